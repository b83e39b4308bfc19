//! Local process orchestrator for the code-quality platform.
//!
//! Supervises the platform's three cooperating child processes (search
//! engine, web server, compute engine): starts them in dependency order,
//! waits for each to report operational on a shared memory-mapped health
//! channel, watches heartbeats and deadlines, applies a sliding-window
//! restart budget, and guarantees bounded-time shutdown.

pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod process;
pub mod restart;
pub mod state;
pub mod supervisor;
pub mod watchdog;
