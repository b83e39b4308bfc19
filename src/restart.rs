use crate::config::RestartBudgetConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window restart budget: at most `max_restarts` automatic restarts
/// within `window`. Bounds restart storms; an exhausted budget is terminal.
#[derive(Debug)]
pub struct RestartBudget {
    max_restarts: u32,
    window: Duration,
    consumed: VecDeque<Instant>,
}

impl RestartBudget {
    pub fn new(max_restarts: u32, window: Duration) -> Self {
        Self {
            max_restarts,
            window,
            consumed: VecDeque::new(),
        }
    }

    pub fn from_config(config: &RestartBudgetConfig) -> Self {
        Self::new(config.max_restarts, Duration::from_secs(config.window_secs))
    }

    pub fn max_restarts(&self) -> u32 {
        self.max_restarts
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Try to consume one restart at `now`. Returns false once the window
    /// already holds `max_restarts` consumptions.
    pub fn try_consume(&mut self, now: Instant) -> bool {
        while let Some(&front) = self.consumed.front() {
            if now.duration_since(front) > self.window {
                self.consumed.pop_front();
            } else {
                break;
            }
        }
        if self.consumed.len() as u64 >= self.max_restarts as u64 {
            return false;
        }
        self.consumed.push_back(now);
        true
    }
}
