use crate::config::ProcessKind;
use log::debug;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

/// Environment variables through which a child finds its health slot.
pub const HEALTH_FILE_ENV: &str = "CQ_HEALTH_FILE";
pub const HEALTH_SLOT_ENV: &str = "CQ_HEALTH_SLOT";

pub const CHANNEL_FILE_NAME: &str = "cq-health.mmap";

// Fixed binary layout, shared with every child process version. Do not
// reorder or resize fields.
//
//   [0..8)                magic + layout version
//   [8 + slot*16 .. +8)   heartbeat counter (u64, child writes)
//   [8 + slot*16 + 8]     ready byte        (child writes)
//   [8 + slot*16 + 9]     stop-request byte (supervisor writes)
//   remaining slot bytes  reserved
const MAGIC: u64 = 0x6351_4845_414c_5401; // "cQHEALT" + layout version 1
const HEADER_SIZE: usize = 8;
const SLOT_SIZE: usize = 16;
const HEARTBEAT_OFFSET: usize = 0;
const READY_OFFSET: usize = 8;
const STOP_OFFSET: usize = 9;

pub const SLOT_COUNT: usize = ProcessKind::ALL.len();
pub const CHANNEL_SIZE: usize = HEADER_SIZE + SLOT_COUNT * SLOT_SIZE;

pub fn channel_path(run_dir: &Path) -> PathBuf {
    run_dir.join(CHANNEL_FILE_NAME)
}

/// Cross-process health mailbox backed by a memory-mapped file.
///
/// Every field has exactly one writer: the child publishes its heartbeat and
/// ready flag, the supervisor publishes the stop request. Publishes use
/// release stores and reads use acquire loads, so a ready flag observed by
/// the supervisor implies the child's initialization work is complete. No
/// locking, and no supervisor wait on this channel is unbounded — deadlines
/// belong to the watchdog.
#[derive(Debug)]
pub struct HealthChannel {
    mmap: MmapMut,
}

impl HealthChannel {
    /// Create (or reset) the channel file. Supervisor side, called before any
    /// child is spawned.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(CHANNEL_SIZE as u64)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let channel = Self { mmap };
        channel.magic_atomic().store(MAGIC, Ordering::Release);
        debug!("health channel created at {}", path.display());
        Ok(channel)
    }

    /// Map an existing channel file. Child side (and tests acting as the
    /// child). Rejects a file whose magic does not match this layout version.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if file.metadata()?.len() != CHANNEL_SIZE as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("health channel {} has unexpected size", path.display()),
            ));
        }
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let channel = Self { mmap };
        if channel.magic_atomic().load(Ordering::Acquire) != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("health channel {} has unknown layout", path.display()),
            ));
        }
        Ok(channel)
    }

    /// Map the channel designated by `CQ_HEALTH_FILE`/`CQ_HEALTH_SLOT`.
    /// Convenience for child processes; returns the channel and the slot index.
    pub fn attach_from_env() -> io::Result<(Self, usize)> {
        let path = std::env::var(HEALTH_FILE_ENV).map_err(|_| {
            io::Error::new(io::ErrorKind::NotFound, format!("{HEALTH_FILE_ENV} not set"))
        })?;
        let slot: usize = std::env::var(HEALTH_SLOT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s < SLOT_COUNT)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("bad {HEALTH_SLOT_ENV}"))
            })?;
        Ok((Self::open(Path::new(&path))?, slot))
    }

    // -- child-side writes --

    /// Publish readiness. All initialization preceding this call is visible
    /// to the supervisor once it observes the flag.
    pub fn mark_ready(&self, kind: ProcessKind) {
        self.ready_atomic(kind.slot()).store(1, Ordering::Release);
    }

    /// Advance the liveness counter. Called periodically by an operational child.
    pub fn beat(&self, kind: ProcessKind) {
        self.heartbeat_atomic(kind.slot())
            .fetch_add(1, Ordering::Release);
    }

    // -- supervisor-side reads --

    pub fn is_ready(&self, kind: ProcessKind) -> bool {
        self.ready_atomic(kind.slot()).load(Ordering::Acquire) != 0
    }

    pub fn heartbeat(&self, kind: ProcessKind) -> u64 {
        self.heartbeat_atomic(kind.slot()).load(Ordering::Acquire)
    }

    // -- supervisor-side writes --

    /// Ask the child to shut down. The child polls this instead of relying on
    /// OS signals alone.
    pub fn request_stop(&self, kind: ProcessKind) {
        self.stop_atomic(kind.slot()).store(1, Ordering::Release);
    }

    /// Clear a slot before (re)spawning its process. The supervisor is the
    /// sole writer here only because the child is not running yet.
    pub fn reset_slot(&self, kind: ProcessKind) {
        let slot = kind.slot();
        self.ready_atomic(slot).store(0, Ordering::Release);
        self.stop_atomic(slot).store(0, Ordering::Release);
        self.heartbeat_atomic(slot).store(0, Ordering::Release);
    }

    // -- child-side read --

    pub fn stop_requested(&self, kind: ProcessKind) -> bool {
        self.stop_atomic(kind.slot()).load(Ordering::Acquire) != 0
    }

    fn magic_atomic(&self) -> &AtomicU64 {
        // The mmap is page-aligned, so offset 0 is 8-byte aligned.
        unsafe { &*self.mmap.as_ptr().cast::<AtomicU64>() }
    }

    fn heartbeat_atomic(&self, slot: usize) -> &AtomicU64 {
        debug_assert!(slot < SLOT_COUNT);
        let offset = HEADER_SIZE + slot * SLOT_SIZE + HEARTBEAT_OFFSET;
        unsafe { &*self.mmap.as_ptr().add(offset).cast::<AtomicU64>() }
    }

    fn ready_atomic(&self, slot: usize) -> &AtomicU8 {
        debug_assert!(slot < SLOT_COUNT);
        let offset = HEADER_SIZE + slot * SLOT_SIZE + READY_OFFSET;
        unsafe { &*self.mmap.as_ptr().add(offset).cast::<AtomicU8>() }
    }

    fn stop_atomic(&self, slot: usize) -> &AtomicU8 {
        debug_assert!(slot < SLOT_COUNT);
        let offset = HEADER_SIZE + slot * SLOT_SIZE + STOP_OFFSET;
        unsafe { &*self.mmap.as_ptr().add(offset).cast::<AtomicU8>() }
    }
}
