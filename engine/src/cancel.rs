//! Cooperative cancellation shared between a caller and an engine worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default time a shutdown waits for a worker to notice cancellation.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Cancellation token for stopping copy jobs and scans.
///
/// Clones share the same flag. Engines check it at fixed points (before each
/// directory, before each file, before each chunk write) and reset it once
/// they return.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next job starts clean.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the token when dropped, whatever way the worker leaves.
pub(crate) struct ResetOnDrop<'a>(pub(crate) &'a CancellationToken);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

/// Single-occupancy flag refusing a second job while one is running.
#[derive(Debug, Clone, Default)]
pub struct JobSlot {
    busy: Arc<AtomicBool>,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Claim the slot, or `None` if a job already holds it.
    pub fn try_acquire(&self) -> Option<JobSlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| JobSlotGuard {
                busy: Arc::clone(&self.busy),
            })
    }
}

/// Releases its `JobSlot` when dropped.
#[derive(Debug)]
pub struct JobSlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for JobSlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Wait for a worker to finish, giving up after `timeout`.
///
/// Returns `Some` with the worker's value if it finished in time. A worker that
/// panicked is reported as `None` as well. A timed out worker keeps running
/// detached.
pub fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> Option<T> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            tracing::warn!("worker did not stop within {:?}", timeout);
            return None;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    handle.join().ok()
}
