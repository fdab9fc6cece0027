//! Progress reporting.
//!
//! Engines never talk to a UI. They push events into an `EventSink`, which in
//! the front ends is the sending half of a channel drained by a render loop.
//! Events are emitted from a single worker thread, so a FIFO channel delivers
//! them in emission order.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::model::Diagnostic;

/// Default capacity for a copy job's event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiver of engine events.
///
/// All methods are called synchronously from the engine's worker thread.
pub trait EventSink<E>: Send {
    fn emit(&self, event: E);
}

impl<E: Send> EventSink<E> for Sender<E> {
    fn emit(&self, event: E) {
        // A dropped receiver means nobody is watching anymore; the job still runs.
        let _ = self.send(event);
    }
}

impl<E: Send> EventSink<E> for Mutex<Vec<E>> {
    fn emit(&self, event: E) {
        if let Ok(mut events) = self.lock() {
            events.push(event);
        }
    }
}

/// Adapter turning a closure into an `EventSink`.
pub struct FnSink<F>(pub F);

impl<E, F> EventSink<E> for FnSink<F>
where
    F: Fn(E) + Send,
{
    fn emit(&self, event: E) {
        (self.0)(event)
    }
}

/// Events emitted by the copy engine, in order.
///
/// `Complete`, `Cancel` and `Error` are terminal; a run emits exactly one of
/// them, last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyProgressEvent {
    /// Emitted once before the first byte is copied
    Start { total_bytes: u64 },
    /// Cumulative bytes copied so far in this run
    Progress { copied_bytes: u64 },
    /// The byte budget shrank because a file was skipped
    AdjustTotal { new_total_bytes: u64 },
    /// A per-item diagnostic
    Log(Diagnostic),
    Complete { message: String },
    Cancel { message: String },
    Error { message: String },
}

impl CopyProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CopyProgressEvent::Complete { .. }
                | CopyProgressEvent::Cancel { .. }
                | CopyProgressEvent::Error { .. }
        )
    }
}

/// Events emitted by the discovery engine, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    /// Directory count of the pre-pass over all valid roots
    Start { total_dirs: u64 },
    Progress { processed_dirs: u64, total_dirs: u64 },
    /// A skipped root or an unreadable directory
    Diagnostic(Diagnostic),
    Complete { found: usize },
    Cancelled { found: usize },
}

impl DiscoveryEvent {
    /// Fraction of directories processed, for `Progress` events.
    pub fn fraction(&self) -> Option<f32> {
        match self {
            DiscoveryEvent::Progress {
                processed_dirs,
                total_dirs,
            } => Some(fraction(*processed_dirs, *total_dirs)),
            DiscoveryEvent::Complete { .. } => Some(1.0),
            _ => None,
        }
    }
}

/// `done / total` clamped to `[0, 1]`, with an empty total counting as done.
pub fn fraction(done: u64, total: u64) -> f32 {
    if total == 0 {
        return 1.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0) as f32
}

/// Consumer-side view of a copy run, rebuilt from its events.
///
/// Progress fraction, speed and ETA are all computed against the adjusted
/// total, so skipped files never leave the bar short of 100%.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    pub total_bytes: u64,
    pub copied_bytes: u64,
    pub running: bool,
    /// Message of the last terminal event
    pub status: Option<String>,
    started_at: Option<Instant>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &CopyProgressEvent) {
        match event {
            CopyProgressEvent::Start { total_bytes } => {
                self.total_bytes = *total_bytes;
                self.copied_bytes = 0;
                self.running = true;
                self.status = None;
                self.started_at = Some(Instant::now());
            }
            CopyProgressEvent::Progress { copied_bytes } => {
                self.copied_bytes = *copied_bytes;
            }
            CopyProgressEvent::AdjustTotal { new_total_bytes } => {
                self.total_bytes = *new_total_bytes;
            }
            CopyProgressEvent::Log(_) => {}
            CopyProgressEvent::Complete { message }
            | CopyProgressEvent::Cancel { message }
            | CopyProgressEvent::Error { message } => {
                self.running = false;
                self.status = Some(message.clone());
            }
        }
    }

    pub fn fraction(&self) -> f32 {
        fraction(self.copied_bytes, self.total_bytes)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    pub fn speed_bytes_per_sec(&self) -> f64 {
        self.speed_after(self.elapsed())
    }

    pub fn eta(&self) -> Duration {
        self.eta_after(self.elapsed())
    }

    /// Average speed if `elapsed` has passed since `Start`.
    pub fn speed_after(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.copied_bytes as f64 / secs
    }

    /// Remaining time at the average speed seen after `elapsed`.
    pub fn eta_after(&self, elapsed: Duration) -> Duration {
        let remaining = self.total_bytes.saturating_sub(self.copied_bytes) as f64;
        let speed = self.speed_after(elapsed).max(1.0);
        Duration::from_secs_f64(remaining / speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction_zero_total_is_complete() {
        assert_eq!(fraction(0, 0), 1.0);
        assert_eq!(fraction(5, 10), 0.5);
        assert_eq!(fraction(20, 10), 1.0);
    }

    #[test]
    fn test_tracker_uses_adjusted_total() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&CopyProgressEvent::Start { total_bytes: 100 });
        tracker.apply(&CopyProgressEvent::AdjustTotal {
            new_total_bytes: 50,
        });
        tracker.apply(&CopyProgressEvent::Progress { copied_bytes: 50 });

        assert!(tracker.running);
        assert_eq!(tracker.fraction(), 1.0);

        tracker.apply(&CopyProgressEvent::Complete {
            message: "Copying completed.".to_string(),
        });
        assert!(!tracker.running);
        assert_eq!(tracker.status.as_deref(), Some("Copying completed."));
    }

    #[test]
    fn test_tracker_speed_and_eta() {
        let mut tracker = ProgressTracker::new();
        tracker.apply(&CopyProgressEvent::Start { total_bytes: 300 });
        tracker.apply(&CopyProgressEvent::Progress { copied_bytes: 100 });

        assert_eq!(tracker.speed_after(Duration::from_secs(2)), 50.0);
        assert_eq!(tracker.eta_after(Duration::from_secs(2)), Duration::from_secs(4));
        assert_eq!(tracker.speed_after(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_channel_sink_preserves_order() {
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.emit(CopyProgressEvent::Start { total_bytes: 3 });
        tx.emit(CopyProgressEvent::Progress { copied_bytes: 3 });

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                CopyProgressEvent::Start { total_bytes: 3 },
                CopyProgressEvent::Progress { copied_bytes: 3 },
            ]
        );
    }

    #[test]
    fn test_discovery_event_fraction() {
        let event = DiscoveryEvent::Progress {
            processed_dirs: 10,
            total_dirs: 40,
        };
        assert_eq!(event.fraction(), Some(0.25));
        assert_eq!(DiscoveryEvent::Start { total_dirs: 4 }.fraction(), None);
    }
}
