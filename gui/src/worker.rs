use std::thread::JoinHandle;

use crossbeam_channel::Receiver;
use savemgr_engine::{
    join_with_timeout, CancellationToken, CopyEngine, CopyJobConfig, CopyProgressEvent,
    DiscoveryConfig, DiscoveryEngine, DiscoveryEvent, DiscoveryResult, EngineError, JobReport,
    DEFAULT_CHANNEL_CAPACITY, SHUTDOWN_TIMEOUT,
};

/// A spawned worker and the channel it reports through.
struct Running<E, T> {
    events: Receiver<E>,
    handle: JoinHandle<T>,
}

/// What a worker reported since the last poll.
pub struct Polled<E, T> {
    pub events: Vec<E>,
    /// Set once the worker has exited; always after its last event
    pub finished: Option<T>,
}

fn poll<E, T>(slot: &mut Option<Running<E, T>>, what: &str) -> Polled<E, T> {
    let Some(running) = slot.as_ref() else {
        return Polled {
            events: Vec::new(),
            finished: None,
        };
    };
    let mut events: Vec<E> = running.events.try_iter().collect();
    if !running.handle.is_finished() {
        return Polled {
            events,
            finished: None,
        };
    }

    let Some(running) = slot.take() else {
        return Polled {
            events,
            finished: None,
        };
    };
    events.extend(running.events.try_iter());
    let finished = match running.handle.join() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::error!("{} worker panicked", what);
            None
        }
    };
    Polled { events, finished }
}

/// Copy and scan workers owned by the window, at most one of each.
#[derive(Default)]
pub struct Workers {
    copy_engine: CopyEngine,
    scan_engine: DiscoveryEngine,
    copy_cancel: CancellationToken,
    scan_cancel: CancellationToken,
    copy: Option<Running<CopyProgressEvent, JobReport>>,
    scan: Option<Running<DiscoveryEvent, DiscoveryResult>>,
}

impl Workers {
    pub fn is_copying(&self) -> bool {
        self.copy.is_some()
    }

    pub fn is_scanning(&self) -> bool {
        self.scan.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.is_copying() || self.is_scanning()
    }

    /// Validate and copy on the worker; validation diagnostics arrive as events.
    pub fn start_copy(&mut self, config: CopyJobConfig) -> Result<(), EngineError> {
        let (tx, rx) = crossbeam_channel::bounded(DEFAULT_CHANNEL_CAPACITY);
        let handle = self
            .copy_engine
            .spawn_validated(config, self.copy_cancel.clone(), tx)?;
        self.copy = Some(Running { events: rx, handle });
        Ok(())
    }

    pub fn start_scan(&mut self, config: DiscoveryConfig) -> Result<(), EngineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = self
            .scan_engine
            .spawn(config, self.scan_cancel.clone(), tx)?;
        self.scan = Some(Running { events: rx, handle });
        Ok(())
    }

    /// Request cancellation of whatever is running. Returns false if idle.
    pub fn cancel(&self) -> bool {
        if self.copy.is_some() {
            self.copy_cancel.cancel();
        }
        if self.scan.is_some() {
            self.scan_cancel.cancel();
        }
        self.is_busy()
    }

    pub fn poll_copy(&mut self) -> Polled<CopyProgressEvent, JobReport> {
        poll(&mut self.copy, "copy")
    }

    pub fn poll_scan(&mut self) -> Polled<DiscoveryEvent, DiscoveryResult> {
        poll(&mut self.scan, "scan")
    }

    /// Cancel both workers and wait a bounded time for each to exit.
    ///
    /// Receivers are dropped first so a worker blocked on a full channel
    /// wakes up and reaches its next cancellation check.
    pub fn shutdown(&mut self) {
        self.cancel();
        if let Some(Running { events, handle }) = self.copy.take() {
            drop(events);
            if join_with_timeout(handle, SHUTDOWN_TIMEOUT).is_none() {
                tracing::warn!("copy worker still running at exit");
            }
        }
        if let Some(Running { events, handle }) = self.scan.take() {
            drop(events);
            if join_with_timeout(handle, SHUTDOWN_TIMEOUT).is_none() {
                tracing::warn!("scan worker still running at exit");
            }
        }
    }
}
