use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::ingestion::IngestionFormat;
use crate::types::Record;

use super::RunSummary;

/// Events emitted by the publisher during a run.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted {
        path: PathBuf,
    },
    DecoderResolved {
        path: PathBuf,
        format: IngestionFormat,
    },
    ThrottleWaited {
        duration: Duration,
    },
    /// One record could not be delivered. Carries the record so it can be replayed.
    PublishFailed {
        record: Record,
        reason: String,
    },
    RunFinished {
        summary: RunSummary,
    },
    RunFailed {
        summary: RunSummary,
        error: String,
    },
}

/// Observer hook for run events.
///
/// `on_event` may be called concurrently from publish completion tasks.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

/// Logs run events through `tracing`.
///
/// Decoder selection and final counts at `info`, failed records and fatal errors at `error`,
/// throttling at `debug`.
#[derive(Debug, Default)]
pub struct TracingRunObserver;

impl RunObserver for TracingRunObserver {
    fn on_event(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { path } => {
                info!(path = %path.display(), "starting file processing");
            }
            RunEvent::DecoderResolved { path, format } => {
                info!(
                    path = %path.display(),
                    decoder = %format,
                    event_driven = format.is_event_driven(),
                    "using decoder"
                );
            }
            RunEvent::ThrottleWaited { duration } => {
                debug!(?duration, "in-flight publish window full");
            }
            RunEvent::PublishFailed { record, reason } => {
                error!(record = %record, reason = %reason, "failed to publish record");
            }
            RunEvent::RunFinished { summary } => {
                info!(
                    path = %summary.path.display(),
                    delivered = summary.delivered,
                    failed = summary.failed,
                    elapsed = ?summary.elapsed,
                    "file processing completed"
                );
            }
            RunEvent::RunFailed { summary, error } => {
                error!(
                    path = %summary.path.display(),
                    error = %error,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "fatal error while processing file"
                );
            }
        }
    }
}

/// An observer that fans out events to a list of observers.
#[derive(Default)]
pub struct CompositeRunObserver {
    observers: Vec<Arc<dyn RunObserver>>,
}

impl CompositeRunObserver {
    pub fn new(observers: Vec<Arc<dyn RunObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeRunObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRunObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl RunObserver for CompositeRunObserver {
    fn on_event(&self, event: &RunEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }
}

/// Counters for one run.
///
/// Updated concurrently by the streaming thread and publish completion tasks; every update is a
/// single atomic operation so completion order does not matter.
pub struct RunMetrics {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    throttle_wait_ns: AtomicU64,

    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn on_submitted(&self) {
        let _ = self.submitted.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_delivered(&self) {
        let _ = self.delivered.fetch_add(1, Ordering::SeqCst);
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_failed(&self) {
        let _ = self.failed.fetch_add(1, Ordering::SeqCst);
        let _ = self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let add = d.as_nanos().min(u64::MAX as u128) as u64;
        let _ = self.throttle_wait_ns.fetch_add(add, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        RunMetricsSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            max_in_flight: self.max_in_flight.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of [`RunMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetricsSnapshot {
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub in_flight: usize,
    pub max_in_flight: usize,
    pub throttle_wait: Duration,
}

impl fmt::Display for RunMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "submitted={}, delivered={}, failed={}, in_flight={}, max_in_flight={}, throttle_wait={:?}",
            self.submitted,
            self.delivered,
            self.failed,
            self.in_flight,
            self.max_in_flight,
            self.throttle_wait
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{CompositeRunObserver, RunEvent, RunMetrics, RunObserver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_outcomes_add_up() {
        let metrics = Arc::new(RunMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for i in 0..250 {
                        m.on_submitted();
                        if (t + i) % 5 == 0 {
                            m.on_failed();
                        } else {
                            m.on_delivered();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.submitted, 2_000);
        assert_eq!(snap.delivered + snap.failed, 2_000);
        assert_eq!(snap.failed, 400);
        assert_eq!(snap.in_flight, 0);
        assert!(snap.max_in_flight >= 1);
    }

    #[test]
    fn throttle_wait_accumulates() {
        let metrics = RunMetrics::default();
        metrics.on_throttle_wait(Duration::from_millis(3));
        metrics.on_throttle_wait(Duration::from_millis(4));
        assert_eq!(metrics.snapshot().throttle_wait, Duration::from_millis(7));
    }

    struct Counting(AtomicUsize);

    impl RunObserver for Counting {
        fn on_event(&self, _event: &RunEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn composite_forwards_to_every_observer() {
        let a = Arc::new(Counting(AtomicUsize::new(0)));
        let b = Arc::new(Counting(AtomicUsize::new(0)));
        let composite = CompositeRunObserver::new(vec![a.clone(), b.clone()]);
        composite.on_event(&RunEvent::ThrottleWaited {
            duration: Duration::from_millis(1),
        });
        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }
}
