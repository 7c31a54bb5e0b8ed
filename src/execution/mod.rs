//! Streaming publish orchestration.
//!
//! [`StreamingPublisher`] drives one run per input file:
//!
//! 1. resolve the decoder from the file extension ([`DecoderRegistry`])
//! 2. open the file and decode it into a lazy [`RecordStream`]
//! 3. submit every record to the [`PublishSink`] without waiting for its outcome
//! 4. fold delivery outcomes into the run counters and report them once everything settled
//!
//! Decoding and submission run on a tokio blocking thread; each submission spawns one task on the
//! caller's runtime that awaits the sink's future. A tokio semaphore bounds how many
//! submissions may be outstanding at once ([`PublishOptions::max_in_flight`]).
//!
//! Records are handed to the sink one at a time, in the order the stream yields them; only the
//! outcomes are awaited concurrently.
//!
//! Per-record delivery failures are counted and reported through the observer; they never stop
//! the run. A decode failure stops submission, closes the stream, waits for outstanding
//! submissions, and fails the run.

mod observer;
mod window;

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::{DecoderRegistry, IngestionFormat, RecordStream, DEFAULT_BRIDGE_CAPACITY};
use crate::publish::PublishSink;
use crate::types::Record;

pub use observer::{
    CompositeRunObserver, RunEvent, RunMetrics, RunMetricsSnapshot, RunObserver, TracingRunObserver,
};

use window::InFlightWindow;

/// Default upper bound on outstanding publishes.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1_024;

/// Configuration for the [`StreamingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Records buffered between an event-driven decoder's worker and the publisher.
    pub bridge_capacity: usize,
    /// Upper bound on submitted-but-unsettled publishes.
    ///
    /// When the window is full, decoding pauses until an outcome arrives.
    pub max_in_flight: usize,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            bridge_capacity: DEFAULT_BRIDGE_CAPACITY,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Lifecycle of one run.
///
/// `Idle → DecoderResolved → Streaming → {Completed | Failed}`; `Failed` is also reachable from
/// `Idle` (no decoder) and `DecoderResolved`. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    DecoderResolved,
    Streaming,
    Completed,
    Failed,
}

impl RunState {
    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, DecoderResolved)
                | (Idle, Failed)
                | (DecoderResolved, Streaming)
                | (DecoderResolved, Failed)
                | (Streaming, Completed)
                | (Streaming, Failed)
        )
    }

    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed)
    }
}

/// Final report of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub path: PathBuf,
    /// `None` if no decoder matched.
    pub format: Option<IngestionFormat>,
    pub state: RunState,
    pub submitted: u64,
    pub delivered: u64,
    pub failed: u64,
    pub max_in_flight: usize,
    pub throttle_wait: Duration,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Whether the run completed (per-record failures do not count against this).
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path={}, state={:?}, delivered={}, failed={}, submitted={}, elapsed={:?}",
            self.path.display(),
            self.state,
            self.delivered,
            self.failed,
            self.submitted,
            self.elapsed
        )
    }
}

/// Streams one file's records into a [`PublishSink`].
pub struct StreamingPublisher {
    registry: DecoderRegistry,
    sink: Arc<dyn PublishSink>,
    opts: PublishOptions,
    observer: Arc<dyn RunObserver>,
}

impl StreamingPublisher {
    /// Create a publisher. Events are logged through [`TracingRunObserver`] unless replaced with
    /// [`Self::with_observer`].
    ///
    /// # Panics
    ///
    /// Panics if `bridge_capacity == 0` or `max_in_flight == 0`.
    pub fn new(registry: DecoderRegistry, sink: Arc<dyn PublishSink>, opts: PublishOptions) -> Self {
        assert!(opts.bridge_capacity > 0, "bridge_capacity must be > 0");
        assert!(opts.max_in_flight > 0, "max_in_flight must be > 0");
        Self {
            registry,
            sink,
            opts,
            observer: Arc::new(TracingRunObserver),
        }
    }

    /// Replace the observer for run events.
    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Publish every record of the file at `path`.
    ///
    /// Must be called from within a tokio runtime. Returns once every submitted record has an
    /// outcome; on a fatal error the returned error is the cause and the partial counts are
    /// reported through [`RunEvent::RunFailed`].
    ///
    /// ```no_run
    /// use std::sync::Arc;
    ///
    /// use file_publisher::execution::{PublishOptions, StreamingPublisher};
    /// use file_publisher::ingestion::DecoderRegistry;
    /// use file_publisher::publish::LogSink;
    ///
    /// # async fn demo() -> Result<(), file_publisher::IngestionError> {
    /// let publisher = StreamingPublisher::new(
    ///     DecoderRegistry::default(),
    ///     Arc::new(LogSink::new("file-lines")),
    ///     PublishOptions::default(),
    /// );
    /// let summary = publisher.run("people.csv").await?;
    /// println!("delivered={} failed={}", summary.delivered, summary.failed);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run(&self, path: impl AsRef<Path>) -> IngestionResult<RunSummary> {
        let path = path.as_ref().to_path_buf();
        let mut tracker = RunTracker::new(path.clone(), Arc::clone(&self.observer));
        self.observer.on_event(&RunEvent::RunStarted { path: path.clone() });

        let format = match self.registry.resolve(&path) {
            Ok(format) => format,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.resolved(format);

        let runtime = Handle::current();
        let pump = Pump {
            sink: Arc::clone(&self.sink),
            metrics: Arc::clone(&tracker.metrics),
            observer: Arc::clone(&self.observer),
            window: InFlightWindow::new(self.opts.max_in_flight, runtime.clone()),
            runtime,
        };
        let bridge_capacity = self.opts.bridge_capacity;

        tracker.advance(RunState::Streaming);
        let streamed = tokio::task::spawn_blocking(move || -> IngestionResult<()> {
            let file = File::open(&path)?;
            let records = format.decode(file, bridge_capacity)?;
            pump.publish_all(records)
        })
        .await;

        let result = streamed.unwrap_or_else(|e| {
            Err(IngestionError::Runtime {
                message: format!("streaming task failed: {e}"),
            })
        });
        match result {
            Ok(()) => Ok(tracker.complete()),
            Err(e) => Err(tracker.fail(e)),
        }
    }
}

impl fmt::Debug for StreamingPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingPublisher")
            .field("registry", &self.registry)
            .field("destination", &self.sink.destination())
            .field("opts", &self.opts)
            .finish()
    }
}

struct RunTracker {
    path: PathBuf,
    format: Option<IngestionFormat>,
    state: RunState,
    started: Instant,
    metrics: Arc<RunMetrics>,
    observer: Arc<dyn RunObserver>,
}

impl RunTracker {
    fn new(path: PathBuf, observer: Arc<dyn RunObserver>) -> Self {
        Self {
            path,
            format: None,
            state: RunState::Idle,
            started: Instant::now(),
            metrics: Arc::new(RunMetrics::new()),
            observer,
        }
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
    }

    fn resolved(&mut self, format: IngestionFormat) {
        self.format = Some(format);
        self.advance(RunState::DecoderResolved);
        self.observer.on_event(&RunEvent::DecoderResolved {
            path: self.path.clone(),
            format,
        });
    }

    fn complete(mut self) -> RunSummary {
        self.advance(RunState::Completed);
        let summary = self.summary();
        self.observer.on_event(&RunEvent::RunFinished {
            summary: summary.clone(),
        });
        summary
    }

    fn fail(mut self, error: IngestionError) -> IngestionError {
        self.advance(RunState::Failed);
        self.observer.on_event(&RunEvent::RunFailed {
            summary: self.summary(),
            error: error.to_string(),
        });
        error
    }

    fn summary(&self) -> RunSummary {
        let snap = self.metrics.snapshot();
        RunSummary {
            path: self.path.clone(),
            format: self.format,
            state: self.state,
            submitted: snap.submitted,
            delivered: snap.delivered,
            failed: snap.failed,
            max_in_flight: snap.max_in_flight,
            throttle_wait: snap.throttle_wait,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Everything the streaming thread needs to submit records and settle their outcomes.
struct Pump {
    sink: Arc<dyn PublishSink>,
    metrics: Arc<RunMetrics>,
    observer: Arc<dyn RunObserver>,
    window: InFlightWindow,
    runtime: Handle,
}

impl Pump {
    /// Drain `records` into the sink, then wait until every submission has settled.
    ///
    /// Blocking; must not run on an async worker thread.
    fn publish_all(&self, mut records: RecordStream) -> IngestionResult<()> {
        let outcome = self.drain(&mut records);
        records.close();
        let settled = self.window.wait_idle().map_err(window_closed);
        outcome?;
        settled
    }

    fn drain(&self, records: &mut RecordStream) -> IngestionResult<()> {
        for item in records {
            let record = item?;
            self.submit(record)?;
        }
        Ok(())
    }

    fn submit(&self, record: Record) -> IngestionResult<()> {
        let (permit, waited) = self.window.acquire().map_err(window_closed)?;
        if waited > Duration::ZERO {
            self.metrics.on_throttle_wait(waited);
            self.observer.on_event(&RunEvent::ThrottleWaited { duration: waited });
        }

        self.metrics.on_submitted();
        let delivery = self.sink.publish(record.clone());
        let metrics = Arc::clone(&self.metrics);
        let observer = Arc::clone(&self.observer);

        self.runtime.spawn(async move {
            let _permit = permit;
            match delivery.await {
                Ok(()) => metrics.on_delivered(),
                Err(e) => {
                    metrics.on_failed();
                    observer.on_event(&RunEvent::PublishFailed {
                        record,
                        reason: e.reason,
                    });
                }
            }
        });
        Ok(())
    }
}

fn window_closed(e: tokio::sync::AcquireError) -> IngestionError {
    IngestionError::Runtime {
        message: format!("in-flight window closed: {e}"),
    }
}
