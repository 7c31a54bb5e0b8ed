//! Push-to-pull bridge for event-driven decoders.
//!
//! Some decoders (spreadsheet readers in particular) drive the caller: they fire a callback per
//! cell and per row boundary instead of handing rows out one at a time. [`spawn_bridge`] runs such
//! a decoder on a dedicated worker thread and exposes its rows as a pull-based [`BridgeStream`].
//!
//! - The worker and the consumer share exactly one bounded buffer of `capacity` frames. A full
//!   buffer blocks the worker, so memory stays bounded even when the consumer is slow.
//! - After the decoder returns (or panics) the worker sends a single end-of-stream frame carrying
//!   the decoder's result; a decode failure is therefore observed as an error, never as a short
//!   but "successful" stream.
//! - Closing (or dropping) the stream cancels the worker: the buffer's receiving half is dropped,
//!   which fails any blocked push with [`BridgeClosed`], and the worker is joined so the decoder's
//!   resources are released before `close` returns.

use std::any::Any;
use std::fmt;
use std::iter::FusedIterator;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Record;

/// Default number of records buffered between a bridge worker and its consumer.
pub const DEFAULT_BRIDGE_CAPACITY: usize = 1_024;

/// Returned to the decoder when the consumer has closed the stream.
///
/// The decoder should stop producing and return as soon as it sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("record stream closed by consumer")]
pub struct BridgeClosed;

impl From<BridgeClosed> for IngestionError {
    fn from(_: BridgeClosed) -> Self {
        IngestionError::Cancelled
    }
}

/// Callback contract of an event-driven (SAX-style) row decoder.
///
/// A decoder reports each logical row as `start_row`, zero or more `cell`s in column order, then
/// `end_row`.
pub trait RowEvents {
    /// A new row begins. Any cells from an unterminated previous row are discarded.
    fn start_row(&mut self, row: u32);

    /// One cell value of the current row, already formatted as text.
    fn cell(&mut self, value: String);

    /// The current row is complete.
    ///
    /// Returns [`BridgeClosed`] if nobody will consume the row; the decoder must stop.
    fn end_row(&mut self, row: u32) -> Result<(), BridgeClosed>;

    /// Whether the consumer is gone. Decoders may poll this between expensive steps.
    fn is_closed(&self) -> bool {
        false
    }
}

enum Frame {
    Row(Record),
    End(IngestionResult<()>),
}

/// Worker-side half of a bridge: assembles cell events into [`Record`]s and pushes them into the
/// bounded buffer.
pub struct RowAssembler {
    tx: SyncSender<Frame>,
    cancelled: Arc<AtomicBool>,
    cells: Vec<String>,
    emitted: u64,
}

impl RowAssembler {
    fn new(tx: SyncSender<Frame>, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            cancelled,
            cells: Vec::new(),
            emitted: 0,
        }
    }

    /// Push a complete record, blocking while the buffer is full.
    pub fn push(&mut self, record: Record) -> Result<(), BridgeClosed> {
        if self.is_closed() {
            return Err(BridgeClosed);
        }
        self.tx.send(Frame::Row(record)).map_err(|_| BridgeClosed)?;
        self.emitted += 1;
        Ok(())
    }

    /// Number of records pushed so far.
    pub fn rows_emitted(&self) -> u64 {
        self.emitted
    }

    // Consumes the assembler so the end-of-stream frame can only ever be sent once.
    fn finish(self, result: IngestionResult<()>) {
        if self.tx.send(Frame::End(result)).is_err() {
            debug!(rows = self.emitted, "bridge consumer gone before end-of-stream");
        }
    }
}

impl RowEvents for RowAssembler {
    fn start_row(&mut self, _row: u32) {
        self.cells.clear();
    }

    fn cell(&mut self, value: String) {
        self.cells.push(value);
    }

    fn end_row(&mut self, _row: u32) -> Result<(), BridgeClosed> {
        if self.cells.is_empty() {
            return Ok(());
        }
        let record = Record::from_fields(self.cells.drain(..));
        self.push(record)
    }

    fn is_closed(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RowAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowAssembler")
            .field("pending_cells", &self.cells.len())
            .field("emitted", &self.emitted)
            .finish()
    }
}

/// Start a bridge worker named `name` running `produce`, buffering at most `capacity` records.
///
/// `capacity` values below 1 are raised to 1. `produce` owns everything it captures (typically
/// the input byte stream) for the lifetime of the worker.
///
/// ```rust
/// use file_publisher::ingestion::bridge::{spawn_bridge, RowEvents};
///
/// let stream = spawn_bridge("demo", 4, |rows| {
///     for i in 0..3u32 {
///         rows.start_row(i);
///         rows.cell(format!("r{i}"));
///         rows.cell("x".to_string());
///         rows.end_row(i)?;
///     }
///     Ok(())
/// })
/// .unwrap();
///
/// let lines: Vec<String> = stream.map(|r| r.unwrap().into_string()).collect();
/// assert_eq!(lines, vec!["r0;x", "r1;x", "r2;x"]);
/// ```
pub fn spawn_bridge<F>(name: &str, capacity: usize, produce: F) -> IngestionResult<BridgeStream>
where
    F: FnOnce(&mut RowAssembler) -> IngestionResult<()> + Send + 'static,
{
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::sync_channel(capacity);
    let cancelled = Arc::new(AtomicBool::new(false));
    let worker_cancelled = Arc::clone(&cancelled);

    let worker = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let mut rows = RowAssembler::new(tx, worker_cancelled);
            let result = match panic::catch_unwind(AssertUnwindSafe(|| produce(&mut rows))) {
                Ok(result) => result,
                Err(payload) => Err(IngestionError::Decode {
                    message: format!("decoder worker panicked: {}", panic_message(payload.as_ref())),
                }),
            };
            match &result {
                Ok(()) => debug!(rows = rows.rows_emitted(), "bridge decoder finished"),
                Err(IngestionError::Cancelled) => debug!(rows = rows.rows_emitted(), "bridge decoder cancelled"),
                Err(e) => warn!(rows = rows.rows_emitted(), error = %e, "bridge decoder failed"),
            }
            rows.finish(result);
        })?;

    Ok(BridgeStream {
        name: name.to_string(),
        rx: Some(rx),
        worker: Some(worker),
        cancelled,
        finished: false,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Consumer-side half of a bridge: a lazy, single-pass sequence of records.
///
/// Yields `Ok(record)` in the order the decoder completed rows, then either ends (`None`) or
/// yields exactly one `Err` carrying the decoder failure; it is fused afterwards.
pub struct BridgeStream {
    name: String,
    rx: Option<Receiver<Frame>>,
    worker: Option<JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

impl BridgeStream {
    /// Stop the worker and release the decoder. Safe to call more than once.
    pub fn close(&mut self) {
        self.finished = true;
        if self.rx.is_none() && self.worker.is_none() {
            return;
        }
        self.cancelled.store(true, Ordering::Release);
        // Dropping the receiver wakes a worker blocked on a full buffer.
        drop(self.rx.take());
        self.join_worker();
    }

    /// Whether the stream has ended (exhausted, failed, or closed).
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(bridge = %self.name, "bridge worker terminated abnormally");
            }
        }
    }

    fn end(&mut self) {
        self.finished = true;
        drop(self.rx.take());
        self.join_worker();
    }
}

impl Iterator for BridgeStream {
    type Item = IngestionResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let frame = self.rx.as_ref()?.recv();
        match frame {
            Ok(Frame::Row(record)) => Some(Ok(record)),
            Ok(Frame::End(Ok(()))) => {
                self.end();
                None
            }
            Ok(Frame::End(Err(e))) => {
                self.end();
                Some(Err(e))
            }
            Err(_) => {
                self.end();
                Some(Err(IngestionError::Decode {
                    message: format!("bridge worker '{}' exited without end-of-stream", self.name),
                }))
            }
        }
    }
}

impl FusedIterator for BridgeStream {}

impl Drop for BridgeStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BridgeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeStream")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .field("worker_alive", &self.worker.is_some())
            .finish()
    }
}
