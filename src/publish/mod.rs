//! Asynchronous record sinks.
//!
//! A [`PublishSink`] accepts one [`Record`] per call and hands back a future that resolves to the
//! delivery outcome. Submission itself must not wait for the broker; the publisher spawns the
//! returned future and folds its outcome into the run counters.
//!
//! Implementations:
//! - [`LogSink`]: logs each record and always delivers (dry runs, local testing)
//! - `kafka::KafkaSink`: produces to a Kafka topic (requires the `kafka` feature)

#[cfg(feature = "kafka")]
pub mod kafka;

use futures::future::{self, BoxFuture, FutureExt};
use tracing::info;

use crate::error::PublishError;
use crate::types::Record;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaSink, KafkaSinkConfig};

/// Outcome of publishing one record: delivered, or failed with a reason.
pub type PublishOutcome = Result<(), PublishError>;

/// Destination for published records.
pub trait PublishSink: Send + Sync {
    /// Destination name used in logs (topic, queue, ...).
    fn destination(&self) -> &str;

    /// Submit `record` for delivery.
    ///
    /// The record must be handed to the transport before this returns: calls arrive in stream
    /// order, while the returned futures may be polled in any order. The future resolves exactly
    /// once with the outcome for this record.
    fn publish(&self, record: Record) -> BoxFuture<'static, PublishOutcome>;
}

/// Sink that writes every record to the `file_publisher::sink` log target.
#[derive(Debug, Clone)]
pub struct LogSink {
    destination: String,
}

impl LogSink {
    /// Create a log sink reporting `destination` as its target.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl PublishSink for LogSink {
    fn destination(&self) -> &str {
        &self.destination
    }

    fn publish(&self, record: Record) -> BoxFuture<'static, PublishOutcome> {
        info!(target: "file_publisher::sink", destination = %self.destination, record = %record, "record published");
        future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::{LogSink, PublishSink};
    use crate::types::Record;

    #[tokio::test]
    async fn log_sink_always_delivers() {
        let sink = LogSink::new("file-lines");
        assert_eq!(sink.destination(), "file-lines");
        assert!(sink.publish(Record::new("a;b")).await.is_ok());
    }
}
