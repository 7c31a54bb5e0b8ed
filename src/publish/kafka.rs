//! Kafka publish sink built on rdkafka's `FutureProducer`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use rdkafka::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::error::PublishError;
use crate::types::Record;

use super::{PublishOutcome, PublishSink};

/// Default time a record may wait for broker acknowledgement.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection and topic settings for [`KafkaSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaSinkConfig {
    /// Comma-separated `host:port` list.
    pub bootstrap_servers: String,
    /// Topic every record is produced to.
    pub topic: String,
    /// Upper bound on local queueing plus broker acknowledgement for one record
    /// (librdkafka `message.timeout.ms`).
    pub message_timeout: Duration,
    /// Extra librdkafka properties, applied last.
    pub properties: Vec<(String, String)>,
}

impl KafkaSinkConfig {
    /// Create a config with default timeout and no extra properties.
    pub fn new(bootstrap_servers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            topic: topic.into(),
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            properties: Vec::new(),
        }
    }

    /// Build the librdkafka client configuration.
    pub fn to_rdkafka_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("message.timeout.ms", self.message_timeout.as_millis().to_string());
        for (key, value) in &self.properties {
            config.set(key, value);
        }
        config
    }
}

/// Produces each record's text as an un-keyed message to one topic.
///
/// A record is placed on the producer queue inside [`PublishSink::publish`]; a full local queue
/// fails that record immediately instead of waiting for room.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer,
    topic: Arc<str>,
    message_timeout: Duration,
}

impl KafkaSink {
    /// Create the producer. Connection to the brokers happens lazily in the background.
    pub fn connect(config: &KafkaSinkConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = config.to_rdkafka_config().create()?;
        Ok(Self {
            producer,
            topic: Arc::from(config.topic.as_str()),
            message_timeout: config.message_timeout,
        })
    }
}

impl PublishSink for KafkaSink {
    fn destination(&self) -> &str {
        &self.topic
    }

    fn publish(&self, record: Record) -> BoxFuture<'static, PublishOutcome> {
        // Enqueue now so librdkafka sees records in submission order; only the acknowledgement
        // is left to the returned future.
        let message = FutureRecord::<(), str>::to(&self.topic).payload(record.as_str());
        match self.producer.send_result(message) {
            Ok(delivery) => async move {
                match delivery.await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err((e, _))) => Err(PublishError::new(e.to_string())),
                    Err(canceled) => Err(PublishError::new(format!("delivery canceled: {canceled}"))),
                }
            }
            .boxed(),
            Err((e, _)) => future::ready(Err(PublishError::new(e.to_string()))).boxed(),
        }
    }
}

impl fmt::Debug for KafkaSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KafkaSink")
            .field("topic", &self.topic)
            .field("message_timeout", &self.message_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{KafkaSink, KafkaSinkConfig};
    use std::time::Duration;

    use crate::publish::PublishSink;
    use crate::types::Record;

    #[test]
    fn rdkafka_config_carries_servers_timeout_and_overrides() {
        let mut cfg = KafkaSinkConfig::new("broker-1:9092,broker-2:9092", "file-lines");
        cfg.message_timeout = Duration::from_millis(2_500);
        cfg.properties.push(("acks".to_string(), "all".to_string()));

        let rd = cfg.to_rdkafka_config();
        assert_eq!(rd.get("bootstrap.servers"), Some("broker-1:9092,broker-2:9092"));
        assert_eq!(rd.get("message.timeout.ms"), Some("2500"));
        assert_eq!(rd.get("acks"), Some("all"));
    }

    #[tokio::test]
    async fn records_are_enqueued_when_submitted_not_when_polled() {
        // No broker listens here, so the first record stays queued until it times out.
        let mut cfg = KafkaSinkConfig::new("127.0.0.1:1", "file-lines");
        cfg.message_timeout = Duration::from_millis(300);
        cfg.properties
            .push(("queue.buffering.max.messages".to_string(), "1".to_string()));
        let sink = KafkaSink::connect(&cfg).unwrap();

        let first = sink.publish(Record::new("first"));
        // The queue slot was taken by `first` before it was ever polled.
        let second = sink.publish(Record::new("second"));

        let rejected = tokio::time::timeout(Duration::from_millis(100), second)
            .await
            .expect("a full queue must fail immediately");
        assert!(rejected.is_err());

        let timed_out = tokio::time::timeout(Duration::from_secs(10), first)
            .await
            .expect("queued record must settle after message.timeout.ms");
        assert!(timed_out.is_err());
    }
}
