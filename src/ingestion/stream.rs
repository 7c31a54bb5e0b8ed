//! The lazy record sequence every decoder hands to the publisher.

use std::fmt;
use std::iter::FusedIterator;

use crate::error::IngestionResult;
use crate::types::Record;

use super::bridge::BridgeStream;

type BoxedRecords = Box<dyn Iterator<Item = IngestionResult<Record>> + Send>;

/// A finite, single-pass sequence of [`Record`]s produced by one decoder for one input.
///
/// The stream owns its underlying resources (open file, decoder state, bridge worker). They are
/// released exactly once: when the sequence is exhausted, when it yields an error, on
/// [`RecordStream::close`], or on drop, whichever comes first.
///
/// After the first `Err` the stream is closed and yields `None`.
pub struct RecordStream {
    inner: Option<BoxedRecords>,
}

impl RecordStream {
    /// Wrap an in-memory/pull-based record iterator.
    pub fn from_iter<I>(records: I) -> Self
    where
        I: Iterator<Item = IngestionResult<Record>> + Send + 'static,
    {
        Self {
            inner: Some(Box::new(records)),
        }
    }

    /// Wrap the consumer half of a push-to-pull bridge.
    pub fn from_bridge(bridge: BridgeStream) -> Self {
        Self::from_iter(bridge)
    }

    /// Release the underlying resources. Closing an already-closed stream is a no-op.
    pub fn close(&mut self) {
        drop(self.inner.take());
    }

    /// Whether the stream has been closed or has run to completion.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Iterator for RecordStream {
    type Item = IngestionResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.as_mut()?.next();
        match item {
            Some(Ok(record)) => Some(Ok(record)),
            Some(Err(e)) => {
                self.close();
                Some(Err(e))
            }
            None => {
                self.close();
                None
            }
        }
    }
}

impl FusedIterator for RecordStream {}

impl fmt::Debug for RecordStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStream")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::RecordStream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::{IngestionError, IngestionResult};
    use crate::types::Record;

    struct Tracked {
        items: std::vec::IntoIter<IngestionResult<Record>>,
        released: Arc<AtomicUsize>,
    }

    impl Iterator for Tracked {
        type Item = IngestionResult<Record>;
        fn next(&mut self) -> Option<Self::Item> {
            self.items.next()
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(items: Vec<IngestionResult<Record>>) -> (RecordStream, Arc<AtomicUsize>) {
        let released = Arc::new(AtomicUsize::new(0));
        let stream = RecordStream::from_iter(Tracked {
            items: items.into_iter(),
            released: Arc::clone(&released),
        });
        (stream, released)
    }

    #[test]
    fn exhaustion_releases_source_once() {
        let (mut stream, released) = tracked(vec![Ok(Record::new("a")), Ok(Record::new("b"))]);
        assert_eq!(stream.by_ref().count(), 2);
        assert!(stream.is_closed());
        stream.close();
        drop(stream);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_terminates_and_releases_source() {
        let (mut stream, released) = tracked(vec![
            Ok(Record::new("a")),
            Err(IngestionError::Decode {
                message: "broken".to_string(),
            }),
            Ok(Record::new("never")),
        ]);
        assert!(stream.next().unwrap().is_ok());
        assert!(stream.next().unwrap().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(stream.next().is_none());
    }

    #[test]
    fn early_close_is_idempotent() {
        let (mut stream, released) = tracked(vec![Ok(Record::new("a")), Ok(Record::new("b"))]);
        assert!(stream.next().is_some());
        stream.close();
        stream.close();
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
