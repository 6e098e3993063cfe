//! Topic writer used for regular production and dead-letter forwarding.

use bytes::Bytes;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::broker::LogWriter;
use super::error::{MessagingError, Result};

/// Appends key/value records to a single topic.
///
/// Each write is an independent append, so a `Writer` can be shared between
/// tasks behind an [`Arc`]. Writes are never retried here; any failure is
/// handed back to the caller as returned by the broker log.
///
/// # Example
///
/// ```rust
/// use missy::messaging::memory::MemoryBroker;
/// use missy::messaging::Writer;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), missy::messaging::MessagingError> {
/// let broker = MemoryBroker::new();
/// let writer = Writer::new(vec!["memory".to_string()], "orders", broker.writer("orders"));
/// writer.write("order-1", "payload").await?;
/// writer.close().await?;
/// assert_eq!(broker.records("orders").len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Writer {
    brokers: Vec<String>,
    topic: String,
    log: Arc<dyn LogWriter>,
    closed: AtomicBool,
}

impl Writer {
    /// Creates a writer appending to `topic` through `log`.
    pub fn new(brokers: Vec<String>, topic: impl Into<String>, log: Arc<dyn LogWriter>) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            log,
            closed: AtomicBool::new(false),
        }
    }

    /// Topic this writer appends to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Broker addresses this writer was created for.
    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    /// Appends one record stamped with the current UTC time.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Closed` after [`Writer::close`], otherwise
    /// whatever error the broker log reported.
    pub async fn write(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed(format!(
                "writer for topic '{}'",
                self.topic
            )));
        }

        let key = key.into();
        let value = value.into();
        debug!(
            topic = %self.topic,
            key_len = key.len(),
            value_len = value.len(),
            "Writing message"
        );
        self.log.write(key, value, Utc::now()).await
    }

    /// Closes the writer. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!(topic = %self.topic, "Closing writer");
        self.log.close().await
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("brokers", &self.brokers)
            .field("topic", &self.topic)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::broker::MockLogWriter;

    fn writer_with(mock: MockLogWriter) -> Writer {
        Writer::new(vec!["localhost:9092".to_string()], "test", Arc::new(mock))
    }

    #[tokio::test]
    async fn test_write_forwards_key_and_value() {
        let mut mock = MockLogWriter::new();
        mock.expect_write()
            .withf(|key, value, _| key.as_ref() == b"key" && value.as_ref() == b"value")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let writer = writer_with(mock);
        assert!(writer.write("key", "value").await.is_ok());
    }

    #[tokio::test]
    async fn test_write_stamps_current_time() {
        let before = Utc::now();
        let mut mock = MockLogWriter::new();
        mock.expect_write()
            .withf(move |_, _, timestamp| *timestamp >= before)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let writer = writer_with(mock);
        writer.write("key", "value").await.unwrap();
    }

    #[tokio::test]
    async fn test_write_error_is_returned_unmodified() {
        let mut mock = MockLogWriter::new();
        mock.expect_write()
            .times(1)
            .returning(|_, _, _| Err(MessagingError::Write("leader not available".to_string())));

        let writer = writer_with(mock);
        let err = writer.write("key", "value").await.unwrap_err();
        assert_eq!(
            err,
            MessagingError::Write("leader not available".to_string())
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut mock = MockLogWriter::new();
        mock.expect_close().times(1).returning(|| Ok(()));

        let writer = writer_with(mock);
        assert!(writer.close().await.is_ok());
        assert!(writer.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let mut mock = MockLogWriter::new();
        mock.expect_close().times(1).returning(|| Ok(()));
        mock.expect_write().times(0);

        let writer = writer_with(mock);
        writer.close().await.unwrap();
        let err = writer.write("key", "value").await.unwrap_err();
        assert!(matches!(err, MessagingError::Closed(_)));
    }

    #[test]
    fn test_accessors() {
        let writer = writer_with(MockLogWriter::new());
        assert_eq!(writer.topic(), "test");
        assert_eq!(writer.brokers(), ["localhost:9092".to_string()]);
    }
}
