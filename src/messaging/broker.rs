//! Broker log capability required by the pipeline.
//!
//! The pipeline never talks to a broker client directly. Readers depend on
//! [`LogReader`] and writers on [`LogWriter`]; the Kafka adapters in
//! [`super::kafka`] and the in-process log in [`super::memory`] implement
//! both. A connection is owned by exactly one reader or writer, and
//! `fetch_next` is only ever called by the single loop that owns the reader.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::error::Result;
use super::message::Message;

/// Read side of a partitioned log, bound to one topic and consumer group.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogReader: Send + Sync {
    /// Waits for the next record.
    ///
    /// Does not advance the committed position. An error means the
    /// connection is unusable and the consumption loop must stop. The
    /// returned future may be dropped at any time to cancel the wait.
    async fn fetch_next(&self) -> Result<Message>;

    /// Advances the committed position past the given records.
    async fn commit(&self, messages: &[Message]) -> Result<()>;

    /// Releases the underlying connection.
    async fn close(&self) -> Result<()>;
}

/// Write side of a partitioned log, bound to one topic.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogWriter: Send + Sync {
    /// Appends one record.
    async fn write(&self, key: Bytes, value: Bytes, timestamp: DateTime<Utc>) -> Result<()>;

    /// Flushes pending appends and releases the underlying connection.
    async fn close(&self) -> Result<()>;
}
