//! Errors produced by the messaging pipeline.

use thiserror::Error;

/// Errors that can occur while reading, writing or committing messages.
///
/// Only [`MessagingError::AlreadyReading`] is ever returned to the caller of
/// [`Reader::start_reading`](super::Reader::start_reading); everything that
/// goes wrong inside the consumption loop is logged instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    /// A consumption loop is already active on this reader.
    #[error("reader is already reading messages from topic '{0}' (don't call start_reading twice)")]
    AlreadyReading(String),

    /// The broker could not deliver the next record.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The broker rejected an offset commit.
    #[error("commit error: {0}")]
    Commit(String),

    /// The broker rejected an append.
    #[error("write error: {0}")]
    Write(String),

    /// The reader or writer has been closed.
    #[error("{0} is closed")]
    Closed(String),

    /// No broker addresses were supplied.
    #[error("no brokers provided, value='{0}'")]
    NoBrokers(String),

    /// The underlying Kafka client could not be created or configured.
    #[error("kafka client error: {0}")]
    Kafka(String),

    /// The consumption loop task ended abnormally.
    #[error("consumption loop terminated abnormally: {0}")]
    LoopAborted(String),
}

/// Result alias for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;
