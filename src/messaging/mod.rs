//! At-least-once consumption of partitioned logs.
//!
//! The pipeline is made of a few small parts:
//!
//! - [`Message`]: an immutable broker record with a content hash
//! - [`LogReader`] / [`LogWriter`]: the broker capability the pipeline needs,
//!   implemented for Kafka in [`kafka`] and in memory in [`memory`]
//! - [`Writer`]: appends records to a topic, also used for dead-lettering
//! - [`RetryPolicy`]: bounded retries with a fixed delay
//! - [`Reader`]: the fetch, process, retry, commit loop
//! - [`Brokers`]: creates Kafka backed readers and writers
//!
//! Records of a partition are resolved one at a time and in offset order.
//! Every fetched record is committed exactly once after it was either
//! processed successfully or given up on, so a crash between processing and
//! commit leads to redelivery, never to loss.

pub mod broker;
pub mod brokers;
pub mod error;
pub mod kafka;
pub mod memory;
pub mod message;
pub mod metrics;
pub mod reader;
pub mod retry;
pub mod writer;

pub use broker::{LogReader, LogWriter};
pub use brokers::Brokers;
pub use error::MessagingError;
pub use message::Message;
pub use reader::{
    CommitPolicy, HandlerError, LoopExit, MessageHandler, Reader, ReaderOptions, ReadingHandle,
};
pub use retry::{Exhausted, RetryPolicy};
pub use writer::Writer;
