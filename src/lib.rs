//! Missy - reliable Kafka consumption
//!
//! This library provides an at-least-once consumption pipeline for
//! partitioned logs: a reader that fetches one record at a time, retries
//! failed processing with a fixed delay, forwards records that keep failing
//! to a dead-letter topic and commits every record once it is resolved.
//!
//! # Architecture
//!
//! - `messaging`: messages, broker log ports, retry policy, reader, writer
//!   and the Kafka and in-memory broker adapters
//! - `config`: Configuration management and validation
//! - `logging`: tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: the `missy` command line tool
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use missy::messaging::{Brokers, HandlerError, Message, ReaderOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let brokers = Brokers::parse("localhost:9092")?;
//!     let options = ReaderOptions::default().with_dead_letter(None);
//!     let reader = brokers.new_reader("billing", "orders", &options)?;
//!
//!     let handle = reader.start_reading(
//!         CancellationToken::new(),
//!         Arc::new(|message: Message| async move {
//!             println!("{}", message.sha256_string());
//!             Ok::<(), HandlerError>(())
//!         }),
//!     )?;
//!     let exit = handle.join().await?;
//!     println!("reader stopped: {:?}", exit);
//!     reader.close().await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, MissyError, Result};
pub use messaging::{Message, MessagingError, Reader, ReaderOptions, Writer};

#[cfg(test)]
pub mod test_utils;
