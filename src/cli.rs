//! Command-line interface definition for Missy
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for consuming, producing and hashing messages.

use clap::{Parser, Subcommand};

/// Missy - reliable Kafka consumption
///
/// Consume topics with bounded retries and dead-letter forwarding, produce
/// single records and compute message identities.
#[derive(Parser, Debug, Clone)]
#[command(name = "missy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "MISSY_CONFIG")]
    pub config: Option<String>,

    /// Comma separated bootstrap brokers, overrides the configuration
    #[arg(short, long)]
    pub brokers: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Missy
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Consume a topic, logging every record, until interrupted
    Consume {
        /// Topic to consume from
        #[arg(short, long)]
        topic: Option<String>,

        /// Consumer group id
        #[arg(short, long)]
        group: Option<String>,

        /// Forward records that exhausted their retries to a dead-letter topic
        #[arg(long)]
        dlq: bool,

        /// Dead-letter topic (defaults to `<topic>.dlq`); implies --dlq
        #[arg(long)]
        dlq_topic: Option<String>,

        /// Retries after the first failed processing attempt
        #[arg(long)]
        max_retries: Option<u32>,

        /// Delay between processing attempts in milliseconds
        #[arg(long)]
        retry_interval_ms: Option<u64>,
    },

    /// Write one record to a topic
    Produce {
        /// Topic to write to
        #[arg(short, long)]
        topic: String,

        /// Record key
        #[arg(short, long, default_value = "")]
        key: String,

        /// Record value
        #[arg(long)]
        value: String,
    },

    /// Print the SHA-256 identity of a message
    Hash {
        /// Topic of the message
        #[arg(short, long)]
        topic: String,

        /// Message key
        #[arg(short, long, default_value = "")]
        key: String,

        /// Message value
        #[arg(long)]
        value: String,

        /// Partition of the message
        #[arg(short, long, default_value_t = 0)]
        partition: i32,

        /// Offset of the message
        #[arg(short, long, default_value_t = 0)]
        offset: i64,

        /// Message timestamp in milliseconds since the Unix epoch
        #[arg(long)]
        timestamp_ms: Option<i64>,

        /// Print the message and its hash as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
