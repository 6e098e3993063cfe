//! Missy - reliable Kafka consumption
//!
#![doc = "Main entry point for the missy command line tool."]

use anyhow::Result;

use missy::cli::{Cli, Commands};
use missy::commands;
use missy::config::Config;
use missy::logging::init_logging;
use missy::messaging::metrics::init_metrics_exporter;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/missy.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;
    init_metrics_exporter();

    match cli.command {
        Commands::Consume { .. } => {
            tracing::info!(
                topic = %config.kafka.topic,
                group_id = %config.kafka.group_id,
                "Starting consume mode"
            );
            commands::consume::run_consume(config).await
        }
        Commands::Produce { topic, key, value } => {
            tracing::debug!(topic = %topic, "Producing one record");
            commands::produce::run_produce(config, &topic, &key, &value).await
        }
        Commands::Hash {
            topic,
            key,
            value,
            partition,
            offset,
            timestamp_ms,
            json,
        } => {
            let message =
                commands::hash::build_message(&topic, &key, &value, partition, offset, timestamp_ms)?;
            println!("{}", commands::hash::render(&message, json)?);
            Ok(())
        }
    }
}
