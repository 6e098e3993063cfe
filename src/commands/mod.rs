/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `consume` runs a reader under a restart supervisor until interrupted
- `produce` writes one record
- `hash` computes the identity of a message

The handlers are small and only use the public library components.
*/

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::messaging::{HandlerError, LoopExit, Message, Reader};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Consume command handler
pub mod consume {
    //! Runs a reader whose handler logs every record.
    //!
    //! The consumption loop ends on its own when a fetch fails, or when a
    //! dead-letter write fails under the `require_dead_letter` commit
    //! policy. The supervisor here then closes the reader, waits for the
    //! retry interval and starts a fresh one, which resumes from the last
    //! committed offset.

    use super::*;
    use tracing::{info, warn};

    /// Consume the configured topic until Ctrl-C is received
    pub async fn run_consume(config: Config) -> Result<()> {
        config.validate()?;

        let brokers = config.brokers()?;
        let options = config.reader_options();
        let topic = config.kafka.topic.clone();
        let group_id = config.kafka.group_id.clone();
        let restart_delay = Duration::from_millis(config.reader.retry_interval_ms);

        let shutdown = CancellationToken::new();
        let on_signal = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping");
                on_signal.cancel();
            }
        });

        supervise(
            shutdown,
            restart_delay,
            || Ok(brokers.new_reader(&group_id, &topic, &options)?),
            logging_handler(config.logging.include_payload),
        )
        .await
    }

    /// Handler that logs each record and always succeeds.
    pub fn logging_handler(
        include_payload: bool,
    ) -> Arc<impl Fn(Message) -> std::future::Ready<std::result::Result<(), HandlerError>> + Send + Sync>
    {
        Arc::new(move |message: Message| {
            if include_payload {
                info!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    key = %String::from_utf8_lossy(&message.key),
                    value = %String::from_utf8_lossy(&message.value),
                    "Received message"
                );
            } else {
                info!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    value_len = message.value.len(),
                    "Received message"
                );
            }
            std::future::ready(Ok(()))
        })
    }

    /// Keeps a consumption loop running until `shutdown` fires.
    ///
    /// `connect` is called for every (re)start. Returns the first error of
    /// `connect` or of starting the loop.
    pub async fn supervise<F, H>(
        shutdown: CancellationToken,
        restart_delay: Duration,
        mut connect: F,
        handler: Arc<H>,
    ) -> Result<()>
    where
        F: FnMut() -> Result<Reader>,
        H: crate::messaging::MessageHandler + 'static,
    {
        let mut restarts: u64 = 0;
        loop {
            let reader = connect()?;
            info!(
                topic = %reader.topic(),
                group_id = %reader.group_id(),
                restarts,
                "Starting consumption"
            );

            let handle = reader.start_reading(shutdown.child_token(), Arc::clone(&handler))?;
            let exit = handle.join().await?;

            if let Err(e) = reader.close().await {
                warn!(topic = %reader.topic(), error = %e, "Failed to close reader");
            }

            match exit {
                LoopExit::Cancelled => return Ok(()),
                LoopExit::FetchFailed(error) => {
                    warn!(topic = %reader.topic(), error = %error, "Consumption stopped, restarting")
                }
                LoopExit::DeadLetterFailed {
                    partition,
                    offset,
                    error,
                } => warn!(
                    topic = %reader.topic(),
                    partition,
                    offset,
                    error = %error,
                    "Dead-letter write failed, restarting to redeliver"
                ),
            }

            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(restart_delay) => {}
            }
            restarts += 1;
        }
    }
}

// Produce command handler
pub mod produce {
    //! Writes a single record through a [`Writer`](crate::messaging::Writer).

    use super::*;
    use tracing::info;

    /// Write `key`/`value` to `topic`
    pub async fn run_produce(config: Config, topic: &str, key: &str, value: &str) -> Result<()> {
        let writer = config.brokers()?.new_writer(topic)?;
        writer
            .write(key.to_string().into_bytes(), value.to_string().into_bytes())
            .await?;
        writer.close().await?;
        info!(topic, "Record written");
        Ok(())
    }
}

// Hash command handler
pub mod hash {
    //! Computes the SHA-256 identity of a message described on the command
    //! line.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    /// Message described by the `hash` arguments
    pub fn build_message(
        topic: &str,
        key: &str,
        value: &str,
        partition: i32,
        offset: i64,
        timestamp_ms: Option<i64>,
    ) -> Result<Message> {
        let timestamp: DateTime<Utc> = match timestamp_ms {
            Some(ms) => Utc.timestamp_millis_opt(ms).single().ok_or_else(|| {
                ConfigError::Invalid(format!("timestamp out of range: {}", ms))
            })?,
            None => DateTime::<Utc>::default(),
        };

        Ok(Message::new(topic, key.to_string(), value.to_string())
            .with_position(partition, offset)
            .with_timestamp(timestamp))
    }

    /// Hex hash, or a JSON document describing the message and its hash
    pub fn render(message: &Message, json: bool) -> Result<String> {
        let hash = message.sha256_string();
        if !json {
            return Ok(hash);
        }
        let document = serde_json::json!({
            "topic": message.topic,
            "key": String::from_utf8_lossy(&message.key),
            "value": String::from_utf8_lossy(&message.value),
            "partition": message.partition,
            "offset": message.offset,
            "timestamp": message.timestamp.to_rfc3339(),
            "sha256": hash,
        });
        Ok(serde_json::to_string_pretty(&document)?)
    }
}
