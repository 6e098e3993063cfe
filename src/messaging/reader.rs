//! Topic reader and its consumption loop.
//!
//! A [`Reader`] pulls one record at a time from a [`LogReader`], hands it to
//! a [`MessageHandler`], retries failed processing according to its
//! [`RetryPolicy`], forwards records that exhausted their retries to an
//! optional dead-letter [`Writer`] and finally commits the record. Fetch,
//! processing, retry sleeps and commit are strictly sequential, so records
//! of a partition are resolved in offset order.
//!
//! # Loop
//!
//! 1. Stop if the cancellation token fired.
//! 2. Fetch the next record; a fetch error ends the loop.
//! 3. Run the handler under the retry policy.
//! 4. On success commit and continue.
//! 5. On exhaustion write key/value once to the dead-letter writer (if any),
//!    then commit and continue. Dead-letter and commit failures are logged,
//!    never retried.
//!
//! The caller of [`Reader::start_reading`] only ever sees the synchronous
//! "already reading" error. Everything else is reported through `tracing`,
//! the pipeline counters, and the [`LoopExit`] returned by
//! [`ReadingHandle::join`].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use missy::messaging::memory::MemoryBroker;
//! use missy::messaging::{HandlerError, LoopExit, Message, Reader, ReaderOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = MemoryBroker::new();
//! broker.append("orders", "order-1", "payload");
//!
//! let options = ReaderOptions::default().with_retries(1).with_interval(Duration::ZERO);
//! let reader = Reader::new("orders", "billing", broker.reader("orders", "billing"), &options);
//!
//! let cancel = CancellationToken::new();
//! let stop = cancel.clone();
//! let handle = reader.start_reading(
//!     cancel,
//!     Arc::new(move |message: Message| {
//!         let stop = stop.clone();
//!         async move {
//!             println!("offset {}", message.offset);
//!             stop.cancel();
//!             Ok::<(), HandlerError>(())
//!         }
//!     }),
//! )?;
//!
//! assert_eq!(handle.join().await?, LoopExit::Cancelled);
//! assert_eq!(broker.committed("billing", "orders"), vec![0]);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::broker::LogReader;
use super::error::{MessagingError, Result};
use super::message::Message;
use super::metrics;
use super::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL};
use super::writer::Writer;

/// Error type returned by message handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processing callback invoked for every fetched message.
///
/// Returning `Err` makes the reader retry the same message; once the retry
/// budget is spent the message is dead-lettered and committed. Closures of
/// the form `Fn(Message) -> impl Future<Output = Result<(), HandlerError>>`
/// implement this trait.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one message.
    async fn handle(&self, message: Message) -> std::result::Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> std::result::Result<(), HandlerError> {
        (self)(message).await
    }
}

/// What to do with a record whose dead-letter write failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit the record anyway and keep reading. The record only survives
    /// in the logs.
    #[default]
    Always,
    /// Leave the record uncommitted and stop the loop so that it is
    /// redelivered once the reader is restarted.
    RequireDeadLetter,
}

/// Options changing the behaviour of a reader.
///
/// `None` selects the default for that option; an explicit zero is honoured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Retries after the first failed processing attempt (default 3).
    pub retries: Option<u32>,
    /// Delay between processing attempts (default 5s).
    pub interval: Option<Duration>,
    /// Interval at which offsets are flushed to the broker. Zero commits
    /// synchronously. Only broker adapters that batch commits use it.
    pub commit_interval: Duration,
    /// Forward exhausted records to a dead-letter topic.
    pub dlq_enabled: bool,
    /// Dead-letter topic; defaults to `<topic>.dlq` when enabled.
    pub dlq_topic: Option<String>,
    /// Commit behaviour after a failed dead-letter write.
    pub commit_policy: CommitPolicy,
    /// Include key and value in per-record debug logs.
    pub log_payloads: bool,
}

impl ReaderOptions {
    /// Sets the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Sets the delay between attempts.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Enables dead-lettering, optionally to an explicit topic.
    pub fn with_dead_letter(mut self, topic: Option<&str>) -> Self {
        self.dlq_enabled = true;
        self.dlq_topic = topic.map(str::to_string);
        self
    }

    /// Sets the commit policy.
    pub fn with_commit_policy(mut self, policy: CommitPolicy) -> Self {
        self.commit_policy = policy;
        self
    }

    /// Sets the commit interval.
    pub fn with_commit_interval(mut self, interval: Duration) -> Self {
        self.commit_interval = interval;
        self
    }

    /// Retry policy described by these options.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retries.unwrap_or(DEFAULT_MAX_RETRIES),
            self.interval.unwrap_or(DEFAULT_RETRY_INTERVAL),
        )
    }

    /// Dead-letter topic for records read from `topic`, if enabled.
    ///
    /// ```rust
    /// use missy::messaging::ReaderOptions;
    ///
    /// let options = ReaderOptions::default().with_dead_letter(None);
    /// assert_eq!(options.dead_letter_topic("orders").as_deref(), Some("orders.dlq"));
    /// assert_eq!(ReaderOptions::default().dead_letter_topic("orders"), None);
    /// ```
    pub fn dead_letter_topic(&self, topic: &str) -> Option<String> {
        if !self.dlq_enabled {
            return None;
        }
        match self.dlq_topic.as_deref() {
            Some(dlq) if !dlq.is_empty() => Some(dlq.to_string()),
            _ => Some(format!("{}.dlq", topic)),
        }
    }
}

/// Why a consumption loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    /// The cancellation token fired.
    Cancelled,
    /// The broker log failed to deliver the next record.
    FetchFailed(String),
    /// A dead-letter write failed under [`CommitPolicy::RequireDeadLetter`];
    /// the record at `partition`/`offset` was left uncommitted.
    DeadLetterFailed {
        /// Partition of the uncommitted record.
        partition: i32,
        /// Offset of the uncommitted record.
        offset: i64,
        /// Error reported by the dead-letter writer.
        error: String,
    },
}

/// Handle to a running consumption loop.
///
/// Dropping the handle detaches the loop; it keeps running until its
/// cancellation token fires or a fetch fails.
#[derive(Debug)]
pub struct ReadingHandle {
    task: JoinHandle<LoopExit>,
}

impl ReadingHandle {
    /// Waits for the loop to end and reports why it ended.
    ///
    /// When this returns the reader already accepts a new
    /// [`Reader::start_reading`] call.
    pub async fn join(self) -> Result<LoopExit> {
        self.task
            .await
            .map_err(|e| MessagingError::LoopAborted(e.to_string()))
    }

    /// Whether the loop has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Reads one topic on behalf of one consumer group.
pub struct Reader {
    brokers: Vec<String>,
    group_id: String,
    topic: String,
    log: Arc<dyn LogReader>,
    dead_letter: Option<Arc<Writer>>,
    retry: RetryPolicy,
    commit_policy: CommitPolicy,
    log_payloads: bool,
    reading: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl Reader {
    /// Creates an idle reader for `topic` in consumer group `group_id`.
    ///
    /// The dead-letter options in `options` are not acted upon here since a
    /// writer needs a broker connection; attach one with
    /// [`Reader::with_dead_letter`] or build the reader through
    /// [`Brokers::new_reader`](super::Brokers::new_reader).
    pub fn new(
        topic: impl Into<String>,
        group_id: impl Into<String>,
        log: Arc<dyn LogReader>,
        options: &ReaderOptions,
    ) -> Self {
        Self {
            brokers: Vec::new(),
            group_id: group_id.into(),
            topic: topic.into(),
            log,
            dead_letter: None,
            retry: options.retry_policy(),
            commit_policy: options.commit_policy,
            log_payloads: options.log_payloads,
            reading: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        }
    }

    /// Records the broker addresses this reader is connected to.
    pub fn with_brokers(mut self, brokers: Vec<String>) -> Self {
        self.brokers = brokers;
        self
    }

    /// Forwards exhausted records to `writer`.
    pub fn with_dead_letter(mut self, writer: Writer) -> Self {
        self.dead_letter = Some(Arc::new(writer));
        self
    }

    /// Topic this reader consumes.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Consumer group of this reader.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Broker addresses of this reader.
    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    /// Retry policy applied to every message.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Topic of the dead-letter writer, if one is attached.
    pub fn dead_letter_topic(&self) -> Option<&str> {
        self.dead_letter.as_deref().map(Writer::topic)
    }

    /// Whether a consumption loop is currently active.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }

    /// Starts the consumption loop on a new tokio task.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::AlreadyReading`, without side effects, if a
    /// loop started earlier has not exited yet, and `MessagingError::Closed`
    /// once [`Reader::close`] has been called.
    pub fn start_reading<H>(
        &self,
        cancellation: CancellationToken,
        handler: Arc<H>,
    ) -> Result<ReadingHandle>
    where
        H: MessageHandler + ?Sized + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed(format!(
                "reader for topic '{}'",
                self.topic
            )));
        }
        if self
            .reading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MessagingError::AlreadyReading(self.topic.clone()));
        }
        let guard = ReadingGuard(Arc::clone(&self.reading));

        let consumption = ConsumptionLoop {
            group_id: self.group_id.clone(),
            topic: self.topic.clone(),
            log: Arc::clone(&self.log),
            dead_letter: self.dead_letter.clone(),
            retry: self.retry,
            commit_policy: self.commit_policy,
            log_payloads: self.log_payloads,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            consumption.run(cancellation, handler).await
        });

        Ok(ReadingHandle { task })
    }

    /// Closes the broker connection and the dead-letter writer.
    ///
    /// Does not stop a running loop; cancel the token passed to
    /// [`Reader::start_reading`] for that. A closed reader cannot be started
    /// again.
    pub async fn close(&self) -> Result<()> {
        info!(topic = %self.topic, group_id = %self.group_id, "Closing reader");
        self.closed.store(true, Ordering::Release);
        let closed = self.log.close().await;
        if let Some(dead_letter) = &self.dead_letter {
            if let Err(e) = dead_letter.close().await {
                warn!(topic = %self.topic, error = %e, "Failed to close dead-letter writer");
            }
        }
        closed
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("brokers", &self.brokers)
            .field("group_id", &self.group_id)
            .field("topic", &self.topic)
            .field("retry", &self.retry)
            .field("commit_policy", &self.commit_policy)
            .field("dead_letter", &self.dead_letter_topic())
            .field("reading", &self.is_reading())
            .finish()
    }
}

/// Clears the single-flight flag when the loop task ends, panics included.
struct ReadingGuard(Arc<AtomicBool>);

impl Drop for ReadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State moved into the spawned loop task.
struct ConsumptionLoop {
    group_id: String,
    topic: String,
    log: Arc<dyn LogReader>,
    dead_letter: Option<Arc<Writer>>,
    retry: RetryPolicy,
    commit_policy: CommitPolicy,
    log_payloads: bool,
}

impl ConsumptionLoop {
    async fn run<H>(self, cancellation: CancellationToken, handler: Arc<H>) -> LoopExit
    where
        H: MessageHandler + ?Sized,
    {
        info!(
            topic = %self.topic,
            group_id = %self.group_id,
            max_retries = self.retry.max_retries(),
            retry_interval_ms = self.retry.interval().as_millis() as u64,
            dead_letter = ?self.dead_letter.as_deref().map(Writer::topic),
            "Reader started"
        );

        let exit = loop {
            if cancellation.is_cancelled() {
                break LoopExit::Cancelled;
            }

            let fetched = tokio::select! {
                biased;
                _ = cancellation.cancelled() => break LoopExit::Cancelled,
                fetched = self.log.fetch_next() => fetched,
            };

            let message = match fetched {
                Ok(message) => message,
                Err(e) => {
                    error!(topic = %self.topic, error = %e, "Failed to fetch a message");
                    metrics::record_fetch_failure(&self.topic);
                    break LoopExit::FetchFailed(e.to_string());
                }
            };
            metrics::record_fetched(&self.topic);
            self.log_received(&message);

            if let Some(exit) = self.process(&message, handler.as_ref()).await {
                break exit;
            }
        };

        match &exit {
            LoopExit::Cancelled => {
                info!(topic = %self.topic, group_id = %self.group_id, "Reader stopped")
            }
            other => warn!(
                topic = %self.topic,
                group_id = %self.group_id,
                exit = ?other,
                "Reader stopped"
            ),
        }
        exit
    }

    /// Resolves one record. Returns `Some` only when the loop must stop.
    async fn process<H>(&self, message: &Message, handler: &H) -> Option<LoopExit>
    where
        H: MessageHandler + ?Sized,
    {
        let outcome = self
            .retry
            .run(|attempt| {
                if attempt > 1 {
                    metrics::record_retry(&self.topic);
                }
                handler.handle(message.clone())
            })
            .await;

        match outcome {
            Ok(attempts) => {
                debug!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    attempts,
                    "Message processed"
                );
                metrics::record_processed(&self.topic);
            }
            Err(exhausted) => {
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "Processing message failed, retries exhausted"
                );
                metrics::record_exhausted(&self.topic);

                if let Some(dead_letter) = &self.dead_letter {
                    match dead_letter
                        .write(message.key.clone(), message.value.clone())
                        .await
                    {
                        Ok(()) => {
                            info!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                dead_letter_topic = %dead_letter.topic(),
                                "Message sent to dead-letter topic"
                            );
                            metrics::record_dead_letter(&self.topic, true);
                        }
                        Err(e) => {
                            error!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                dead_letter_topic = %dead_letter.topic(),
                                error = %e,
                                "Sending message to dead-letter topic failed"
                            );
                            metrics::record_dead_letter(&self.topic, false);

                            if self.commit_policy == CommitPolicy::RequireDeadLetter {
                                return Some(LoopExit::DeadLetterFailed {
                                    partition: message.partition,
                                    offset: message.offset,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                }
            }
        }

        self.commit(message).await;
        None
    }

    async fn commit(&self, message: &Message) {
        if let Err(e) = self.log.commit(std::slice::from_ref(message)).await {
            error!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Committing message failed"
            );
            metrics::record_commit_failure(&self.topic);
        }
    }

    fn log_received(&self, message: &Message) {
        if self.log_payloads {
            debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                key = %String::from_utf8_lossy(&message.key),
                value = %String::from_utf8_lossy(&message.value),
                "New message"
            );
        } else {
            debug!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                "New message"
            );
        }
    }
}
