//! In-process broker log.
//!
//! [`MemoryBroker`] keeps every topic as a single partition held in memory
//! and tracks committed offsets per consumer group. It implements both port
//! traits, which makes it usable for local runs of the CLI and for tests of
//! code built on [`Reader`](super::Reader) and [`Writer`](super::Writer)
//! without a Kafka cluster. Faults can be injected per topic to exercise the
//! error paths of the pipeline.
//!
//! A reader obtained from [`MemoryBroker::reader`] starts right after the
//! highest offset its group committed so far. Records fetched but never
//! committed are therefore redelivered to the next reader of that group.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::debug;

use super::broker::{LogReader, LogWriter};
use super::error::{MessagingError, Result};
use super::message::Message;

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<Message>>,
    // (group, topic) -> committed offsets in commit order
    commits: HashMap<(String, String), Vec<i64>>,
    fetch_failures: HashMap<String, String>,
    write_failures: HashMap<String, String>,
    commit_failures: HashMap<String, String>,
}

impl State {
    fn next_position(&self, group: &str, topic: &str) -> usize {
        self.commits
            .get(&(group.to_string(), topic.to_string()))
            .and_then(|offsets| offsets.iter().max())
            .map(|offset| (*offset + 1) as usize)
            .unwrap_or(0)
    }

    fn append(&mut self, topic: &str, key: Bytes, value: Bytes, timestamp: DateTime<Utc>) -> i64 {
        let records = self.topics.entry(topic.to_string()).or_default();
        let offset = records.len() as i64;
        records.push(Message {
            topic: topic.to_string(),
            key,
            value,
            timestamp,
            partition: 0,
            offset,
        });
        offset
    }
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    changed: Notify,
}

/// Shared in-memory log. Clones refer to the same log.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the maps half-updated.
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn modify<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let result = f(&mut self.state());
        self.inner.changed.notify_waiters();
        result
    }

    /// Opens a reader on `topic` for consumer group `group`.
    pub fn reader(&self, topic: &str, group: &str) -> Arc<MemoryLogReader> {
        let position = self.state().next_position(group, topic);
        debug!(topic, group, position, "Opening in-memory reader");
        Arc::new(MemoryLogReader {
            broker: self.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            position: Mutex::new(position),
            closed: AtomicBool::new(false),
        })
    }

    /// Opens a writer on `topic`.
    pub fn writer(&self, topic: &str) -> Arc<MemoryLogWriter> {
        Arc::new(MemoryLogWriter {
            broker: self.clone(),
            topic: topic.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    /// Appends a record stamped with the current time and returns its offset.
    pub fn append(&self, topic: &str, key: impl Into<Bytes>, value: impl Into<Bytes>) -> i64 {
        self.modify(|state| state.append(topic, key.into(), value.into(), Utc::now()))
    }

    /// Every record of `topic` in offset order.
    pub fn records(&self, topic: &str) -> Vec<Message> {
        self.state().topics.get(topic).cloned().unwrap_or_default()
    }

    /// Offsets committed by `group` on `topic`, in commit order.
    pub fn committed(&self, group: &str, topic: &str) -> Vec<i64> {
        self.state()
            .commits
            .get(&(group.to_string(), topic.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Makes every fetch on `topic` fail with `error`.
    pub fn fail_fetches(&self, topic: &str, error: impl Into<String>) {
        let error = error.into();
        self.modify(|state| state.fetch_failures.insert(topic.to_string(), error));
    }

    /// Makes every write to `topic` fail with `error`.
    pub fn fail_writes(&self, topic: &str, error: impl Into<String>) {
        let error = error.into();
        self.modify(|state| state.write_failures.insert(topic.to_string(), error));
    }

    /// Makes every commit on `topic` fail with `error`.
    pub fn fail_commits(&self, topic: &str, error: impl Into<String>) {
        let error = error.into();
        self.modify(|state| state.commit_failures.insert(topic.to_string(), error));
    }

    /// Removes every injected fault of `topic`.
    pub fn clear_failures(&self, topic: &str) {
        self.modify(|state| {
            state.fetch_failures.remove(topic);
            state.write_failures.remove(topic);
            state.commit_failures.remove(topic);
        });
    }
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        let mut topics: Vec<(&String, usize)> = state
            .topics
            .iter()
            .map(|(topic, records)| (topic, records.len()))
            .collect();
        topics.sort();
        f.debug_struct("MemoryBroker").field("topics", &topics).finish()
    }
}

/// Reader side of [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryLogReader {
    broker: MemoryBroker,
    topic: String,
    group: String,
    position: Mutex<usize>,
    closed: AtomicBool,
}

impl MemoryLogReader {
    /// Whether [`LogReader::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn try_next(&self) -> Result<Option<Message>> {
        if self.is_closed() {
            return Err(MessagingError::Closed(format!(
                "reader for topic '{}'",
                self.topic
            )));
        }

        let state = self.broker.state();
        if let Some(error) = state.fetch_failures.get(&self.topic) {
            return Err(MessagingError::Fetch(error.clone()));
        }

        let mut position = match self.position.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = state
            .topics
            .get(&self.topic)
            .and_then(|records| records.get(*position))
            .cloned();
        if next.is_some() {
            *position += 1;
        }
        Ok(next)
    }
}

#[async_trait]
impl LogReader for MemoryLogReader {
    async fn fetch_next(&self) -> Result<Message> {
        loop {
            let changed = self.broker.inner.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            if let Some(message) = self.try_next()? {
                return Ok(message);
            }
            changed.await;
        }
    }

    async fn commit(&self, messages: &[Message]) -> Result<()> {
        let mut state = self.broker.state();
        if let Some(error) = state.commit_failures.get(&self.topic) {
            return Err(MessagingError::Commit(error.clone()));
        }
        let offsets = state
            .commits
            .entry((self.group.clone(), self.topic.clone()))
            .or_default();
        offsets.extend(messages.iter().map(|m| m.offset));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.broker.inner.changed.notify_waiters();
        Ok(())
    }
}

/// Writer side of [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryLogWriter {
    broker: MemoryBroker,
    topic: String,
    closed: AtomicBool,
}

impl MemoryLogWriter {
    /// Whether [`LogWriter::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl LogWriter for MemoryLogWriter {
    async fn write(&self, key: Bytes, value: Bytes, timestamp: DateTime<Utc>) -> Result<()> {
        if self.is_closed() {
            return Err(MessagingError::Closed(format!(
                "writer for topic '{}'",
                self.topic
            )));
        }
        let topic = self.topic.as_str();
        self.broker.modify(|state| {
            if let Some(error) = state.write_failures.get(topic) {
                return Err(MessagingError::Write(error.clone()));
            }
            state.append(topic, key, value, timestamp);
            Ok(())
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
