use missy::messaging::{HandlerError, Message, MessageHandler};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Handler recording every message it sees and failing the first
/// `failures_per_message` attempts of each offset.
#[allow(dead_code)]
pub struct RecordingHandler {
    failures_per_message: usize,
    attempts: Mutex<Vec<Message>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn failing(failures_per_message: usize) -> Arc<Self> {
        Arc::new(Self {
            failures_per_message,
            attempts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::failing(0)
    }

    pub fn always_failing() -> Arc<Self> {
        Self::failing(usize::MAX)
    }

    /// Every attempt, in call order.
    pub fn attempts(&self) -> Vec<Message> {
        self.attempts.lock().unwrap().clone()
    }

    /// Highest number of concurrently running invocations observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MessageHandler for RecordingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let previous = {
            let mut attempts = self.attempts.lock().unwrap();
            let previous = attempts
                .iter()
                .filter(|m| m.partition == message.partition && m.offset == message.offset)
                .count();
            attempts.push(message.clone());
            previous
        };

        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if previous < self.failures_per_message {
            Err(format!("attempt {} of offset {} failed", previous + 1, message.offset).into())
        } else {
            Ok(())
        }
    }
}
