//! Test utilities for Missy
//!
//! Message fixtures and handlers with scripted outcomes for the reader
//! tests.

use crate::messaging::{HandlerError, Message, MessageHandler};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Message of `topic` at partition 0 and `offset`, with key and value
/// derived from the offset.
pub fn sample_message(topic: &str, offset: i64) -> Message {
    Message::new(
        topic,
        format!("key-{}", offset),
        format!("value-{}", offset),
    )
    .with_position(0, offset)
}

/// Outcome script failing the first `failures` calls, then succeeding.
pub fn failing_times(
    failures: u32,
) -> impl Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static {
    let seen = AtomicU32::new(0);
    move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) < failures {
            Err("scripted failure".into())
        } else {
            Ok(())
        }
    }
}

/// Outcome script that never succeeds.
pub fn always_failing() -> impl Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static
{
    |message| Err(format!("cannot process offset {}", message.offset).into())
}

/// Counts handler invocations.
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicUsize>,
}

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations so far.
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Handler counting its invocations and answering with `outcome`.
    pub fn handler<F>(&self, outcome: F) -> Arc<impl MessageHandler + 'static>
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let calls = Arc::clone(&self.calls);
        Arc::new(move |message: Message| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(outcome(&message))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_times_script() {
        let counter = CallCounter::new();
        let handler = counter.handler(failing_times(2));
        let message = sample_message("t", 0);

        assert!(handler.handle(message.clone()).await.is_err());
        assert!(handler.handle(message.clone()).await.is_err());
        assert!(handler.handle(message).await.is_ok());
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_sample_message() {
        let message = sample_message("orders", 5);
        assert_eq!(message.offset, 5);
        assert_eq!(message.key.as_ref(), b"key-5");
    }
}
