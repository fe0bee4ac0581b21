//! In-process queue transport with at-least-once semantics.
//!
//! Stands in for the out-of-scope broker in the binary and in tests. A
//! popped message that is dropped without being completed or dead-lettered
//! returns to the queue with its delivery count incremented — the local
//! equivalent of a broker's lock expiry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::error::QueueError;
use crate::queue::message::QueueMessage;
use crate::queue::processor::MessageProcessor;

#[derive(Debug, Clone)]
struct PendingMessage {
    id: String,
    subject: Option<String>,
    body: Vec<u8>,
    delivery_count: u32,
}

/// A dead-lettered message, kept for operator inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetteredMessage {
    pub message_id: String,
    pub reason: String,
    pub description: String,
}

#[derive(Debug, Default)]
struct QueueInner {
    ready: VecDeque<PendingMessage>,
    dead: Vec<DeadLetteredMessage>,
}

/// Single-consumer in-process queue.
#[derive(Debug, Clone, Default)]
pub struct LocalQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl LocalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message for its first delivery.
    pub fn push(&self, subject: Option<String>, body: Vec<u8>) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.ready.push_back(PendingMessage {
            id: Uuid::new_v4().to_string(),
            subject,
            body,
            delivery_count: 0,
        });
    }

    /// Take the next message for delivery, if any.
    pub fn pop(&self) -> Option<LocalMessage> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.ready.pop_front().map(|pending| LocalMessage {
            queue: self.clone(),
            pending,
            finalized: AtomicBool::new(false),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").ready.is_empty()
    }

    /// Messages terminally rejected so far.
    pub fn dead_lettered(&self) -> Vec<DeadLetteredMessage> {
        self.inner.lock().expect("queue lock poisoned").dead.clone()
    }

    fn redeliver(&self, pending: PendingMessage) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.ready.push_back(PendingMessage {
            delivery_count: pending.delivery_count + 1,
            ..pending
        });
    }

    fn record_dead_letter(&self, message: DeadLetteredMessage) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.dead.push(message);
    }
}

/// One delivery of a local-queue message.
pub struct LocalMessage {
    queue: LocalQueue,
    pending: PendingMessage,
    finalized: AtomicBool,
}

#[async_trait]
impl QueueMessage for LocalMessage {
    fn message_id(&self) -> &str {
        &self.pending.id
    }

    fn subject(&self) -> Option<&str> {
        self.pending.subject.as_deref()
    }

    fn body(&self) -> &[u8] {
        &self.pending.body
    }

    fn delivery_count(&self) -> u32 {
        self.pending.delivery_count
    }

    async fn complete(&self) -> Result<(), QueueError> {
        self.finalized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn dead_letter(&self, reason: &str, description: &str) -> Result<(), QueueError> {
        self.finalized.store(true, Ordering::SeqCst);
        self.queue.record_dead_letter(DeadLetteredMessage {
            message_id: self.pending.id.clone(),
            reason: reason.to_string(),
            description: description.to_string(),
        });
        Ok(())
    }
}

impl Drop for LocalMessage {
    fn drop(&mut self) {
        if !self.finalized.load(Ordering::SeqCst) {
            self.queue.redeliver(self.pending.clone());
        }
    }
}

/// Spawn a background task that drains the local queue through the
/// processor. Returns the task handle and a shutdown flag.
pub fn spawn_envelope_consumer(
    queue: LocalQueue,
    processor: Arc<MessageProcessor>,
    poll_interval: Duration,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);

    let handle = tokio::spawn(async move {
        info!("Envelope consumer started");
        let mut tick = tokio::time::interval(poll_interval);

        loop {
            tick.tick().await;

            if shutdown.load(Ordering::Relaxed) {
                info!("Envelope consumer shutting down");
                return;
            }

            while let Some(message) = queue.pop() {
                processor.process_message(&message).await;
            }
        }
    });

    (handle, shutdown_flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completed_message_does_not_come_back() {
        let queue = LocalQueue::new();
        queue.push(None, b"body".to_vec());

        let message = queue.pop().unwrap();
        message.complete().await.unwrap();
        drop(message);

        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn unfinalized_message_is_redelivered_with_a_higher_count() {
        let queue = LocalQueue::new();
        queue.push(None, b"body".to_vec());

        let first = queue.pop().unwrap();
        assert_eq!(first.delivery_count(), 0);
        drop(first); // neither completed nor dead-lettered

        let second = queue.pop().unwrap();
        assert_eq!(second.delivery_count(), 1);
        assert_eq!(second.body(), b"body");
    }

    #[tokio::test]
    async fn dead_lettered_message_is_recorded_and_removed() {
        let queue = LocalQueue::new();
        queue.push(Some("subject".to_string()), b"body".to_vec());

        let message = queue.pop().unwrap();
        message.dead_letter("Too many deliveries", "limit 3").await.unwrap();
        let id = message.message_id().to_string();
        drop(message);

        assert!(queue.is_empty());
        let dead = queue.dead_lettered();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message_id, id);
        assert_eq!(dead[0].reason, "Too many deliveries");
    }
}
