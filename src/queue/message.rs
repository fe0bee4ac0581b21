//! The transport boundary: a received message and its finalization.
//!
//! The transport provides at-least-once delivery; idempotency of side
//! effects is this system's responsibility, not the transport's.

use async_trait::async_trait;

use crate::error::QueueError;

/// Subject of liveness probes. Acknowledged without business processing.
pub const HEARTBEAT_SUBJECT: &str = "heartbeat";

/// The three-way outcome of processing one delivery. Finalization is an
/// explicit value, not a side effect buried in error handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: processing succeeded (or the message was a heartbeat).
    Complete,
    /// Terminal rejection, removing the message from normal redelivery.
    DeadLetter { reason: String, description: String },
    /// Do nothing; the transport will redeliver with its own pacing.
    LeaveForRedelivery,
}

/// A message as delivered by the transport.
#[async_trait]
pub trait QueueMessage: Send + Sync {
    fn message_id(&self) -> &str;

    fn subject(&self) -> Option<&str>;

    fn body(&self) -> &[u8];

    /// Number of *prior* delivery attempts; 0 on first delivery.
    fn delivery_count(&self) -> u32;

    async fn complete(&self) -> Result<(), QueueError>;

    async fn dead_letter(&self, reason: &str, description: &str) -> Result<(), QueueError>;
}
