//! Queue transport boundary and the message-processing loop.

pub mod local;
pub mod message;
pub mod notifier;
pub mod processor;
pub mod telemetry;

pub use local::{LocalQueue, spawn_envelope_consumer};
pub use message::{Disposition, HEARTBEAT_SUBJECT, QueueMessage};
pub use notifier::{EnvelopeNotifier, NoopNotifier};
pub use processor::MessageProcessor;
pub use telemetry::Telemetry;
