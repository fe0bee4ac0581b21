//! Downstream notification of successfully processed envelopes.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::NotificationError;
use crate::handlers::EnvelopeAction;

/// Notification body sent downstream once an envelope is resolved.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedEnvelope {
    pub envelope_id: String,
    pub case_id: u64,
    pub action: EnvelopeAction,
}

/// Notifies a downstream consumer that an envelope was processed.
///
/// A notification failure must not undo the completed case mutation: the
/// processor leaves the message unfinalized and relies on the idempotent
/// fallbacks to make redelivery safe.
#[async_trait]
pub trait EnvelopeNotifier: Send + Sync {
    async fn notify(
        &self,
        envelope_id: &str,
        case_id: u64,
        action: EnvelopeAction,
    ) -> Result<(), NotificationError>;
}

/// Notifier for environments without a downstream queue; logs and succeeds.
pub struct NoopNotifier;

#[async_trait]
impl EnvelopeNotifier for NoopNotifier {
    async fn notify(
        &self,
        envelope_id: &str,
        case_id: u64,
        action: EnvelopeAction,
    ) -> Result<(), NotificationError> {
        let body = serde_json::to_string(&ProcessedEnvelope {
            envelope_id: envelope_id.to_string(),
            case_id,
            action,
        })
        .map_err(|e| NotificationError::Send(e.to_string()))?;
        info!(%body, "Processed-envelope notification (noop notifier)");
        Ok(())
    }
}
