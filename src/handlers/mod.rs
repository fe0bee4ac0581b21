//! Classification-driven envelope handling.
//!
//! The router maps each classification to exactly one handler; every
//! handler re-validates the classification before doing anything else and
//! resolves the envelope to a [`ProcessingResult`] — falling back to the
//! idempotent exception-record path rather than dropping work.

pub mod exception;
pub mod new_application;
pub mod supplementary_evidence;
pub mod supplementary_evidence_with_ocr;

use serde::Serialize;

use crate::envelope::{Classification, Envelope};
use crate::error::HandlerError;

pub use exception::ExceptionHandler;
pub use new_application::NewApplicationHandler;
pub use supplementary_evidence::SupplementaryEvidenceHandler;
pub use supplementary_evidence_with_ocr::SupplementaryEvidenceWithOcrHandler;

/// What was done with an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeAction {
    AutoCreatedCase,
    AutoAttachedToCase,
    AutoUpdatedCase,
    ExceptionRecord,
}

/// Produced once per envelope; drives notification and the payment
/// exception-record flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingResult {
    pub case_id: u64,
    pub action: EnvelopeAction,
}

/// Defensive check that an envelope reached the handler it was routed to.
pub(crate) fn ensure_classification(
    envelope: &Envelope,
    expected: Classification,
) -> Result<(), HandlerError> {
    if envelope.classification == expected {
        Ok(())
    } else {
        Err(HandlerError::ClassificationMismatch {
            expected,
            actual: envelope.classification,
        })
    }
}

/// Dispatches envelopes to their classification's handler.
pub struct EnvelopeRouter {
    new_application: NewApplicationHandler,
    exception: ExceptionHandler,
    supplementary_evidence: SupplementaryEvidenceHandler,
    supplementary_evidence_with_ocr: SupplementaryEvidenceWithOcrHandler,
}

impl EnvelopeRouter {
    pub fn new(
        new_application: NewApplicationHandler,
        exception: ExceptionHandler,
        supplementary_evidence: SupplementaryEvidenceHandler,
        supplementary_evidence_with_ocr: SupplementaryEvidenceWithOcrHandler,
    ) -> Self {
        Self {
            new_application,
            exception,
            supplementary_evidence,
            supplementary_evidence_with_ocr,
        }
    }

    pub async fn route(
        &self,
        envelope: &Envelope,
        delivery_count: u32,
    ) -> Result<ProcessingResult, HandlerError> {
        match envelope.classification {
            Classification::NewApplication => {
                self.new_application.handle(envelope, delivery_count).await
            }
            Classification::Exception => self.exception.handle(envelope).await,
            Classification::SupplementaryEvidence => {
                self.supplementary_evidence.handle(envelope).await
            }
            Classification::SupplementaryEvidenceWithOcr => {
                self.supplementary_evidence_with_ocr
                    .handle(envelope, delivery_count)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::envelope;

    #[test]
    fn mismatched_classification_names_both_values() {
        let envelope = envelope(Classification::Exception);
        let err =
            ensure_classification(&envelope, Classification::NewApplication).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("new_application"));
        assert!(message.contains("exception"));
    }

    #[test]
    fn matching_classification_passes() {
        let envelope = envelope(Classification::Exception);
        assert!(ensure_classification(&envelope, Classification::Exception).is_ok());
    }

    #[test]
    fn action_serializes_for_the_notification_payload() {
        let json = serde_json::to_string(&EnvelopeAction::AutoCreatedCase).unwrap();
        assert_eq!(json, "\"AUTO_CREATED_CASE\"");
        let json = serde_json::to_string(&EnvelopeAction::ExceptionRecord).unwrap();
        assert_eq!(json, "\"EXCEPTION_RECORD\"");
    }
}
