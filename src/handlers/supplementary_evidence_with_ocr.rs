//! Handles envelopes of classification `supplementary_evidence_with_ocr`.

use std::sync::Arc;

use tracing::info;

use crate::cases::exception_record::ExceptionRecordCreator;
use crate::cases::update::{AutoCaseUpdateResult, AutoCaseUpdater};
use crate::config::ServiceConfigProvider;
use crate::envelope::{Classification, Envelope};
use crate::error::{ExceptionRecordError, HandlerError};
use crate::handlers::{EnvelopeAction, ProcessingResult, ensure_classification};
use crate::payments::service::PaymentsService;

/// Retry budget for potentially recoverable case-update failures.
pub const MAX_RETRIES: u32 = 2;

pub struct SupplementaryEvidenceWithOcrHandler {
    exception_record_creator: Arc<ExceptionRecordCreator>,
    payments: Arc<PaymentsService>,
    case_updater: Arc<AutoCaseUpdater>,
    services: Arc<ServiceConfigProvider>,
}

impl SupplementaryEvidenceWithOcrHandler {
    pub fn new(
        exception_record_creator: Arc<ExceptionRecordCreator>,
        payments: Arc<PaymentsService>,
        case_updater: Arc<AutoCaseUpdater>,
        services: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            exception_record_creator,
            payments,
            case_updater,
            services,
        }
    }

    pub async fn handle(
        &self,
        envelope: &Envelope,
        delivery_count: u32,
    ) -> Result<ProcessingResult, HandlerError> {
        ensure_classification(envelope, Classification::SupplementaryEvidenceWithOcr)?;

        let config = self
            .services
            .get(&envelope.container)
            .map_err(ExceptionRecordError::from)?;

        if !config.auto_case_update_enabled {
            info!(
                envelope_id = %envelope.id,
                service = %envelope.container,
                "Automatic case update is disabled for the service. Creating exception record"
            );
            return self.create_exception_record(envelope).await;
        }

        match self.case_updater.update_case(envelope).await {
            AutoCaseUpdateResult::Updated { case_id } => {
                self.payments
                    .create_new_payment(envelope, case_id, false)
                    .await?;
                Ok(ProcessingResult {
                    case_id,
                    action: EnvelopeAction::AutoUpdatedCase,
                })
            }
            AutoCaseUpdateResult::Failed => {
                if delivery_count < MAX_RETRIES {
                    Err(HandlerError::CaseUpdate(
                        "Updating case failed due to a potentially recoverable error".to_string(),
                    ))
                } else {
                    self.create_exception_record(envelope).await
                }
            }
            AutoCaseUpdateResult::Abandoned => {
                // It's not possible to update a case for this envelope.
                self.create_exception_record(envelope).await
            }
        }
    }

    async fn create_exception_record(
        &self,
        envelope: &Envelope,
    ) -> Result<ProcessingResult, HandlerError> {
        let case_id = self.exception_record_creator.try_create_from(envelope).await?;
        self.payments
            .create_new_payment(envelope, case_id, true)
            .await?;
        Ok(ProcessingResult {
            case_id,
            action: EnvelopeAction::ExceptionRecord,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestHarness, TransformMode, envelope, envelope_with};

    fn ocr_envelope(case_ref: Option<&str>) -> Envelope {
        envelope_with(Classification::SupplementaryEvidenceWithOcr, case_ref, None)
    }

    #[tokio::test]
    async fn updates_the_case_when_enabled_and_found() {
        let harness = TestHarness::with_auto_update(true);
        harness.case_api.put_case(77, "MAILSCAN_Service");
        let handler = harness.supplementary_evidence_with_ocr_handler();

        let result = handler.handle(&ocr_envelope(Some("77")), 0).await.unwrap();
        assert_eq!(result.case_id, 77);
        assert_eq!(result.action, EnvelopeAction::AutoUpdatedCase);
    }

    #[tokio::test]
    async fn disabled_auto_update_goes_straight_to_exception_record() {
        let harness = TestHarness::with_auto_update(false);
        harness.case_api.put_case(77, "MAILSCAN_Service");
        let handler = harness.supplementary_evidence_with_ocr_handler();

        let result = handler.handle(&ocr_envelope(Some("77")), 0).await.unwrap();
        assert_eq!(result.action, EnvelopeAction::ExceptionRecord);
        // Only the exception record submit; the case itself is untouched.
        assert_eq!(harness.case_api.submits(), 1);
    }

    #[tokio::test]
    async fn abandoned_update_falls_back_to_exception_record() {
        let harness = TestHarness::with_auto_update(true);
        let handler = harness.supplementary_evidence_with_ocr_handler();

        // No case matches the reference.
        let result = handler.handle(&ocr_envelope(Some("9999")), 0).await.unwrap();
        assert_eq!(result.action, EnvelopeAction::ExceptionRecord);
    }

    #[tokio::test]
    async fn failed_update_retries_then_falls_back() {
        let harness = TestHarness::with_auto_update(true);
        harness.case_api.put_case(77, "MAILSCAN_Service");
        harness.update_client.set_mode(TransformMode::Transport);
        let handler = harness.supplementary_evidence_with_ocr_handler();
        let envelope = ocr_envelope(Some("77"));

        let err = handler.handle(&envelope, 0).await.unwrap_err();
        assert!(matches!(err, HandlerError::CaseUpdate(_)));

        let result = handler.handle(&envelope, MAX_RETRIES).await.unwrap();
        assert_eq!(result.action, EnvelopeAction::ExceptionRecord);
    }

    #[tokio::test]
    async fn rejects_foreign_classifications() {
        let harness = TestHarness::with_auto_update(true);
        let handler = harness.supplementary_evidence_with_ocr_handler();
        let envelope = envelope(Classification::SupplementaryEvidence);

        let err = handler.handle(&envelope, 0).await.unwrap_err();
        assert!(matches!(err, HandlerError::ClassificationMismatch { .. }));
    }
}
