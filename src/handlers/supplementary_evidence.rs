//! Handles envelopes of classification `supplementary_evidence`.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cases::attach::SupplementaryEvidenceAttacher;
use crate::cases::exception_record::ExceptionRecordCreator;
use crate::cases::finder::CaseFinder;
use crate::envelope::{Classification, Envelope};
use crate::error::HandlerError;
use crate::handlers::{EnvelopeAction, ProcessingResult, ensure_classification};
use crate::payments::service::PaymentsService;

pub struct SupplementaryEvidenceHandler {
    case_finder: Arc<CaseFinder>,
    evidence_attacher: Arc<SupplementaryEvidenceAttacher>,
    exception_record_creator: Arc<ExceptionRecordCreator>,
    payments: Arc<PaymentsService>,
}

impl SupplementaryEvidenceHandler {
    pub fn new(
        case_finder: Arc<CaseFinder>,
        evidence_attacher: Arc<SupplementaryEvidenceAttacher>,
        exception_record_creator: Arc<ExceptionRecordCreator>,
        payments: Arc<PaymentsService>,
    ) -> Self {
        Self {
            case_finder,
            evidence_attacher,
            exception_record_creator,
            payments,
        }
    }

    pub async fn handle(&self, envelope: &Envelope) -> Result<ProcessingResult, HandlerError> {
        ensure_classification(envelope, Classification::SupplementaryEvidence)?;

        let found = self.case_finder.find_case(envelope).await?;

        match found {
            Some(existing_case) => {
                match self.evidence_attacher.attach(envelope, &existing_case).await {
                    Ok(()) => {
                        self.payments
                            .create_new_payment(envelope, existing_case.id, false)
                            .await?;
                        Ok(ProcessingResult {
                            case_id: existing_case.id,
                            action: EnvelopeAction::AutoAttachedToCase,
                        })
                    }
                    Err(e) => {
                        info!(
                            envelope_id = %envelope.id,
                            case_id = %existing_case.id,
                            error = %e,
                            "Creating exception record because attaching supplementary evidence to a case failed"
                        );
                        self.create_exception_record(envelope).await
                    }
                }
            }
            None => {
                warn!(
                    zip_file_name = %envelope.zip_file_name,
                    envelope_id = %envelope.id,
                    case_ref = %envelope.case_ref_for_logging(),
                    "Case not found. Creating exception record instead"
                );
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
    use crate::cases::api::CaseDocument;
    use crate::payments::model::PaymentStatus;
    use crate::payments::store::PaymentStore;
    use crate::test_support::{TestHarness, envelope, envelope_with};

    fn evidence_envelope(case_ref: Option<&str>) -> Envelope {
        envelope_with(Classification::SupplementaryEvidence, case_ref, None)
    }

    #[tokio::test]
    async fn attaches_to_the_referenced_case() {
        let harness = TestHarness::new();
        harness.case_api.put_case(1001, "MAILSCAN_Service");
        let handler = harness.supplementary_evidence_handler();

        let result = handler.handle(&evidence_envelope(Some("1001"))).await.unwrap();
        assert_eq!(result.case_id, 1001);
        assert_eq!(result.action, EnvelopeAction::AutoAttachedToCase);
        assert_eq!(harness.case_api.submits(), 1);
    }

    #[tokio::test]
    async fn missing_case_falls_back_to_exception_record_with_flagged_payment() {
        let harness = TestHarness::new();
        let handler = harness.supplementary_evidence_handler();
        let mut envelope = evidence_envelope(Some("9999"));
        envelope.payments = vec![crate::envelope::PaymentReference {
            document_control_number: "111".to_string(),
        }];

        let result = handler.handle(&envelope).await.unwrap();
        assert_eq!(result.action, EnvelopeAction::ExceptionRecord);

        let record = harness.case_api.case(result.case_id).unwrap();
        assert_eq!(record.case_type_id, "MAILSCAN_ExceptionRecord");

        let payments = harness
            .payment_store
            .payments_by_status(PaymentStatus::Complete)
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].is_exception_record);
        assert_eq!(payments[0].case_reference, result.case_id.to_string());
    }

    #[tokio::test]
    async fn duplicate_clash_falls_back_to_exception_record() {
        let harness = TestHarness::new();
        // The envelope's only document is already on the case from a
        // different source.
        harness.case_api.put_case_with_documents(
            1001,
            vec![CaseDocument {
                file_name: None,
                control_number: "1234".to_string(),
                document_type: None,
                scanned_at: None,
                url: None,
                source_ref: Some("ER1".to_string()),
            }],
        );
        let handler = harness.supplementary_evidence_handler();

        let result = handler.handle(&evidence_envelope(Some("1001"))).await.unwrap();
        assert_eq!(result.action, EnvelopeAction::ExceptionRecord);
    }

    #[tokio::test]
    async fn rejects_foreign_classifications() {
        let harness = TestHarness::new();
        let handler = harness.supplementary_evidence_handler();
        let envelope = envelope(Classification::SupplementaryEvidenceWithOcr);

        let err = handler.handle(&envelope).await.unwrap_err();
        assert!(matches!(err, HandlerError::ClassificationMismatch { .. }));
    }
}
