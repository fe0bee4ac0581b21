//! Handles envelopes of classification `new_application`.

use std::sync::Arc;

use crate::cases::creation::{AutoCaseCreator, CaseCreationResult};
use crate::cases::exception_record::ExceptionRecordCreator;
use crate::envelope::{Classification, Envelope};
use crate::error::HandlerError;
use crate::handlers::{EnvelopeAction, ProcessingResult, ensure_classification};
use crate::payments::service::PaymentsService;

/// Retry budget for potentially recoverable case-creation failures. Once a
/// message has been delivered this many times the handler stops raising
/// and degrades to the exception-record path.
pub const MAX_RETRIES_FOR_POTENTIALLY_RECOVERABLE_FAILURES: u32 = 2;

pub struct NewApplicationHandler {
    case_creator: Arc<AutoCaseCreator>,
    payments: Arc<PaymentsService>,
    exception_record_creator: Arc<ExceptionRecordCreator>,
}

impl NewApplicationHandler {
    pub fn new(
        case_creator: Arc<AutoCaseCreator>,
        payments: Arc<PaymentsService>,
        exception_record_creator: Arc<ExceptionRecordCreator>,
    ) -> Self {
        Self {
            case_creator,
            payments,
            exception_record_creator,
        }
    }

    pub async fn handle(
        &self,
        envelope: &Envelope,
        delivery_count: u32,
    ) -> Result<ProcessingResult, HandlerError> {
        ensure_classification(envelope, Classification::NewApplication)?;

        match self.case_creator.create_case(envelope).await {
            CaseCreationResult::Success { case_id } => {
                self.payments
                    .create_new_payment(envelope, case_id, false)
                    .await?;
                Ok(ProcessingResult {
                    case_id,
                    action: EnvelopeAction::AutoCreatedCase,
                })
            }
            CaseCreationResult::UnrecoverableFailure => {
                // A case can't be created - create an exception record instead.
                self.create_exception_record(envelope).await
            }
            CaseCreationResult::PotentiallyRecoverableFailure => {
                if delivery_count < MAX_RETRIES_FOR_POTENTIALLY_RECOVERABLE_FAILURES {
                    // Let the transport redeliver.
                    Err(HandlerError::CaseCreation(
                        "Case creation failed due to a potentially recoverable error".to_string(),
                    ))
                } else {
                    // Too many attempts - fall back to an exception record.
                    self.create_exception_record(envelope).await
                }
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
