//! Handles envelopes of classification `exception`.
//!
//! Always resolves via the exception-record path; there is no auto
//! processing to attempt.

use std::sync::Arc;

use crate::cases::exception_record::ExceptionRecordCreator;
use crate::envelope::{Classification, Envelope};
use crate::error::HandlerError;
use crate::handlers::{EnvelopeAction, ProcessingResult, ensure_classification};
use crate::payments::service::PaymentsService;

pub struct ExceptionHandler {
    exception_record_creator: Arc<ExceptionRecordCreator>,
    payments: Arc<PaymentsService>,
}

impl ExceptionHandler {
    pub fn new(
        exception_record_creator: Arc<ExceptionRecordCreator>,
        payments: Arc<PaymentsService>,
    ) -> Self {
        Self {
            exception_record_creator,
            payments,
        }
    }

    pub async fn handle(&self, envelope: &Envelope) -> Result<ProcessingResult, HandlerError> {
        ensure_classification(envelope, Classification::Exception)?;

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
