//! Payment reconciliation service.
//!
//! Creation swallows processor failures — the case mutation already
//! succeeded and is the primary deliverable; the failed row stays visible
//! to operators for manual reprocessing. Reprocessing is synchronous and
//! reports its failure.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::{PaymentsError, StoreError};
use crate::payments::client::PaymentProcessorClient;
use crate::payments::model::{
    CreatePaymentRequest, Payment, PaymentStatus, UpdatePayment, UpdatePaymentRequest,
};
use crate::payments::store::PaymentStore;

pub struct PaymentsService {
    store: Arc<dyn PaymentStore>,
    client: Arc<dyn PaymentProcessorClient>,
}

impl PaymentsService {
    pub fn new(store: Arc<dyn PaymentStore>, client: Arc<dyn PaymentProcessorClient>) -> Self {
        Self { store, client }
    }

    /// Record and send a new payment for an envelope resolved to `case_id`.
    ///
    /// The `Pending` row is persisted *before* the processor call so a
    /// crash mid-call still leaves an auditable trail. Processor failure
    /// marks the row `Failed` and returns `Ok` — it must not fail the
    /// envelope's processing.
    pub async fn create_new_payment(
        &self,
        envelope: &Envelope,
        case_id: u64,
        is_exception_record: bool,
    ) -> Result<(), StoreError> {
        if envelope.payments.is_empty() {
            info!(
                envelope_id = %envelope.id,
                case_ref = %envelope.case_ref_for_logging(),
                "Envelope has no payments, not sending create command"
            );
            return Ok(());
        }

        let mut payment = Payment::new(envelope, case_id, is_exception_record);
        self.store.save_payment(&payment).await?;

        let request = CreatePaymentRequest::from(&payment);
        match self.client.create_payment(&request).await {
            Ok(()) => {
                payment.status = PaymentStatus::Complete;
            }
            Err(e) => {
                payment.status = PaymentStatus::Failed;
                payment.status_message = Some(e.to_string());
                error!(
                    envelope_id = %envelope.id,
                    payment_id = %payment.id,
                    error = %e,
                    "Call to payment processor for new payment failed"
                );
            }
        }
        self.store.save_payment(&payment).await
    }

    /// Record and send a payment move from an exception record to the case
    /// it was promoted to. Same lifecycle as creation.
    pub async fn update_payment(
        &self,
        envelope_id: &str,
        jurisdiction: &str,
        exception_record_ref: &str,
        new_case_ref: &str,
    ) -> Result<(), StoreError> {
        let mut payment =
            UpdatePayment::new(envelope_id, jurisdiction, exception_record_ref, new_case_ref);
        self.store.save_update_payment(&payment).await?;

        let request = UpdatePaymentRequest::from(&payment);
        match self.client.update_payment(&request).await {
            Ok(()) => {
                payment.status = PaymentStatus::Complete;
            }
            Err(e) => {
                payment.status = PaymentStatus::Failed;
                payment.status_message = Some(e.to_string());
                error!(
                    envelope_id = %envelope_id,
                    payment_id = %payment.id,
                    error = %e,
                    "Call to payment processor for update payment failed"
                );
            }
        }
        self.store.save_update_payment(&payment).await
    }

    /// Retry a failed new payment. Failure is reported to the caller —
    /// an operator is waiting on the result.
    pub async fn reprocess_new_payment(&self, id: Uuid) -> Result<Payment, PaymentsError> {
        let mut payment = self
            .store
            .payment(id)
            .await?
            .ok_or(PaymentsError::NotFound(id))?;

        let request = CreatePaymentRequest::from(&payment);
        match self.client.create_payment(&request).await {
            Ok(()) => {
                payment.status = PaymentStatus::Complete;
                payment.status_message = None;
                self.store.save_payment(&payment).await?;
                info!(payment_id = %payment.id, "Reprocessed payment completed");
                Ok(payment)
            }
            Err(e) => {
                payment.status = PaymentStatus::Failed;
                payment.status_message = Some(e.to_string());
                self.store.save_payment(&payment).await?;
                Err(PaymentsError::ReprocessFailed(e.to_string()))
            }
        }
    }

    /// Retry a failed update payment. Failure is reported to the caller.
    pub async fn reprocess_update_payment(
        &self,
        id: Uuid,
    ) -> Result<UpdatePayment, PaymentsError> {
        let mut payment = self
            .store
            .update_payment(id)
            .await?
            .ok_or(PaymentsError::NotFound(id))?;

        let request = UpdatePaymentRequest::from(&payment);
        match self.client.update_payment(&request).await {
            Ok(()) => {
                payment.status = PaymentStatus::Complete;
                payment.status_message = None;
                self.store.save_update_payment(&payment).await?;
                info!(payment_id = %payment.id, "Reprocessed update payment completed");
                Ok(payment)
            }
            Err(e) => {
                payment.status = PaymentStatus::Failed;
                payment.status_message = Some(e.to_string());
                self.store.save_update_payment(&payment).await?;
                Err(PaymentsError::ReprocessFailed(e.to_string()))
            }
        }
    }

    /// All new payments that have failed processing.
    pub async fn failed_new_payments(&self) -> Result<Vec<Payment>, StoreError> {
        self.store.payments_by_status(PaymentStatus::Failed).await
    }

    /// All update payments that have failed processing.
    pub async fn failed_update_payments(&self) -> Result<Vec<UpdatePayment>, StoreError> {
        self.store
            .update_payments_by_status(PaymentStatus::Failed)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePaymentProcessor, MemoryPaymentStore, envelope, envelope_with_payments};
    use crate::envelope::Classification;

    fn service(
        store: &Arc<MemoryPaymentStore>,
        processor: &Arc<FakePaymentProcessor>,
    ) -> PaymentsService {
        PaymentsService::new(
            Arc::clone(store) as Arc<dyn PaymentStore>,
            Arc::clone(processor) as Arc<dyn PaymentProcessorClient>,
        )
    }

    #[tokio::test]
    async fn creation_persists_pending_before_the_processor_call() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());
        let envelope = envelope_with_payments(Classification::Exception, &["111"]);

        service(&store, &processor)
            .create_new_payment(&envelope, 42, true)
            .await
            .unwrap();

        // Two saves: one pending, one terminal.
        let history = store.payment_save_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, PaymentStatus::Pending);
        assert_eq!(history[1].status, PaymentStatus::Complete);

        // The processor saw the pending row's data.
        let requests = processor.create_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].case_reference, "42");
        assert!(requests[0].is_exception_record);
    }

    #[tokio::test]
    async fn processor_failure_on_creation_is_swallowed_and_recorded() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());
        processor.fail_next(1);
        let envelope = envelope_with_payments(Classification::Exception, &["111"]);

        // Creation must not propagate the processor failure.
        service(&store, &processor)
            .create_new_payment(&envelope, 42, false)
            .await
            .unwrap();

        let failed = store
            .payments_by_status(PaymentStatus::Failed)
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].status_message.is_some());
    }

    #[tokio::test]
    async fn envelope_without_payments_is_a_no_op() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());

        service(&store, &processor)
            .create_new_payment(&envelope(Classification::Exception), 42, true)
            .await
            .unwrap();

        assert!(store.payment_save_history().is_empty());
        assert!(processor.create_requests().is_empty());
    }

    #[tokio::test]
    async fn reprocess_success_clears_the_status_message() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());
        processor.fail_next(1);
        let envelope = envelope_with_payments(Classification::Exception, &["111"]);

        let svc = service(&store, &processor);
        svc.create_new_payment(&envelope, 42, false).await.unwrap();
        let failed = svc.failed_new_payments().await.unwrap();

        let reprocessed = svc.reprocess_new_payment(failed[0].id).await.unwrap();
        assert_eq!(reprocessed.status, PaymentStatus::Complete);
        assert_eq!(reprocessed.status_message, None);
        assert!(svc.failed_new_payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reprocess_failure_is_persisted_and_reported() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());
        processor.fail_next(2);
        let envelope = envelope_with_payments(Classification::Exception, &["111"]);

        let svc = service(&store, &processor);
        svc.create_new_payment(&envelope, 42, false).await.unwrap();
        let failed = svc.failed_new_payments().await.unwrap();

        let err = svc.reprocess_new_payment(failed[0].id).await.unwrap_err();
        assert!(matches!(err, PaymentsError::ReprocessFailed(_)));

        let still_failed = svc.failed_new_payments().await.unwrap();
        assert_eq!(still_failed.len(), 1);
        assert!(still_failed[0].status_message.is_some());
    }

    #[tokio::test]
    async fn reprocess_of_unknown_id_is_not_found() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());

        let id = Uuid::new_v4();
        let err = service(&store, &processor)
            .reprocess_new_payment(id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentsError::NotFound(found) if found == id));
    }

    #[tokio::test]
    async fn update_payment_follows_the_same_lifecycle() {
        let store = Arc::new(MemoryPaymentStore::default());
        let processor = Arc::new(FakePaymentProcessor::default());
        processor.fail_next(1);

        let svc = service(&store, &processor);
        svc.update_payment("env-1", "MAILSCAN", "100", "200")
            .await
            .unwrap();

        let failed = svc.failed_update_payments().await.unwrap();
        assert_eq!(failed.len(), 1);

        let reprocessed = svc.reprocess_update_payment(failed[0].id).await.unwrap();
        assert_eq!(reprocessed.status, PaymentStatus::Complete);
        assert_eq!(reprocessed.new_case_ref, "200");

        let requests = processor.update_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].exception_record_ref, "100");
    }
}
