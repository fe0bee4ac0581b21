//! The top-level message loop: deserialize, filter heartbeats, route,
//! finalize, notify.

use std::sync::Arc;

use tracing::{error, info};

use crate::envelope;
use crate::error::ParseError;
use crate::handlers::EnvelopeRouter;
use crate::queue::message::{Disposition, HEARTBEAT_SUBJECT, QueueMessage};
use crate::queue::notifier::EnvelopeNotifier;
use crate::queue::telemetry::Telemetry;

const DEAD_LETTER_PROCESSING_ERROR: &str = "Message processing error";
const DEAD_LETTER_TOO_MANY_DELIVERIES: &str = "Too many deliveries";

/// Outcome of processing one delivery, before finalization.
#[derive(Debug)]
enum ProcessingOutcome {
    Success,
    /// Malformed payload; never retried.
    UnrecoverableFailure(ParseError),
    /// Retried via redelivery up to the configured limit.
    PotentiallyRecoverableFailure,
}

/// Processes queue messages one at a time. Independent invocations may run
/// concurrently; each works on its own envelope and call stack.
pub struct MessageProcessor {
    router: Arc<EnvelopeRouter>,
    notifier: Arc<dyn EnvelopeNotifier>,
    max_delivery_count: u32,
    telemetry: Arc<Telemetry>,
}

impl MessageProcessor {
    pub fn new(
        router: Arc<EnvelopeRouter>,
        notifier: Arc<dyn EnvelopeNotifier>,
        max_delivery_count: u32,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            router,
            notifier,
            max_delivery_count,
            telemetry,
        }
    }

    /// Process one delivery and finalize the message accordingly.
    pub async fn process_message(&self, message: &dyn QueueMessage) {
        info!(message_id = %message.message_id(), "Started processing message");
        let outcome = self.process(message).await;
        let disposition = disposition(&outcome, message.delivery_count(), self.max_delivery_count);
        self.finalize(message, disposition).await;
    }

    async fn process(&self, message: &dyn QueueMessage) -> ProcessingOutcome {
        if message.subject() == Some(HEARTBEAT_SUBJECT) {
            info!(message_id = %message.message_id(), "Heartbeat message received");
            self.telemetry.record_heartbeat();
            return ProcessingOutcome::Success;
        }

        let envelope = match envelope::parse(message.body()) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(
                    message_id = %message.message_id(),
                    error = %e,
                    "Rejected message because it's invalid"
                );
                self.telemetry.record_parse_failure();
                return ProcessingOutcome::UnrecoverableFailure(e);
            }
        };

        info!(
            message_id = %message.message_id(),
            envelope_id = %envelope.id,
            zip_file_name = %envelope.zip_file_name,
            service = %envelope.container,
            jurisdiction = %envelope.jurisdiction,
            form_type = envelope.form_type.as_deref().unwrap_or(""),
            classification = %envelope.classification,
            case_ref = %envelope.case_ref_for_logging(),
            "Parsed message"
        );

        let result = match self.router.route(&envelope, message.delivery_count()).await {
            Ok(result) => result,
            Err(e) => {
                error!(
                    message_id = %message.message_id(),
                    envelope_id = %envelope.id,
                    zip_file_name = %envelope.zip_file_name,
                    error = %e,
                    "Failed to process message"
                );
                self.telemetry.record_recoverable_failure();
                return ProcessingOutcome::PotentiallyRecoverableFailure;
            }
        };

        // The case mutation has already happened. If notification fails the
        // message stays unfinalized; redelivery is safe because the
        // fallbacks are idempotent.
        if let Err(e) = self
            .notifier
            .notify(&envelope.id, result.case_id, result.action)
            .await
        {
            error!(
                message_id = %message.message_id(),
                envelope_id = %envelope.id,
                error = %e,
                "Failed to notify about processed envelope"
            );
            self.telemetry.record_recoverable_failure();
            return ProcessingOutcome::PotentiallyRecoverableFailure;
        }

        info!(
            message_id = %message.message_id(),
            zip_file_name = %envelope.zip_file_name,
            "Processed message"
        );
        self.telemetry.record_processed();
        ProcessingOutcome::Success
    }

    async fn finalize(&self, message: &dyn QueueMessage, disposition: Disposition) {
        let result = match &disposition {
            Disposition::Complete => match message.complete().await {
                Ok(()) => {
                    info!(message_id = %message.message_id(), "Message has been completed");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Disposition::DeadLetter {
                reason,
                description,
            } => match message.dead_letter(reason, description).await {
                Ok(()) => {
                    info!(
                        message_id = %message.message_id(),
                        %reason,
                        "Message has been dead-lettered"
                    );
                    self.telemetry.record_dead_lettered();
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Disposition::LeaveForRedelivery => {
                info!(
                    message_id = %message.message_id(),
                    delivery_attempt = message.delivery_count() + 1,
                    "Allowing message to return to queue"
                );
                Ok(())
            }
        };

        if let Err(e) = result {
            // Finalization failures are logged, never propagated; the
            // transport's redelivery handles the rest.
            error!(
                message_id = %message.message_id(),
                error = %e,
                "Failed to finalize processed message"
            );
        }
    }
}

/// Pure mapping from a processing outcome to the message's fate.
fn disposition(
    outcome: &ProcessingOutcome,
    delivery_count: u32,
    max_delivery_count: u32,
) -> Disposition {
    match outcome {
        ProcessingOutcome::Success => Disposition::Complete,
        ProcessingOutcome::UnrecoverableFailure(e) => Disposition::DeadLetter {
            reason: DEAD_LETTER_PROCESSING_ERROR.to_string(),
            description: e.describe(),
        },
        ProcessingOutcome::PotentiallyRecoverableFailure => {
            // Delivery counts start from 0.
            let delivery_attempt = delivery_count + 1;
            if delivery_attempt < max_delivery_count {
                Disposition::LeaveForRedelivery
            } else {
                Disposition::DeadLetter {
                    reason: DEAD_LETTER_TOO_MANY_DELIVERIES.to_string(),
                    description: format!(
                        "Reached limit of message delivery count of {delivery_attempt}"
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Classification;
    use crate::payments::model::PaymentStatus;
    use crate::payments::store::PaymentStore;
    use crate::test_support::{FakeQueueMessage, TestHarness, envelope_json, envelope_with_payments};

    fn processor_with(harness: &TestHarness, max_delivery_count: u32) -> MessageProcessor {
        MessageProcessor::new(
            Arc::new(harness.router()),
            harness.notifier.clone(),
            max_delivery_count,
            Arc::clone(&harness.telemetry),
        )
    }

    #[tokio::test]
    async fn heartbeat_is_acknowledged_without_business_processing() {
        let harness = TestHarness::new();
        let processor = processor_with(&harness, 10);
        let message = FakeQueueMessage::heartbeat();

        processor.process_message(&message).await;

        assert!(message.completed());
        assert!(harness.notifier.notifications().is_empty());
        assert_eq!(harness.telemetry.snapshot().heartbeats, 1);
        assert_eq!(harness.telemetry.snapshot().processed, 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_dead_lettered_immediately() {
        let harness = TestHarness::new();
        let processor = processor_with(&harness, 10);
        let message = FakeQueueMessage::new(b"{not json".to_vec(), 0);

        processor.process_message(&message).await;

        let (reason, description) = message.dead_lettered().unwrap();
        assert_eq!(reason, "Message processing error");
        assert!(description.starts_with("Json:"));
        assert!(!message.completed());
        assert_eq!(harness.telemetry.snapshot().parse_failures, 1);
        assert_eq!(harness.telemetry.snapshot().dead_lettered, 1);
    }

    #[tokio::test]
    async fn success_completes_and_notifies() {
        let harness = TestHarness::new();
        harness.case_api.put_case(1001, "MAILSCAN_Service");
        let processor = processor_with(&harness, 10);

        let envelope = crate::test_support::envelope_with(
            Classification::SupplementaryEvidence,
            Some("1001"),
            None,
        );
        let message = FakeQueueMessage::new(envelope_json(&envelope), 0);

        processor.process_message(&message).await;

        assert!(message.completed());
        let notifications = harness.notifier.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, "envelope-1");
        assert_eq!(notifications[0].1, 1001);
        assert_eq!(harness.telemetry.snapshot().processed, 1);
    }

    #[tokio::test]
    async fn notification_failure_leaves_the_message_for_redelivery() {
        let harness = TestHarness::new();
        harness.case_api.put_case(1001, "MAILSCAN_Service");
        harness.notifier.fail_next(1);
        let processor = processor_with(&harness, 10);

        let envelope = crate::test_support::envelope_with(
            Classification::SupplementaryEvidence,
            Some("1001"),
            None,
        );
        let message = FakeQueueMessage::new(envelope_json(&envelope), 0);

        processor.process_message(&message).await;

        assert!(!message.completed());
        assert!(message.dead_lettered().is_none());
    }

    #[tokio::test]
    async fn recoverable_failure_under_the_limit_is_left_for_redelivery() {
        let harness = TestHarness::new();
        harness.transformer.set_mode(crate::test_support::TransformMode::Transport);
        let processor = processor_with(&harness, 10);

        let envelope = crate::test_support::envelope(Classification::NewApplication);
        let message = FakeQueueMessage::new(envelope_json(&envelope), 0);

        processor.process_message(&message).await;

        assert!(!message.completed());
        assert!(message.dead_lettered().is_none());
    }

    #[tokio::test]
    async fn recoverable_failure_at_the_limit_is_dead_lettered_with_the_limit_named() {
        let harness = TestHarness::new();
        // The payment store failing keeps even the fallback path failing.
        harness.payment_store.fail_saves(true);
        let processor = processor_with(&harness, 3);

        let envelope = envelope_with_payments(Classification::Exception, &["111"]);
        let message = FakeQueueMessage::new(envelope_json(&envelope), 2);

        processor.process_message(&message).await;

        let (reason, description) = message.dead_lettered().unwrap();
        assert_eq!(reason, "Too many deliveries");
        assert!(description.contains("3"));
    }

    #[tokio::test]
    async fn end_to_end_fallback_creates_flagged_payment() {
        // Supplementary evidence referencing a case that doesn't exist:
        // the envelope degrades to an exception record and the payment row
        // carries the exception-record flag and the record's reference.
        let harness = TestHarness::new();
        let processor = processor_with(&harness, 10);

        let mut envelope = crate::test_support::envelope_with(
            Classification::SupplementaryEvidence,
            Some("1539007368674134"),
            None,
        );
        envelope.payments = vec![crate::envelope::PaymentReference {
            document_control_number: "9876543210".to_string(),
        }];
        let message = FakeQueueMessage::new(envelope_json(&envelope), 0);

        processor.process_message(&message).await;

        assert!(message.completed());
        let notifications = harness.notifier.notifications();
        assert_eq!(notifications[0].2, crate::handlers::EnvelopeAction::ExceptionRecord);

        let payments = harness
            .payment_store
            .payments_by_status(PaymentStatus::Complete)
            .await
            .unwrap();
        assert_eq!(payments.len(), 1);
        assert!(payments[0].is_exception_record);
        assert_eq!(payments[0].case_reference, notifications[0].1.to_string());
    }
}
