//! Payment rows and processor request payloads.
//!
//! Rows outlive the envelope that created them — they are the unit of
//! retry for payment-side failures and are never deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::envelope::Envelope;

/// `Pending` is written before the processor call; exactly one terminal
/// status is persisted afterwards. `Failed` rows stay until manually
/// reprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Complete,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Complete => "complete",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => PaymentStatus::Complete,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

/// A recorded payment-creation intent.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub envelope_id: String,
    /// The case the payment was reconciled against.
    pub case_reference: String,
    pub is_exception_record: bool,
    pub po_box: String,
    pub jurisdiction: String,
    pub service: String,
    pub document_control_numbers: Vec<String>,
    pub status: PaymentStatus,
    pub status_message: Option<String>,
}

impl Payment {
    /// A new `Pending` row for an envelope resolved to `case_id`.
    pub fn new(envelope: &Envelope, case_id: u64, is_exception_record: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            envelope_id: envelope.id.clone(),
            case_reference: case_id.to_string(),
            is_exception_record,
            po_box: envelope.po_box.clone(),
            jurisdiction: envelope.jurisdiction.clone(),
            service: envelope.container.clone(),
            document_control_numbers: envelope
                .payments
                .iter()
                .map(|p| p.document_control_number.clone())
                .collect(),
            status: PaymentStatus::Pending,
            status_message: None,
        }
    }
}

/// A recorded payment-update intent: moves payments from an exception
/// record onto the case it was promoted to.
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePayment {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub envelope_id: String,
    pub jurisdiction: String,
    pub exception_record_ref: String,
    pub new_case_ref: String,
    pub status: PaymentStatus,
    pub status_message: Option<String>,
}

impl UpdatePayment {
    pub fn new(
        envelope_id: &str,
        jurisdiction: &str,
        exception_record_ref: &str,
        new_case_ref: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            envelope_id: envelope_id.to_string(),
            jurisdiction: jurisdiction.to_string(),
            exception_record_ref: exception_record_ref.to_string(),
            new_case_ref: new_case_ref.to_string(),
            status: PaymentStatus::Pending,
            status_message: None,
        }
    }
}

/// Wire payload for the processor's create endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePaymentRequest {
    pub envelope_id: String,
    pub case_reference: String,
    pub is_exception_record: bool,
    pub po_box: String,
    pub jurisdiction: String,
    pub service: String,
    pub payments: Vec<PaymentInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInfo {
    pub document_control_number: String,
}

impl From<&Payment> for CreatePaymentRequest {
    fn from(payment: &Payment) -> Self {
        Self {
            envelope_id: payment.envelope_id.clone(),
            case_reference: payment.case_reference.clone(),
            is_exception_record: payment.is_exception_record,
            po_box: payment.po_box.clone(),
            jurisdiction: payment.jurisdiction.clone(),
            service: payment.service.clone(),
            payments: payment
                .document_control_numbers
                .iter()
                .map(|dcn| PaymentInfo {
                    document_control_number: dcn.clone(),
                })
                .collect(),
        }
    }
}

/// Wire payload for the processor's update endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdatePaymentRequest {
    pub envelope_id: String,
    pub jurisdiction: String,
    pub exception_record_ref: String,
    pub new_case_ref: String,
}

impl From<&UpdatePayment> for UpdatePaymentRequest {
    fn from(payment: &UpdatePayment) -> Self {
        Self {
            envelope_id: payment.envelope_id.clone(),
            jurisdiction: payment.jurisdiction.clone(),
            exception_record_ref: payment.exception_record_ref.clone(),
            new_case_ref: payment.new_case_ref.clone(),
        }
    }
}
