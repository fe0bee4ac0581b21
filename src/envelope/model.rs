//! Envelope data model — one unit of scanned-document work from the queue.
//!
//! Constructed once per dequeued message, read-only thereafter, discarded
//! after the message is finalized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drives which handler processes an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    NewApplication,
    Exception,
    SupplementaryEvidence,
    SupplementaryEvidenceWithOcr,
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Classification::NewApplication => "new_application",
            Classification::Exception => "exception",
            Classification::SupplementaryEvidence => "supplementary_evidence",
            Classification::SupplementaryEvidenceWithOcr => "supplementary_evidence_with_ocr",
        };
        f.write_str(name)
    }
}

/// One unit of scanned-document work arriving on the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    #[serde(default)]
    pub case_ref: Option<String>,
    #[serde(default, rename = "previous_service_case_ref")]
    pub legacy_case_ref: Option<String>,
    pub po_box: String,
    pub jurisdiction: String,
    /// Originating service.
    pub container: String,
    pub zip_file_name: String,
    #[serde(default)]
    pub form_type: Option<String>,
    pub delivery_date: DateTime<Utc>,
    pub opening_date: DateTime<Utc>,
    pub classification: Classification,
    pub documents: Vec<Document>,
    #[serde(default)]
    pub payments: Vec<PaymentReference>,
    #[serde(default)]
    pub ocr_data: Vec<OcrField>,
    pub ocr_data_validation_warnings: Vec<String>,
}

impl Envelope {
    /// The case reference to report in logs when none was supplied.
    pub fn case_ref_for_logging(&self) -> &str {
        self.case_ref.as_deref().unwrap_or("(NOT PRESENT)")
    }
}

/// A single scanned document within an envelope.
///
/// The control number (DCN) is unique within one envelope and is the join
/// key for cross-envelope duplicate detection against an existing case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub file_name: String,
    pub control_number: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub scanned_at: DateTime<Utc>,
    /// Opaque storage reference.
    pub uuid: String,
    #[serde(default)]
    pub delivery_date: Option<DateTime<Utc>>,
}

/// A payment slip scanned with the envelope, referenced by document
/// control number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReference {
    pub document_control_number: String,
}

/// One OCR-extracted key/value field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrField {
    #[serde(rename = "metadata_field_name")]
    pub name: String,
    #[serde(rename = "metadata_field_value")]
    pub value: String,
}
