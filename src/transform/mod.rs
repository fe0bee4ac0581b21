//! Transformation / case-update data boundary.
//!
//! These services turn raw scanned data into case-shaped data. A rejection
//! ([`TransformationError::Unprocessable`](crate::error::TransformationError::Unprocessable))
//! means the data can never transform; anything else is transient.

pub mod http;

use async_trait::async_trait;

use crate::cases::api::CaseRecord;
use crate::envelope::Envelope;
use crate::error::TransformationError;

pub use http::{HttpCaseUpdateClient, HttpTransformationClient};

/// What the transformation service returns for a new case.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CaseCreationDetails {
    pub case_type_id: String,
    pub event_id: String,
    pub case_data: serde_json::Value,
}

/// What the update service returns for an existing case.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CaseUpdateDetails {
    pub case_data: serde_json::Value,
}

/// Turns an envelope into the data for a brand-new case.
#[async_trait]
pub trait TransformationClient: Send + Sync {
    async fn transform_envelope(
        &self,
        envelope: &Envelope,
    ) -> Result<CaseCreationDetails, TransformationError>;
}

/// Merges an envelope's OCR data into an existing case's data.
#[async_trait]
pub trait CaseUpdateClient: Send + Sync {
    async fn case_update_data(
        &self,
        service: &str,
        existing_case: &CaseRecord,
        envelope: &Envelope,
    ) -> Result<CaseUpdateDetails, TransformationError>;
}
