//! Case-management API boundary.
//!
//! The case-management system is the external system of record. Mutations
//! follow a two-phase protocol: `start_mutation` opens a transaction scoped
//! to a case type (and optionally an existing case) and returns an opaque
//! token; `submit` finalizes it. Concurrent mutations of the same case are
//! rejected by the system's own conflict detection and surface as
//! [`CaseApiError::Conflict`](crate::error::CaseApiError::Conflict).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cases::auth::Credentials;
use crate::error::CaseApiError;

/// A case as returned by the case-management system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: u64,
    pub case_type_id: String,
    pub jurisdiction: String,
    #[serde(default)]
    pub state: Option<String>,
    /// Case-shaped data. Shape varies per case type; typed accessors below
    /// cover the slices this pipeline reads.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl CaseRecord {
    /// The scanned documents currently held on the case. Entries that fail
    /// to deserialize are skipped rather than failing the whole read.
    pub fn scanned_documents(&self) -> Vec<CaseDocument> {
        self.data
            .get("scanned_documents")
            .and_then(|v| v.as_array())
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| serde_json::from_value(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A scanned document as stored on a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDocument {
    #[serde(default)]
    pub file_name: Option<String>,
    pub control_number: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub scanned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: Option<String>,
    /// Back-reference to the envelope or exception record the document
    /// arrived from. The duplicate guard partitions on this field.
    #[serde(default)]
    pub source_ref: Option<String>,
}

/// Result of starting a case mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationStart {
    /// Opaque transaction token, echoed back on submit.
    pub token: String,
    pub event_id: String,
    /// For mutations of an existing case: the case as seen under the
    /// mutation lock. Attach flows must read documents from here, not from
    /// an earlier lookup.
    #[serde(default)]
    pub case_record: Option<CaseRecord>,
}

/// The payload finalizing a started mutation.
#[derive(Debug, Clone, Serialize)]
pub struct CaseSubmission {
    pub event_token: String,
    pub event_id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data: serde_json::Value,
    pub ignore_warnings: bool,
}

/// Client for the case-management system.
#[async_trait]
pub trait CaseApi: Send + Sync {
    /// Start a case mutation scoped to `case_type_id`, against an existing
    /// case when `case_id` is given.
    async fn start_mutation(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_id: Option<u64>,
        event_id: &str,
    ) -> Result<MutationStart, CaseApiError>;

    /// Submit a started mutation, returning the resulting case.
    async fn submit(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_id: Option<u64>,
        submission: CaseSubmission,
    ) -> Result<CaseRecord, CaseApiError>;

    /// Read a case by id. `Ok(None)` when the case does not exist.
    async fn get_case(
        &self,
        case_id: &str,
        jurisdiction: &str,
    ) -> Result<Option<CaseRecord>, CaseApiError>;

    /// Ids of service cases already linked to the given envelope.
    async fn case_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError>;

    /// Ids of cases matching a legacy (pre-migration) case reference.
    async fn case_refs_by_legacy_id(
        &self,
        legacy_case_ref: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError>;

    /// Ids of exception records already created for the given envelope.
    async fn exception_record_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError>;
}
