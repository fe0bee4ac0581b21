//! Idempotent exception-record creation.
//!
//! This is the safety net every handler falls back to. Its dedup-by-envelope
//! check is what makes message redelivery safe after a partially completed
//! delivery: the same envelope resolves to the same record.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cases::api::{CaseApi, CaseSubmission};
use crate::cases::auth::AuthProvider;
use crate::cases::mappers;
use crate::config::ServiceConfigProvider;
use crate::envelope::Envelope;
use crate::error::ExceptionRecordError;

const CASE_TYPE_SUFFIX: &str = "ExceptionRecord";
const EVENT_ID: &str = "create_exception";
const EVENT_SUMMARY: &str = "Create an exception record";

/// Creates exception records, deduplicated per originating envelope.
pub struct ExceptionRecordCreator {
    api: Arc<dyn CaseApi>,
    auth: Arc<dyn AuthProvider>,
    services: Arc<ServiceConfigProvider>,
}

impl ExceptionRecordCreator {
    pub fn new(
        api: Arc<dyn CaseApi>,
        auth: Arc<dyn AuthProvider>,
        services: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            api,
            auth,
            services,
        }
    }

    /// Create an exception record from the envelope, unless one already
    /// exists for it. Returns the id of the created or existing record.
    pub async fn try_create_from(&self, envelope: &Envelope) -> Result<u64, ExceptionRecordError> {
        let config = self.services.get(&envelope.container)?;

        if config.duplicate_prevention_enabled {
            info!(
                envelope_id = %envelope.id,
                "Checking for existing exception records for envelope"
            );
            let existing = self
                .api
                .exception_record_refs_by_envelope_id(&envelope.id, &envelope.container)
                .await?;

            if let Some(first) = existing.first() {
                warn!(
                    envelope_id = %envelope.id,
                    existing = ?existing,
                    "Creating of exception record aborted - exception records already exist for envelope"
                );
                return Ok(*first);
            }
        }

        self.create_exception_record(envelope).await
    }

    async fn create_exception_record(&self, envelope: &Envelope) -> Result<u64, ExceptionRecordError> {
        info!(envelope_id = %envelope.id, "Creating exception record for envelope");

        let credentials = self.auth.credentials_for(&envelope.jurisdiction).await?;
        let case_type_id = exception_record_case_type(&envelope.container);

        let start = self
            .api
            .start_mutation(
                &credentials,
                &envelope.jurisdiction,
                &case_type_id,
                None,
                EVENT_ID,
            )
            .await?;

        info!(
            envelope_id = %envelope.id,
            zip_file_name = %envelope.zip_file_name,
            "Started exception record mutation for envelope"
        );

        let record = self
            .api
            .submit(
                &credentials,
                &envelope.jurisdiction,
                &case_type_id,
                None,
                CaseSubmission {
                    event_token: start.token,
                    event_id: start.event_id,
                    summary: EVENT_SUMMARY.to_string(),
                    description: None,
                    data: mappers::exception_record_data(envelope),
                    ignore_warnings: false,
                },
            )
            .await?;

        info!(
            envelope_id = %envelope.id,
            zip_file_name = %envelope.zip_file_name,
            case_id = %record.id,
            case_type = %case_type_id,
            "Created exception record"
        );

        Ok(record.id)
    }
}

fn exception_record_case_type(service: &str) -> String {
    format!("{}_{CASE_TYPE_SUFFIX}", service.to_uppercase())
}
