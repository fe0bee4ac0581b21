//! Automatic case creation for new-application envelopes.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cases::api::{CaseApi, CaseSubmission};
use crate::cases::auth::AuthProvider;
use crate::cases::mappers;
use crate::config::ServiceConfigProvider;
use crate::envelope::Envelope;
use crate::error::{CaseApiError, TransformationError};
use crate::transform::TransformationClient;

/// Outcome of an auto-creation attempt, returned by value. The retry
/// policy branches on this in the handler; no exceptions-as-control-flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseCreationResult {
    Success { case_id: u64 },
    UnrecoverableFailure,
    PotentiallyRecoverableFailure,
}

/// Creates a service case from an envelope via the transformation service,
/// unless one already exists for the envelope.
pub struct AutoCaseCreator {
    api: Arc<dyn CaseApi>,
    auth: Arc<dyn AuthProvider>,
    transformer: Arc<dyn TransformationClient>,
    services: Arc<ServiceConfigProvider>,
}

impl AutoCaseCreator {
    pub fn new(
        api: Arc<dyn CaseApi>,
        auth: Arc<dyn AuthProvider>,
        transformer: Arc<dyn TransformationClient>,
        services: Arc<ServiceConfigProvider>,
    ) -> Self {
        Self {
            api,
            auth,
            transformer,
            services,
        }
    }

    pub async fn create_case(&self, envelope: &Envelope) -> CaseCreationResult {
        info!(
            envelope_id = %envelope.id,
            zip_file_name = %envelope.zip_file_name,
            service = %envelope.container,
            "Started attempt to auto create a new case from envelope"
        );

        let config = match self.services.get(&envelope.container) {
            Ok(config) => config,
            Err(e) => {
                error!(service = %envelope.container, error = %e, "Service lookup failed");
                return CaseCreationResult::PotentiallyRecoverableFailure;
            }
        };

        if !config.auto_case_creation_enabled {
            info!(
                envelope_id = %envelope.id,
                service = %envelope.container,
                "Automatic case creation is disabled for the service - skipping"
            );
            return CaseCreationResult::UnrecoverableFailure;
        }

        self.create_case_if_does_not_exist(envelope).await
    }

    async fn create_case_if_does_not_exist(&self, envelope: &Envelope) -> CaseCreationResult {
        let case_ids = match self
            .api
            .case_refs_by_envelope_id(&envelope.id, &envelope.container)
            .await
        {
            Ok(ids) => ids,
            Err(e) => {
                error!(envelope_id = %envelope.id, error = %e, "Existing-case lookup failed");
                return CaseCreationResult::PotentiallyRecoverableFailure;
            }
        };

        match case_ids.as_slice() {
            [] => self.transform_and_create_case(envelope).await,
            [case_id] => {
                warn!(
                    envelope_id = %envelope.id,
                    case_id = %case_id,
                    "Case already exists for envelope - skipping creation"
                );
                CaseCreationResult::Success { case_id: *case_id }
            }
            many => {
                error!(
                    envelope_id = %envelope.id,
                    case_ids = ?many,
                    "Multiple cases exist for envelope"
                );
                CaseCreationResult::UnrecoverableFailure
            }
        }
    }

    async fn transform_and_create_case(&self, envelope: &Envelope) -> CaseCreationResult {
        let details = match self.transformer.transform_envelope(envelope).await {
            Ok(details) => details,
            Err(TransformationError::Unprocessable(message)) => {
                warn!(
                    envelope_id = %envelope.id,
                    %message,
                    "Envelope cannot be transformed into case data"
                );
                return CaseCreationResult::UnrecoverableFailure;
            }
            Err(TransformationError::Transport(message)) => {
                warn!(
                    envelope_id = %envelope.id,
                    %message,
                    "Transformation service call failed"
                );
                return CaseCreationResult::PotentiallyRecoverableFailure;
            }
        };

        let data = mappers::with_envelope_reference(details.case_data, &envelope.id, "create");

        let submitted = async {
            let credentials = self.auth.credentials_for(&envelope.jurisdiction).await?;
            let start = self
                .api
                .start_mutation(
                    &credentials,
                    &envelope.jurisdiction,
                    &details.case_type_id,
                    None,
                    &details.event_id,
                )
                .await?;
            self.api
                .submit(
                    &credentials,
                    &envelope.jurisdiction,
                    &details.case_type_id,
                    None,
                    CaseSubmission {
                        event_token: start.token,
                        event_id: start.event_id,
                        summary: "Case created".to_string(),
                        description: Some(format!("Case created from envelope {}", envelope.id)),
                        data,
                        ignore_warnings: false,
                    },
                )
                .await
        }
        .await;

        match submitted {
            Ok(record) => {
                info!(
                    envelope_id = %envelope.id,
                    case_id = %record.id,
                    "Auto created a case from envelope"
                );
                CaseCreationResult::Success { case_id: record.id }
            }
            Err(e) if e.is_unrecoverable() => {
                error!(
                    envelope_id = %envelope.id,
                    error = %e,
                    "Case creation request was rejected"
                );
                CaseCreationResult::UnrecoverableFailure
            }
            Err(e) => {
                error!(
                    envelope_id = %envelope.id,
                    error = %e,
                    "An error occurred when trying to auto create a case from envelope"
                );
                CaseCreationResult::PotentiallyRecoverableFailure
            }
        }
    }
}
