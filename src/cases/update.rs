//! Automatic case update for OCR supplementary-evidence envelopes.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cases::api::{CaseApi, CaseSubmission};
use crate::cases::auth::AuthProvider;
use crate::cases::finder::CaseFinder;
use crate::cases::mappers;
use crate::envelope::Envelope;
use crate::error::TransformationError;
use crate::transform::CaseUpdateClient;

const EVENT_ID: &str = "attach_scanned_docs_with_ocr";

/// Outcome of an auto-update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoCaseUpdateResult {
    Updated { case_id: u64 },
    /// Updating is not possible for this envelope (no target case, or the
    /// update service rejected the data). Retrying won't change that.
    Abandoned,
    /// A transient failure; eligible for the retry-then-fallback policy.
    Failed,
}

/// Updates the case an envelope refers to with OCR-derived data.
pub struct AutoCaseUpdater {
    api: Arc<dyn CaseApi>,
    auth: Arc<dyn AuthProvider>,
    finder: Arc<CaseFinder>,
    update_client: Arc<dyn CaseUpdateClient>,
}

impl AutoCaseUpdater {
    pub fn new(
        api: Arc<dyn CaseApi>,
        auth: Arc<dyn AuthProvider>,
        finder: Arc<CaseFinder>,
        update_client: Arc<dyn CaseUpdateClient>,
    ) -> Self {
        Self {
            api,
            auth,
            finder,
            update_client,
        }
    }

    pub async fn update_case(&self, envelope: &Envelope) -> AutoCaseUpdateResult {
        let existing_case = match self.finder.find_case(envelope).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(
                    envelope_id = %envelope.id,
                    case_ref = %envelope.case_ref_for_logging(),
                    "No case found for envelope. Auto case update abandoned"
                );
                return AutoCaseUpdateResult::Abandoned;
            }
            Err(e) => {
                error!(envelope_id = %envelope.id, error = %e, "Case lookup failed");
                return AutoCaseUpdateResult::Failed;
            }
        };

        let update = match self
            .update_client
            .case_update_data(&envelope.container, &existing_case, envelope)
            .await
        {
            Ok(details) => details,
            Err(TransformationError::Unprocessable(message)) => {
                warn!(
                    envelope_id = %envelope.id,
                    case_id = %existing_case.id,
                    %message,
                    "Update service rejected the envelope data. Auto case update abandoned"
                );
                return AutoCaseUpdateResult::Abandoned;
            }
            Err(TransformationError::Transport(message)) => {
                error!(
                    envelope_id = %envelope.id,
                    case_id = %existing_case.id,
                    %message,
                    "Update service call failed"
                );
                return AutoCaseUpdateResult::Failed;
            }
        };

        let data = mappers::with_envelope_reference(update.case_data, &envelope.id, "update");

        let submitted = async {
            let credentials = self.auth.credentials_for(&envelope.jurisdiction).await?;
            let start = self
                .api
                .start_mutation(
                    &credentials,
                    &envelope.jurisdiction,
                    &existing_case.case_type_id,
                    Some(existing_case.id),
                    EVENT_ID,
                )
                .await?;
            self.api
                .submit(
                    &credentials,
                    &envelope.jurisdiction,
                    &existing_case.case_type_id,
                    Some(existing_case.id),
                    CaseSubmission {
                        event_token: start.token,
                        event_id: start.event_id,
                        summary: "Case automatically updated with envelope".to_string(),
                        description: Some(format!("Case update with envelope {}", envelope.id)),
                        data,
                        // Update data already passed the update service's
                        // own validation.
                        ignore_warnings: true,
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
                    "Auto updated case with envelope"
                );
                AutoCaseUpdateResult::Updated { case_id: record.id }
            }
            Err(e) => {
                error!(
                    envelope_id = %envelope.id,
                    case_id = %existing_case.id,
                    error = %e,
                    "Failed to update case with envelope"
                );
                AutoCaseUpdateResult::Failed
            }
        }
    }
}
