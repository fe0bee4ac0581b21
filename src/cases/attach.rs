//! Attaching envelope documents to an existing case.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cases::api::{CaseApi, CaseRecord, CaseSubmission};
use crate::cases::auth::AuthProvider;
use crate::cases::{documents, mappers};
use crate::envelope::Envelope;
use crate::error::AttachError;

const EVENT_ID: &str = "attach_scanned_docs";
const EVENT_SUMMARY: &str = "Attach scanned documents";

/// Appends an envelope's documents to an existing case, guarded against
/// duplicates so redelivery of an already-processed attach is a no-op.
pub struct SupplementaryEvidenceAttacher {
    api: Arc<dyn CaseApi>,
    auth: Arc<dyn AuthProvider>,
}

impl SupplementaryEvidenceAttacher {
    pub fn new(api: Arc<dyn CaseApi>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { api, auth }
    }

    pub async fn attach(
        &self,
        envelope: &Envelope,
        existing_case: &CaseRecord,
    ) -> Result<(), AttachError> {
        let case_ref = existing_case.id.to_string();

        // Guard first: a control number held by another source is a clash,
        // never a silent skip. Only same-source duplicates may be dropped.
        let known_documents = existing_case.scanned_documents();
        documents::verify_no_duplicates(
            &known_documents,
            &envelope.documents,
            &envelope.id,
            &case_ref,
        )?;

        if documents::documents_to_add(&envelope.documents, &known_documents).is_empty() {
            warn!(
                envelope_id = %envelope.id,
                zip_file_name = %envelope.zip_file_name,
                case = %case_ref,
                "Envelope has no new documents. Case not updated"
            );
            return Ok(());
        }

        info!(
            envelope_id = %envelope.id,
            zip_file_name = %envelope.zip_file_name,
            case = %case_ref,
            state = existing_case.state.as_deref().unwrap_or(""),
            "Attaching supplementary evidence"
        );

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

        // The document list must come from under the mutation lock; an
        // earlier lookup may be stale by now.
        let target_documents = start
            .case_record
            .as_ref()
            .map(CaseRecord::scanned_documents)
            .unwrap_or_else(|| existing_case.scanned_documents());

        let already_attached = documents::verify_no_duplicates(
            &target_documents,
            &envelope.documents,
            &envelope.id,
            &case_ref,
        )?;

        let to_add: Vec<_> = documents::documents_to_add(&envelope.documents, &target_documents)
            .into_iter()
            .map(|d| mappers::scanned_document(d, &envelope.id))
            .collect();

        if to_add.is_empty() {
            info!(
                envelope_id = %envelope.id,
                case = %case_ref,
                skipped = already_attached.len(),
                "All documents were already attached. Nothing to submit"
            );
            return Ok(());
        }

        let data = mappers::with_envelope_reference(
            mappers::supplementary_evidence_data(&target_documents, &to_add),
            &envelope.id,
            "update",
        );

        self.api
            .submit(
                &credentials,
                &envelope.jurisdiction,
                &existing_case.case_type_id,
                Some(existing_case.id),
                CaseSubmission {
                    event_token: start.token,
                    event_id: start.event_id,
                    summary: EVENT_SUMMARY.to_string(),
                    description: None,
                    data,
                    ignore_warnings: false,
                },
            )
            .await?;

        info!(
            envelope_id = %envelope.id,
            case = %case_ref,
            attached = to_add.len(),
            "Attached documents from envelope to case"
        );
        Ok(())
    }
}
