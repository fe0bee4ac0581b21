//! Case lookup by envelope references.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cases::api::{CaseApi, CaseRecord};
use crate::envelope::Envelope;
use crate::error::CaseApiError;

/// Finds the case an envelope refers to, trying the service case reference
/// first and falling back to the legacy (pre-migration) reference.
pub struct CaseFinder {
    api: Arc<dyn CaseApi>,
}

impl CaseFinder {
    pub fn new(api: Arc<dyn CaseApi>) -> Self {
        Self { api }
    }

    pub async fn find_case(&self, envelope: &Envelope) -> Result<Option<CaseRecord>, CaseApiError> {
        if let Some(case_ref) = envelope.case_ref.as_deref().filter(|r| is_valid_case_ref(r)) {
            if let Some(found) = self.get_case_by_id(case_ref, &envelope.jurisdiction).await? {
                return Ok(Some(found));
            }
        }

        match envelope.legacy_case_ref.as_deref() {
            Some(legacy_ref) if !legacy_ref.is_empty() => {
                self.get_case_by_legacy_id(legacy_ref, envelope).await
            }
            _ => Ok(None),
        }
    }

    async fn get_case_by_id(
        &self,
        case_ref: &str,
        jurisdiction: &str,
    ) -> Result<Option<CaseRecord>, CaseApiError> {
        match self.api.get_case(case_ref, jurisdiction).await {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                info!(case_ref = %case_ref, "Case wasn't found by its id");
                Ok(None)
            }
            Err(CaseApiError::NotFound(_)) => {
                info!(case_ref = %case_ref, "Case wasn't found by its id");
                Ok(None)
            }
            Err(CaseApiError::InvalidCaseId(message)) => {
                warn!(case_ref = %case_ref, %message, "Case id rejected as invalid");
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    async fn get_case_by_legacy_id(
        &self,
        legacy_ref: &str,
        envelope: &Envelope,
    ) -> Result<Option<CaseRecord>, CaseApiError> {
        let case_refs = self
            .api
            .case_refs_by_legacy_id(legacy_ref, &envelope.container)
            .await?;

        match case_refs.as_slice() {
            [case_ref] => {
                let found = self
                    .get_case_by_id(&case_ref.to_string(), &envelope.jurisdiction)
                    .await?;
                match &found {
                    Some(_) => info!(
                        legacy_ref = %legacy_ref,
                        case_ref = %case_ref,
                        envelope_id = %envelope.id,
                        "Found case by legacy reference"
                    ),
                    None => error!(
                        legacy_ref = %legacy_ref,
                        case_ref = %case_ref,
                        envelope_id = %envelope.id,
                        "Case was found by legacy reference, but a subsequent read couldn't find it"
                    ),
                }
                Ok(found)
            }
            [] => {
                info!(
                    legacy_ref = %legacy_ref,
                    envelope_id = %envelope.id,
                    "Case not found by legacy reference"
                );
                Ok(None)
            }
            many => {
                warn!(
                    legacy_ref = %legacy_ref,
                    envelope_id = %envelope.id,
                    matches = many.len(),
                    "Multiple cases found for legacy reference"
                );
                Ok(None)
            }
        }
    }
}

/// A case reference is searchable only when non-empty and numeric.
fn is_valid_case_ref(case_ref: &str) -> bool {
    !case_ref.is_empty() && case_ref.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCaseApi, envelope_with};
    use crate::envelope::Classification;

    fn finder(api: &Arc<FakeCaseApi>) -> CaseFinder {
        CaseFinder::new(Arc::clone(api) as Arc<dyn CaseApi>)
    }

    #[tokio::test]
    async fn finds_case_by_numeric_reference() {
        let api = Arc::new(FakeCaseApi::default());
        api.put_case(1001, "MAILSCAN_Service");

        let envelope = envelope_with(Classification::SupplementaryEvidence, Some("1001"), None);
        let found = finder(&api).find_case(&envelope).await.unwrap();
        assert_eq!(found.unwrap().id, 1001);
    }

    #[tokio::test]
    async fn non_numeric_reference_skips_straight_to_legacy_search() {
        let api = Arc::new(FakeCaseApi::default());
        api.put_case(2002, "MAILSCAN_Service");
        api.set_legacy_refs("legacy-9", vec![2002]);

        let envelope = envelope_with(
            Classification::SupplementaryEvidence,
            Some("not-numeric"),
            Some("legacy-9"),
        );
        let found = finder(&api).find_case(&envelope).await.unwrap();
        assert_eq!(found.unwrap().id, 2002);
        assert_eq!(api.get_case_calls(), 1);
    }

    #[tokio::test]
    async fn ambiguous_legacy_match_resolves_to_not_found() {
        let api = Arc::new(FakeCaseApi::default());
        api.set_legacy_refs("legacy-9", vec![1, 2]);

        let envelope =
            envelope_with(Classification::SupplementaryEvidence, None, Some("legacy-9"));
        let found = finder(&api).find_case(&envelope).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn no_references_means_no_case() {
        let api = Arc::new(FakeCaseApi::default());
        let envelope = envelope_with(Classification::SupplementaryEvidence, None, None);
        assert!(finder(&api).find_case(&envelope).await.unwrap().is_none());
    }
}
