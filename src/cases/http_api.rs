//! HTTP implementation of the case-management boundary.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;

use crate::cases::api::{CaseApi, CaseRecord, CaseSubmission, MutationStart};
use crate::cases::auth::Credentials;
use crate::error::CaseApiError;

/// Thin JSON-over-HTTP adapter for the case-management system.
pub struct HttpCaseApi {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CaseRefs {
    case_ids: Vec<u64>,
}

impl HttpCaseApi {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        credentials: &Credentials,
    ) -> reqwest::RequestBuilder {
        request
            .bearer_auth(credentials.user_token.expose_secret())
            .header(
                "Service-Authorization",
                credentials.service_token.expose_secret(),
            )
            .header("User-Id", &credentials.user_id)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, CaseApiError> {
        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| CaseApiError::Transport(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(map_status(status, body))
        }
    }

    async fn search(&self, url: String) -> Result<Vec<u64>, CaseApiError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CaseApiError::Transport(e.to_string()))?;
        let refs: CaseRefs = Self::read_json(response).await?;
        Ok(refs.case_ids)
    }
}

fn map_status(status: reqwest::StatusCode, body: String) -> CaseApiError {
    use reqwest::StatusCode;
    match status {
        StatusCode::CONFLICT => CaseApiError::Conflict(body),
        StatusCode::NOT_FOUND => CaseApiError::NotFound(body),
        StatusCode::BAD_REQUEST => CaseApiError::BadRequest(body),
        StatusCode::UNPROCESSABLE_ENTITY => CaseApiError::Unprocessable(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CaseApiError::Auth {
            jurisdiction: String::new(),
            message: body,
        },
        other => CaseApiError::Transport(format!("{other}: {body}")),
    }
}

#[async_trait]
impl CaseApi for HttpCaseApi {
    async fn start_mutation(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_id: Option<u64>,
        event_id: &str,
    ) -> Result<MutationStart, CaseApiError> {
        let url = match case_id {
            Some(id) => format!(
                "{}/jurisdictions/{jurisdiction}/case-types/{case_type_id}/cases/{id}/mutations",
                self.base_url
            ),
            None => format!(
                "{}/jurisdictions/{jurisdiction}/case-types/{case_type_id}/mutations",
                self.base_url
            ),
        };
        let response = self
            .authorized(self.http.post(url), credentials)
            .json(&json!({ "event_id": event_id }))
            .send()
            .await
            .map_err(|e| CaseApiError::Transport(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn submit(
        &self,
        credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_id: Option<u64>,
        submission: CaseSubmission,
    ) -> Result<CaseRecord, CaseApiError> {
        let url = match case_id {
            Some(id) => format!(
                "{}/jurisdictions/{jurisdiction}/case-types/{case_type_id}/cases/{id}/submissions",
                self.base_url
            ),
            None => format!(
                "{}/jurisdictions/{jurisdiction}/case-types/{case_type_id}/submissions",
                self.base_url
            ),
        };
        let response = self
            .authorized(self.http.post(url), credentials)
            .json(&submission)
            .send()
            .await
            .map_err(|e| CaseApiError::Transport(e.to_string()))?;
        Self::read_json(response).await
    }

    async fn get_case(
        &self,
        case_id: &str,
        jurisdiction: &str,
    ) -> Result<Option<CaseRecord>, CaseApiError> {
        let response = self
            .http
            .get(format!(
                "{}/cases/{case_id}?jurisdiction={jurisdiction}",
                self.base_url
            ))
            .send()
            .await
            .map_err(|e| CaseApiError::Transport(e.to_string()))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            reqwest::StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                Err(CaseApiError::InvalidCaseId(body))
            }
            _ => Self::read_json(response).await.map(Some),
        }
    }

    async fn case_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        self.search(format!(
            "{}/case-refs?service={service}&envelope_id={envelope_id}",
            self.base_url
        ))
        .await
    }

    async fn case_refs_by_legacy_id(
        &self,
        legacy_case_ref: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        self.search(format!(
            "{}/case-refs?service={service}&legacy_case_ref={legacy_case_ref}",
            self.base_url
        ))
        .await
    }

    async fn exception_record_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        self.search(format!(
            "{}/exception-record-refs?service={service}&envelope_id={envelope_id}",
            self.base_url
        ))
        .await
    }
}
