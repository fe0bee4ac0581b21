//! HTTP implementations of the transformation / case-update boundaries.

use async_trait::async_trait;
use serde_json::json;

use crate::cases::api::CaseRecord;
use crate::envelope::Envelope;
use crate::error::TransformationError;
use crate::transform::{CaseCreationDetails, CaseUpdateClient, CaseUpdateDetails, TransformationClient};

/// Client for a service's transformation endpoint.
pub struct HttpTransformationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransformationClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TransformationClient for HttpTransformationClient {
    async fn transform_envelope(
        &self,
        envelope: &Envelope,
    ) -> Result<CaseCreationDetails, TransformationError> {
        let response = self
            .http
            .post(format!("{}/transform-envelope", self.base_url))
            .json(envelope)
            .send()
            .await
            .map_err(|e| TransformationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| TransformationError::Transport(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
                || status == reqwest::StatusCode::BAD_REQUEST
            {
                Err(TransformationError::Unprocessable(body))
            } else {
                Err(TransformationError::Transport(format!("{status}: {body}")))
            }
        }
    }
}

/// Client for a service's case-update endpoint.
pub struct HttpCaseUpdateClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCaseUpdateClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CaseUpdateClient for HttpCaseUpdateClient {
    async fn case_update_data(
        &self,
        service: &str,
        existing_case: &CaseRecord,
        envelope: &Envelope,
    ) -> Result<CaseUpdateDetails, TransformationError> {
        let response = self
            .http
            .post(format!("{}/case-update", self.base_url))
            .json(&json!({
                "service": service,
                "existing_case": existing_case,
                "envelope": envelope,
            }))
            .send()
            .await
            .map_err(|e| TransformationError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| TransformationError::Transport(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
                || status == reqwest::StatusCode::BAD_REQUEST
            {
                Err(TransformationError::Unprocessable(body))
            } else {
                Err(TransformationError::Transport(format!("{status}: {body}")))
            }
        }
    }
}
