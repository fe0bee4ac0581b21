//! Payment processor boundary and its HTTP implementation.

use async_trait::async_trait;
use tracing::info;

use crate::error::PaymentClientError;
use crate::payments::model::{CreatePaymentRequest, UpdatePaymentRequest};

/// Client for the external payment processor.
#[async_trait]
pub trait PaymentProcessorClient: Send + Sync {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<(), PaymentClientError>;

    async fn update_payment(
        &self,
        request: &UpdatePaymentRequest,
    ) -> Result<(), PaymentClientError>;
}

/// HTTP client posting create/update payloads to the processor.
pub struct HttpPaymentProcessorClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpPaymentProcessorClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn post<T: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), PaymentClientError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentClientError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(PaymentClientError::Response {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl PaymentProcessorClient for HttpPaymentProcessorClient {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<(), PaymentClientError> {
        info!(
            envelope_id = %request.envelope_id,
            "Posting payment to payment processor"
        );
        self.post("/create", request).await
    }

    async fn update_payment(
        &self,
        request: &UpdatePaymentRequest,
    ) -> Result<(), PaymentClientError> {
        info!(
            envelope_id = %request.envelope_id,
            "Posting update payment to payment processor"
        );
        self.post("/update", request).await
    }
}
