//! Integration tests for the payments REST API.
//!
//! Each test spins up an Axum server on a random port over an in-memory
//! payment store and a stub processor, and exercises the real HTTP
//! contract operators use.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::time::timeout;

use scanflow::envelope::{Classification, Envelope, PaymentReference};
use scanflow::error::PaymentClientError;
use scanflow::payments::client::PaymentProcessorClient;
use scanflow::payments::libsql_store::LibSqlPaymentStore;
use scanflow::payments::model::{CreatePaymentRequest, UpdatePaymentRequest};
use scanflow::payments::routes::payment_routes;
use scanflow::payments::service::PaymentsService;
use scanflow::payments::store::PaymentStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stub payment processor whose failure mode can be toggled per test.
#[derive(Default)]
struct StubProcessor {
    failing: AtomicBool,
}

impl StubProcessor {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PaymentClientError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(PaymentClientError::Response {
                status: 502,
                body: "processor unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentProcessorClient for StubProcessor {
    async fn create_payment(&self, _request: &CreatePaymentRequest) -> Result<(), PaymentClientError> {
        self.check()
    }

    async fn update_payment(&self, _request: &UpdatePaymentRequest) -> Result<(), PaymentClientError> {
        self.check()
    }
}

fn payment_envelope() -> Envelope {
    Envelope {
        id: "envelope-1".to_string(),
        case_ref: None,
        legacy_case_ref: None,
        po_box: "PO 12345".to_string(),
        jurisdiction: "MAILSCAN".to_string(),
        container: "mailscan".to_string(),
        zip_file_name: "envelope.zip".to_string(),
        form_type: None,
        delivery_date: Utc.with_ymd_and_hms(2024, 6, 24, 12, 0, 0).unwrap(),
        opening_date: Utc.with_ymd_and_hms(2024, 6, 24, 13, 0, 0).unwrap(),
        classification: Classification::Exception,
        documents: Vec::new(),
        payments: vec![PaymentReference {
            document_control_number: "9876543210".to_string(),
        }],
        ocr_data: Vec::new(),
        ocr_data_validation_warnings: Vec::new(),
    }
}

/// Start the payments API on a random port. Returns the port, the service
/// and the stub processor.
async fn start_server() -> (u16, Arc<PaymentsService>, Arc<StubProcessor>) {
    let store: Arc<dyn PaymentStore> = Arc::new(LibSqlPaymentStore::new_memory().await.unwrap());
    let processor = Arc::new(StubProcessor::default());
    let service = Arc::new(PaymentsService::new(
        store,
        Arc::clone(&processor) as Arc<dyn PaymentProcessorClient>,
    ));
    let app = payment_routes(Arc::clone(&service));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, service, processor)
}

#[tokio::test]
async fn health_endpoint_responds() {
    timeout(TEST_TIMEOUT, async {
        let (port, _service, _processor) = start_server().await;

        let response = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let json: Value = response.json().await.unwrap();
        assert_eq!(json["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn failed_payments_are_listed_and_reprocessable() {
    timeout(TEST_TIMEOUT, async {
        let (port, service, processor) = start_server().await;

        // Seed one failed payment through the real creation path.
        processor.set_failing(true);
        service
            .create_new_payment(&payment_envelope(), 42, true)
            .await
            .unwrap();

        let listed: Value = reqwest::get(format!("http://127.0.0.1:{port}/payments/new/failed"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let failed = listed.as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["status"], "failed");
        assert_eq!(failed[0]["case_reference"], "42");
        let id = failed[0]["id"].as_str().unwrap().to_string();

        // Processor recovers; reprocessing succeeds and clears the row.
        processor.set_failing(false);
        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://127.0.0.1:{port}/payments/new/{id}/reprocess"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let reprocessed: Value = response.json().await.unwrap();
        assert_eq!(reprocessed["status"], "complete");
        assert!(reprocessed["status_message"].is_null());

        let listed: Value = reqwest::get(format!("http://127.0.0.1:{port}/payments/new/failed"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(listed.as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reprocess_failure_returns_bad_gateway_and_keeps_the_row() {
    timeout(TEST_TIMEOUT, async {
        let (port, service, processor) = start_server().await;

        processor.set_failing(true);
        service
            .create_new_payment(&payment_envelope(), 42, false)
            .await
            .unwrap();
        let failed = service.failed_new_payments().await.unwrap();
        let id = failed[0].id;

        // Still failing: the reprocess is reported, the row stays failed.
        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://127.0.0.1:{port}/payments/new/{id}/reprocess"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 502);

        let still_failed = service.failed_new_payments().await.unwrap();
        assert_eq!(still_failed.len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_payment_id_is_not_found() {
    timeout(TEST_TIMEOUT, async {
        let (port, _service, _processor) = start_server().await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!(
                "http://127.0.0.1:{port}/payments/new/0e0f37a9-95cf-4f0b-8ce1-d04b21eb4b30/reprocess"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        let response = client
            .post(format!("http://127.0.0.1:{port}/payments/new/not-a-uuid/reprocess"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn update_payments_have_their_own_failed_list() {
    timeout(TEST_TIMEOUT, async {
        let (port, service, processor) = start_server().await;

        processor.set_failing(true);
        service
            .update_payment("envelope-1", "MAILSCAN", "100", "200")
            .await
            .unwrap();

        let listed: Value =
            reqwest::get(format!("http://127.0.0.1:{port}/payments/update/failed"))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
        let failed = listed.as_array().unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["exception_record_ref"], "100");
        assert_eq!(failed[0]["new_case_ref"], "200");
        let id = failed[0]["id"].as_str().unwrap().to_string();

        processor.set_failing(false);
        let client = reqwest::Client::new();
        let response = client
            .post(format!(
                "http://127.0.0.1:{port}/payments/update/{id}/reprocess"
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let reprocessed: Value = response.json().await.unwrap();
        assert_eq!(reprocessed["status"], "complete");
    })
    .await
    .expect("test timed out");
}
