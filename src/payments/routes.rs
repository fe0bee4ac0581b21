//! Operator-facing REST endpoints for failed payments.
//!
//! Operators observe failed payments here and trigger manual reprocessing;
//! there is no synchronous caller waiting on envelope processing itself.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::warn;
use uuid::Uuid;

use crate::error::PaymentsError;
use crate::payments::service::PaymentsService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<PaymentsService>,
}

/// Build the Axum router for the payments API.
pub fn payment_routes(payments: Arc<PaymentsService>) -> Router {
    let state = AppState { payments };

    Router::new()
        .route("/health", get(health))
        .route("/payments/new/failed", get(failed_new_payments))
        .route("/payments/update/failed", get(failed_update_payments))
        .route("/payments/new/{id}/reprocess", post(reprocess_new_payment))
        .route(
            "/payments/update/{id}/reprocess",
            post(reprocess_update_payment),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "scanflow"
    }))
}

async fn failed_new_payments(State(state): State<AppState>) -> impl IntoResponse {
    match state.payments.failed_new_payments().await {
        Ok(payments) => (StatusCode::OK, Json(serde_json::json!(payments))),
        Err(e) => internal_error(e.to_string()),
    }
}

async fn failed_update_payments(State(state): State<AppState>) -> impl IntoResponse {
    match state.payments.failed_update_payments().await {
        Ok(payments) => (StatusCode::OK, Json(serde_json::json!(payments))),
        Err(e) => internal_error(e.to_string()),
    }
}

async fn reprocess_new_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id(&id);
    };
    match state.payments.reprocess_new_payment(id).await {
        Ok(payment) => (StatusCode::OK, Json(serde_json::json!(payment))),
        Err(e) => payments_error(e),
    }
}

async fn reprocess_update_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = Uuid::parse_str(&id) else {
        return bad_id(&id);
    };
    match state.payments.reprocess_update_payment(id).await {
        Ok(payment) => (StatusCode::OK, Json(serde_json::json!(payment))),
        Err(e) => payments_error(e),
    }
}

fn bad_id(raw: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": format!("invalid payment id: {raw}") })),
    )
}

fn payments_error(e: PaymentsError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &e {
        PaymentsError::NotFound(_) => StatusCode::NOT_FOUND,
        PaymentsError::ReprocessFailed(_) => StatusCode::BAD_GATEWAY,
        PaymentsError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(error = %e, "Payments API request failed");
    (status, Json(serde_json::json!({ "error": e.to_string() })))
}

fn internal_error(message: String) -> (StatusCode, Json<serde_json::Value>) {
    warn!(error = %message, "Payments API request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
}
