use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use secrecy::SecretString;
use tower_http::cors::CorsLayer;

use scanflow::cases::api::CaseApi;
use scanflow::cases::attach::SupplementaryEvidenceAttacher;
use scanflow::cases::auth::{AuthProvider, Credentials, StaticAuthProvider};
use scanflow::cases::creation::AutoCaseCreator;
use scanflow::cases::exception_record::ExceptionRecordCreator;
use scanflow::cases::finder::CaseFinder;
use scanflow::cases::http_api::HttpCaseApi;
use scanflow::cases::update::AutoCaseUpdater;
use scanflow::config::{AppConfig, ServiceConfigProvider};
use scanflow::handlers::{
    EnvelopeRouter, ExceptionHandler, NewApplicationHandler, SupplementaryEvidenceHandler,
    SupplementaryEvidenceWithOcrHandler,
};
use scanflow::payments::client::{HttpPaymentProcessorClient, PaymentProcessorClient};
use scanflow::payments::libsql_store::LibSqlPaymentStore;
use scanflow::payments::routes::payment_routes;
use scanflow::payments::service::PaymentsService;
use scanflow::payments::store::PaymentStore;
use scanflow::queue::local::{LocalQueue, spawn_envelope_consumer};
use scanflow::queue::notifier::{EnvelopeNotifier, NoopNotifier};
use scanflow::queue::processor::MessageProcessor;
use scanflow::queue::telemetry::Telemetry;
use scanflow::transform::{
    CaseUpdateClient, HttpCaseUpdateClient, HttpTransformationClient, TransformationClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    let services = Arc::new(
        ServiceConfigProvider::from_json_file(Path::new(&config.services_path)).unwrap_or_else(
            |e| {
                eprintln!("Error: failed to load service configuration: {e}");
                eprintln!("  set SCANFLOW_SERVICES_PATH to a JSON array of service configs");
                std::process::exit(1);
            },
        ),
    );

    eprintln!("scanflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Payments API: http://0.0.0.0:{}/payments", config.http_port);
    eprintln!("   Envelope ingress: http://0.0.0.0:{}/envelopes", config.http_port);
    eprintln!("   Database: {}", config.db_path);

    // ── Persistence ─────────────────────────────────────────────────
    let store: Arc<dyn PaymentStore> = Arc::new(
        LibSqlPaymentStore::new_local(Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: failed to open database at {}: {e}", config.db_path);
                std::process::exit(1);
            }),
    );

    // ── External collaborators ──────────────────────────────────────
    let http = reqwest::Client::new();
    let case_api: Arc<dyn CaseApi> =
        Arc::new(HttpCaseApi::new(http.clone(), config.case_api_url.clone()));
    let auth: Arc<dyn AuthProvider> =
        Arc::new(StaticAuthProvider::new(credentials_from_env(&services)));
    let transformer: Arc<dyn TransformationClient> = Arc::new(HttpTransformationClient::new(
        http.clone(),
        config.transform_api_url.clone(),
    ));
    let update_client: Arc<dyn CaseUpdateClient> = Arc::new(HttpCaseUpdateClient::new(
        http.clone(),
        config.transform_api_url.clone(),
    ));
    let payment_client: Arc<dyn PaymentProcessorClient> = Arc::new(
        HttpPaymentProcessorClient::new(http, config.payment_api_url.clone()),
    );

    // ── Pipeline ────────────────────────────────────────────────────
    let payments = Arc::new(PaymentsService::new(Arc::clone(&store), payment_client));
    let exception_record_creator = Arc::new(ExceptionRecordCreator::new(
        Arc::clone(&case_api),
        Arc::clone(&auth),
        Arc::clone(&services),
    ));
    let case_finder = Arc::new(CaseFinder::new(Arc::clone(&case_api)));
    let case_creator = Arc::new(AutoCaseCreator::new(
        Arc::clone(&case_api),
        Arc::clone(&auth),
        transformer,
        Arc::clone(&services),
    ));
    let case_updater = Arc::new(AutoCaseUpdater::new(
        Arc::clone(&case_api),
        Arc::clone(&auth),
        Arc::clone(&case_finder),
        update_client,
    ));
    let evidence_attacher = Arc::new(SupplementaryEvidenceAttacher::new(
        Arc::clone(&case_api),
        Arc::clone(&auth),
    ));

    let router = Arc::new(EnvelopeRouter::new(
        NewApplicationHandler::new(
            case_creator,
            Arc::clone(&payments),
            Arc::clone(&exception_record_creator),
        ),
        ExceptionHandler::new(
            Arc::clone(&exception_record_creator),
            Arc::clone(&payments),
        ),
        SupplementaryEvidenceHandler::new(
            case_finder,
            evidence_attacher,
            Arc::clone(&exception_record_creator),
            Arc::clone(&payments),
        ),
        SupplementaryEvidenceWithOcrHandler::new(
            exception_record_creator,
            Arc::clone(&payments),
            case_updater,
            Arc::clone(&services),
        ),
    ));

    let notifier: Arc<dyn EnvelopeNotifier> = Arc::new(NoopNotifier);
    let telemetry = Arc::new(Telemetry::default());
    let processor = Arc::new(MessageProcessor::new(
        router,
        notifier,
        config.max_delivery_count,
        Arc::clone(&telemetry),
    ));

    // ── Queue consumer ──────────────────────────────────────────────
    let queue = LocalQueue::new();
    let (_consumer_handle, shutdown) = spawn_envelope_consumer(
        queue.clone(),
        processor,
        Duration::from_millis(500),
    );

    // ── HTTP server: payments API + envelope ingress ────────────────
    let app = payment_routes(payments)
        .merge(
            axum::Router::new()
                .route("/envelopes", post(enqueue_envelope))
                .with_state(queue),
        )
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Error: HTTP server failed: {e}");
            std::process::exit(1);
        }
    });

    tokio::signal::ctrl_c().await?;
    shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
    eprintln!("Shutting down");
    Ok(())
}

/// Accept a raw envelope body and enqueue it for processing.
async fn enqueue_envelope(State(queue): State<LocalQueue>, body: axum::body::Bytes) -> StatusCode {
    queue.push(None, body.to_vec());
    StatusCode::ACCEPTED
}

/// One set of tokens from the environment, applied to every configured
/// jurisdiction. Real deployments swap in a per-jurisdiction provider.
fn credentials_from_env(services: &ServiceConfigProvider) -> HashMap<String, Credentials> {
    let service_token =
        std::env::var("SCANFLOW_SERVICE_TOKEN").unwrap_or_else(|_| "dev-service-token".to_string());
    let user_token =
        std::env::var("SCANFLOW_USER_TOKEN").unwrap_or_else(|_| "dev-user-token".to_string());
    let user_id = std::env::var("SCANFLOW_USER_ID").unwrap_or_else(|_| "dev-user".to_string());

    services
        .jurisdictions()
        .into_iter()
        .map(|jurisdiction| {
            (
                jurisdiction,
                Credentials {
                    service_token: SecretString::from(service_token.clone()),
                    user_token: SecretString::from(user_token.clone()),
                    user_id: user_id.clone(),
                },
            )
        })
        .collect()
}
