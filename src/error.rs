//! Error types for scanflow.

use crate::envelope::Classification;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Envelope parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Case API error: {0}")]
    CaseApi(#[from] CaseApiError),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Payments error: {0}")]
    Payments(#[from] PaymentsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Service not configured: {0}")]
    ServiceNotConfigured(String),

    #[error("Failed to load configuration: {0}")]
    Load(String),
}

/// Envelope deserialization errors. Always unrecoverable — a malformed
/// message stays malformed across redeliveries.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Envelope body is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

impl ParseError {
    /// Error variant name plus text, used as the dead-letter description.
    pub fn describe(&self) -> String {
        match self {
            ParseError::Json(e) => format!("Json: {e}"),
            ParseError::Encoding(e) => format!("Encoding: {e}"),
        }
    }
}

/// Errors surfaced by the case-management API boundary.
#[derive(Debug, thiserror::Error)]
pub enum CaseApiError {
    /// Optimistic-concurrency token mismatch on submit. Never retried
    /// internally; resolved by message redelivery.
    #[error("Concurrent case mutation conflict: {0}")]
    Conflict(String),

    #[error("Case not found: {0}")]
    NotFound(String),

    #[error("Invalid case id: {0}")]
    InvalidCaseId(String),

    #[error("Case API rejected the request: {0}")]
    BadRequest(String),

    #[error("Case API could not process the submitted data: {0}")]
    Unprocessable(String),

    #[error("Authentication failed for jurisdiction {jurisdiction}: {message}")]
    Auth {
        jurisdiction: String,
        message: String,
    },

    #[error("Case API transport failure: {0}")]
    Transport(String),
}

impl CaseApiError {
    /// Whether retrying the same call can never succeed.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            CaseApiError::BadRequest(_) | CaseApiError::Unprocessable(_)
        )
    }
}

/// Errors from the transformation / case-update data services.
#[derive(Debug, thiserror::Error)]
pub enum TransformationError {
    /// The service rejected the data as never-transformable.
    #[error("Envelope data cannot be transformed: {0}")]
    Unprocessable(String),

    #[error("Transformation service transport failure: {0}")]
    Transport(String),
}

/// Errors from attaching envelope documents to an existing case.
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error(
        "Documents with following control numbers are already present in the case \
         {target_case_ref} and cannot be added: {}", .control_numbers.join(", ")
    )]
    DuplicateDocs {
        target_case_ref: String,
        control_numbers: Vec<String>,
    },

    #[error("Case API error: {0}")]
    Api(#[from] CaseApiError),
}

/// Errors from the idempotent exception-record creation path.
#[derive(Debug, thiserror::Error)]
pub enum ExceptionRecordError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Case API error: {0}")]
    Api(#[from] CaseApiError),
}

/// Errors raised by classification handlers.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Programming-invariant violation: an envelope was routed to a handler
    /// for a different classification.
    #[error("Envelope classification has to be {expected}, but was {actual}")]
    ClassificationMismatch {
        expected: Classification,
        actual: Classification,
    },

    /// Case creation failed for a potentially recoverable reason and the
    /// retry budget is not yet exhausted.
    #[error("Case creation failed: {0}")]
    CaseCreation(String),

    /// Case update failed for a potentially recoverable reason and the
    /// retry budget is not yet exhausted.
    #[error("Case update failed: {0}")]
    CaseUpdate(String),

    #[error("Exception record creation failed: {0}")]
    ExceptionRecord(#[from] ExceptionRecordError),

    #[error("Case API error: {0}")]
    Api(#[from] CaseApiError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Payment reconciliation errors reported to callers.
#[derive(Debug, thiserror::Error)]
pub enum PaymentsError {
    #[error("Payment with id '{0}' not found")]
    NotFound(uuid::Uuid),

    /// A deliberate, synchronous retry failed; unlike the creation path
    /// this is reported to the caller.
    #[error("Payment reprocessing failed: {0}")]
    ReprocessFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the payment processor HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum PaymentClientError {
    #[error("Payment processor responded with status {status}: {body}")]
    Response { status: u16, body: String },

    #[error("Payment processor transport failure: {0}")]
    Transport(String),
}

/// Payment store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Downstream notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Failed to send processed-envelope notification: {0}")]
    Send(String),
}

/// Queue transport finalization errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Failed to finalize message: {0}")]
    Finalize(String),
}
