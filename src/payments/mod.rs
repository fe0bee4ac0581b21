//! Payment reconciliation: records payment intents, calls the payment
//! processor, and tracks success/failure independently of the envelope
//! that created them.

pub mod client;
pub mod libsql_store;
pub mod model;
pub mod routes;
pub mod service;
pub mod store;

pub use client::{HttpPaymentProcessorClient, PaymentProcessorClient};
pub use libsql_store::LibSqlPaymentStore;
pub use model::{CreatePaymentRequest, Payment, PaymentStatus, UpdatePayment, UpdatePaymentRequest};
pub use service::PaymentsService;
pub use store::PaymentStore;
