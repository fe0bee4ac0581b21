//! Envelope wire model and parsing.

pub mod model;
pub mod parser;

pub use model::{Classification, Document, Envelope, OcrField, PaymentReference};
pub use parser::parse;
