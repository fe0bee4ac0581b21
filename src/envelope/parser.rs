//! Envelope deserialization from a raw queue-message body.

use crate::envelope::Envelope;
use crate::error::ParseError;

/// Parse a raw message body into an [`Envelope`].
///
/// A failure here is unrecoverable — the message is dead-lettered, never
/// retried.
pub fn parse(body: &[u8]) -> Result<Envelope, ParseError> {
    let text = std::str::from_utf8(body)?;
    Ok(serde_json::from_str(text)?)
}
