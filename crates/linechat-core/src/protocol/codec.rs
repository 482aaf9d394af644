//! JSON codec for linechat records.
//!
//! Wire format: one compact JSON object per line.
//! ```text
//! {"opCode":1,"data":"{\"Name\":\"alice\",\"Desc\":\"hi\"}"}\n
//! ```
//! `serde_json` escapes control characters inside strings, so an encoded
//! record never contains a raw newline and `\n` is a safe delimiter.  The
//! delimiter itself is added by the transport, not by this module.
//!
//! Decoding never panics.  Every failure is a [`ProtocolError`], and every
//! `ProtocolError` maps onto the [`ErrorCode`] the server answers with.

use thiserror::Error;

use crate::protocol::messages::{ErrorCode, Message, OpCode, Request, Response};

/// Errors that can occur during record encoding or decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The text is not valid JSON or does not match the expected shape.
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope parsed but carries no operation.
    #[error("request carries no operation code")]
    FieldMissing,

    /// An operation that requires a payload arrived without one.
    #[error("request payload is empty")]
    MissingPayload,
}

impl ProtocolError {
    /// The error code a peer should be answered with for this failure.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::Malformed(_) => ErrorCode::BadPacket,
            ProtocolError::FieldMissing => ErrorCode::FieldMissing,
            ProtocolError::MissingPayload => ErrorCode::NullReference,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Request`] into one unterminated record.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use linechat_core::protocol::{decode_request, encode_request, Message, Request};
///
/// let request = Request::send_message(&Message::new("alice", "hi")).unwrap();
/// let line = encode_request(&request).unwrap();
/// assert_eq!(decode_request(&line).unwrap(), request);
/// ```
pub fn encode_request(request: &Request) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(request)?)
}

/// Encodes a [`Response`] into one unterminated record.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
pub fn encode_response(response: &Response) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(response)?)
}

/// Encodes a [`Message`] into the string carried in an envelope's `data` field.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if serialization fails.
pub fn encode_message(message: &Message) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decodes one record as a [`Request`].
///
/// # Errors
///
/// - [`ProtocolError::Malformed`] if the record is not a JSON request object.
/// - [`ProtocolError::FieldMissing`] if `opCode` is `0` or absent.
pub fn decode_request(record: &str) -> Result<Request, ProtocolError> {
    let request: Request = serde_json::from_str(record)?;
    if request.op_code == OpCode::None {
        return Err(ProtocolError::FieldMissing);
    }
    Ok(request)
}

/// Decodes one record as a [`Response`].
///
/// Error responses legitimately carry [`OpCode::None`], so only the JSON shape
/// is validated here.
///
/// # Errors
///
/// Returns [`ProtocolError::Malformed`] if the record is not a JSON response object.
pub fn decode_response(record: &str) -> Result<Response, ProtocolError> {
    Ok(serde_json::from_str(record)?)
}

/// Decodes an envelope payload as a [`Message`].
///
/// # Errors
///
/// - [`ProtocolError::MissingPayload`] if `data` is empty.
/// - [`ProtocolError::Malformed`] if `data` is not a JSON message object.
pub fn decode_message(data: &str) -> Result<Message, ProtocolError> {
    if data.trim().is_empty() {
        return Err(ProtocolError::MissingPayload);
    }
    Ok(serde_json::from_str(data)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
