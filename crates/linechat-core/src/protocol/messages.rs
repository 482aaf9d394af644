//! All linechat protocol types.
//!
//! Two envelopes travel over the wire, one JSON object per line:
//!
//! ```text
//! client → server   {"opCode":1,"data":"<json Message>"}
//! server → client   {"opCode":1,"errorCode":100,"data":"<json Message>"}
//! ```
//!
//! The chat [`Message`] is serialized to a JSON string first and then embedded
//! as the envelope's `data` field, so the envelope never needs to know the
//! payload schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::codec::{encode_message, ProtocolError};

/// Sender name used for status lines synthesized by the client.
pub const CLIENT_LOG_SENDER: &str = "Log";

/// Sender name used for status lines synthesized by the server.
pub const SERVER_LOG_SENDER: &str = "Server Log";

/// A numeric code on the wire did not match any known variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownCode {
    pub kind: &'static str,
    pub value: u16,
}

// ── Operation codes ───────────────────────────────────────────────────────────

/// Operation requested by a client, echoed back in the matching response.
///
/// Encoded on the wire as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum OpCode {
    /// No operation.  A request carrying this code is answered with
    /// [`ErrorCode::FieldMissing`].
    #[default]
    None = 0,
    SendMessage = 1,
}

impl TryFrom<u8> for OpCode {
    type Error = UnknownCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OpCode::None),
            1 => Ok(OpCode::SendMessage),
            _ => Err(UnknownCode {
                kind: "opCode",
                value: u16::from(value),
            }),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}

// ── Error codes ───────────────────────────────────────────────────────────────

/// Outcome attached to every [`Response`].
///
/// The numeric ranges group related failures: `1xx` success, `2xx` malformed
/// input, `3xx` missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    #[default]
    None = 0,
    Ok = 100,
    BadPacket = 201,
    FieldMissing = 202,
    NullReference = 301,
}

impl TryFrom<u16> for ErrorCode {
    type Error = UnknownCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::None),
            100 => Ok(ErrorCode::Ok),
            201 => Ok(ErrorCode::BadPacket),
            202 => Ok(ErrorCode::FieldMissing),
            301 => Ok(ErrorCode::NullReference),
            _ => Err(UnknownCode {
                kind: "errorCode",
                value,
            }),
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

// ── Envelopes ─────────────────────────────────────────────────────────────────

/// Client-originated envelope.  One per user action.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Request {
    /// Absent on the wire decodes to [`OpCode::None`].
    #[serde(rename = "opCode", default)]
    pub op_code: OpCode,
    /// JSON-encoded payload; empty when the operation carries none.
    #[serde(default)]
    pub data: String,
}

impl Request {
    /// Builds a `SendMessage` request carrying `message` as its payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the message cannot be serialized.
    pub fn send_message(message: &Message) -> Result<Self, ProtocolError> {
        Ok(Self {
            op_code: OpCode::SendMessage,
            data: encode_message(message)?,
        })
    }
}

/// Server-originated envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "opCode", default)]
    pub op_code: OpCode,
    #[serde(rename = "errorCode", default)]
    pub error_code: ErrorCode,
    #[serde(default)]
    pub data: String,
}

impl Response {
    /// Builds a successful response wrapping `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the message cannot be serialized.
    pub fn ok(op_code: OpCode, message: &Message) -> Result<Self, ProtocolError> {
        Ok(Self {
            op_code,
            error_code: ErrorCode::Ok,
            data: encode_message(message)?,
        })
    }

    /// Builds an error response with an empty payload.
    pub fn error(op_code: OpCode, error_code: ErrorCode) -> Self {
        Self {
            op_code,
            error_code,
            data: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code == ErrorCode::Ok
    }
}

// ── Chat message ──────────────────────────────────────────────────────────────

/// One chat line, or one synthesized status line.
///
/// Identity is structural: two messages with the same fields are the same
/// message.  Wire field names are fixed by existing peers, including the
/// `ClinetSendTime` spelling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// Display name of the author.
    #[serde(rename = "Name", default)]
    pub sender: String,
    /// Message text.
    #[serde(rename = "Desc", default)]
    pub body: String,
    /// When the author pressed enter, by the author's clock.
    #[serde(
        rename = "ClinetSendTime",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::protocol::timestamp"
    )]
    pub client_send_time: Option<DateTime<Utc>>,
    /// When the server accepted the message.  `None` until the server stamps it.
    #[serde(
        rename = "ServerCheckTime",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::protocol::timestamp"
    )]
    pub server_check_time: Option<DateTime<Utc>>,
}

impl Message {
    /// Creates a user-authored message stamped with the current client time.
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            client_send_time: Some(Utc::now()),
            server_check_time: None,
        }
    }

    /// Creates a status line (connect, disconnect, error) so the presentation
    /// layer can render system events like any other message.
    pub fn system(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            client_send_time: None,
            server_check_time: Some(Utc::now()),
        }
    }

    /// Returns the message with `server_check_time` set to `now`, replacing any
    /// client-supplied value.
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.server_check_time = Some(now);
        self
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
