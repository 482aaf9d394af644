//! # linechat-core
//!
//! Shared library for linechat containing the newline-delimited JSON wire
//! protocol, the per-socket connection engine, and the dispatch queue that
//! hands socket-side events to the module that owns them.
//!
//! This crate is used by both the server and client applications.  It has no
//! dependency on any presentation layer and never touches the server registry
//! or client state directly.
//!
//! # Architecture overview (for beginners)
//!
//! linechat is a minimal chat relay: one TCP server accepts many clients and
//! rebroadcasts every chat message it receives to all of them.
//!
//! - **`protocol`** – What travels over the wire.  Every `Request` (client to
//!   server) and `Response` (server to client) is one JSON object on one line.
//!   The chat `Message` itself is JSON-encoded again inside the envelope's
//!   `data` string.
//!
//! - **`transport`** – How bytes travel.  A [`Connection`] wraps one socket and
//!   runs two independent loops: a read loop that turns lines into events and a
//!   write loop that drains an outbound FIFO queue.  Failures are classified
//!   once, at the point of detection, and delivered to the owner as data.
//!
//! - **`transport::dispatch`** – The [`DispatchQueue`] is the only road from the
//!   socket tasks to the owning module.  The owner drains it on its own context,
//!   which is why the server registry needs no locks.
//!
//! - **`config`** – Locating, loading, and saving the TOML config files.  Each
//!   binary defines its own schema on top.

pub mod config;
pub mod protocol;
pub mod transport;

pub use protocol::codec::{
    decode_message, decode_request, decode_response, encode_message, encode_request,
    encode_response, ProtocolError,
};
pub use protocol::messages::{ErrorCode, Message, OpCode, Request, Response};
pub use transport::connection::{
    Connection, ConnectionConfig, ConnectionEvent, ConnectionEventKind, ConnectionId, EventSink,
    SendError,
};
pub use transport::dispatch::{DispatchHandle, DispatchQueue};
pub use transport::error::{TransportError, TransportErrorKind};

/// Default TCP port the server listens on and the client dials.
pub const DEFAULT_PORT: u16 = 9050;
