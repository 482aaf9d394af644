//! Transport failures and their classification.
//!
//! The owner of a connection never inspects an `io::Error` to decide what to
//! do.  The loop that detects a failure wraps it in a [`TransportError`]
//! variant, and [`TransportError::kind`] tells the owner which of the three
//! handling paths applies.

use std::io;

use thiserror::Error;

/// How the owner of a connection should react to a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The peer is gone (EOF, reset, broken pipe) or stopped draining its
    /// queue.  The only fatal-per-connection path: close and forget it.
    Disconnected,
    /// The peer sent something that cannot be a record.  The record was
    /// skipped and the connection keeps running.
    MalformedInput,
    /// Any other I/O failure.  The loop that hit it has stopped; surface it,
    /// then clean up through the disconnect path.
    Other,
}

/// Errors raised by a connection's read or write loop.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed its side of the socket.
    #[error("peer closed the connection")]
    Closed,

    /// The socket was reset, aborted, or otherwise torn down underneath us.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// The outbound queue grew past its high-water mark.
    #[error("peer stalled: more than {limit} records waiting to be written")]
    Stalled { limit: usize },

    /// An inbound line exceeded the maximum record length and was discarded.
    #[error("discarded a {len}-byte record; the limit is {limit} bytes")]
    RecordTooLong { len: usize, limit: usize },

    /// An I/O failure that does not indicate a vanished peer.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl TransportError {
    /// Wraps an I/O error from a socket read or write, classifying it.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => TransportError::ConnectionLost(err),
            _ => TransportError::Io(err),
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        match self {
            TransportError::Closed
            | TransportError::ConnectionLost(_)
            | TransportError::Stalled { .. } => TransportErrorKind::Disconnected,
            TransportError::RecordTooLong { .. } => TransportErrorKind::MalformedInput,
            TransportError::Io(_) => TransportErrorKind::Other,
        }
    }
}
