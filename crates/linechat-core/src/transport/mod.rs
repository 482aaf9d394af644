//! Transport module: the per-socket connection engine and its supporting pieces.
//!
//! # Sub-modules
//!
//! - **`connection`** – [`connection::Connection`] owns one socket and runs an
//!   independent read loop and write loop.  Everything it observes is delivered
//!   to a single [`connection::EventSink`] installed at construction.
//!
//! - **`dispatch`** – [`dispatch::DispatchQueue`], the thread-safe handoff from
//!   socket tasks to the owning module's context.
//!
//! - **`error`** – [`error::TransportError`] and its classification, decided
//!   once where the failure is detected.
//!
//! - **`framing`** – newline-delimited record reading/writing with a maximum
//!   record length.

pub mod connection;
pub mod dispatch;
pub mod error;
pub(crate) mod framing;
