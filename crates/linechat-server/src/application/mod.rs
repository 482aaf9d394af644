//! Application layer use cases for the server.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The *application* layer sits between the wire protocol and the
//! infrastructure (sockets, files).  Code here decides *what* should happen
//! in response to an input and leaves *how* to the infrastructure layer.  It
//! contains no socket I/O and no file-system access, which is why it can be
//! tested with plain function calls.
//!
//! # Sub-modules
//!
//! - **`handle_request`** – Turns one inbound record into either a reply for
//!   the sender or a broadcast to everyone.
//!
//! - **`registry`** – The ordered set of live connections that broadcasts are
//!   fanned out to.

pub mod handle_request;
pub mod registry;
