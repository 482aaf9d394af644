//! Network infrastructure for the server application.
//!
//! # Sub-modules
//!
//! - **`server`** – [`server::ChatServer`] binds the listening socket, runs the
//!   accept loop, and owns the dispatch context: the one place where the
//!   connection registry is mutated and observer messages are emitted.

pub mod server;
