//! linechat-client library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does linechat-client do? (for beginners)
//!
//! The client is one participant in a chat room hosted by `linechat-server`.
//!
//! 1. Dials the server over TCP (default port 9050).
//! 2. Wraps every line the user types in a `SendMessage` request.
//! 3. Receives every message the server relays, including its own, and hands
//!    each one to the presentation layer as a [`ClientEvent`].
//!
//! [`ClientEvent`]: infrastructure::network::ClientEvent

/// Application layer: use cases for the client.
pub mod application;

/// Infrastructure layer: network connection and config storage.
pub mod infrastructure;
