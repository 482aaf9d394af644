//! Application layer use cases for the client application.
//!
//! - **`handle_response`** – Decides what an inbound server record means: a
//!   chat message to show, a rejection to log, or noise to drop.
//!
//! - **`render`** – Formats a message as one terminal line.

pub mod handle_response;
pub mod render;
