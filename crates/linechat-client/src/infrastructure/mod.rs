//! Infrastructure layer for the client application.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `linechat_core`, but MUST NOT be imported by the `application` layer.
//!
//! # Sub-modules
//!
//! - **`network`** – [`network::ChatClient`], which dials the server, owns the
//!   single connection, and turns inbound records and faults into
//!   [`network::ClientEvent`]s on the caller's own context.
//!
//! - **`storage`** – TOML configuration persistence.

pub mod network;
pub mod storage;
