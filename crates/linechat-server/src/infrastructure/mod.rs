//! Infrastructure layer for the server application.
//!
//! Contains OS-facing adapters: the TCP listener and dispatch loop, and
//! file-system storage for the configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `linechat_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
