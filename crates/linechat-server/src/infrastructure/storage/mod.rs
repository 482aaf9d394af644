//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the server's TOML configuration, falls back
//! to defaults when no file exists yet, and can write the file back.

pub mod config;
