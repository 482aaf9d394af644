//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the client's TOML configuration, falls back
//! to defaults on first run, and can write the file back.

pub mod config;
