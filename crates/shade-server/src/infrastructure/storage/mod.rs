//! Storage infrastructure: configuration file loading.
//!
//! The `config` sub-module handles:
//!
//! - Reading the TOML configuration file from the platform-appropriate directory.
//! - Providing sensible defaults when the file does not exist yet (first run).
//! - Validating values that serde cannot check on its own (address syntax,
//!   attempt budget, bind address).

pub mod config;
