//! # keepsake-config
//!
//! Configuration system for the Keepsake memory service. Reads
//! `keepsake.toml`, then applies `KEEPSAKE_*` environment overrides.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{ConfigWarning, KeepsakeConfig, WarningSeverity};
