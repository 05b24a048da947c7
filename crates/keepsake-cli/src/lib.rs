//! # keepsake-cli
//!
//! Command-line interface for the Keepsake memory service.
//!
//! ## Commands
//!
//! - `keepsake serve` — Start the HTTP memory service
//! - `keepsake sweep` — Run a retention sweep and exit
//! - `keepsake config` — Show effective configuration
//! - `keepsake init` — Write a starter config file

pub mod commands;

pub use commands::Cli;
