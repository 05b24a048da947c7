//! # keepsake-core
//!
//! Core types and primitives for the Keepsake conversational memory service.
//! This crate defines the shared vocabulary used by every other crate in the workspace.

pub mod error;
pub mod types;

pub use error::{KeepsakeError, Result};
pub use types::*;
