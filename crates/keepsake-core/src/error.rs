use thiserror::Error;

/// Unified error type for the entire Keepsake service.
#[derive(Error, Debug)]
pub enum KeepsakeError {
    // ── Lookup errors ──────────────────────────────────────────
    #[error("embedding not found: {0}")]
    NotFound(uuid::Uuid),

    // ── Validation errors ──────────────────────────────────────
    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Backing store errors ───────────────────────────────────
    #[error("backing store unavailable: {0}")]
    Backing(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeepsakeError {
    /// Shorthand for a field-level validation failure.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        KeepsakeError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeepsakeError>;
