use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration — maps to `keepsake.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
    pub database: DatabaseConfig,
    pub retention: RetentionConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

// ── Database ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("keepsake.db"),
        }
    }
}

// ── Retention ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// How long short-term fragments live before the sweeper removes them.
    pub fragment_ttl_hours: u64,
    /// How long long-term embeddings live before the sweeper removes them.
    pub embedding_ttl_days: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            fragment_ttl_hours: 24,
            embedding_ttl_days: 365,
        }
    }
}

impl RetentionConfig {
    pub fn fragment_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.fragment_ttl_hours as i64)
    }

    pub fn embedding_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.embedding_ttl_days as i64)
    }
}

// ── Server ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub listen: String,
    /// Enable CORS (for dashboard development against a local server).
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3900".into(),
            cors: false,
        }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Default for root ───────────────────────────────────────────

impl Default for KeepsakeConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            retention: RetentionConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl KeepsakeConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Database path ───
        if self.database.path.as_os_str().is_empty() {
            warnings.push(ConfigWarning {
                field: "database.path".into(),
                message: "database path is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 'keepsake.db'".into()),
            });
        }

        // ── Retention ───
        if self.retention.fragment_ttl_hours == 0 {
            warnings.push(ConfigWarning {
                field: "retention.fragment_ttl_hours".into(),
                message: "fragment TTL is 0 — fragments would expire immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 24".into()),
            });
        } else if self.retention.fragment_ttl_hours > 7 * 24 {
            warnings.push(ConfigWarning {
                field: "retention.fragment_ttl_hours".into(),
                message: format!(
                    "{} hours is unusually long for the short-term tier",
                    self.retention.fragment_ttl_hours
                ),
                severity: WarningSeverity::Warning,
                hint: Some("Fragments are session context; 24 hours is typical".into()),
            });
        }

        if self.retention.embedding_ttl_days == 0 {
            warnings.push(ConfigWarning {
                field: "retention.embedding_ttl_days".into(),
                message: "embedding TTL is 0 — long-term memories would expire immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 365".into()),
            });
        }

        // ── Server listen address ───
        if self.server.listen.is_empty() {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "listen address is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. '127.0.0.1:3900'".into()),
            });
        } else if self.server.listen.starts_with("0.0.0.0") {
            warnings.push(ConfigWarning {
                field: "server.listen".into(),
                message: "binding to 0.0.0.0 — server is accessible from all interfaces".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Use '127.0.0.1:3900' unless a gateway sits in front".into()),
            });
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
