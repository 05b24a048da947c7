use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::schema::KeepsakeConfig;

/// Loads the Keepsake configuration from disk.
pub struct ConfigLoader {
    config: KeepsakeConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > KEEPSAKE_CONFIG env > ~/.keepsake/keepsake.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("KEEPSAKE_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".keepsake")
            .join("keepsake.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> keepsake_core::Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str::<KeepsakeConfig>(&raw).map_err(|e| {
                keepsake_core::KeepsakeError::Config(format!(
                    "failed to parse {}: {}",
                    config_path.display(),
                    e
                ))
            })?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            KeepsakeConfig::default()
        };

        // Apply environment variable overrides
        let config = Self::apply_env_overrides(config);

        // Validate config — log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(keepsake_core::KeepsakeError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Get a snapshot of the current config.
    pub fn get(&self) -> KeepsakeConfig {
        self.config.clone()
    }

    /// Path the config was resolved from.
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply env var overrides (KEEPSAKE_DB_PATH, KEEPSAKE_LISTEN, etc.)
    fn apply_env_overrides(mut config: KeepsakeConfig) -> KeepsakeConfig {
        if let Ok(v) = std::env::var("KEEPSAKE_DB_PATH") {
            config.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("KEEPSAKE_LISTEN") {
            config.server.listen = v;
        }
        if let Ok(v) = std::env::var("KEEPSAKE_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Ok(v) = std::env::var("KEEPSAKE_FRAGMENT_TTL_HOURS") {
            if let Ok(hours) = v.parse::<u64>() {
                config.retention.fragment_ttl_hours = hours;
            }
        }
        if let Ok(v) = std::env::var("KEEPSAKE_EMBEDDING_TTL_DAYS") {
            if let Ok(days) = v.parse::<u64>() {
                config.retention.embedding_ttl_days = days;
            }
        }
        config
    }
}
