use clap::{Parser, Subcommand};
use std::path::PathBuf;

use keepsake_config::{ConfigLoader, KeepsakeConfig};
use keepsake_memory::{Database, EmbeddingStore, FragmentStore, MemoryService, SweepReport};

/// 🧸 Keepsake — conversational memory service for companion chat
#[derive(Parser)]
#[command(name = "keepsake", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to keepsake.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP memory service
    Serve,
    /// Run a retention sweep once and exit (cron-friendly)
    Sweep {
        /// Sweep only the short-term fragment tier
        #[arg(long)]
        fragments: bool,

        /// Sweep only the long-term embedding tier
        #[arg(long)]
        embeddings: bool,
    },
    /// Show current configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Initialize a starter keepsake.toml in ~/.keepsake/
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub async fn run(self) -> keepsake_core::Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        // Resolve log level: --verbose > --quiet > --log-level > config
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            self.log_level
                .as_deref()
                .unwrap_or(config.logging.level.as_str())
        };

        // Initialize tracing with appropriate format
        if config.logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .json()
                .with_target(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
                )
                .with_target(false)
                .init();
        }

        match self.command {
            Commands::Serve => Self::cmd_serve(config).await,
            Commands::Sweep {
                fragments,
                embeddings,
            } => Self::cmd_sweep(config, fragments, embeddings),
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Init { force } => Self::cmd_init(force),
        }
    }

    /// Open the database and build the memory service both long-running
    /// and one-shot commands share.
    fn open_service(config: &KeepsakeConfig) -> keepsake_core::Result<MemoryService> {
        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tracing::debug!(path = %parent.display(), "creating database directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::open(&config.database.path)?;
        Ok(MemoryService::new(
            FragmentStore::new(db.clone(), config.retention.fragment_ttl()),
            EmbeddingStore::new(db, config.retention.embedding_ttl()),
        ))
    }

    async fn cmd_serve(config: KeepsakeConfig) -> keepsake_core::Result<()> {
        println!("🧸 Keepsake v{}", env!("CARGO_PKG_VERSION"));
        println!("   Database: {}", config.database.path.display());
        println!("   Listen: {}", config.server.listen);
        println!(
            "   Retention: fragments {}h, embeddings {}d",
            config.retention.fragment_ttl_hours, config.retention.embedding_ttl_days
        );
        println!();

        let memory = Self::open_service(&config)?;
        keepsake_server::start_server(config.server, memory).await
    }

    fn cmd_sweep(
        config: KeepsakeConfig,
        fragments: bool,
        embeddings: bool,
    ) -> keepsake_core::Result<()> {
        let memory = Self::open_service(&config)?;

        // No tier flag means both tiers.
        let report = if !fragments && !embeddings {
            memory.sweep_expired()?
        } else {
            let mut report = SweepReport::default();
            if fragments {
                report.fragments_removed = memory.sweep_expired_fragments()?;
            }
            if embeddings {
                report.embeddings_removed = memory.sweep_expired_embeddings()?;
            }
            report
        };

        println!("🧹 Sweep complete");
        println!("   Fragments removed:  {}", report.fragments_removed);
        println!("   Embeddings removed: {}", report.embeddings_removed);
        Ok(())
    }

    fn cmd_config(config: KeepsakeConfig, json: bool) -> keepsake_core::Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config)
                    .map_err(|e| keepsake_core::KeepsakeError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_init(force: bool) -> keepsake_core::Result<()> {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".keepsake");

        std::fs::create_dir_all(&dir)?;
        let config_path = dir.join("keepsake.toml");

        if config_path.exists() && !force {
            println!("⚠️  {} already exists", config_path.display());
            println!("   Pass --force to overwrite it.");
            return Ok(());
        }

        let starter = r#"# 🧸 Keepsake Configuration

[database]
path = "keepsake.db"    # or env: KEEPSAKE_DB_PATH

[retention]
fragment_ttl_hours = 24    # short-term session memory
embedding_ttl_days = 365   # long-term child memory

[server]
listen = "127.0.0.1:3900"  # or env: KEEPSAKE_LISTEN
# cors = true

[logging]
level = "info"             # or env: KEEPSAKE_LOG_LEVEL
# format = "json"
"#;

        std::fs::write(&config_path, starter)?;
        println!("✅ Created {}", config_path.display());
        println!("   Edit it to adjust retention, then run: keepsake serve");
        Ok(())
    }
}
