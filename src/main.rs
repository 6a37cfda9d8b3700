use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use taskboard::config::{self, TaskboardConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(version, about = "Kanban task board service with ordered columns and tasks")]
pub struct Cli {
    /// Path to taskboard.toml (default: .taskboard/taskboard.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP/JSON API server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS, bind on all interfaces)
        #[arg(long)]
        dev: bool,
    },
    /// Create the database and write a default taskboard.toml if none exists
    Init {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Verify every board and column still has a dense position sequence
    Check {
        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(config::CONFIG_DIR).join(config::CONFIG_FILE))
    }

    /// File → environment. CLI flags are applied per command.
    fn load_config(&self) -> Result<TaskboardConfig> {
        let mut config = match &self.config {
            Some(path) => TaskboardConfig::load(path)?,
            None => TaskboardConfig::load_or_default(std::path::Path::new(config::CONFIG_DIR))?,
        };
        config.apply_env()?;
        Ok(config)
    }
}

/// RUST_LOG wins over the configured filter. Logs go to stderr so command
/// output on stdout stays clean.
fn init_tracing(config: &TaskboardConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = cli.load_config()?;
    init_tracing(&config);

    match &cli.command {
        Commands::Serve { port, db_path, dev } => {
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(path) = db_path {
                config.database.path = path.clone();
            }
            config.server.dev_mode |= *dev;
            cmd::cmd_serve(&config).await?;
        }
        Commands::Init { db_path } => {
            if let Some(path) = db_path {
                config.database.path = path.clone();
            }
            cmd::cmd_init(&config, &cli.config_path())?;
        }
        Commands::Check { db_path } => {
            let path = db_path.clone().unwrap_or_else(|| config.database.path.clone());
            cmd::cmd_check(&path)?;
        }
    }

    Ok(())
}
