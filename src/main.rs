//! Lazyhub CLI
//!
//! - `lazyhub serve` - run the WebSocket hub
//! - `lazyhub init-config` - print a default configuration file
//!
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lazyhub::config::{generate_default_config, Config, LoggingConfig};
use lazyhub::server::{serve, AppState};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lazyhub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pub/sub routing hub for WebSocket connections")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hub
    Serve {
        /// Config file (default: standard locations, then environment)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Override listener host
        #[arg(long)]
        host: Option<String>,
        /// Override listener port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let mut config = match config {
                Some(path) => Config::load_with_env(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => Config::load_default(),
            };
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            init_logging(&config.logging);
            tracing::info!("Starting Lazyhub v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!(
                "Hub {:?}, default group {:?}, transform {:?}",
                config.hub.name,
                config.hub.default_group,
                config.hub.transform
            );

            let state = AppState::from_settings(&config.hub);
            serve(state, &config.server).await?;
        }
        Commands::InitConfig => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("lazyhub={},tower_http=info", logging.level).into()
    });

    let (pretty, json) = if logging.format == "json" {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}
