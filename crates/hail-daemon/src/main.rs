//! Hail dispatch daemon
//!
//! Serves the negotiation engine over HTTP:
//! - REST API for presence, rides, offers and arbitration
//! - Per-party and firehose SSE event streams
//! - Graceful shutdown on signal or API request

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod server;

use config::DaemonConfig;
use error::{DaemonError, DaemonResult};
use server::Server;

/// Hail daemon CLI
#[derive(Parser)]
#[command(name = "haild")]
#[command(about = "Hail - ride dispatch and negotiation daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HAIL_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "HAIL_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "HAIL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "HAIL_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration first so the file can set the log level; CLI
    // arguments override it.
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Print startup banner
    println!(
        r#"
  _   _       _ _
 | | | | __ _(_) |
 | |_| |/ _` | | |
 |  _  | (_| | | |
 |_| |_|\__,_|_|_|

  Hail - ride dispatch and negotiation daemon
  Version: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config);
    server.run().await
}
