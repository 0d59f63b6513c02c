//! Giggletech OSCQuery Helper
//!
//! Runs an OSCQuery host for Giggletech products on demand and exposes its
//! lifecycle over a local HTTP command port.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                 OSCQ HELPER                   │
//!   GET /start       │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!   ─────────────────┼─▶│   net    │──▶│   http   │──▶│ lifecycle │  │
//!                    │  │ listener │   │ commands │   │  manager  │  │
//!   "Service         │  └──────────┘   └──────────┘   └─────┬─────┘  │
//!    started..."     │                                      │        │
//!   ◀────────────────┼──────────────────────────────        ▼        │
//!                    │                               ┌────────────┐  │
//!                    │                               │  service   │  │
//!                    │                               │ OSCQuery   │──┼──▶ TCP (JSON)
//!                    │                               │   host     │──┼──▶ UDP (OSC)
//!                    │                               └────────────┘  │
//!                    │  config · observability · shutdown signal     │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use oscq_helper::config;
use oscq_helper::lifecycle::{signals, LifecycleManager, Shutdown};
use oscq_helper::net::Listener;
use oscq_helper::observability::{logging, metrics};
use oscq_helper::service::{EphemeralPorts, OscQueryLauncher};
use oscq_helper::CommandServer;

#[derive(Parser)]
#[command(name = "oscq-helper")]
#[command(about = "Giggletech VRChat OSCQuery helper service", long_about = None)]
struct Args {
    /// Configuration file, TOML or YAML by extension
    /// [default: config_oscq.toml, falling back to config_oscq.yml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append-only log file
    #[arg(long, default_value = logging::DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(&args.log_file);

    tracing::info!("oscq-helper v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .unwrap_or_else(|| config::default_config_path(Path::new(".")));
    let config = config::load_or_default(&config_path);

    if let Some(addr) = config.metrics_address {
        if let Err(e) = metrics::init_metrics(addr) {
            tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let listener = match Listener::bind(config.bind_address, config.http_port).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start HTTP listener");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let manager = Arc::new(LifecycleManager::new(
        config.service_name.clone(),
        Arc::new(OscQueryLauncher::new(config.bind_address)),
        Arc::new(EphemeralPorts::new(config.bind_address)),
    ));

    let termination = CommandServer::new(manager, shutdown).run(listener).await;

    tracing::info!(?termination, "Shutdown complete");
    ExitCode::SUCCESS
}
