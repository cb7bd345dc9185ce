// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/main.rs
// Version: 1.0.0
//
// Binary entry point for SoloForge. Parses the command line, loads the
// configuration and persisted statistics, wires the mining engine together
// and serves the dashboard API until interrupted.

use clap::Parser;
use log::{error, info};
use soloforge::web_server::{self, AppState};
use soloforge::{Collector, ConfigHandle, Coordinator, Result, StratumClient, WorkerManager, WsHub};
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "soloforge";

/// Command-line arguments for the SoloForge miner
#[derive(Parser, Debug)]
#[command(
    name = "soloforge",
    version,
    about = "Solo Bitcoin mining coordinator with a real-time web dashboard",
    long_about = "SoloForge keeps a persistent Stratum V1 session with a solo mining pool,\n\
                  drives a fleet of CPU hashing workers and exposes a REST + WebSocket\n\
                  surface for an external dashboard UI.\n\n\
                  Mining is controlled through the API: POST /mining/start and\n\
                  POST /mining/stop. Pool and wallet settings live in the JSON\n\
                  configuration file and can be changed at runtime via PUT /config."
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(
        long,
        value_name = "FILE",
        default_value = "config.json",
        help = "Configuration file (created with defaults when missing)"
    )]
    config: PathBuf,

    /// Directory for persisted statistics
    #[arg(
        long,
        value_name = "DIR",
        default_value = "data",
        help = "Directory holding stats.json"
    )]
    data_dir: PathBuf,

    /// HTTP listen address for the dashboard API
    #[arg(
        long,
        value_name = "ADDR",
        default_value = "0.0.0.0:8080",
        help = "Listen address for the REST/WebSocket API"
    )]
    listen: String,

    /// Share and block history entries kept in memory
    #[arg(
        long,
        value_name = "COUNT",
        default_value = "1000",
        help = "In-memory history cap for shares and blocks"
    )]
    history_size: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ConfigHandle::load(&args.config)?;
    let stats = Arc::new(Collector::new(&args.data_dir, args.history_size));
    let pool = Arc::new(WorkerManager::new());
    let stratum = Arc::new(StratumClient::new(&config.pool_url(), config.pool_port()));
    let hub = Arc::new(WsHub::new());

    let coordinator = Coordinator::new(
        config.clone(),
        stratum.clone(),
        pool.clone(),
        stats.clone(),
        hub.clone(),
    );

    let state = AppState {
        config,
        stratum,
        pool,
        stats,
        hub,
        coordinator: coordinator.clone(),
    };
    web_server::start_stats_loop(state.clone());
    let app = web_server::router(state);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .map_err(|e| {
            error!(target: LOG_TARGET, "❌ Failed to bind {}: {}", args.listen, e);
            soloforge::Error::Transport(format!("cannot bind {}: {}", args.listen, e))
        })?;
    info!(target: LOG_TARGET, "🌐 Dashboard API listening on http://{}", args.listen);
    info!(target: LOG_TARGET, "🔗 WebSocket endpoint: ws://{}/ws", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(coordinator))
        .await
        .map_err(|e| soloforge::Error::Transport(e.to_string()))?;
    Ok(())
}

async fn shutdown_signal(coordinator: Arc<Coordinator>) {
    let _ = tokio::signal::ctrl_c().await;
    info!(target: LOG_TARGET, "🛑 Shutting down");
    coordinator.stop_mining().await;
}
