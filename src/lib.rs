// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/lib.rs
// Version: 1.0.0
//
// This file serves as the main library entry point for the SoloForge solo
// Bitcoin miner, located at the root of the source tree. It exports all
// public modules and types that other crates or binaries can use.
//
// Tree Location:
// - src/lib.rs (root library file)
// - Exports modules: core, miner, stratum, stats, config, coordinator,
//   web_server, ws_hub

pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod miner;
pub mod stats;
pub mod stratum;
pub mod web_server;
pub mod ws_hub;

// Re-export commonly used types at the crate root for convenience
pub use crate::config::{Config, ConfigHandle};
pub use crate::coordinator::Coordinator;
pub use crate::error::{Error, Result};
pub use crate::miner::{Worker, WorkerManager};
pub use crate::stats::Collector;
pub use crate::stratum::{StratumClient, StratumObserver};
pub use crate::ws_hub::WsHub;
