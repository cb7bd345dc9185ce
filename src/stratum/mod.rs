// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/stratum/mod.rs
// Version: 1.0.0
//
// This file is the module declaration for the Stratum V1 pool communication
// functionality of SoloForge, located in the stratum subdirectory. It
// declares submodules and re-exports key types for use throughout the
// project.
//
// Tree Location:
// - src/stratum/mod.rs (stratum module entry point)
// - Submodules: client, messages

pub mod client;
pub mod messages;

// Re-export key types for convenience
pub use client::{ConnectionState, StratumClient, StratumObserver};
pub use messages::{Notification, Request, Response, StratumMessage};
