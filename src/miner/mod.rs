// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/miner/mod.rs
// Version: 1.0.0
//
// This file is the module declaration for the mining functionality of
// SoloForge, located in the miner subdirectory. It declares submodules and
// re-exports key types for use throughout the project.
//
// Tree Location:
// - src/miner/mod.rs (miner module entry point)
// - Submodules: worker, manager

pub mod manager;
pub mod worker;

// Re-export key types for convenience
pub use manager::WorkerManager;
pub use worker::{ShareCallback, Worker};
