// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/stats/mod.rs
// Version: 1.0.0
//
// This file is the module declaration for the statistics functionality of
// SoloForge, located in the stats subdirectory.
//
// Tree Location:
// - src/stats/mod.rs (stats module entry point)
// - Submodules: collector

pub mod collector;

// Re-export key types for convenience
pub use collector::{BlockEntry, Collector, SessionRecord, ShareEntry, StatsSnapshot};
