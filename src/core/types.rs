// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/types.rs
// Version: 1.0.0
//
// This file defines core data structures for SoloForge, located in the core
// subdirectory. It includes the mining job received from the pool, the
// per-connection extranonce data and the share event emitted by workers.
//
// Tree Location:
// - src/core/types.rs (core data structures)
// - Depends on: serde

use serde::{Deserialize, Serialize};

/// A mining job received from the pool via `mining.notify`.
///
/// All hash and header fields are kept as the pool-supplied hex strings and
/// passed through verbatim into the block header; decoding happens at header
/// construction time. Immutable once constructed; workers receive snapshots
/// by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Opaque job identifier from the pool
    pub job_id: String,

    /// Previous block hash (32 bytes of hex, pool-supplied byte order)
    pub prev_hash: String,

    /// Coinbase transaction prefix (hex)
    pub coinbase1: String,

    /// Coinbase transaction suffix (hex)
    pub coinbase2: String,

    /// Ordered Merkle branch hashes (32 bytes of hex each, possibly empty)
    pub merkle_branch: Vec<String>,

    /// Block version (4 bytes of hex, little-endian on the wire)
    pub version: String,

    /// Compact network target (4 bytes of hex)
    pub nbits: String,

    /// Block timestamp (4 bytes of hex)
    pub ntime: String,

    /// Pool hint that previous jobs are invalidated
    pub clean_jobs: bool,
}

/// Per-connection extranonce data established by the subscribe response.
///
/// `extranonce1` is fixed for the session; `extranonce2_size` is the byte
/// length each worker must choose for its own extranonce2.
#[derive(Debug, Clone, Default)]
pub struct ExtranonceInfo {
    pub extranonce1: String,
    pub extranonce2_size: usize,
}

/// A share event produced when a candidate hash meets the network target.
#[derive(Debug, Clone, Serialize)]
pub struct Share {
    /// Id of the worker that found the share
    pub worker_id: u32,

    /// Name of the worker that found the share
    pub worker_name: String,

    /// Job the share was found on
    pub job_id: String,

    /// The extranonce2 used in the coinbase (hex)
    pub extranonce2: String,

    /// The job's ntime, echoed back on submission (hex)
    pub ntime: String,

    /// The winning nonce (lowercase 8-digit hex)
    pub nonce: String,

    /// Achieved difficulty of the share's hash
    pub difficulty: f64,
}
