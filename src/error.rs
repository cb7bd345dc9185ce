// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/error.rs
// Version: 1.0.0
//
// This file defines the centralized error type for SoloForge. Transport
// errors are fatal to the current pool connection, protocol errors drop the
// offending message, config and not-found errors surface through the REST
// layer, and internal errors are logged without propagating to workers.
//
// Tree Location:
// - src/error.rs (crate-wide error kinds)
// - Depends on: thiserror

use thiserror::Error;

/// Main error type for SoloForge operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Socket connect/read/write/close failures; fatal to the current
    /// connection, not to the process.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed JSON, wrong message shape, short parameter arrays.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid or missing configuration, e.g. no wallet address.
    #[error("config error: {0}")]
    Config(String),

    /// Lookup of an unknown worker id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unexpected state, e.g. submit while not connected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Protocol(err.to_string())
    }
}

/// Convenience type alias for Results using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
