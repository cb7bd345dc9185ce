// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/header.rs
// Version: 1.0.0
//
// This file assembles the 80-byte Bitcoin block header from a mining job and
// the extranonce pair, located in the core subdirectory. The coinbase is
// hashed into the Merkle root, the root is reversed into little-endian, and
// the remaining fields pass through verbatim from the pool.
//
// Tree Location:
// - src/core/header.rs (block header assembly)
// - Depends on: hex, core::sha256

use crate::core::sha256::{reverse_bytes, sha256d};
use crate::core::types::Job;
use crate::error::{Error, Result};

/// An 80-byte block header with a mutable nonce slot at bytes [76, 80).
#[derive(Debug, Clone)]
pub struct BlockHeader {
    bytes: [u8; 80],
}

impl BlockHeader {
    /// Write a nonce little-endian into the reserved slot.
    pub fn set_nonce(&mut self, nonce: u32) {
        self.bytes[76..80].copy_from_slice(&nonce.to_le_bytes());
    }

    /// The full 80-byte header, including the current nonce slot.
    pub fn as_bytes(&self) -> &[u8; 80] {
        &self.bytes
    }
}

fn decode_field(hex_str: &str, name: &str, expected_len: usize) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| Error::Protocol(format!("invalid {} hex {:?}: {}", name, hex_str, e)))?;
    if bytes.len() != expected_len {
        return Err(Error::Protocol(format!(
            "invalid {} length: {} bytes (expected {})",
            name,
            bytes.len(),
            expected_len
        )));
    }
    Ok(bytes)
}

/// Build the block header for a job and extranonce pair.
///
/// The coinbase is `coinbase1 || extranonce1 || extranonce2 || coinbase2`;
/// its double SHA-256 is folded with each Merkle branch and the final root is
/// byte-reversed into the header. The nonce slot is left zeroed.
pub fn build_header(job: &Job, extranonce1: &str, extranonce2: &str) -> Result<BlockHeader> {
    let coinbase_hex = format!(
        "{}{}{}{}",
        job.coinbase1, extranonce1, extranonce2, job.coinbase2
    );
    let coinbase = hex::decode(&coinbase_hex)
        .map_err(|e| Error::Protocol(format!("invalid coinbase hex: {}", e)))?;

    let mut root = sha256d(&coinbase);
    for branch in &job.merkle_branch {
        let branch_bytes = decode_field(branch, "merkle branch", 32)?;
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(&root);
        concat.extend_from_slice(&branch_bytes);
        root = sha256d(&concat);
    }
    let merkle_le = reverse_bytes(&root);

    let version = decode_field(&job.version, "version", 4)?;
    let prev_hash = decode_field(&job.prev_hash, "prev_hash", 32)?;
    let ntime = decode_field(&job.ntime, "ntime", 4)?;
    let nbits = decode_field(&job.nbits, "nbits", 4)?;

    let mut bytes = [0u8; 80];
    bytes[0..4].copy_from_slice(&version);
    bytes[4..36].copy_from_slice(&prev_hash);
    bytes[36..68].copy_from_slice(&merkle_le);
    bytes[68..72].copy_from_slice(&ntime);
    bytes[72..76].copy_from_slice(&nbits);
    // bytes[76..80] stay zero until the worker writes a nonce

    Ok(BlockHeader { bytes })
}
