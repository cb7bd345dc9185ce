// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/sha256.rs
// Version: 1.0.0
//
// This file implements the SHA256d (double SHA-256) algorithm used by
// Bitcoin, plus the byte-reversal helper the header codec relies on. Bitcoin
// displays hashes in reverse byte order, so the same helper converts a digest
// into its big-endian integer representation and produces the little-endian
// Merkle root in the block header.
//
// Tree Location:
// - src/core/sha256.rs (double SHA-256 and byte order helpers)
// - Depends on: sha2

use sha2::{Digest, Sha256};

/// Compute SHA256(SHA256(data)).
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

/// Return a byte-reversed copy of the input.
pub fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_empty_input() {
        let digest = sha256d(&hex::decode("").unwrap());
        assert_eq!(
            hex::encode(digest),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456",
            "double SHA-256 of the empty string should match the known anchor"
        );
    }

    #[test]
    fn test_sha256d_output_length() {
        let digest = sha256d(b"soloforge");
        assert_eq!(digest.len(), 32, "digest should be 32 bytes");
    }

    #[test]
    fn test_reverse_bytes_round_trip() {
        let data: Vec<u8> = (0u8..80).collect();
        assert_eq!(
            reverse_bytes(&reverse_bytes(&data)),
            data,
            "double reversal should be the identity"
        );
    }

    #[test]
    fn test_reversed_big_endian_equals_little_endian() {
        use crate::core::difficulty::U256;
        let digest = sha256d(b"byte order");
        let via_reverse = U256::from_big_endian(&reverse_bytes(&digest));
        let via_le = U256::from_little_endian(&digest);
        assert_eq!(via_reverse, via_le);
    }
}
