// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/difficulty.rs
// Version: 1.0.0
//
// This file contains functions for decoding Bitcoin's compact target
// encoding (nBits) and computing share difficulty with 256-bit precision,
// located in the core subdirectory of the SoloForge source tree.

use crate::core::sha256::reverse_bytes;
use log::warn;
use uint::construct_uint;

const LOG_TARGET: &str = "soloforge::difficulty";

construct_uint! {
    pub struct U256(4);
}

/// Bitcoin's maximum target (difficulty 1)
const DIFFICULTY_1_TARGET: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// The difficulty-1 target as a 256-bit integer.
pub fn difficulty_1_target() -> U256 {
    U256::from_big_endian(&DIFFICULTY_1_TARGET)
}

/// Decode a compact target from the 4-byte hex `nbits` field of a job.
///
/// The encoding is one exponent byte `e` followed by a three-byte coefficient
/// `c`; the target is `c * 2^(8*(e-3))`, a right shift when `e < 3`. Anything
/// that does not decode to exactly four bytes yields a zero target, which
/// every candidate hash fails; callers must not submit in that state.
pub fn decode_compact_target(nbits_hex: &str) -> U256 {
    let nbits_bytes = match hex::decode(nbits_hex) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(target: LOG_TARGET, "Failed to decode nbits hex {:?}: {}", nbits_hex, e);
            return U256::zero();
        }
    };
    if nbits_bytes.len() != 4 {
        warn!(target: LOG_TARGET,
            "Invalid nbits: wrong length ({} bytes)",
            nbits_bytes.len()
        );
        return U256::zero();
    }

    let exponent = nbits_bytes[0] as usize;
    let coefficient = U256::from(
        ((nbits_bytes[1] as u32) << 16) | ((nbits_bytes[2] as u32) << 8) | nbits_bytes[3] as u32,
    );

    if exponent <= 3 {
        coefficient >> (8 * (3 - exponent))
    } else {
        coefficient << (8 * (exponent - 3))
    }
}

/// Compute the difficulty of a raw SHA256d digest.
///
/// The digest is reversed into its big-endian integer H and the result is
/// `difficulty_1 / H` as a float (0 when H is zero). Display precision beyond
/// 2^53 is not required.
pub fn hash_difficulty(hash: &[u8; 32]) -> f64 {
    let hash_value = U256::from_big_endian(&reverse_bytes(hash));
    if hash_value.is_zero() {
        return 0.0;
    }
    let quotient = difficulty_1_target() / hash_value;
    if quotient > U256::from(u64::MAX) {
        u64::MAX as f64
    } else {
        quotient.low_u64() as f64
    }
}

/// Check whether a raw SHA256d digest meets the given target.
pub fn hash_meets_target(hash: &[u8; 32], target: U256) -> bool {
    U256::from_big_endian(&reverse_bytes(hash)) <= target
}
