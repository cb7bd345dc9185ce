// SoloForge - Free and Open Source Software Statement
//
// This project, soloforge, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/core/coinbase.rs
// Version: 1.0.0
//
// This file extracts the block height from the coinbase prefix of a job,
// located in the core subdirectory. BIP34 requires the height as the first
// push in the coinbase scriptSig, which lets the dashboard attach a height to
// block-detection events without a full node.

/// Parse the BIP34 block height from a coinbase transaction prefix.
///
/// The coinbase input starts at a fixed offset in the prefix: tx version (4)
/// + input count (1) + null prevout (36) + scriptSig length (1) = 42 bytes.
/// The first scriptSig element is a push of the height, little-endian.
/// Returns None for prefixes that are too short or carry a non-minimal push.
pub fn parse_coinbase_height(coinbase1_hex: &str) -> Option<u64> {
    let bytes = hex::decode(coinbase1_hex).ok()?;
    const SCRIPT_START: usize = 42;
    let push_len = *bytes.get(SCRIPT_START)? as usize;
    // BIP34 heights are direct pushes of 1..=8 bytes
    if push_len == 0 || push_len > 8 {
        return None;
    }
    let height_bytes = bytes.get(SCRIPT_START + 1..SCRIPT_START + 1 + push_len)?;
    let mut height = 0u64;
    for (i, b) in height_bytes.iter().enumerate() {
        height |= (*b as u64) << (8 * i);
    }
    Some(height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coinbase_prefix_with_height(height_push: &str) -> String {
        // version + input count + null prevout (txid, index) + script len
        format!(
            "01000000{}{}{}{}{}",
            "01",
            "00".repeat(32),
            "ffffffff",
            "28",
            height_push
        )
    }

    #[test]
    fn test_parse_height_three_byte_push() {
        // 0x03 push of 850000 = 0x0cf850 little-endian
        let prefix = coinbase_prefix_with_height("0350f80c");
        assert_eq!(parse_coinbase_height(&prefix), Some(850_000));
    }

    #[test]
    fn test_parse_height_short_prefix() {
        assert_eq!(parse_coinbase_height("01000000"), None);
    }

    #[test]
    fn test_parse_height_invalid_push() {
        // OP_PUSHDATA-style lengths are not minimal height pushes
        let prefix = coinbase_prefix_with_height("4c0350f80c");
        assert_eq!(parse_coinbase_height(&prefix), None);
    }

    #[test]
    fn test_parse_height_not_hex() {
        assert_eq!(parse_coinbase_height("nonsense"), None);
    }
}
