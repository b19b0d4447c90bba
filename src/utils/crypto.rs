//! Hash Helpers
//!
//! Keccak256 for EVM addresses and transaction hashes, HASH160 for BIP32
//! fingerprints, and EIP-55 address checksumming.

use bitcoin::hashes::{hash160, Hash};
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (EVM addresses, signing hashes, tx hashes)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Convert raw 20-byte address to its EIP-55 checksummed form
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::with_capacity(42);
    result.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };

        if ch.is_ascii_alphabetic() && nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Strip an optional `0x` prefix and decode hex
pub fn decode_hex_prefixed(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = value.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_checksum_eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let raw = hex::decode(&expected[2..].to_lowercase()).unwrap();
            assert_eq!(to_checksum_address(&raw), expected);
        }
    }

    #[test]
    fn test_hash160_known() {
        // HASH160 of the empty string
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_decode_hex_prefixed() {
        assert_eq!(decode_hex_prefixed("0xa9059cbb").unwrap(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(decode_hex_prefixed("a9059cbb").unwrap(), vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert!(decode_hex_prefixed("0xzz").is_err());
    }
}
