//! Address Derivation and Validation
//!
//! - EVM: keccak256 of the uncompressed public key, last 20 bytes, EIP-55
//! - Taproot: segwit v1 bech32m on an explicit network

use crate::crypto::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::Network;
use crate::utils::crypto::{decode_hex_prefixed, keccak256, to_checksum_address};
use bitcoin::address::{Address, AddressType, NetworkUnchecked};
use bitcoin::secp256k1::{PublicKey, SecretKey};

// MARK: - EVM

/// Raw 20-byte address of a secp256k1 public key
pub fn evm_address_bytes(public_key: &PublicKey) -> [u8; 20] {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    out
}

/// EIP-55 checksummed address of a public key
pub fn evm_address_from_public_key(public_key: &PublicKey) -> String {
    to_checksum_address(&evm_address_bytes(public_key))
}

/// EIP-55 checksummed address of a raw 32-byte private key
pub fn evm_address_from_private_key(private_key: &[u8]) -> SignerResult<String> {
    let mut secret = SecretKey::from_slice(private_key)
        .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;
    let public_key = secret.public_key(&SECP);
    secret.non_secure_erase();
    Ok(evm_address_from_public_key(&public_key))
}

/// Parse a `0x` + 40 hex address
///
/// All-lowercase and all-uppercase bodies are accepted as-is; a mixed-case
/// body must carry a valid EIP-55 checksum.
pub fn parse_evm_address(address: &str) -> SignerResult<[u8; 20]> {
    let trimmed = address.trim();
    let body = trimmed
        .strip_prefix("0x")
        .ok_or_else(|| SignerError::invalid_address(format!("Missing 0x prefix: {}", trimmed)))?;

    if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SignerError::invalid_address(format!(
            "Expected 0x followed by 40 hex characters: {}",
            trimmed
        )));
    }

    let raw = decode_hex_prefixed(body)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&raw);

    let has_lower = body.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = body.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum_address(&out) != trimmed {
        return Err(SignerError::invalid_address(format!(
            "EIP-55 checksum mismatch: {}",
            trimmed
        )));
    }

    Ok(out)
}

pub fn is_valid_evm_address(address: &str) -> bool {
    parse_evm_address(address).is_ok()
}

// MARK: - Bitcoin

/// Parse any Bitcoin address and require it to belong to `network`
pub fn parse_bitcoin_address(address: &str, network: Network) -> SignerResult<Address> {
    let unchecked: Address<NetworkUnchecked> = address.trim().parse()?;
    unchecked.require_network(network.to_bitcoin()).map_err(|e| {
        SignerError::invalid_address(format!("Address not valid on {}: {}", network, e))
    })
}

/// True for a well-formed P2TR address on `network`
pub fn is_valid_taproot_address(address: &str, network: Network) -> bool {
    parse_bitcoin_address(address, network)
        .map(|addr| addr.address_type() == Some(AddressType::P2tr))
        .unwrap_or(false)
}
