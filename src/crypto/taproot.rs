//! Taproot Key Tweaking (BIP-341, key path only)
//!
//! - Internal key to output key: Q = P + t·G, t = hash_TapTweak(P)
//! - Private key tweak for signing with BIP-341 parity correction
//! - P2TR bech32m address formatting
//! - Key-path Schnorr sign/verify over a sighash
//!
//! No script tree is ever committed: the tweak covers the internal key alone.
//!
//! Reference: https://github.com/bitcoin/bips/blob/master/bip-0341.mediawiki

use super::schnorr::{sign_digest, tagged_hash, tags, verify_digest, SchnorrSig};
use super::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::Network;
use bitcoin::secp256k1::{Keypair, Parity, Scalar, SecretKey, XOnlyPublicKey};
use bitcoin::Address;
use zeroize::Zeroizing;

// MARK: - Taproot Types

/// Taproot output key (tweaked public key)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaprootOutputKey {
    /// The x-only output public key embedded in the witness program
    pub output_key: XOnlyPublicKey,
    /// True when Q has an odd y coordinate
    pub parity: bool,
    /// The tweak scalar t
    pub tweak: [u8; 32],
}

impl TaprootOutputKey {
    pub fn to_hex(&self) -> String {
        hex::encode(self.output_key.serialize())
    }
}

// MARK: - Key Parsing

/// Parse a signer key given either as 33-byte compressed or 32-byte x-only
pub fn parse_internal_key(bytes: &[u8]) -> SignerResult<XOnlyPublicKey> {
    match bytes.len() {
        32 => XOnlyPublicKey::from_slice(bytes)
            .map_err(|e| SignerError::crypto_error(format!("Invalid x-only key: {}", e))),
        33 => bitcoin::secp256k1::PublicKey::from_slice(bytes)
            .map(|pk| pk.x_only_public_key().0)
            .map_err(|e| SignerError::crypto_error(format!("Invalid public key: {}", e))),
        n => Err(SignerError::crypto_error(format!(
            "Public key must be 32 or 33 bytes, got {}",
            n
        ))),
    }
}

// MARK: - Tweaking

fn tweak_scalar(internal: &XOnlyPublicKey) -> SignerResult<([u8; 32], Scalar)> {
    let t = tagged_hash(tags::TAP_TWEAK, &internal.serialize());
    // Probability of t >= n is negligible but it must not be reduced silently
    let scalar = Scalar::from_be_bytes(t)
        .map_err(|_| SignerError::crypto_error("TapTweak hash exceeds curve order"))?;
    Ok((t, scalar))
}

/// Tweak an internal key into the Taproot output key
pub fn tweak_for_output(internal: &XOnlyPublicKey) -> SignerResult<TaprootOutputKey> {
    let (tweak, scalar) = tweak_scalar(internal)?;
    let (output_key, parity) = internal
        .add_tweak(&SECP, &scalar)
        .map_err(|e| SignerError::crypto_error(format!("Output key tweak failed: {}", e)))?;

    Ok(TaprootOutputKey {
        output_key,
        parity: parity == Parity::Odd,
        tweak,
    })
}

/// Tweak a private key for key-path signing
///
/// d' = (d if P has even y, else n - d) + t mod n
///
/// The key must correspond to `internal`; a foreign key is rejected rather
/// than producing a signature nobody can verify.
pub fn tweak_private_key_for_signing(
    private_key: Option<&[u8]>,
    internal: &XOnlyPublicKey,
) -> SignerResult<Zeroizing<[u8; 32]>> {
    let mut keypair = tweaked_keypair(private_key, internal)?;
    let mut secret = SecretKey::from_keypair(&keypair);
    let tweaked = Zeroizing::new(secret.secret_bytes());
    secret.non_secure_erase();
    keypair.non_secure_erase();
    Ok(tweaked)
}

/// Same as `tweak_private_key_for_signing` but keeps the keypair form
pub(crate) fn tweaked_keypair(
    private_key: Option<&[u8]>,
    internal: &XOnlyPublicKey,
) -> SignerResult<Keypair> {
    let raw = private_key.ok_or_else(|| {
        SignerError::missing_private_key("Taproot signing requires a private key")
    })?;

    let mut secret = SecretKey::from_slice(raw)
        .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;
    let mut keypair = Keypair::from_secret_key(&SECP, &secret);
    secret.non_secure_erase();

    let (own_xonly, _) = keypair.x_only_public_key();
    if own_xonly != *internal {
        keypair.non_secure_erase();
        return Err(SignerError::key_mismatch(
            "Private key does not match the input's internal key",
        ));
    }

    let scalar = match tweak_scalar(internal) {
        Ok((_, scalar)) => scalar,
        Err(e) => {
            keypair.non_secure_erase();
            return Err(e);
        }
    };
    // add_xonly_tweak negates the secret first when P has odd y
    let tweaked = keypair.add_xonly_tweak(&SECP, &scalar);
    // Keypair is Copy, so the untweaked original is still live here
    keypair.non_secure_erase();
    tweaked.map_err(|e| SignerError::crypto_error(format!("Private key tweak failed: {}", e)))
}

// MARK: - Addresses

/// Segwit v1 (bech32m) address for a key-path-only output
pub fn taproot_address(internal: &XOnlyPublicKey, network: Network) -> String {
    Address::p2tr(&*SECP, *internal, None, network.to_bitcoin()).to_string()
}

// MARK: - Key Path Signing

/// Sign a BIP-341 sighash with the tweaked form of `private_key`
pub fn sign_key_path(sighash: &[u8; 32], private_key: &[u8]) -> SignerResult<SchnorrSig> {
    let mut secret = SecretKey::from_slice(private_key)
        .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;
    let (internal, _) = secret.x_only_public_key(&SECP);
    secret.non_secure_erase();

    let mut keypair = tweaked_keypair(Some(private_key), &internal)?;
    let signature = sign_digest(sighash, &keypair);
    keypair.non_secure_erase();
    Ok(signature)
}

/// Verify a key-path signature against the output key
pub fn verify_key_path(sighash: &[u8; 32], signature: &SchnorrSig, output_key: &XOnlyPublicKey) -> bool {
    verify_digest(sighash, signature, output_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::key::TapTweak;

    fn internal_from(secret: [u8; 32]) -> XOnlyPublicKey {
        SecretKey::from_slice(&secret).unwrap().x_only_public_key(&SECP).0
    }

    #[test]
    fn test_bip86_vector_first_receive_address() {
        // BIP86 test vector: m/86'/0'/0'/0/0 of the "abandon ... about" mnemonic
        let internal = XOnlyPublicKey::from_slice(
            &hex::decode("cc8a4bc64d897bddc5fbc2f670f7a8ba0b386779106cf1223c6fc5d7cd6fc115").unwrap(),
        )
        .unwrap();

        let out = tweak_for_output(&internal).unwrap();
        assert_eq!(
            out.to_hex(),
            "a60869f0dbcf1dc659c9cecbaf8050135ea9e8cdc487053f1dc6880949dc684c"
        );
        assert_eq!(
            taproot_address(&internal, Network::Mainnet),
            "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr"
        );
    }

    #[test]
    fn test_output_key_matches_bitcoin_crate() {
        let internal = internal_from([0x5a; 32]);
        let ours = tweak_for_output(&internal).unwrap();
        let (theirs, parity) = internal.tap_tweak(&SECP, None);
        assert_eq!(ours.output_key, theirs.to_inner());
        assert_eq!(ours.parity, parity == Parity::Odd);
    }

    #[test]
    fn test_tweaked_private_key_matches_output_key() {
        // Cover both parities of the internal key
        for seed in [[0x01u8; 32], [0x02; 32], [0x03; 32], [0x77; 32]] {
            let internal = internal_from(seed);
            let tweaked = tweak_private_key_for_signing(Some(&seed), &internal).unwrap();
            let tweaked_sk = SecretKey::from_slice(tweaked.as_ref()).unwrap();
            let (tweaked_xonly, _) = tweaked_sk.x_only_public_key(&SECP);
            assert_eq!(tweaked_xonly, tweak_for_output(&internal).unwrap().output_key);
        }
    }

    #[test]
    fn test_missing_private_key() {
        let internal = internal_from([0x01; 32]);
        let err = tweak_private_key_for_signing(None, &internal).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MissingPrivateKey);
    }

    #[test]
    fn test_foreign_key_rejected() {
        let internal = internal_from([0x01; 32]);
        let err = tweak_private_key_for_signing(Some(&[0x02; 32]), &internal).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::KeyMismatch);
    }

    #[test]
    fn test_address_prefix_per_network() {
        let internal = internal_from([0x09; 32]);
        assert!(taproot_address(&internal, Network::Mainnet).starts_with("bc1p"));
        assert!(taproot_address(&internal, Network::Testnet).starts_with("tb1p"));
        assert!(taproot_address(&internal, Network::Signet).starts_with("tb1p"));
        assert!(taproot_address(&internal, Network::Regtest).starts_with("bcrt1p"));
    }

    #[test]
    fn test_address_program_is_output_key() {
        let internal = internal_from([0x33; 32]);
        let addr: Address = taproot_address(&internal, Network::Mainnet)
            .parse::<Address<bitcoin::address::NetworkUnchecked>>()
            .unwrap()
            .assume_checked();
        let script = addr.script_pubkey();
        let bytes = script.as_bytes();
        assert_eq!(bytes[0], 0x51);
        assert_eq!(bytes[1], 0x20);
        assert_eq!(&bytes[2..], &tweak_for_output(&internal).unwrap().output_key.serialize());
    }

    #[test]
    fn test_sign_key_path_verifies_under_output_key() {
        let secret = [0x44u8; 32];
        let internal = internal_from(secret);
        let output = tweak_for_output(&internal).unwrap();

        let sighash = [0x10u8; 32];
        let sig = sign_key_path(&sighash, &secret).unwrap();
        assert!(verify_key_path(&sighash, &sig, &output.output_key));
        // The untweaked key must not verify
        assert!(!verify_key_path(&sighash, &sig, &internal));
    }

    #[test]
    fn test_parse_internal_key_forms() {
        let sk = SecretKey::from_slice(&[0x21; 32]).unwrap();
        let full = sk.public_key(&SECP);
        let (xonly, _) = full.x_only_public_key();
        assert_eq!(parse_internal_key(&full.serialize()).unwrap(), xonly);
        assert_eq!(parse_internal_key(&xonly.serialize()).unwrap(), xonly);
        assert!(parse_internal_key(&[0u8; 20]).is_err());
    }
}
