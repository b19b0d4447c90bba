//! BIP-340 Schnorr Helpers
//!
//! Tagged hashes for domain separation and deterministic (no aux rand)
//! Schnorr signing over 32-byte digests.
//!
//! Reference: https://github.com/bitcoin/bips/blob/master/bip-0340.mediawiki

use super::SECP;
use crate::error::{SignerError, SignerResult};
use bitcoin::secp256k1::{schnorr::Signature as SchnorrSignature, Keypair, Message, XOnlyPublicKey};
use sha2::{Digest, Sha256};

// MARK: - Tagged Hash Functions

/// BIP-340 tagged hash
///
/// tagged_hash(tag, msg) = SHA256(SHA256(tag) || SHA256(tag) || msg)
pub fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());

    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(msg);
    hasher.finalize().into()
}

/// Tags used by the Taproot key path
pub mod tags {
    pub const TAP_TWEAK: &str = "TapTweak";
    pub const TAP_SIGHASH: &str = "TapSighash";
}

// MARK: - Signature Type

/// Schnorr signature (64 bytes: 32-byte R + 32-byte s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchnorrSig(pub [u8; 64]);

impl serde::Serialize for SchnorrSig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> serde::Deserialize<'de> for SchnorrSig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        <[u8; 64]>::try_from(bytes.as_slice())
            .map(SchnorrSig)
            .map_err(|_| serde::de::Error::custom("expected 64 bytes"))
    }
}

impl SchnorrSig {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_secp256k1(&self) -> SignerResult<SchnorrSignature> {
        SchnorrSignature::from_slice(&self.0)
            .map_err(|e| SignerError::crypto_error(format!("Invalid Schnorr signature: {}", e)))
    }
}

impl From<SchnorrSignature> for SchnorrSig {
    fn from(sig: SchnorrSignature) -> Self {
        Self(*sig.as_ref())
    }
}

// MARK: - Sign / Verify

/// Sign a 32-byte digest without auxiliary randomness
pub fn sign_digest(digest: &[u8; 32], keypair: &Keypair) -> SchnorrSig {
    let msg = Message::from_digest(*digest);
    SchnorrSig::from(SECP.sign_schnorr_no_aux_rand(&msg, keypair))
}

/// Verify a BIP-340 signature; malformed signatures verify as false
pub fn verify_digest(digest: &[u8; 32], signature: &SchnorrSig, public_key: &XOnlyPublicKey) -> bool {
    let Ok(sig) = signature.to_secp256k1() else {
        return false;
    };
    let msg = Message::from_digest(*digest);
    SECP.verify_schnorr(&sig, &msg, public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    #[test]
    fn test_tagged_hash_matches_bitcoin_crate() {
        use bitcoin::hashes::Hash;
        use bitcoin::taproot::TapTweakHash;

        // TapTweakHash is the same tagged construction under "TapTweak"
        let key = [0x42u8; 32];
        let ours = tagged_hash(tags::TAP_TWEAK, &key);
        let engine_hash = TapTweakHash::hash(&key).to_byte_array();
        assert_eq!(ours, engine_hash);
    }

    #[test]
    fn test_sign_and_verify() {
        let sk = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let keypair = Keypair::from_secret_key(&SECP, &sk);
        let (xonly, _) = keypair.x_only_public_key();

        let digest = [0xabu8; 32];
        let sig = sign_digest(&digest, &keypair);
        assert!(verify_digest(&digest, &sig, &xonly));

        // Deterministic: same key and digest give the same signature
        assert_eq!(sig, sign_digest(&digest, &keypair));

        let other = [0xacu8; 32];
        assert!(!verify_digest(&other, &sig, &xonly));
    }

    #[test]
    fn test_sig_serde_hex() {
        let sig = SchnorrSig([7u8; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(64)));
        let back: SchnorrSig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
        assert!(serde_json::from_str::<SchnorrSig>("\"0707\"").is_err());
    }
}
