//! BIP-32 Hierarchical Key Derivation
//!
//! Walks the key tree from a seed, producing child private/public keys.
//! An invalid intermediate scalar fails the whole derivation with
//! `InvalidPrivateKeyFound`; the caller decides whether to move to the next
//! index.
//!
//! SECURITY: private keys and chain codes live in `Zeroizing` buffers and
//! are wiped on drop. `Debug` never prints them.

use crate::crypto::taproot::{taproot_address, tweak_for_output};
use crate::crypto::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::Network;
use crate::utils::crypto::hash160;
use crate::wallet::address::evm_address_from_public_key;
use crate::wallet::derivation_path::{coin_types, ChildNumber, DerivationPath};
use bitcoin::bip32::{self, ChainCode, Fingerprint, Xpriv, Xpub};
use bitcoin::NetworkKind;
use bitcoin::secp256k1::{PublicKey, Scalar, SecretKey, XOnlyPublicKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

const MASTER_HMAC_KEY: &[u8] = b"Bitcoin seed";
const MIN_SEED_LEN: usize = 16;
const MAX_SEED_LEN: usize = 64;

/// A node in the BIP-32 tree
#[derive(Clone)]
pub struct HdKey {
    private_key: Option<Zeroizing<[u8; 32]>>,
    public_key: PublicKey,
    chain_code: Zeroizing<[u8; 32]>,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_number: u32,
}

impl fmt::Debug for HdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKey")
            .field("public_key", &hex::encode(self.public_key.serialize()))
            .field("has_private_key", &self.private_key.is_some())
            .field("depth", &self.depth)
            .field("parent_fingerprint", &hex::encode(self.parent_fingerprint))
            .field("child_number", &ChildNumber::from_raw(self.child_number).to_string())
            .finish()
    }
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> SignerResult<Zeroizing<[u8; 64]>> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| SignerError::internal(format!("HMAC init failed: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn split_i(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>) {
    let mut il = Zeroizing::new([0u8; 32]);
    let mut ir = Zeroizing::new([0u8; 32]);
    il.copy_from_slice(&i[..32]);
    ir.copy_from_slice(&i[32..]);
    (il, ir)
}

impl HdKey {
    /// Master node from a 16..=64 byte seed
    pub fn from_seed(seed: &[u8]) -> SignerResult<Self> {
        if !(MIN_SEED_LEN..=MAX_SEED_LEN).contains(&seed.len()) {
            return Err(SignerError::invalid_seed_length(seed.len()));
        }

        let i = hmac_sha512(MASTER_HMAC_KEY, &[seed])?;
        let (il, ir) = split_i(&i);

        let mut secret = SecretKey::from_slice(il.as_ref()).map_err(|_| {
            SignerError::invalid_private_key("Master key is zero or not below the curve order")
        })?;
        let master = Self {
            private_key: Some(Zeroizing::new(secret.secret_bytes())),
            public_key: secret.public_key(&SECP),
            chain_code: ir,
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: 0,
        };
        secret.non_secure_erase();
        Ok(master)
    }

    /// Public-only node from its parts
    pub fn from_public_parts(
        public_key: PublicKey,
        chain_code: [u8; 32],
        depth: u8,
        parent_fingerprint: [u8; 4],
        child_number: u32,
    ) -> Self {
        Self {
            private_key: None,
            public_key,
            chain_code: Zeroizing::new(chain_code),
            depth,
            parent_fingerprint,
            child_number,
        }
    }

    /// Derive the child at `child`
    pub fn derive_child(&self, child: ChildNumber) -> SignerResult<Self> {
        let depth = self.depth.checked_add(1).ok_or_else(|| {
            SignerError::invalid_path("Derivation depth exceeds 255")
        })?;
        let index_bytes = child.to_raw().to_be_bytes();

        let i = if child.is_hardened() {
            let private_key = self.private_key.as_ref().ok_or_else(|| {
                SignerError::invalid_path(format!(
                    "Hardened child {} requires a private parent",
                    child
                ))
            })?;
            hmac_sha512(self.chain_code.as_ref(), &[&[0u8], private_key.as_ref(), &index_bytes])?
        } else {
            hmac_sha512(self.chain_code.as_ref(), &[&self.public_key.serialize(), &index_bytes])?
        };
        let (il, ir) = split_i(&i);

        let tweak = Scalar::from_be_bytes(*il).map_err(|_| {
            SignerError::invalid_private_key(format!("Derived IL at child {} is not below the curve order", child))
        })?;

        let (private_key, public_key) = match &self.private_key {
            Some(parent_key) => {
                let mut parent = SecretKey::from_slice(parent_key.as_ref())?;
                // SecretKey is Copy; add_tweak leaves `parent` intact
                let derived = parent.add_tweak(&tweak);
                parent.non_secure_erase();
                let mut derived = derived.map_err(|_| {
                    SignerError::invalid_private_key(format!("Derived key at child {} is zero", child))
                })?;
                let public = derived.public_key(&SECP);
                let private = Zeroizing::new(derived.secret_bytes());
                derived.non_secure_erase();
                (Some(private), public)
            }
            None => {
                let public = self.public_key.add_exp_tweak(&SECP, &tweak).map_err(|_| {
                    SignerError::invalid_private_key(format!(
                        "Derived public key at child {} is the point at infinity",
                        child
                    ))
                })?;
                (None, public)
            }
        };

        Ok(Self {
            private_key,
            public_key,
            chain_code: ir,
            depth,
            parent_fingerprint: self.fingerprint(),
            child_number: child.to_raw(),
        })
    }

    /// Derive every segment of `path` below this node
    pub fn derive_path(&self, path: &DerivationPath) -> SignerResult<Self> {
        path.components()
            .iter()
            .try_fold(self.clone(), |node, child| node.derive_child(*child))
    }

    /// Public-only copy of this node
    pub fn neuter(&self) -> Self {
        Self {
            private_key: None,
            ..self.clone()
        }
    }

    /// First 4 bytes of HASH160(public key)
    pub fn fingerprint(&self) -> [u8; 4] {
        let h = hash160(&self.public_key.serialize());
        [h[0], h[1], h[2], h[3]]
    }

    pub fn private_key(&self) -> Option<&[u8; 32]> {
        self.private_key.as_deref()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn public_key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }

    pub fn x_only_public_key(&self) -> XOnlyPublicKey {
        self.public_key.x_only_public_key().0
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    pub fn child_number(&self) -> ChildNumber {
        ChildNumber::from_raw(self.child_number)
    }

    /// Base58 `xprv`/`tprv` string
    pub fn to_xpriv(&self, network: Network) -> SignerResult<String> {
        let private_key = self
            .private_key
            .as_ref()
            .ok_or_else(|| SignerError::missing_private_key("Public-only node has no xprv"))?;

        let mut xpriv = Xpriv {
            network: NetworkKind::from(network.to_bitcoin()),
            depth: self.depth,
            parent_fingerprint: Fingerprint::from(self.parent_fingerprint),
            child_number: bip32::ChildNumber::from(self.child_number),
            private_key: SecretKey::from_slice(private_key.as_ref())?,
            chain_code: ChainCode::from(*self.chain_code),
        };
        let encoded = xpriv.to_string();
        xpriv.private_key.non_secure_erase();
        Ok(encoded)
    }

    /// Base58 `xpub`/`tpub` string
    pub fn to_xpub(&self, network: Network) -> String {
        Xpub {
            network: NetworkKind::from(network.to_bitcoin()),
            depth: self.depth,
            parent_fingerprint: Fingerprint::from(self.parent_fingerprint),
            child_number: bip32::ChildNumber::from(self.child_number),
            public_key: self.public_key,
            chain_code: ChainCode::from(*self.chain_code),
        }
        .to_string()
    }
}

/// Master node from `seed`, then walk `path`
pub fn derive(seed: &[u8], path: &DerivationPath) -> SignerResult<HdKey> {
    HdKey::from_seed(seed)?.derive_path(path)
}

// =============================================================================
// Account helpers
// =============================================================================

/// BIP86 Taproot account derived from a seed
pub struct TaprootAccount {
    pub path: DerivationPath,
    pub address: String,
    pub internal_key: XOnlyPublicKey,
    pub output_key: XOnlyPublicKey,
    pub private_key: Zeroizing<[u8; 32]>,
}

/// BIP44 EVM account derived from a seed
pub struct EvmAccount {
    pub path: DerivationPath,
    pub address: String,
    pub public_key: PublicKey,
    pub private_key: Zeroizing<[u8; 32]>,
}

fn take_private_key(node: &HdKey) -> SignerResult<Zeroizing<[u8; 32]>> {
    node.private_key()
        .map(|k| Zeroizing::new(*k))
        .ok_or_else(|| SignerError::internal("Seed-derived node lost its private key"))
}

/// `m/86'/0'/0'/{change}/{index}` key, internal key, and P2TR address
///
/// Coin type 0' is used on every network; `network` only selects the
/// address encoding.
pub fn derive_taproot_account(
    seed: &[u8],
    network: Network,
    change: u32,
    index: u32,
) -> SignerResult<TaprootAccount> {
    derive_taproot_account_with_coin(seed, network, coin_types::BITCOIN, change, index)
}

/// As `derive_taproot_account`, with an explicit BIP86 coin type
pub fn derive_taproot_account_with_coin(
    seed: &[u8],
    network: Network,
    coin_type: u32,
    change: u32,
    index: u32,
) -> SignerResult<TaprootAccount> {
    let path = DerivationPath::bip86(coin_type, 0, change, index)?;
    let node = derive(seed, &path)?;

    let internal_key = node.x_only_public_key();
    let output_key = tweak_for_output(&internal_key)?.output_key;

    Ok(TaprootAccount {
        address: taproot_address(&internal_key, network),
        internal_key,
        output_key,
        private_key: take_private_key(&node)?,
        path,
    })
}

/// `m/44'/60'/0'/0/{index}` key and checksummed address
pub fn derive_evm_account(seed: &[u8], index: u32) -> SignerResult<EvmAccount> {
    let path = DerivationPath::bip44_evm(0, index)?;
    let node = derive(seed, &path)?;

    Ok(EvmAccount {
        address: evm_address_from_public_key(node.public_key()),
        public_key: *node.public_key(),
        private_key: take_private_key(&node)?,
        path,
    })
}
