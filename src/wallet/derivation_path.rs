//! Key Derivation Paths
//!
//! Parses and renders BIP-32 paths such as `m/86'/0'/0'/0/0`, and builds the
//! two fixed conventions used by the signer:
//! - BIP86 Taproot: `m/86'/{coin}'/{account}'/{change}/{index}`
//! - BIP44 EVM: `m/44'/60'/{account}'/0/{index}`

use crate::error::SignerError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Standard BIP purposes
pub mod bip_purposes {
    pub const BIP44: u32 = 44; // EVM accounts
    pub const BIP86: u32 = 86; // Taproot (P2TR)
}

/// Coin types from SLIP-0044
pub mod coin_types {
    pub const BITCOIN: u32 = 0;
    pub const BITCOIN_TESTNET: u32 = 1;
    pub const ETHEREUM: u32 = 60;
}

/// Hardened offset for BIP-32 derivation
pub const HARDENED: u32 = 0x8000_0000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Derivation path must start with 'm'")]
    MissingRoot,
    #[error("Empty path component")]
    EmptyComponent,
    #[error("Invalid path component '{0}'")]
    InvalidComponent(String),
    #[error("Path index {0} exceeds 2^31 - 1")]
    IndexOutOfRange(u32),
    #[error("Derivation path deeper than 255 levels")]
    TooDeep,
}

impl From<PathError> for SignerError {
    fn from(e: PathError) -> Self {
        SignerError::invalid_path(e.to_string())
    }
}

/// One segment of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildNumber {
    index: u32,
    hardened: bool,
}

impl ChildNumber {
    pub fn normal(index: u32) -> Result<Self, PathError> {
        Self::new(index, false)
    }

    pub fn hardened(index: u32) -> Result<Self, PathError> {
        Self::new(index, true)
    }

    pub fn new(index: u32, hardened: bool) -> Result<Self, PathError> {
        if index >= HARDENED {
            return Err(PathError::IndexOutOfRange(index));
        }
        Ok(Self { index, hardened })
    }

    /// Decode from the raw 32-bit form where the top bit marks hardening
    pub fn from_raw(raw: u32) -> Self {
        Self {
            index: raw & !HARDENED,
            hardened: raw & HARDENED != 0,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// Full index including hardened bit, as serialized by `ser32(i)`
    pub fn to_raw(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED
        } else {
            self.index
        }
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

impl FromStr for ChildNumber {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PathError::EmptyComponent);
        }

        let (digits, hardened) = match trimmed.strip_suffix(['\'', 'h', 'H']) {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::InvalidComponent(s.to_string()));
        }

        let index: u32 = digits
            .parse()
            .map_err(|_| PathError::InvalidComponent(s.to_string()))?;

        ChildNumber::new(index, hardened)
    }
}

/// Parsed derivation path, root first
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    components: Vec<ChildNumber>,
}

impl DerivationPath {
    /// The master path `m`
    pub fn master() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<ChildNumber>) -> Result<Self, PathError> {
        if components.len() > u8::MAX as usize {
            return Err(PathError::TooDeep);
        }
        Ok(Self { components })
    }

    pub fn components(&self) -> &[ChildNumber] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Append a segment, returning a new path
    pub fn child(&self, child: ChildNumber) -> Result<Self, PathError> {
        let mut components = self.components.clone();
        components.push(child);
        Self::from_components(components)
    }

    /// BIP86 Taproot path `m/86'/{coin_type}'/{account}'/{change}/{index}`
    ///
    /// Wallets use `coin_types::BITCOIN` on every network; pass
    /// `coin_types::BITCOIN_TESTNET` only for SLIP-44 style test accounts.
    pub fn bip86(coin_type: u32, account: u32, change: u32, index: u32) -> Result<Self, PathError> {
        Self::from_components(vec![
            ChildNumber::hardened(bip_purposes::BIP86)?,
            ChildNumber::hardened(coin_type)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(change)?,
            ChildNumber::normal(index)?,
        ])
    }

    /// BIP44 EVM account path
    pub fn bip44_evm(account: u32, index: u32) -> Result<Self, PathError> {
        Self::from_components(vec![
            ChildNumber::hardened(bip_purposes::BIP44)?,
            ChildNumber::hardened(coin_types::ETHEREUM)?,
            ChildNumber::hardened(account)?,
            ChildNumber::normal(0)?,
            ChildNumber::normal(index)?,
        ])
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let trimmed = path.trim();

        let rest = trimmed
            .strip_prefix('m')
            .or_else(|| trimmed.strip_prefix('M'))
            .ok_or(PathError::MissingRoot)?;

        if rest.is_empty() {
            return Ok(Self::master());
        }

        let body = rest.strip_prefix('/').ok_or(PathError::MissingRoot)?;
        let components = body
            .split('/')
            .map(ChildNumber::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_components(components)
    }
}
