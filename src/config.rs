//! Signer Configuration
//!
//! Transaction-building knobs loaded from JSON (file or string). Every field
//! has a default, so an empty object `{}` is a valid configuration.

use crate::error::{SignerError, SignerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sequence value that signals BIP125 replaceability
pub const SEQUENCE_RBF: u32 = 0xffff_fffd;
/// Final sequence, RBF disabled
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    pub bitcoin: BitcoinConfig,
    pub evm: EvmConfig,
}

/// Bitcoin transaction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// Transaction version field (1 or 2)
    pub tx_version: i32,
    /// Signal replace-by-fee on every input
    pub enable_rbf: bool,
    /// nLockTime, 0 for none
    pub lock_time: u32,
    /// Refuse to build a transaction paying more than this (sat/vB)
    pub max_fee_rate_sat_vb: Option<u64>,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            tx_version: 2,
            enable_rbf: true,
            lock_time: 0,
            max_fee_rate_sat_vb: Some(1_000),
        }
    }
}

impl BitcoinConfig {
    pub fn sequence(&self) -> u32 {
        if self.enable_rbf {
            SEQUENCE_RBF
        } else {
            SEQUENCE_FINAL
        }
    }
}

/// EVM transaction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvmConfig {
    /// Reject signing when the key's address differs from `from`
    pub require_from_match: bool,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            require_from_match: true,
        }
    }
}

impl SignerConfig {
    pub fn from_json_str(json: &str) -> SignerResult<Self> {
        let config: SignerConfig = serde_json::from_str(json)
            .map_err(|e| SignerError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SignerResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SignerError::config_error(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> SignerResult<()> {
        if !matches!(self.bitcoin.tx_version, 1 | 2) {
            return Err(SignerError::config_error(format!(
                "Unsupported transaction version {}",
                self.bitcoin.tx_version
            )));
        }

        if self.bitcoin.max_fee_rate_sat_vb == Some(0) {
            return Err(SignerError::config_error(
                "max_fee_rate_sat_vb must be positive when set",
            ));
        }

        Ok(())
    }
}
