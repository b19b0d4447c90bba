//! Shared types for the signing core
//!
//! Data structures that cross module boundaries are defined here
//! for consistent serialization.

use serde::{Deserialize, Serialize};

// =============================================================================
// Network Types
// =============================================================================

/// Bitcoin network a key, address, or transaction belongs to.
///
/// Always passed explicitly; nothing in the crate assumes mainnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl Network {
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Signet => bitcoin::Network::Signet,
            Network::Regtest => bitcoin::Network::Regtest,
        }
    }
}

impl std::str::FromStr for Network {
    type Err = crate::error::SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "signet" => Ok(Network::Signet),
            "regtest" => Ok(Network::Regtest),
            other => Err(crate::error::SignerError::invalid_input(format!(
                "Unknown network: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Signet => "signet",
            Network::Regtest => "regtest",
        };
        f.write_str(name)
    }
}

/// Chain family a signed transaction belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Bitcoin,
    Evm,
}

// =============================================================================
// Transaction Types
// =============================================================================

/// Broadcast-ready signed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub chain: ChainKind,
    /// Raw transaction hex (`0x`-prefixed for EVM)
    pub raw_tx: String,
    /// Transaction id / hash as displayed by explorers
    pub txid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse_and_display() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("Bitcoin".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("signet".parse::<Network>().unwrap(), Network::Signet);
        assert!("dogecoin".parse::<Network>().is_err());
        assert_eq!(Network::Regtest.to_string(), "regtest");
    }
}
