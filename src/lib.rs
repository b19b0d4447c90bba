//! Wallet Signing Core
//!
//! Offline key derivation and transaction signing for Bitcoin Taproot and
//! EVM chains.
//!
//! # Architecture
//!
//! This crate provides:
//! - **wallet**: BIP32 derivation, BIP44/BIP86 paths, address helpers
//! - **crypto**: BIP340 Schnorr and BIP341 Taproot tweaking
//! - **tx**: Taproot PSBT and EVM transaction build/sign
//! - **config**: Signing policy loaded from JSON
//!
//! Nothing here touches the network. Inputs are plain data in, signed
//! broadcast-ready bytes out.
//!
//! # Security
//!
//! Seeds, private keys, and tweaked keys live in `zeroize::Zeroizing`
//! buffers and are wiped when dropped. The logger redacts secret fields.
//!
//! # Example
//!
//! ```rust,ignore
//! use wallet_sign_core::{wallet, Network};
//!
//! let account = wallet::derive_taproot_account(&seed, Network::Mainnet, 0, 0)?;
//! println!("Taproot address: {}", account.address);
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod tx;
pub mod types;
pub mod utils;
pub mod wallet;

pub use config::SignerConfig;
pub use error::{ErrorCode, SignerError, SignerResult};
pub use types::{ChainKind, Network, SignedTransaction};
