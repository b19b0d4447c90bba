//! Cryptographic primitives for the signing core
//!
//! - BIP-340 tagged hashes and Schnorr sign/verify helpers
//! - BIP-341 Taproot key tweaking (public and private side)
//!
//! All curve arithmetic goes through one process-wide `Secp256k1` context.

pub mod schnorr;
pub mod taproot;

use bitcoin::secp256k1::{All, Secp256k1};

lazy_static::lazy_static! {
    /// Shared signing/verification context, read-only after creation
    pub static ref SECP: Secp256k1<All> = Secp256k1::new();
}

pub use schnorr::*;
pub use taproot::*;
