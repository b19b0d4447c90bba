//! Wallet Module
//!
//! Hierarchical key derivation, derivation paths, and address helpers.

pub mod address;
pub mod derivation;
pub mod derivation_path;

pub use address::*;
pub use derivation::*;
pub use derivation_path::*;
