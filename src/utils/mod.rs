//! Utilities Module
//!
//! Hash helpers and redacting logger shared across the crate.

pub mod crypto;
pub mod logging;

pub use crypto::*;
