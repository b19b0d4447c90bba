//! Unified error types for the signing core
//!
//! Every public operation returns `SignerResult<T>`. Failures are local and
//! synchronous; nothing is retried and no partial transaction bytes escape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all signing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn invalid_seed_length(len: usize) -> Self {
        Self::new(
            ErrorCode::InvalidSeedLength,
            format!("Seed must be between 16 and 64 bytes, got {}", len),
        )
    }

    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDerivationPath, msg)
    }

    pub fn invalid_private_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPrivateKeyFound, msg)
    }

    pub fn missing_private_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::MissingPrivateKey, msg)
    }

    pub fn invalid_structure(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidTransactionStructure, msg)
    }

    pub fn unsupported_fee_model(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedFeeModel, msg)
    }

    pub fn serialization_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationFailed, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn key_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyMismatch, msg)
    }

    pub fn signing_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::SigningFailed, msg)
    }

    pub fn crypto_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::CryptoError, msg)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Key derivation
    InvalidSeedLength,
    InvalidDerivationPath,
    InvalidPrivateKeyFound,
    MissingPrivateKey,
    KeyMismatch,

    // Transaction construction
    InvalidTransactionStructure,
    UnsupportedFeeModel,
    SerializationFailed,
    SigningFailed,

    // Input errors
    InvalidInput,
    InvalidAddress,

    // Crypto / parse errors
    CryptoError,
    HexError,
    JsonError,
    ConfigError,

    // Internal
    Internal,
}

/// Result type alias for signing operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<std::io::Error> for SignerError {
    fn from(e: std::io::Error) -> Self {
        SignerError::new(ErrorCode::Internal, e.to_string())
    }
}

impl From<bitcoin::secp256k1::Error> for SignerError {
    fn from(e: bitcoin::secp256k1::Error) -> Self {
        SignerError::new(ErrorCode::CryptoError, format!("Secp256k1 error: {}", e))
    }
}

impl From<bitcoin::address::ParseError> for SignerError {
    fn from(e: bitcoin::address::ParseError) -> Self {
        SignerError::new(ErrorCode::InvalidAddress, format!("Address error: {}", e))
    }
}

impl From<bitcoin::psbt::Error> for SignerError {
    fn from(e: bitcoin::psbt::Error) -> Self {
        SignerError::new(ErrorCode::InvalidTransactionStructure, format!("PSBT error: {}", e))
    }
}

impl From<bitcoin::sighash::TaprootError> for SignerError {
    fn from(e: bitcoin::sighash::TaprootError) -> Self {
        SignerError::new(ErrorCode::SigningFailed, format!("Taproot sighash error: {}", e))
    }
}
