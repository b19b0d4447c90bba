//! Transaction Module
//!
//! Building and signing for the two supported chain families:
//! - **bitcoin**: Taproot key-path PSBT build, sign, finalize
//! - **evm**: legacy (EIP-155) and EIP-1559 RLP build and sign
//! - **request**: JSON request documents for both
//!
//! `rlp` and `amount` are the encoding and unit-scaling helpers the EVM
//! side is built on.

pub mod amount;
pub mod bitcoin;
pub mod evm;
pub mod request;
pub mod rlp;

pub use amount::{format_units, parse_units, AmountError};
pub use request::{BitcoinSignRequest, EvmSignRequest};
