//! JSON Signing Requests
//!
//! Loosely typed request documents (camelCase keys, numbers or strings for
//! quantities) converted exactly once into the typed builder inputs.

use super::amount::parse_units;
use super::bitcoin::{self as btc, BitcoinInput, BitcoinOutput, Destination, SingleKey};
use super::evm::{self, EvmTxRequest};
use crate::config::SignerConfig;
use crate::crypto::taproot::{parse_internal_key, tweak_for_output};
use crate::crypto::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::{Network, SignedTransaction};
use crate::utils::crypto::decode_hex_prefixed;
use ethers_core::types::U256;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Integer given either as a JSON number or a decimal / `0x` hex string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(u64),
    Text(String),
}

impl Quantity {
    pub fn to_u256(&self) -> SignerResult<U256> {
        match self {
            Quantity::Number(n) => Ok(U256::from(*n)),
            Quantity::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x") {
                    Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok(),
                    None => U256::from_dec_str(s).ok(),
                };
                parsed.ok_or_else(|| SignerError::invalid_input(format!("Invalid quantity '{}'", s)))
            }
        }
    }
}

fn decode_private_key(hex_key: &str) -> SignerResult<Zeroizing<[u8; 32]>> {
    let raw = Zeroizing::new(decode_hex_prefixed(hex_key).map_err(|_| {
        SignerError::invalid_private_key("Private key is not valid hex")
    })?);
    let mut secret = SecretKey::from_slice(&raw)
        .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;
    let key = Zeroizing::new(secret.secret_bytes());
    secret.non_secure_erase();
    Ok(key)
}

// =============================================================================
// EVM
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmSignRequest {
    /// Hex private key, `0x` optional
    pub private_key: String,
    pub nonce: u64,
    pub from: String,
    pub to: String,
    pub gas_limit: u64,
    /// Human-readable amount, scaled by `decimal`
    pub amount: String,
    #[serde(default = "default_decimal")]
    pub decimal: u32,
    pub chain_id: u64,
    #[serde(default)]
    pub gas_price: Option<Quantity>,
    #[serde(default)]
    pub max_fee_per_gas: Option<Quantity>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<Quantity>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub call_data: Option<String>,
}

fn default_decimal() -> u32 {
    18
}

fn optional_quantity(q: &Option<Quantity>) -> SignerResult<Option<U256>> {
    q.as_ref().map(Quantity::to_u256).transpose()
}

impl EvmSignRequest {
    pub fn to_tx_request(&self) -> SignerResult<EvmTxRequest> {
        let value = parse_units(&self.amount, self.decimal)?;

        let mut builder = EvmTxRequest::builder()
            .nonce(self.nonce)
            .from(self.from.as_str())
            .to(self.to.as_str())
            .value(value)
            .gas_limit(self.gas_limit)
            .chain_id(self.chain_id);

        if let Some(gas_price) = optional_quantity(&self.gas_price)? {
            builder = builder.gas_price(gas_price);
        }
        if let Some(max_fee) = optional_quantity(&self.max_fee_per_gas)? {
            builder = builder.max_fee_per_gas(max_fee);
        }
        if let Some(priority) = optional_quantity(&self.max_priority_fee_per_gas)? {
            builder = builder.max_priority_fee_per_gas(priority);
        }
        if let Some(token) = &self.token_address {
            builder = builder.token_address(token.as_str());
        }
        if let Some(data) = self.call_data.as_deref().filter(|d| !d.trim().is_empty()) {
            let bytes = decode_hex_prefixed(data)
                .map_err(|e| SignerError::invalid_input(format!("Invalid call data: {}", e)))?;
            builder = builder.call_data(bytes);
        }

        builder.build()
    }

    pub fn sign(&self, config: &SignerConfig) -> SignerResult<SignedTransaction> {
        let key = decode_private_key(&self.private_key)?;
        let unsigned = evm::build(self.to_tx_request()?)?;
        Ok(evm::sign_with_config(unsigned, key.as_ref(), config)?.into_signed_transaction())
    }
}

// =============================================================================
// Bitcoin
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinInputRequest {
    pub txid: String,
    #[serde(alias = "index")]
    pub vout: u32,
    /// Satoshis
    pub amount: u64,
    /// Hex script being spent; defaults to the key-path P2TR script
    #[serde(default, alias = "output")]
    pub script_pubkey: Option<String>,
    /// Hex signer key; defaults to the request's private key
    #[serde(default)]
    pub public_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinOutputRequest {
    /// Satoshis
    #[serde(alias = "value")]
    pub amount: u64,
    #[serde(default, alias = "sendAddress")]
    pub address: Option<String>,
    /// Hex script, used when no address is given
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitcoinSignRequest {
    pub private_key: String,
    pub network: Network,
    pub inputs: Vec<BitcoinInputRequest>,
    #[serde(alias = "output")]
    pub outputs: Vec<BitcoinOutputRequest>,
}

fn p2tr_script_for(signer_key: &[u8]) -> SignerResult<Vec<u8>> {
    let internal = parse_internal_key(signer_key)?;
    let output_key = tweak_for_output(&internal)?.output_key;
    let mut script = Vec::with_capacity(34);
    script.push(0x51); // OP_1
    script.push(0x20);
    script.extend_from_slice(&output_key.serialize());
    Ok(script)
}

impl BitcoinSignRequest {
    /// Builder inputs and outputs, with defaults filled from `private_key`
    pub fn to_parts(&self) -> SignerResult<(Vec<BitcoinInput>, Vec<BitcoinOutput>)> {
        let key = decode_private_key(&self.private_key)?;
        let mut secret = SecretKey::from_slice(key.as_ref())?;
        let own_public = secret.public_key(&SECP).serialize().to_vec();
        secret.non_secure_erase();

        let inputs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let signer_public_key = match &input.public_key {
                    Some(pk) => decode_hex_prefixed(pk).map_err(|e| {
                        SignerError::invalid_input(format!("Input {} public key: {}", index, e))
                    })?,
                    None => own_public.clone(),
                };
                let script_pubkey = match &input.script_pubkey {
                    Some(script) => decode_hex_prefixed(script).map_err(|e| {
                        SignerError::invalid_input(format!("Input {} script: {}", index, e))
                    })?,
                    None => p2tr_script_for(&signer_public_key).map_err(|e| {
                        SignerError::invalid_structure(format!("Input {}: {}", index, e.message))
                    })?,
                };
                Ok(BitcoinInput {
                    txid: input.txid.clone(),
                    vout: input.vout,
                    value_sats: input.amount,
                    script_pubkey,
                    signer_public_key,
                })
            })
            .collect::<SignerResult<Vec<_>>>()?;

        let outputs = self
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let destination = match (&output.address, &output.script) {
                    (Some(address), _) => Destination::Address(address.clone()),
                    (None, Some(script)) => Destination::Script(decode_hex_prefixed(script).map_err(|e| {
                        SignerError::invalid_input(format!("Output {} script: {}", index, e))
                    })?),
                    (None, None) => {
                        return Err(SignerError::invalid_structure(format!(
                            "Output {} needs an address or a script",
                            index
                        )))
                    }
                };
                Ok(BitcoinOutput {
                    value_sats: output.amount,
                    destination,
                })
            })
            .collect::<SignerResult<Vec<_>>>()?;

        Ok((inputs, outputs))
    }

    /// Build and sign every input with the request's single key
    pub fn sign(&self, config: &SignerConfig) -> SignerResult<SignedTransaction> {
        let (inputs, outputs) = self.to_parts()?;
        let key = decode_private_key(&self.private_key)?;
        let unsigned = btc::build(&inputs, &outputs, self.network, config)?;
        let signed = btc::sign(unsigned, &SingleKey::new(key.as_ref())?)?;
        Ok(signed.into_signed_transaction())
    }
}
