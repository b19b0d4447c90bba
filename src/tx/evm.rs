//! EVM Transaction Builder
//!
//! Legacy (EIP-155) and EIP-1559 (type 2) transactions, RLP encoded and
//! signed with recoverable ECDSA. ERC20 `transfer(address,uint256)` is the
//! only contract call encoded here.

use super::rlp::{self, RlpList};
use crate::config::SignerConfig;
use crate::crypto::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::{ChainKind, SignedTransaction};
use crate::utils::crypto::{keccak256, to_checksum_address};
use crate::wallet::address::{evm_address_bytes, parse_evm_address};
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::U256;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, SecretKey};

const MODULE: &str = "tx::evm";

/// `transfer(address,uint256)` selector
pub const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// EIP-2718 type byte for EIP-1559 transactions
pub const EIP1559_TX_TYPE: u8 = 0x02;

// =============================================================================
// Request Types
// =============================================================================

/// How the transaction pays for gas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeModel {
    Legacy {
        gas_price: U256,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
}

impl FeeModel {
    /// Pick the fee model from optional gas fields
    ///
    /// Both EIP-1559 fields present and non-zero select type 2; otherwise a
    /// gas price selects legacy.
    pub fn resolve(
        gas_price: Option<U256>,
        max_fee_per_gas: Option<U256>,
        max_priority_fee_per_gas: Option<U256>,
    ) -> SignerResult<Self> {
        match (max_fee_per_gas, max_priority_fee_per_gas, gas_price) {
            (Some(max_fee), Some(priority), _) if !max_fee.is_zero() && !priority.is_zero() => {
                if priority > max_fee {
                    return Err(SignerError::unsupported_fee_model(format!(
                        "Priority fee {} exceeds max fee {}",
                        priority, max_fee
                    )));
                }
                Ok(FeeModel::Eip1559 {
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority,
                })
            }
            (_, _, Some(gas_price)) => Ok(FeeModel::Legacy { gas_price }),
            _ => Err(SignerError::unsupported_fee_model(
                "Neither gas_price nor max_fee_per_gas/max_priority_fee_per_gas given",
            )),
        }
    }
}

/// What goes into the data field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallData {
    None,
    /// Caller-supplied bytes, sent with the request's `to` and `value`
    Explicit(Vec<u8>),
    /// ERC20 transfer of `value` to `to`, sent to `contract` with zero ETH
    TokenTransfer { contract: [u8; 20] },
}

impl CallData {
    /// Resolve call data once; explicit bytes win over a token address
    pub fn resolve(token_address: Option<&str>, explicit: Option<Vec<u8>>) -> SignerResult<Self> {
        if let Some(data) = explicit.filter(|d| !d.is_empty()) {
            return Ok(CallData::Explicit(data));
        }

        match token_address.map(str::trim) {
            Some(token) if !is_placeholder_address(token) => Ok(CallData::TokenTransfer {
                contract: parse_evm_address(token)?,
            }),
            _ => Ok(CallData::None),
        }
    }
}

/// Empty strings and all-zero stubs such as `0x00` mean "no token"
fn is_placeholder_address(value: &str) -> bool {
    let body = value.strip_prefix("0x").unwrap_or(value);
    body.chars().all(|c| c == '0')
}

/// Strongly typed transaction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvmTxRequest {
    pub nonce: u64,
    pub from: [u8; 20],
    /// Recipient; for token transfers this is the token recipient
    pub to: [u8; 20],
    /// Wei, or token base units for token transfers
    pub value: U256,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub call: CallData,
    pub fee: FeeModel,
}

impl EvmTxRequest {
    pub fn builder() -> EvmTxRequestBuilder {
        EvmTxRequestBuilder::default()
    }
}

/// Collects loosely specified fields and resolves them once in `build`
#[derive(Debug, Clone, Default)]
pub struct EvmTxRequestBuilder {
    nonce: u64,
    from: Option<String>,
    to: Option<String>,
    value: U256,
    gas_limit: u64,
    chain_id: u64,
    gas_price: Option<U256>,
    max_fee_per_gas: Option<U256>,
    max_priority_fee_per_gas: Option<U256>,
    token_address: Option<String>,
    call_data: Option<Vec<u8>>,
}

impl EvmTxRequestBuilder {
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn max_fee_per_gas(mut self, fee: U256) -> Self {
        self.max_fee_per_gas = Some(fee);
        self
    }

    pub fn max_priority_fee_per_gas(mut self, fee: U256) -> Self {
        self.max_priority_fee_per_gas = Some(fee);
        self
    }

    pub fn token_address(mut self, token: impl Into<String>) -> Self {
        self.token_address = Some(token.into());
        self
    }

    pub fn call_data(mut self, data: Vec<u8>) -> Self {
        self.call_data = Some(data);
        self
    }

    pub fn build(self) -> SignerResult<EvmTxRequest> {
        let from = self
            .from
            .as_deref()
            .ok_or_else(|| SignerError::invalid_input("Missing from address"))?;
        let to = self
            .to
            .as_deref()
            .ok_or_else(|| SignerError::invalid_input("Missing to address"))?;

        Ok(EvmTxRequest {
            nonce: self.nonce,
            from: parse_evm_address(from)?,
            to: parse_evm_address(to)?,
            value: self.value,
            gas_limit: self.gas_limit,
            chain_id: self.chain_id,
            call: CallData::resolve(self.token_address.as_deref(), self.call_data)?,
            fee: FeeModel::resolve(
                self.gas_price,
                self.max_fee_per_gas,
                self.max_priority_fee_per_gas,
            )?,
        })
    }
}

// =============================================================================
// Unsigned Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmTxType {
    Legacy,
    Eip1559,
}

/// Wire-level fields after call data has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvmTx {
    pub nonce: u64,
    pub from: [u8; 20],
    pub to: [u8; 20],
    pub value: U256,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub fee: FeeModel,
}

/// ABI encoding of `transfer(recipient, amount)`
pub fn encode_erc20_transfer(recipient: &[u8; 20], amount: U256) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(recipient);
    let mut amount_word = [0u8; 32];
    amount.to_big_endian(&mut amount_word);
    data.extend_from_slice(&amount_word);
    data
}

/// Apply call data and validate the request
pub fn build(request: EvmTxRequest) -> SignerResult<UnsignedEvmTx> {
    if request.gas_limit == 0 {
        return Err(SignerError::invalid_structure("gas_limit must be positive"));
    }
    if request.chain_id == 0 && matches!(request.fee, FeeModel::Eip1559 { .. }) {
        return Err(SignerError::unsupported_fee_model(
            "EIP-1559 transactions require a non-zero chain id",
        ));
    }

    let (to, value, data) = match request.call {
        CallData::None => (request.to, request.value, Vec::new()),
        CallData::Explicit(data) => (request.to, request.value, data),
        CallData::TokenTransfer { contract } => (
            contract,
            U256::zero(),
            encode_erc20_transfer(&request.to, request.value),
        ),
    };

    let tx = UnsignedEvmTx {
        nonce: request.nonce,
        from: request.from,
        to,
        value,
        data,
        gas_limit: request.gas_limit,
        chain_id: request.chain_id,
        fee: request.fee,
    };

    log_debug!(
        MODULE,
        "Built unsigned EVM transaction",
        tx_type = format!("{:?}", tx.tx_type()),
        chain_id = tx.chain_id,
        nonce = tx.nonce,
        data_len = tx.data.len(),
    );

    Ok(tx)
}

impl UnsignedEvmTx {
    pub fn tx_type(&self) -> EvmTxType {
        match self.fee {
            FeeModel::Legacy { .. } => EvmTxType::Legacy,
            FeeModel::Eip1559 { .. } => EvmTxType::Eip1559,
        }
    }

    /// Fields shared by the unsigned and signed legacy payloads
    fn legacy_fields(&self, gas_price: U256) -> RlpList {
        RlpList::new()
            .u64(self.nonce)
            .u256(gas_price)
            .u64(self.gas_limit)
            .bytes(&self.to)
            .u256(self.value)
            .bytes(&self.data)
    }

    fn eip1559_fields(&self, max_fee: U256, priority: U256) -> RlpList {
        RlpList::new()
            .u64(self.chain_id)
            .u64(self.nonce)
            .u256(priority)
            .u256(max_fee)
            .u64(self.gas_limit)
            .bytes(&self.to)
            .u256(self.value)
            .bytes(&self.data)
            // Empty access list
            .raw(rlp::encode_list(&[]))
    }

    /// Bytes whose keccak256 is signed
    pub fn signing_payload(&self) -> Vec<u8> {
        match self.fee {
            FeeModel::Legacy { gas_price } => {
                let fields = self.legacy_fields(gas_price);
                if self.chain_id == 0 {
                    fields.finish()
                } else {
                    fields.u64(self.chain_id).u64(0).u64(0).finish()
                }
            }
            FeeModel::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut out = vec![EIP1559_TX_TYPE];
                out.extend(self.eip1559_fields(max_fee_per_gas, max_priority_fee_per_gas).finish());
                out
            }
        }
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    fn encode_signed(&self, signature: &EvmSignature) -> Vec<u8> {
        match self.fee {
            FeeModel::Legacy { gas_price } => self
                .legacy_fields(gas_price)
                .u64(signature.v)
                .u256(signature.r)
                .u256(signature.s)
                .finish(),
            FeeModel::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut out = vec![EIP1559_TX_TYPE];
                out.extend(
                    self.eip1559_fields(max_fee_per_gas, max_priority_fee_per_gas)
                        .u64(signature.v)
                        .u256(signature.r)
                        .u256(signature.s)
                        .finish(),
                );
                out
            }
        }
    }
}

// =============================================================================
// Signing
// =============================================================================

/// ECDSA signature with the chain-specific `v`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvmSignature {
    /// EIP-155 `v`, `27/28` pre-EIP-155, or the y-parity for type 2
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub recovery_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEvmTx {
    tx: UnsignedEvmTx,
    signature: EvmSignature,
    raw: Vec<u8>,
}

impl SignedEvmTx {
    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    /// keccak256 of the raw bytes, as shown by explorers
    pub fn tx_hash(&self) -> String {
        format!("0x{}", hex::encode(keccak256(&self.raw)))
    }

    pub fn signature(&self) -> &EvmSignature {
        &self.signature
    }

    pub fn unsigned(&self) -> &UnsignedEvmTx {
        &self.tx
    }

    /// Recover the signing address from the signature
    pub fn recover_signer(&self) -> SignerResult<String> {
        let recovery_id = RecoveryId::from_i32(i32::from(self.signature.recovery_id))
            .map_err(|e| SignerError::crypto_error(format!("Bad recovery id: {}", e)))?;

        let mut compact = [0u8; 64];
        self.signature.r.to_big_endian(&mut compact[..32]);
        self.signature.s.to_big_endian(&mut compact[32..]);

        let sig = RecoverableSignature::from_compact(&compact, recovery_id)?;
        let msg = Message::from_digest(self.tx.signing_hash());
        let public_key = SECP.recover_ecdsa(&msg, &sig)?;
        Ok(to_checksum_address(&evm_address_bytes(&public_key)))
    }

    pub fn into_signed_transaction(self) -> SignedTransaction {
        SignedTransaction {
            chain: ChainKind::Evm,
            raw_tx: self.to_hex(),
            txid: self.tx_hash(),
        }
    }
}

fn v_value(tx: &UnsignedEvmTx, recovery_id: u8) -> SignerResult<u64> {
    let recid = u64::from(recovery_id);
    match tx.tx_type() {
        EvmTxType::Eip1559 => Ok(recid),
        EvmTxType::Legacy if tx.chain_id == 0 => Ok(recid + 27),
        EvmTxType::Legacy => tx
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + recid))
            .ok_or_else(|| SignerError::invalid_structure("chain_id too large for EIP-155 v")),
    }
}

/// Sign with the default configuration (signer must equal `from`)
pub fn sign(tx: UnsignedEvmTx, private_key: &[u8]) -> SignerResult<SignedEvmTx> {
    sign_with_config(tx, private_key, &SignerConfig::default())
}

pub fn sign_with_config(
    tx: UnsignedEvmTx,
    private_key: &[u8],
    config: &SignerConfig,
) -> SignerResult<SignedEvmTx> {
    let mut secret = SecretKey::from_slice(private_key)
        .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;

    let signer = evm_address_bytes(&secret.public_key(&SECP));
    if signer != tx.from {
        if config.evm.require_from_match {
            secret.non_secure_erase();
            return Err(SignerError::key_mismatch(format!(
                "Key controls {}, transaction is from {}",
                to_checksum_address(&signer),
                to_checksum_address(&tx.from)
            )));
        }
        log_warn!(
            MODULE,
            "Signing key differs from the from address",
            signer_address = to_checksum_address(&signer),
        );
    }

    let msg = Message::from_digest(tx.signing_hash());
    let (recovery_id, compact) = SECP.sign_ecdsa_recoverable(&msg, &secret).serialize_compact();
    secret.non_secure_erase();
    let recovery_id = u8::try_from(recovery_id.to_i32())
        .map_err(|_| SignerError::signing_failed("Recovery id out of range"))?;

    let signature = EvmSignature {
        v: v_value(&tx, recovery_id)?,
        r: U256::from_big_endian(&compact[..32]),
        s: U256::from_big_endian(&compact[32..]),
        recovery_id,
    };

    let raw = tx.encode_signed(&signature);
    if raw.is_empty() {
        return Err(SignerError::serialization_failed("Encoder produced no output"));
    }

    let signed = SignedEvmTx { tx, signature, raw };
    log_info!(
        MODULE,
        "Signed EVM transaction",
        tx_hash = signed.tx_hash(),
        chain_id = signed.tx.chain_id,
    );
    Ok(signed)
}
