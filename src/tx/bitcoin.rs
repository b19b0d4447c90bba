//! Bitcoin Taproot Transaction Builder
//!
//! Builds a PSBT from explicit inputs and outputs, signs every input with a
//! BIP-341 key-path Schnorr signature, and extracts the final segwit
//! transaction. Inputs and outputs keep the caller's order.

use crate::config::SignerConfig;
use crate::crypto::schnorr::sign_digest;
use crate::crypto::taproot::{parse_internal_key, tweaked_keypair};
use crate::crypto::SECP;
use crate::error::{SignerError, SignerResult};
use crate::types::{ChainKind, Network, SignedTransaction};
use crate::wallet::address::parse_bitcoin_address;
use crate::{log_debug, log_info};
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::psbt::Psbt;
use bitcoin::secp256k1::{SecretKey, XOnlyPublicKey};
use bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use bitcoin::transaction::Version;
use bitcoin::{taproot, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use std::collections::HashMap;
use std::str::FromStr;
use zeroize::Zeroizing;

const MODULE: &str = "tx::bitcoin";

// Witness for one key-path input: item count, length prefix, 64-byte signature
const KEY_SPEND_WITNESS_WEIGHT: u64 = 1 + 1 + 64;
// Segwit marker and flag bytes
const SEGWIT_HEADER_WEIGHT: u64 = 2;

// =============================================================================
// Inputs / Outputs
// =============================================================================

/// A previous output being spent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinInput {
    /// Previous txid in display (big-endian) hex
    pub txid: String,
    pub vout: u32,
    pub value_sats: u64,
    /// Script of the output being spent
    pub script_pubkey: Vec<u8>,
    /// Internal key of the spender, 33-byte compressed or 32-byte x-only
    pub signer_public_key: Vec<u8>,
}

/// Where an output pays to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Address(String),
    Script(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitcoinOutput {
    pub value_sats: u64,
    pub destination: Destination,
}

impl BitcoinOutput {
    pub fn to_address(address: impl Into<String>, value_sats: u64) -> Self {
        Self {
            value_sats,
            destination: Destination::Address(address.into()),
        }
    }

    pub fn to_script(script: Vec<u8>, value_sats: u64) -> Self {
        Self {
            value_sats,
            destination: Destination::Script(script),
        }
    }
}

// =============================================================================
// Key Sources
// =============================================================================

/// Supplies the untweaked private key for an input
pub trait InputKeySource {
    /// Key for input `index`, whose PSBT internal key is `internal_key`
    fn key_for(&self, index: usize, internal_key: &XOnlyPublicKey) -> Option<&[u8]>;
}

/// One key that signs every input it owns
pub struct SingleKey {
    secret: Zeroizing<[u8; 32]>,
    internal_key: XOnlyPublicKey,
}

impl SingleKey {
    pub fn new(private_key: &[u8]) -> SignerResult<Self> {
        let mut sk = SecretKey::from_slice(private_key)
            .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key: {}", e)))?;
        let key = Self {
            secret: Zeroizing::new(sk.secret_bytes()),
            internal_key: sk.x_only_public_key(&SECP).0,
        };
        sk.non_secure_erase();
        Ok(key)
    }

    pub fn internal_key(&self) -> &XOnlyPublicKey {
        &self.internal_key
    }
}

impl InputKeySource for SingleKey {
    fn key_for(&self, _index: usize, internal_key: &XOnlyPublicKey) -> Option<&[u8]> {
        (*internal_key == self.internal_key).then(|| self.secret.as_slice())
    }
}

/// Distinct key per input index
#[derive(Default)]
pub struct PerInputKeys {
    keys: HashMap<usize, Zeroizing<[u8; 32]>>,
}

impl PerInputKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: usize, private_key: &[u8]) -> SignerResult<()> {
        let mut sk = SecretKey::from_slice(private_key)
            .map_err(|e| SignerError::invalid_private_key(format!("Invalid private key for input {}: {}", index, e)))?;
        self.keys.insert(index, Zeroizing::new(sk.secret_bytes()));
        sk.non_secure_erase();
        Ok(())
    }

    pub fn with_key(mut self, index: usize, private_key: &[u8]) -> SignerResult<Self> {
        self.insert(index, private_key)?;
        Ok(self)
    }
}

impl InputKeySource for PerInputKeys {
    fn key_for(&self, index: usize, _internal_key: &XOnlyPublicKey) -> Option<&[u8]> {
        self.keys.get(&index).map(|k| k.as_slice())
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Unsigned transaction wrapped in a PSBT with witness UTXOs attached
#[derive(Debug, Clone)]
pub struct UnsignedBitcoinTx {
    psbt: Psbt,
    network: Network,
}

impl UnsignedBitcoinTx {
    pub fn psbt(&self) -> &Psbt {
        &self.psbt
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// BIP-174 binary serialization
    pub fn psbt_bytes(&self) -> Vec<u8> {
        self.psbt.serialize()
    }

    /// Fee implied by witness UTXO values
    pub fn fee_sats(&self) -> SignerResult<u64> {
        let total_in = self.psbt.inputs.iter().try_fold(0u64, |acc, input| {
            let utxo = input
                .witness_utxo
                .as_ref()
                .ok_or_else(|| SignerError::invalid_structure("Input without witness UTXO"))?;
            acc.checked_add(utxo.value.to_sat())
                .ok_or_else(|| SignerError::invalid_structure("Input value overflow"))
        })?;
        let total_out = sum_outputs(&self.psbt.unsigned_tx.output)?;
        total_in
            .checked_sub(total_out)
            .ok_or_else(|| SignerError::invalid_structure("Outputs exceed inputs"))
    }

    /// Virtual size once every input carries a key-path witness
    pub fn estimated_signed_vsize(&self) -> u64 {
        let tx = &self.psbt.unsigned_tx;
        let weight = tx.weight().to_wu()
            + SEGWIT_HEADER_WEIGHT
            + KEY_SPEND_WITNESS_WEIGHT * tx.input.len() as u64;
        (weight + 3) / 4
    }
}

/// Fully signed, finalized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBitcoinTx {
    tx: Transaction,
}

impl SignedBitcoinTx {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn to_hex(&self) -> String {
        hex::encode(serialize(self))
    }

    /// Display-order txid of the non-witness serialization
    pub fn txid(&self) -> String {
        self.tx.compute_txid().to_string()
    }

    pub fn vsize(&self) -> usize {
        self.tx.vsize()
    }

    pub fn into_signed_transaction(self) -> SignedTransaction {
        SignedTransaction {
            chain: ChainKind::Bitcoin,
            raw_tx: self.to_hex(),
            txid: self.txid(),
        }
    }
}

/// Consensus serialization including segwit marker, flag, and witnesses
pub fn serialize(tx: &SignedBitcoinTx) -> Vec<u8> {
    encode::serialize(&tx.tx)
}

fn sum_outputs(outputs: &[TxOut]) -> SignerResult<u64> {
    outputs.iter().try_fold(0u64, |acc, out| {
        acc.checked_add(out.value.to_sat())
            .ok_or_else(|| SignerError::invalid_structure("Output value overflow"))
    })
}

fn checked_amount(value_sats: u64, what: &str) -> SignerResult<Amount> {
    let amount = Amount::from_sat(value_sats);
    if amount > Amount::MAX_MONEY {
        return Err(SignerError::invalid_structure(format!(
            "{} value {} exceeds the 21M BTC supply",
            what, value_sats
        )));
    }
    Ok(amount)
}

/// Raw output script, rejected when empty or not parseable as opcodes
fn checked_output_script(script: &[u8]) -> SignerResult<ScriptBuf> {
    if script.is_empty() {
        return Err(SignerError::invalid_structure("Script is empty"));
    }
    let script = ScriptBuf::from_bytes(script.to_vec());
    if let Some(Err(e)) = script.instructions().find(|ins| ins.is_err()) {
        return Err(SignerError::invalid_structure(format!("Malformed script: {}", e)));
    }
    Ok(script)
}

// =============================================================================
// Build
// =============================================================================

/// Build an unsigned PSBT spending `inputs` to `outputs`
pub fn build(
    inputs: &[BitcoinInput],
    outputs: &[BitcoinOutput],
    network: Network,
    config: &SignerConfig,
) -> SignerResult<UnsignedBitcoinTx> {
    config.validate()?;

    if inputs.is_empty() {
        return Err(SignerError::invalid_structure("Transaction has no inputs"));
    }
    if outputs.is_empty() {
        return Err(SignerError::invalid_structure("Transaction has no outputs"));
    }

    let sequence = Sequence::from_consensus(config.bitcoin.sequence());

    let mut tx_inputs = Vec::with_capacity(inputs.len());
    let mut witness_utxos = Vec::with_capacity(inputs.len());
    let mut internal_keys = Vec::with_capacity(inputs.len());

    for (index, input) in inputs.iter().enumerate() {
        let txid = Txid::from_str(input.txid.trim()).map_err(|e| {
            SignerError::invalid_structure(format!("Input {} has a malformed txid: {}", index, e))
        })?;
        let internal_key = parse_internal_key(&input.signer_public_key).map_err(|e| {
            SignerError::invalid_structure(format!("Input {} signer key: {}", index, e.message))
        })?;
        let script_pubkey = ScriptBuf::from_bytes(input.script_pubkey.clone());
        if !script_pubkey.is_p2tr() {
            return Err(SignerError::invalid_structure(format!(
                "Input {} script_pubkey is not a segwit v1 (P2TR) program",
                index
            )));
        }

        tx_inputs.push(TxIn {
            previous_output: OutPoint::new(txid, input.vout),
            script_sig: ScriptBuf::new(),
            sequence,
            witness: Witness::default(),
        });
        witness_utxos.push(TxOut {
            value: checked_amount(input.value_sats, "Input")?,
            script_pubkey,
        });
        internal_keys.push(internal_key);
    }

    let mut tx_outputs = Vec::with_capacity(outputs.len());
    for (index, output) in outputs.iter().enumerate() {
        let script_pubkey = match &output.destination {
            Destination::Address(address) => parse_bitcoin_address(address, network)
                .map_err(|e| {
                    SignerError::invalid_structure(format!("Output {}: {}", index, e.message))
                })?
                .script_pubkey(),
            Destination::Script(script) => checked_output_script(script).map_err(|e| {
                SignerError::invalid_structure(format!("Output {}: {}", index, e.message))
            })?,
        };
        tx_outputs.push(TxOut {
            value: checked_amount(output.value_sats, "Output")?,
            script_pubkey,
        });
    }

    let tx = Transaction {
        version: Version(config.bitcoin.tx_version),
        lock_time: LockTime::from_consensus(config.bitcoin.lock_time),
        input: tx_inputs,
        output: tx_outputs,
    };

    let mut psbt = Psbt::from_unsigned_tx(tx)?;
    for ((psbt_input, utxo), internal_key) in psbt
        .inputs
        .iter_mut()
        .zip(witness_utxos)
        .zip(internal_keys)
    {
        psbt_input.witness_utxo = Some(utxo);
        psbt_input.tap_internal_key = Some(internal_key);
    }

    let unsigned = UnsignedBitcoinTx { psbt, network };
    let fee = unsigned.fee_sats()?;

    if let Some(max_rate) = config.bitcoin.max_fee_rate_sat_vb {
        let vsize = unsigned.estimated_signed_vsize();
        if fee > max_rate.saturating_mul(vsize) {
            return Err(SignerError::invalid_structure(format!(
                "Fee of {} sats exceeds {} sat/vB for {} vbytes",
                fee, max_rate, vsize
            )));
        }
    }

    log_debug!(
        MODULE,
        "Built unsigned taproot transaction",
        inputs = inputs.len(),
        outputs = outputs.len(),
        fee_sats = fee,
        network = network,
    );

    Ok(unsigned)
}

// =============================================================================
// Sign
// =============================================================================

/// Sign every input with a key-path signature and extract the final tx
///
/// Fails as a whole if any input cannot be signed; no partially signed
/// bytes are produced.
pub fn sign(tx: UnsignedBitcoinTx, keys: &dyn InputKeySource) -> SignerResult<SignedBitcoinTx> {
    let mut psbt = tx.psbt;

    let prevouts = psbt
        .inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            input.witness_utxo.clone().ok_or_else(|| {
                SignerError::invalid_structure(format!("Input {} has no witness UTXO", index))
            })
        })
        .collect::<SignerResult<Vec<TxOut>>>()?;

    let mut cache = SighashCache::new(&psbt.unsigned_tx);

    for (index, prevout) in prevouts.iter().enumerate() {
        let psbt_input = &mut psbt.inputs[index];
        let internal_key = psbt_input.tap_internal_key.ok_or_else(|| {
            SignerError::invalid_structure(format!("Input {} has no internal key", index))
        })?;

        let private_key = keys.key_for(index, &internal_key).ok_or_else(|| {
            SignerError::signing_failed(format!("No signing key for input {}", index))
        })?;
        // build() only admits P2TR prevouts; a PSBT assembled elsewhere may not
        if !prevout.script_pubkey.is_p2tr() {
            return Err(SignerError::invalid_structure(format!(
                "Input {} does not spend a P2TR output",
                index
            )));
        }

        let mut keypair = tweaked_keypair(Some(private_key), &internal_key)?;

        let (output_key, _) = keypair.x_only_public_key();
        if prevout.script_pubkey.as_bytes()[2..] != output_key.serialize() {
            keypair.non_secure_erase();
            return Err(SignerError::key_mismatch(format!(
                "Input {} script does not commit to the tweaked key",
                index
            )));
        }

        let sighash = match cache.taproot_key_spend_signature_hash(
            index,
            &Prevouts::All(&prevouts),
            TapSighashType::Default,
        ) {
            Ok(sighash) => sighash,
            Err(e) => {
                keypair.non_secure_erase();
                return Err(e.into());
            }
        };

        let signature = sign_digest(&sighash.to_byte_array(), &keypair);
        keypair.non_secure_erase();
        let signature = signature.to_secp256k1()?;
        psbt_input.tap_key_sig = Some(taproot::Signature {
            signature,
            sighash_type: TapSighashType::Default,
        });
    }

    finalize(&mut psbt)?;
    let signed = psbt.extract_tx_unchecked_fee_rate();

    if signed.input.iter().any(|input| input.witness.is_empty()) {
        return Err(SignerError::signing_failed("Finalized transaction has an empty witness"));
    }

    let signed = SignedBitcoinTx { tx: signed };
    log_info!(
        MODULE,
        "Signed taproot transaction",
        txid = signed.txid(),
        vsize = signed.vsize(),
    );
    Ok(signed)
}

/// Move each key-path signature into the final witness
fn finalize(psbt: &mut Psbt) -> SignerResult<()> {
    for (index, input) in psbt.inputs.iter_mut().enumerate() {
        let signature = input.tap_key_sig.take().ok_or_else(|| {
            SignerError::signing_failed(format!("Input {} is unsigned", index))
        })?;
        input.final_script_witness = Some(Witness::p2tr_key_spend(&signature));
        input.tap_internal_key = None;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::schnorr::{verify_digest, SchnorrSig};
    use crate::crypto::taproot::{taproot_address, tweak_for_output};
    use crate::error::ErrorCode;
    use crate::utils::crypto::hash160;
    use crate::wallet::derivation::derive_taproot_account;

    const PREV_TXID: &str = "b00771c6acc9d84e503edb1cab32325dee4d261762e84d23fb11fab26143ff18";

    fn p2tr_script(internal: &XOnlyPublicKey) -> Vec<u8> {
        let out = tweak_for_output(internal).unwrap().output_key.serialize();
        let mut script = vec![0x51, 0x20];
        script.extend_from_slice(&out);
        script
    }

    fn input_for(secret: &[u8; 32], vout: u32, value: u64) -> BitcoinInput {
        let sk = SecretKey::from_slice(secret).unwrap();
        let internal = sk.x_only_public_key(&SECP).0;
        BitcoinInput {
            txid: PREV_TXID.to_string(),
            vout,
            value_sats: value,
            script_pubkey: p2tr_script(&internal),
            signer_public_key: sk.public_key(&SECP).serialize().to_vec(),
        }
    }

    fn verify_all(signed: &SignedBitcoinTx, prevouts: &[TxOut]) {
        let tx = signed.transaction();
        let mut cache = SighashCache::new(tx);
        for (i, prevout) in prevouts.iter().enumerate() {
            let sighash = cache
                .taproot_key_spend_signature_hash(i, &Prevouts::All(prevouts), TapSighashType::Default)
                .unwrap();
            let witness = &tx.input[i].witness;
            assert_eq!(witness.len(), 1);
            let sig_bytes: [u8; 64] = witness.nth(0).unwrap().try_into().unwrap();
            let output_key =
                XOnlyPublicKey::from_slice(&prevout.script_pubkey.as_bytes()[2..]).unwrap();
            assert!(verify_digest(&sighash.to_byte_array(), &SchnorrSig(sig_bytes), &output_key));
        }
    }

    #[test]
    fn test_single_input_spend_from_seed() {
        let seed = [0x42u8; 32];
        let account = derive_taproot_account(&seed, Network::Mainnet, 0, 0).unwrap();
        let script = p2tr_script(&account.internal_key);

        let inputs = vec![BitcoinInput {
            txid: PREV_TXID.to_string(),
            vout: 0,
            value_sats: 10_000,
            script_pubkey: script.clone(),
            signer_public_key: account.internal_key.serialize().to_vec(),
        }];
        let outputs = vec![BitcoinOutput::to_address(account.address.clone(), 9_000)];

        let unsigned = build(&inputs, &outputs, Network::Mainnet, &SignerConfig::default()).unwrap();
        assert_eq!(unsigned.fee_sats().unwrap(), 1_000);

        let key = SingleKey::new(account.private_key.as_ref()).unwrap();
        let signed = sign(unsigned, &key).unwrap();

        let hex = signed.to_hex();
        assert!(hex.starts_with("02000000"));
        // Segwit marker and flag follow the version
        assert_eq!(&hex[8..12], "0001");
        assert_eq!(signed.transaction().input[0].sequence.to_consensus_u32(), 0xffff_fffd);

        let decoded: Transaction = encode::deserialize(&hex::decode(&hex).unwrap()).unwrap();
        assert_eq!(&decoded, signed.transaction());

        verify_all(
            &signed,
            &[TxOut {
                value: Amount::from_sat(10_000),
                script_pubkey: ScriptBuf::from_bytes(script),
            }],
        );
    }

    #[test]
    fn test_txid_is_reversed_on_the_wire() {
        let unsigned = build(
            &[input_for(&[1u8; 32], 3, 5_000)],
            &[BitcoinOutput::to_script(vec![0x6a], 4_000)],
            Network::Testnet,
            &SignerConfig::default(),
        )
        .unwrap();
        let key = SingleKey::new(&[1u8; 32]).unwrap();
        let raw = serialize(&sign(unsigned, &key).unwrap());

        // version(4) + marker/flag(2) + input count(1)
        let wire_txid = &raw[7..39];
        let mut display = hex::decode(PREV_TXID).unwrap();
        display.reverse();
        assert_eq!(wire_txid, display.as_slice());
        assert_eq!(&raw[39..43], &3u32.to_le_bytes());
    }

    #[test]
    fn test_multi_input_per_input_keys() {
        let a = [0x0au8; 32];
        let b = [0x0bu8; 32];
        let inputs = vec![input_for(&a, 0, 20_000), input_for(&b, 1, 30_000)];
        let outputs = vec![BitcoinOutput::to_script(inputs[0].script_pubkey.clone(), 49_000)];

        let unsigned = build(&inputs, &outputs, Network::Regtest, &SignerConfig::default()).unwrap();
        let keys = PerInputKeys::new().with_key(0, &a).unwrap().with_key(1, &b).unwrap();
        let signed = sign(unsigned, &keys).unwrap();

        let prevouts: Vec<TxOut> = inputs
            .iter()
            .map(|i| TxOut {
                value: Amount::from_sat(i.value_sats),
                script_pubkey: ScriptBuf::from_bytes(i.script_pubkey.clone()),
            })
            .collect();
        verify_all(&signed, &prevouts);
    }

    #[test]
    fn test_single_key_cannot_cover_foreign_input() {
        let a = [0x0au8; 32];
        let inputs = vec![input_for(&a, 0, 20_000), input_for(&[0x0b; 32], 1, 30_000)];
        let outputs = vec![BitcoinOutput::to_script(vec![0x6a], 49_000)];
        let unsigned = build(&inputs, &outputs, Network::Regtest, &SignerConfig::default()).unwrap();

        let err = sign(unsigned, &SingleKey::new(&a).unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::SigningFailed);
    }

    #[test]
    fn test_wrong_key_for_input_is_mismatch() {
        let inputs = vec![input_for(&[0x0a; 32], 0, 20_000)];
        let outputs = vec![BitcoinOutput::to_script(vec![0x6a], 19_000)];
        let unsigned = build(&inputs, &outputs, Network::Regtest, &SignerConfig::default()).unwrap();

        let keys = PerInputKeys::new().with_key(0, &[0x0c; 32]).unwrap();
        assert_eq!(sign(unsigned, &keys).unwrap_err().code, ErrorCode::KeyMismatch);
    }

    #[test]
    fn test_script_not_committing_to_key_is_mismatch() {
        let mut input = input_for(&[0x0a; 32], 0, 20_000);
        input.script_pubkey = p2tr_script(&SecretKey::from_slice(&[0x0d; 32]).unwrap().x_only_public_key(&SECP).0);
        let unsigned = build(
            &[input],
            &[BitcoinOutput::to_script(vec![0x6a], 19_000)],
            Network::Regtest,
            &SignerConfig::default(),
        )
        .unwrap();
        let err = sign(unsigned, &SingleKey::new(&[0x0a; 32]).unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyMismatch);
    }

    #[test]
    fn test_structural_errors() {
        let config = SignerConfig::default();
        let input = input_for(&[1u8; 32], 0, 10_000);
        let output = BitcoinOutput::to_script(vec![0x6a], 9_000);

        let err = build(&[], &[output.clone()], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let err = build(&[input.clone()], &[], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let mut bad_txid = input.clone();
        bad_txid.txid = "zz".to_string();
        let err = build(&[bad_txid], &[output.clone()], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let mut bad_key = input.clone();
        bad_key.signer_public_key = vec![0u8; 33];
        let err = build(&[bad_key], &[output.clone()], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        // Testnet address on mainnet
        let internal = SecretKey::from_slice(&[2u8; 32]).unwrap().x_only_public_key(&SECP).0;
        let wrong_net = BitcoinOutput::to_address(taproot_address(&internal, Network::Testnet), 9_000);
        let err = build(&[input.clone()], &[wrong_net], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let overspend = BitcoinOutput::to_script(vec![0x6a], 10_001);
        let err = build(&[input], &[overspend], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);
    }

    #[test]
    fn test_non_taproot_prevouts_rejected() {
        let config = SignerConfig::default();
        let output = BitcoinOutput::to_script(vec![0x6a], 9_000);
        let sk = SecretKey::from_slice(&[1u8; 32]).unwrap();

        let mut p2wpkh = input_for(&[1u8; 32], 0, 10_000);
        p2wpkh.script_pubkey = [&[0x00, 0x14][..], &hash160(&sk.public_key(&SECP).serialize())].concat();
        let err = build(&[p2wpkh], &[output.clone()], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let mut garbage = input_for(&[1u8; 32], 0, 10_000);
        garbage.script_pubkey = vec![0xff, 0xee];
        let err = build(&[garbage], &[output.clone()], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let mut empty = input_for(&[1u8; 32], 0, 10_000);
        empty.script_pubkey = Vec::new();
        let err = build(&[empty], &[output], Network::Mainnet, &config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);
    }

    #[test]
    fn test_sign_refuses_non_taproot_witness_utxo() {
        let mut unsigned = build(
            &[input_for(&[1u8; 32], 0, 10_000)],
            &[BitcoinOutput::to_script(vec![0x6a], 9_000)],
            Network::Mainnet,
            &SignerConfig::default(),
        )
        .unwrap();
        let sk = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let p2wpkh = [&[0x00, 0x14][..], &hash160(&sk.public_key(&SECP).serialize())].concat();
        if let Some(utxo) = unsigned.psbt.inputs[0].witness_utxo.as_mut() {
            utxo.script_pubkey = ScriptBuf::from_bytes(p2wpkh);
        }

        let err = sign(unsigned, &SingleKey::new(&[1u8; 32]).unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);
    }

    #[test]
    fn test_malformed_output_script_rejected() {
        let input = input_for(&[1u8; 32], 0, 10_000);
        // OP_PUSHBYTES_32 with no data following
        let truncated = BitcoinOutput::to_script(vec![0x51, 0x20], 9_000);
        let err = build(&[input.clone()], &[truncated], Network::Mainnet, &SignerConfig::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let empty = BitcoinOutput::to_script(Vec::new(), 9_000);
        let err = build(&[input], &[empty], Network::Mainnet, &SignerConfig::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);
    }

    #[test]
    fn test_fee_rate_cap() {
        let input = input_for(&[1u8; 32], 0, 1_000_000);
        let output = BitcoinOutput::to_script(vec![0x6a], 1_000);
        let err = build(&[input.clone()], &[output.clone()], Network::Mainnet, &SignerConfig::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransactionStructure);

        let mut relaxed = SignerConfig::default();
        relaxed.bitcoin.max_fee_rate_sat_vb = None;
        assert!(build(&[input], &[output], Network::Mainnet, &relaxed).is_ok());
    }

    #[test]
    fn test_config_controls_version_sequence_locktime() {
        let mut config = SignerConfig::default();
        config.bitcoin.tx_version = 1;
        config.bitcoin.enable_rbf = false;
        config.bitcoin.lock_time = 840_000;

        let unsigned = build(
            &[input_for(&[1u8; 32], 0, 10_000)],
            &[BitcoinOutput::to_script(vec![0x6a], 9_000)],
            Network::Mainnet,
            &config,
        )
        .unwrap();
        let signed = sign(unsigned, &SingleKey::new(&[1u8; 32]).unwrap()).unwrap();
        let tx = signed.transaction();
        assert!(signed.to_hex().starts_with("01000000"));
        assert_eq!(tx.input[0].sequence, Sequence::MAX);
        assert_eq!(tx.lock_time.to_consensus_u32(), 840_000);
    }

    #[test]
    fn test_estimated_vsize_matches_signed() {
        let unsigned = build(
            &[input_for(&[5u8; 32], 0, 10_000), input_for(&[5u8; 32], 1, 10_000)],
            &[BitcoinOutput::to_script(vec![0x6a], 19_000)],
            Network::Mainnet,
            &SignerConfig::default(),
        )
        .unwrap();
        let estimate = unsigned.estimated_signed_vsize();
        let signed = sign(unsigned, &SingleKey::new(&[5u8; 32]).unwrap()).unwrap();
        assert_eq!(estimate, signed.vsize() as u64);
    }
}
