use bitcoin::key::TapTweak;
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use ethers_core::types::U256;
use proptest::prelude::*;
use wallet_sign_core::crypto::taproot::tweak_for_output;
use wallet_sign_core::tx::evm::{self, EvmTxRequest};
use wallet_sign_core::tx::rlp;
use wallet_sign_core::tx::{format_units, parse_units};
use wallet_sign_core::utils::{keccak256, to_checksum_address};
use wallet_sign_core::wallet::{derive_evm_account, derive_taproot_account, evm_address_from_private_key};
use wallet_sign_core::Network;

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

fn any_seed() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 16..=64)
}

proptest! {
    #[test]
    fn checksum_addresses_follow_eip55(bytes in prop::array::uniform20(any::<u8>())) {
        let checksummed = to_checksum_address(&bytes);
        prop_assert!(checksummed.starts_with("0x"));

        let lower_expected = hex::encode(bytes);
        let tail = checksummed.trim_start_matches("0x");
        prop_assert_eq!(tail.to_ascii_lowercase(), lower_expected.clone());

        let hash = keccak256(lower_expected.as_bytes());
        let mut expected = String::from("0x");
        for (i, ch) in lower_expected.chars().enumerate() {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if ch.is_ascii_digit() || nibble < 8 {
                expected.push(ch);
            } else {
                expected.push(ch.to_ascii_uppercase());
            }
        }
        prop_assert_eq!(checksummed, expected);
    }

    #[test]
    fn derivation_is_deterministic(seed in any_seed(), index in 0u32..1000) {
        let first = derive_evm_account(&seed, index).unwrap();
        let second = derive_evm_account(&seed, index).unwrap();
        prop_assert_eq!(first.address, second.address);

        let a = derive_taproot_account(&seed, Network::Testnet, 0, index).unwrap();
        let b = derive_taproot_account(&seed, Network::Testnet, 0, index).unwrap();
        prop_assert_eq!(a.address.clone(), b.address);
        prop_assert!(a.address.starts_with("tb1p"));
    }

    #[test]
    fn output_key_matches_bitcoin_tap_tweak(secret in any_secret_key()) {
        let secp = Secp256k1::new();
        let (internal, _) = secret.public_key(&secp).x_only_public_key();
        let ours = tweak_for_output(&internal).unwrap();
        let (theirs, parity) = internal.tap_tweak(&secp, None);
        prop_assert_eq!(ours.output_key, theirs.to_inner());
        prop_assert_eq!(ours.parity, parity == bitcoin::secp256k1::Parity::Odd);
    }

    #[test]
    fn format_then_parse_restores_value(value in any::<u128>(), decimals in 0u32..40) {
        let units = U256::from(value);
        let rendered = format_units(units, decimals);
        prop_assert_eq!(parse_units(&rendered, decimals).unwrap(), units);
    }

    #[test]
    fn rlp_matches_ethers(data in prop::collection::vec(any::<u8>(), 0..200), number in any::<u64>()) {
        prop_assert_eq!(rlp::encode_bytes(&data), ethers_core::utils::rlp::encode(&data).to_vec());
        prop_assert_eq!(rlp::encode_u64(number), ethers_core::utils::rlp::encode(&number).to_vec());
    }

    #[test]
    fn signed_evm_tx_recovers_sender(secret in any_secret_key(), nonce in any::<u64>(), chain_id in 1u64..100_000) {
        let key = secret.secret_bytes();
        let from = evm_address_from_private_key(&key).unwrap();
        let request = EvmTxRequest::builder()
            .nonce(nonce)
            .from(from.as_str())
            .to("0x3535353535353535353535353535353535353535")
            .value(U256::from(1u64))
            .gas_limit(21_000)
            .chain_id(chain_id)
            .gas_price(U256::from(1_000_000_000u64))
            .build()
            .unwrap();
        let signed = evm::sign(evm::build(request).unwrap(), &key).unwrap();
        prop_assert_eq!(signed.recover_signer().unwrap(), from);
        prop_assert_eq!(signed.signature().v, chain_id * 2 + 35 + u64::from(signed.signature().recovery_id));
    }
}
