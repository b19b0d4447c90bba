use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use wallet_sign_core::tx::{BitcoinSignRequest, EvmSignRequest};
use wallet_sign_core::utils::logging;
use wallet_sign_core::wallet::{derive_evm_account, derive_taproot_account};
use wallet_sign_core::{Network, SignerConfig, SignerError};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "wallet-sign")]
#[command(about = "Offline key derivation and transaction signing for Bitcoin Taproot and EVM chains", long_about = None)]
struct Cli {
    /// Signer configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print debug logs to stderr
    #[arg(long, global = true, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Chain {
    Bitcoin,
    Evm,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive an account key and address from a seed
    Derive {
        /// BIP32 seed in hex (16 to 64 bytes)
        #[arg(long)]
        seed: String,

        #[arg(long, value_enum)]
        chain: Chain,

        /// Bitcoin network (ignored for EVM)
        #[arg(long, default_value = "mainnet")]
        network: Network,

        /// BIP86 change branch (0 receive, 1 change)
        #[arg(long, default_value = "0")]
        change: u32,

        #[arg(long, default_value = "0")]
        index: u32,
    },

    /// Sign an EVM transaction request
    SignEvm {
        /// Request JSON file, or `-` for stdin
        input: String,
    },

    /// Sign a Bitcoin Taproot transaction request
    SignBtc {
        /// Request JSON file, or `-` for stdin
        input: String,
    },
}

#[derive(Serialize)]
struct DerivedAccount {
    chain: &'static str,
    path: String,
    address: String,
    public_key: String,
    private_key: String,
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("reading request from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading request file {}", input))
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<SignerConfig> {
    match path {
        Some(path) => Ok(SignerConfig::from_file(path)?),
        None => Ok(SignerConfig::default()),
    }
}

fn derive_account(seed_hex: &str, chain: Chain, network: Network, change: u32, index: u32) -> Result<DerivedAccount> {
    let seed = Zeroizing::new(
        hex::decode(seed_hex.trim())
            .map_err(|e| SignerError::invalid_input(format!("Seed is not valid hex: {}", e)))?,
    );

    let account = match chain {
        Chain::Bitcoin => {
            let account = derive_taproot_account(&seed, network, change, index)?;
            DerivedAccount {
                chain: "bitcoin",
                path: account.path.to_string(),
                address: account.address,
                public_key: hex::encode(account.internal_key.serialize()),
                private_key: hex::encode(&account.private_key[..]),
            }
        }
        Chain::Evm => {
            let account = derive_evm_account(&seed, index)?;
            DerivedAccount {
                chain: "evm",
                path: account.path.to_string(),
                address: account.address,
                public_key: hex::encode(account.public_key.serialize()),
                private_key: hex::encode(&account.private_key[..]),
            }
        }
    };
    Ok(account)
}

fn run(cli: Cli) -> Result<String> {
    if cli.debug {
        logging::enable_debug();
    }
    let config = load_config(cli.config.as_ref())?;

    let json = match cli.command {
        Commands::Derive {
            seed,
            chain,
            network,
            change,
            index,
        } => serde_json::to_string_pretty(&derive_account(&seed, chain, network, change, index)?)?,
        Commands::SignEvm { input } => {
            let request: EvmSignRequest =
                serde_json::from_str(&read_input(&input)?).map_err(SignerError::from)?;
            serde_json::to_string_pretty(&request.sign(&config)?)?
        }
        Commands::SignBtc { input } => {
            let request: BitcoinSignRequest =
                serde_json::from_str(&read_input(&input)?).map_err(SignerError::from)?;
            serde_json::to_string_pretty(&request.sign(&config)?)?
        }
    };
    Ok(json)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let signer_error = match err.downcast::<SignerError>() {
                Ok(e) => e,
                Err(other) => SignerError::internal(format!("{:#}", other)),
            };
            let rendered = serde_json::to_string_pretty(&signer_error)
                .unwrap_or_else(|_| signer_error.to_string());
            println!("{}", rendered);
            ExitCode::FAILURE
        }
    }
}
