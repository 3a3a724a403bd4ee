//! pool-cli - privacy pool key and proof tooling
//!
//! Commands:
//! - keygen: generate a key store
//! - commit: create a commitment with a stored key
//! - recover: trial-decrypt a published commitment
//! - pack-proof: snarkjs proof to verifier calldata
//! - inspect-state: summarize an exported root set
//! - simulate: deposit and spend against an in-process pool

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pool_primitives::field::{parse_decimal, parse_hex, to_hex};
use privacy_pool::chain::Request;
use privacy_pool::commitment::Challenge;
use privacy_pool::process::{process, DryRunProver, Intent};
use privacy_pool::proof::pack;
use privacy_pool::state::import_rootset;
use privacy_pool::{
    Amount, CipherRecord, Commitment, FieldElement, KeyStore, MemoryChain, PoolConfig, PoolState,
    RawProof,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "pool-cli")]
#[command(about = "privacy pool key and proof tooling", long_about = None)]
struct Cli {
    /// TOML file with pool configuration overrides
    #[arg(long, env = "POOL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a key store
    Keygen {
        /// Number of keys
        #[arg(short, long, default_value_t = 1)]
        count: usize,
        /// Write to file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Create a commitment and print it as portable json
    Commit {
        /// Key store file, its nonce is advanced in place
        #[arg(short, long)]
        keys: PathBuf,
        /// Key index inside the store
        #[arg(long, default_value_t = 0)]
        key_index: usize,
        /// Pool scope (decimal or 0x hex)
        #[arg(short, long)]
        scope: String,
        /// Committed value
        #[arg(short, long)]
        value: u128,
    },

    /// Recover a published commitment with the stored keys
    Recover {
        #[arg(short, long)]
        keys: PathBuf,
        /// Portable commitment json, only its public half is used
        #[arg(short, long)]
        commitment: PathBuf,
    },

    /// Pack a snarkjs proof into verifier calldata
    PackProof {
        /// proof.json, or a bundle with publicSignals
        #[arg(short, long)]
        proof: PathBuf,
        /// public.json when the proof file holds only the proof
        #[arg(long)]
        public: Option<PathBuf>,
        /// Print the argument tuple as json instead of hex calldata
        #[arg(long)]
        json: bool,
    },

    /// Summarize an exported root set
    InspectState {
        /// `{ "rootset": [...] }` file
        #[arg(short, long)]
        rootset: PathBuf,
    },

    /// Deposit values into an in-process pool, then merge them
    Simulate {
        /// Values to deposit
        #[arg(required = true)]
        values: Vec<u128>,
        #[arg(short, long, default_value = "1")]
        scope: String,
    },
}

fn parse_field(s: &str) -> Result<FieldElement> {
    let parsed = if s.starts_with("0x") {
        parse_hex(s)
    } else {
        parse_decimal(s)
    };
    parsed.with_context(|| format!("invalid field element: {s}"))
}

fn load_config(path: Option<&Path>) -> Result<PoolConfig> {
    let config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => PoolConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_keys(path: &Path) -> Result<KeyStore> {
    Ok(KeyStore::from_json(&read(path)?)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pool_cli=info,privacy_pool=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let mut rng = rand::thread_rng();

    match cli.command {
        Commands::Keygen { count, out } => {
            let json = KeyStore::generate(&mut rng, count).to_json()?;
            match out {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("wrote {} keys to {}", count, path.display());
                }
                None => println!("{json}"),
            }
        }

        Commands::Commit {
            keys,
            key_index,
            scope,
            value,
        } => {
            let mut store = load_keys(&keys)?;
            let key = store
                .keys
                .get_mut(key_index)
                .with_context(|| format!("no key at index {key_index}"))?;
            let commitment = key.commit(&mut rng, parse_field(&scope)?, Amount(value))?;
            fs::write(&keys, store.to_json()?)
                .with_context(|| format!("failed to update {}", keys.display()))?;
            println!("{}", commitment.to_portable_json()?);
        }

        Commands::Recover { keys, commitment } => {
            let store = load_keys(&keys)?;
            let published = Commitment::from_portable_json(&read(&commitment)?)?;
            let record = CipherRecord::from_commitment(&published, 0);
            let challenge = Challenge::hash(published.hash());

            let found = store.keys.iter().enumerate().find_map(|(i, key)| {
                key.nonce_range().find_map(|nonce| {
                    key.recover(&record.salt_public_key, &record.cipher, nonce, Some(&challenge))
                        .ok()
                        .map(|c| (i, c))
                })
            });
            match found {
                Some((i, c)) => {
                    info!("recovered with key {} at nonce {}", i, c.nonce());
                    println!("{}", c.to_portable_json()?);
                }
                None => bail!("no stored key owns this commitment"),
            }
        }

        Commands::PackProof {
            proof,
            public,
            json,
        } => {
            let raw = match public {
                Some(public) => RawProof::from_snarkjs_files(&read(&proof)?, &read(&public)?)?,
                None => RawProof::from_snarkjs_json(&read(&proof)?)?,
            };
            let packed = pack(&raw)?;
            if json {
                println!("{}", packed.to_json()?);
            } else {
                println!("{}", packed.to_calldata_hex());
            }
        }

        Commands::InspectState { rootset } => {
            let log = import_rootset(&read(&rootset)?, config.max_depth)?;
            println!("size:  {}", log.size());
            println!("depth: {}", log.depth());
            println!("root:  {}", to_hex(&log.root()));
        }

        Commands::Simulate { values, scope } => {
            simulate(&config, parse_field(&scope)?, &values, &mut rng).await?;
        }
    }

    Ok(())
}

/// deposit every value, then merge the first two notes
async fn simulate(
    config: &PoolConfig,
    scope: FieldElement,
    values: &[u128],
    rng: &mut rand::rngs::ThreadRng,
) -> Result<()> {
    let chain = MemoryChain::with_max_depth(scope, config.max_depth);
    let mut state = PoolState::new(&chain, config.clone());
    let mut key = privacy_pool::PrivacyKey::generate(rng);
    let request = Request::default();

    for &value in values {
        let intent = Intent::new(
            vec![key.void(rng, scope)?, key.void(rng, scope)?],
            vec![key.commit(rng, scope, Amount(value))?, key.void(rng, scope)?],
        );
        let tx = process(&mut state, &DryRunProver, &chain, &request, &intent).await?;
        state.sync().await?;
        info!("deposited {} in {}", value, tx);
    }

    let mut notes = state
        .decrypt_ciphers(std::slice::from_ref(&key), None)
        .await?
        .remove(0);
    println!("spendable notes: {}", notes.len());

    if notes.len() >= 2 {
        let a = notes.remove(0).commitment;
        let b = notes.remove(0).commitment;
        let total = a
            .value()
            .checked_add(b.value())
            .context("merged value overflows")?;
        let intent = Intent::new(
            vec![a, b],
            vec![key.commit(rng, scope, total)?, key.void(rng, scope)?],
        );
        let tx = process(&mut state, &DryRunProver, &chain, &request, &intent).await?;
        state.sync().await?;
        info!("merged two notes into {} in {}", total, tx);
    }

    let notes = state
        .decrypt_ciphers(std::slice::from_ref(&key), None)
        .await?
        .remove(0);
    for note in notes {
        println!("index {:>4}  value {}", note.index, note.commitment.value());
    }
    println!("log size {}  root {}", state.log().size(), to_hex(&state.log().root()));
    Ok(())
}
