//! CLI commands module.

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use powchain_chain::{Blockchain, ChainConfig};
use powchain_core::{decode_address, Keypair, PubKeyHash};
use powchain_storage::{ChainStore, Storage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

mod block;
mod init;
mod tx;
mod wallet;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new chain
    Init(init::InitArgs),
    /// Wallet management
    Wallet(wallet::WalletArgs),
    /// Block operations
    Block(block::BlockArgs),
    /// Transaction operations
    Tx(tx::TxArgs),
}

/// Options shared by every command.
pub struct Context {
    pub data_dir: PathBuf,
    pub verbose: bool,
}

pub fn run(cmd: Commands, ctx: &Context) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args, ctx),
        Commands::Wallet(args) => wallet::run(args, ctx),
        Commands::Block(args) => block::run(args, ctx),
        Commands::Tx(args) => tx::run(args, ctx),
    }
}

// =============================================================================
// Data directory layout
// =============================================================================

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("db")
}

fn keys_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("keys")
}

fn save_config(data_dir: &Path, config: &ChainConfig) -> Result<()> {
    let path = config_path(data_dir);
    fs::write(&path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn load_config(data_dir: &Path) -> Result<ChainConfig> {
    let contents = fs::read_to_string(config_path(data_dir))
        .context("Failed to read config.json. Did you run 'powchain init'?")?;
    serde_json::from_str(&contents).context("Invalid config.json")
}

fn open_store(ctx: &Context) -> Result<(ChainStore, ChainConfig)> {
    let mut config = load_config(&ctx.data_dir)?;
    config.mining.verbose |= ctx.verbose;

    let storage = Storage::open(db_path(&ctx.data_dir))
        .context("Failed to open storage. Did you run 'powchain init'?")?;
    Ok((ChainStore::new(storage), config))
}

/// Open the persisted chain under `ctx.data_dir`, rejecting an invalid one.
fn open_chain(ctx: &Context) -> Result<Blockchain> {
    let (store, config) = open_store(ctx)?;
    Blockchain::open(store, config).context("Failed to load chain")
}

/// Load the persisted chain without revalidating it.
fn load_chain(ctx: &Context) -> Result<Blockchain> {
    let (store, config) = open_store(ctx)?;
    Blockchain::load(store, config).context("Failed to load chain")
}

// =============================================================================
// Key files
// =============================================================================

/// On-disk wallet format.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    address: String,
    public_key: String,
    private_key: String,
}

impl KeyFile {
    fn from_keypair(keypair: &Keypair) -> Self {
        Self {
            address: keypair.address(),
            public_key: hex::encode(keypair.public_key.to_bytes()),
            private_key: hex::encode(keypair.private_key()),
        }
    }

    fn to_keypair(&self) -> Result<Keypair> {
        let bytes = hex::decode(&self.private_key).context("Invalid private key hex")?;
        let private_key: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!(
                "Invalid private key length: expected 32 bytes, got {}",
                bytes.len()
            )
        })?;
        let keypair = Keypair::from_private_key(&private_key)
            .context("Failed to create keypair from private key")?;

        if keypair.address() != self.address {
            bail!("Key file address does not match its private key");
        }
        Ok(keypair)
    }
}

fn save_keypair(data_dir: &Path, name: &str, keypair: &Keypair) -> Result<PathBuf> {
    let dir = keys_dir(data_dir);
    fs::create_dir_all(&dir)?;

    let key_file = dir.join(format!("{}.json", name));
    if key_file.exists() {
        bail!("Wallet '{}' already exists at {}", name, key_file.display());
    }
    let json = serde_json::to_string_pretty(&KeyFile::from_keypair(keypair))?;
    fs::write(&key_file, json)?;
    Ok(key_file)
}

fn load_keypair(data_dir: &Path, name: &str) -> Result<Keypair> {
    let key_file = keys_dir(data_dir).join(format!("{}.json", name));
    if !key_file.exists() {
        bail!(
            "Wallet file not found: {}. Use 'powchain wallet new' to create one.",
            key_file.display()
        );
    }

    let contents = fs::read_to_string(&key_file)?;
    let parsed: KeyFile = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid wallet file: {}", key_file.display()))?;
    parsed.to_keypair()
}

/// Every saved wallet as `(name, address)`, sorted by name.
fn list_wallets(data_dir: &Path) -> Result<Vec<(String, String)>> {
    let dir = keys_dir(data_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut wallets = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let contents = fs::read_to_string(&path)?;
        if let Ok(parsed) = serde_json::from_str::<KeyFile>(&contents) {
            wallets.push((name.to_string(), parsed.address));
        }
    }
    wallets.sort();
    Ok(wallets)
}

fn parse_address(address: &str) -> Result<PubKeyHash> {
    decode_address(address).with_context(|| format!("Invalid address: {}", address))
}
