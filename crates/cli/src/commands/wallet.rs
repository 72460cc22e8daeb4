//! Wallet management command.

use super::{list_wallets, open_chain, parse_address, save_keypair, Context};
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use powchain_core::Keypair;

#[derive(Args)]
pub struct WalletArgs {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand)]
enum WalletCommand {
    /// Generate a new keypair
    New {
        /// Name for the wallet file
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List saved wallets
    List,
    /// Show the balance of an address
    Balance {
        /// Base58check address
        address: String,
    },
}

pub fn run(args: WalletArgs, ctx: &Context) -> Result<()> {
    match args.command {
        WalletCommand::New { name } => new_wallet(ctx, name),
        WalletCommand::List => list(ctx),
        WalletCommand::Balance { address } => balance(ctx, &address),
    }
}

fn new_wallet(ctx: &Context, name: Option<String>) -> Result<()> {
    let keypair = Keypair::generate()?;
    let address = keypair.address();
    let name = name.unwrap_or_else(|| format!("wallet_{}", &address[..8]));

    println!("{}", "Generated new wallet:".bold().cyan());
    println!();
    println!("  Name:       {}", name.bright_white());
    println!("  Address:    {}", address.bright_yellow());
    println!(
        "  Public Key: {}",
        hex::encode(keypair.public_key.to_bytes()).bright_black()
    );

    let key_file = save_keypair(&ctx.data_dir, &name, &keypair)?;

    println!();
    println!(
        "{}  Saved to: {}",
        "✓".green().bold(),
        key_file.display().to_string().bright_black()
    );
    println!();
    println!("{}", "Keep your private key safe!".yellow().bold());

    Ok(())
}

fn list(ctx: &Context) -> Result<()> {
    let wallets = list_wallets(&ctx.data_dir)?;

    if wallets.is_empty() {
        println!("{}", "No wallets found.".yellow());
        println!(
            "Use {} to create a new wallet.",
            "powchain wallet new".bright_cyan()
        );
        return Ok(());
    }

    println!("{}", "Saved Wallets:".bold().cyan());
    println!();
    for (name, address) in wallets {
        println!(
            "  {} {}",
            format!("{}:", name).bright_black(),
            address.bright_yellow()
        );
    }
    println!();

    Ok(())
}

fn balance(ctx: &Context, address: &str) -> Result<()> {
    let pub_key_hash = parse_address(address)?;
    let chain = open_chain(ctx)?;

    let unspent = chain.find_unspent_outputs(&pub_key_hash);
    let total: u64 = unspent.iter().map(|utxo| utxo.output.value).sum();

    println!();
    println!("  Address: {}", address.bright_yellow());
    println!("  Balance: {}", total.to_string().bright_cyan());
    println!(
        "  Outputs: {}",
        unspent.len().to_string().bright_black()
    );
    println!();

    Ok(())
}
