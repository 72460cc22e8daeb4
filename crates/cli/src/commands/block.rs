//! Block operations command.

use super::{load_chain, open_chain, parse_address, Context};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use powchain_core::Block;

#[derive(Args)]
pub struct BlockArgs {
    #[command(subcommand)]
    command: BlockCommand,
}

#[derive(Subcommand)]
enum BlockCommand {
    /// Mine a block carrying arbitrary data
    Add {
        /// Block data
        data: String,
    },
    /// Mine a block paying the coinbase reward to an address
    Mine {
        /// Reward recipient (base58check address)
        #[arg(short, long)]
        to: String,
    },
    /// List recent blocks, newest first
    List {
        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
    /// Check proof-of-work and linkage of the whole chain
    Validate,
}

pub fn run(args: BlockArgs, ctx: &Context) -> Result<()> {
    match args.command {
        BlockCommand::Add { data } => add(ctx, data),
        BlockCommand::Mine { to } => mine(ctx, &to),
        BlockCommand::List { count } => list(ctx, count),
        BlockCommand::Validate => validate(ctx),
    }
}

fn print_mined(block: &Block) {
    println!();
    println!("{}  Block mined", "✓".green().bold());
    println!("    Index: {}", block.index.to_string().bright_cyan());
    println!("    Hash:  {}", block.hash.to_hex().bright_yellow());
    println!("    Nonce: {}", block.nonce.to_string().bright_black());
    println!("    Txs:   {}", block.tx_count().to_string().bright_cyan());
    println!();
}

fn add(ctx: &Context, data: String) -> Result<()> {
    let mut chain = open_chain(ctx)?;
    println!(
        "{} (difficulty {})",
        "Mining block...".bold().cyan(),
        chain.config().difficulty_bits
    );

    let block = chain.append_data(data).context("Failed to mine block")?;
    print_mined(block);
    chain.flush()?;
    Ok(())
}

fn mine(ctx: &Context, to: &str) -> Result<()> {
    let recipient = parse_address(to)?;
    let mut chain = open_chain(ctx)?;
    println!(
        "{} (difficulty {})",
        "Mining reward block...".bold().cyan(),
        chain.config().difficulty_bits
    );

    let coinbase = chain.coinbase(recipient, b"");
    let reward = coinbase.total_output_value();
    let block = chain
        .mine_block(vec![coinbase])
        .context("Failed to mine block")?;
    print_mined(block);
    println!(
        "    Paid {} to {}",
        reward.to_string().bright_cyan(),
        to.bright_yellow()
    );
    println!();
    chain.flush()?;
    Ok(())
}

fn list(ctx: &Context, count: usize) -> Result<()> {
    let chain = open_chain(ctx)?;

    println!();
    println!("{}", "Recent Blocks:".bold().cyan());
    println!();

    for block in chain.iter().take(count) {
        let data = String::from_utf8_lossy(&block.payload.data);
        let preview: String = data.chars().take(32).collect();
        println!(
            "  {} {} {} {}",
            format!("#{}", block.index).bright_black(),
            block.hash.to_hex()[..16].bright_yellow(),
            format!("({} txs)", block.tx_count()).bright_black(),
            preview
        );
    }

    println!();
    Ok(())
}

fn validate(ctx: &Context) -> Result<()> {
    let chain = load_chain(ctx)?;
    let stats = chain.stats();

    match chain.validate() {
        Ok(()) => {
            println!(
                "{}  Chain is valid ({} blocks, {} transactions, difficulty {})",
                "✓".green().bold(),
                stats.height + 1,
                stats.transaction_count,
                stats.difficulty_bits
            );
            Ok(())
        }
        Err(err) => {
            println!("{}  Chain is invalid: {}", "✗".red().bold(), err);
            Err(err.into())
        }
    }
}
