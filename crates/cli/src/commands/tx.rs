//! Transaction operations command.

use super::{load_keypair, open_chain, parse_address, Context};
use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use powchain_core::{encode_address, Hash};

#[derive(Args)]
pub struct TxArgs {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand)]
enum TxCommand {
    /// Send coins and mine them into a new block
    Send {
        /// Sender wallet name (key file without .json extension)
        #[arg(short, long)]
        from: String,

        /// Recipient address (base58check)
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u64,
    },
    /// Show a transaction by id
    Show {
        /// Transaction id (hex)
        id: String,
    },
}

pub fn run(args: TxArgs, ctx: &Context) -> Result<()> {
    match args.command {
        TxCommand::Send { from, to, amount } => send(ctx, &from, &to, amount),
        TxCommand::Show { id } => show(ctx, &id),
    }
}

fn send(ctx: &Context, from: &str, to: &str, amount: u64) -> Result<()> {
    println!("{}", "Sending transaction...".bold().cyan());
    println!();

    let keypair = load_keypair(&ctx.data_dir, from)?;
    let recipient = parse_address(to)?;
    let mut chain = open_chain(ctx)?;

    println!("  From:   {}", keypair.address().bright_yellow());
    println!("  To:     {}", to.bright_yellow());
    println!("  Amount: {}", amount.to_string().bright_cyan());

    let tx = chain.new_transfer(&keypair, recipient, amount)?;
    let txid = tx.id;

    // The sender mines the block and collects its reward.
    let reward = chain.coinbase(keypair.pub_key_hash(), b"");
    let block = chain
        .mine_block(vec![reward, tx])
        .context("Failed to mine transaction")?;

    println!();
    println!("{}  Transaction mined", "✓".green().bold());
    println!("    Tx:    {}", txid.to_hex().bright_yellow());
    println!("    Block: {}", block.index.to_string().bright_cyan());
    println!("    Hash:  {}", block.hash.to_hex().bright_black());
    println!();

    chain.flush()?;
    Ok(())
}

fn show(ctx: &Context, id: &str) -> Result<()> {
    let txid = Hash::from_hex(id).with_context(|| format!("Invalid transaction id: {}", id))?;
    let chain = open_chain(ctx)?;
    let tx = chain.find_transaction(&txid)?;

    println!();
    println!("{}", "Transaction:".bold().cyan());
    println!();
    println!("  Id:       {}", tx.id.to_hex().bright_yellow());
    println!(
        "  Coinbase: {}",
        if tx.is_coinbase() {
            "Yes".green()
        } else {
            "No".bright_black()
        }
    );
    println!(
        "  Verified: {}",
        if chain.verify_transaction(tx) {
            "Yes".green()
        } else {
            "No".red()
        }
    );

    if !tx.is_coinbase() {
        println!();
        println!("{}", "Inputs:".bold());
        for (i, input) in tx.inputs.iter().enumerate() {
            let source = input
                .prev_tx_id
                .map(|txid| txid.to_hex()[..16].to_string())
                .unwrap_or_default();
            println!(
                "  {} {}:{}",
                format!("{}.", i + 1).bright_black(),
                source.bright_yellow(),
                input.prev_output_index
            );
        }
    }

    println!();
    println!("{}", "Outputs:".bold());
    for (i, output) in tx.outputs.iter().enumerate() {
        println!(
            "  {} {} → {}",
            format!("{}.", i).bright_black(),
            output.value.to_string().bright_cyan(),
            encode_address(&output.pub_key_hash).bright_yellow()
        );
    }
    println!();

    Ok(())
}
