//! Initialize chain command.

use super::{config_path, open_chain, save_config, Context};
use anyhow::{bail, Context as _, Result};
use clap::Args;
use colored::Colorize;
use powchain_chain::ChainConfig;
use powchain_core::COINBASE_REWARD;
use std::fs;

#[derive(Args)]
pub struct InitArgs {
    /// Leading zero bits required of every mined block
    #[arg(long, default_value = "16")]
    difficulty: u32,

    /// Coinbase reward for mined blocks
    #[arg(long, default_value_t = COINBASE_REWARD)]
    reward: u64,
}

pub fn run(args: InitArgs, ctx: &Context) -> Result<()> {
    println!("{}", "Initializing powchain...".bold().cyan());
    println!();

    if !(1..=256).contains(&args.difficulty) {
        bail!("Difficulty must be between 1 and 256 bits, got {}", args.difficulty);
    }
    if config_path(&ctx.data_dir).exists() {
        bail!(
            "A chain already exists in {}",
            ctx.data_dir.display()
        );
    }

    fs::create_dir_all(&ctx.data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", ctx.data_dir))?;
    println!("{}  Created data directory", "✓".green().bold());

    let config = ChainConfig {
        difficulty_bits: args.difficulty,
        block_reward: args.reward,
        ..ChainConfig::default()
    };
    save_config(&ctx.data_dir, &config)?;
    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        config_path(&ctx.data_dir).display().to_string().bright_black()
    );

    let chain = open_chain(ctx)?;
    chain.flush()?;
    let genesis = &chain.blocks()[0];

    println!();
    println!("{}  Created genesis block", "✓".green().bold());
    println!("    Hash:       {}", genesis.hash.to_hex().bright_yellow());
    println!("    Difficulty: {}", config.difficulty_bits.to_string().bright_cyan());
    println!("    Reward:     {}", config.block_reward.to_string().bright_cyan());

    println!();
    println!("{}", "Chain initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!(
        "  • Use {} to create a wallet",
        "powchain wallet new".bright_cyan()
    );
    println!(
        "  • Use {} to earn a block reward",
        "powchain block mine --to <address>".bright_cyan()
    );
    println!(
        "  • Use {} to send coins",
        "powchain tx send".bright_cyan()
    );

    Ok(())
}
