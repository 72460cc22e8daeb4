//! powchain CLI entry point.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "powchain")]
#[command(about = "A proof-of-work UTXO blockchain", long_about = None)]
struct Cli {
    /// Directory holding the chain database, config and keys
    #[arg(short, long, global = true, default_value = "./data")]
    data_dir: PathBuf,

    /// Log mining progress and chain events
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(cmd) => {
            let ctx = commands::Context {
                data_dir: cli.data_dir,
                verbose: cli.verbose,
            };
            if let Err(e) = commands::run(cmd, &ctx) {
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("powchain - A proof-of-work UTXO blockchain");
            println!("Run 'powchain --help' for usage information.");
        }
    }
}
