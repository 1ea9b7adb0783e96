//! Ascend CLI: skill trees, unlock states and session queues.

use ascend::core::config::DEFAULT_CONFIG_FILE;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ascend",
    version,
    about = "Program progression engine: skill trees, unlock states and session queues"
)]
struct Cli {
    /// Engine config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: ascend::cli::Commands,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ascend=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = ascend::cli::dispatch(&cli.config, cli.command).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
