//! murmur - a realtime voice assistant for the terminal.

mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "murmur", about = "murmur - realtime voice assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive voice session.
    Talk,
    /// List audio input and output devices.
    Devices,
    /// Show configuration and device status.
    Status,
    /// Initialize murmur configuration.
    Onboard,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,murmur=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "murmur started");

    match cli.command {
        Commands::Talk => cli::cmd_talk(),
        Commands::Devices => cli::cmd_devices(),
        Commands::Status => cli::cmd_status(),
        Commands::Onboard => cli::cmd_onboard(),
    }
}
