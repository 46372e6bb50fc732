//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use paylink_core::config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "paylink")]
#[command(version)]
#[command(about = "Telegram bot that turns a short chat into a Stripe payment link")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the Telegram bot (long-polling)
    Bot,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Create a payment link without going through Telegram
    Link {
        /// Unit price and currency, e.g. "10.00 USD"
        #[arg(long)]
        price: String,

        /// Product name shown on the checkout page
        #[arg(long)]
        name: String,

        /// Number of units
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Create a default config file
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

/// Log filter comes from `PAYLINK_LOG`, then `RUST_LOG`, then `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("PAYLINK_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
        Commands::Bot => {
            let config = config::Config::load().context("load config")?;
            commands::bot::run(config).await
        }
        Commands::Link {
            price,
            name,
            quantity,
        } => {
            let config = config::Config::load().context("load config")?;
            commands::link::run(&config, &price, &name, quantity).await
        }
    }
}
