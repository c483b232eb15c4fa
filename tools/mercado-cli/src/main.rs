//! Mercado CLI - Command line front end for the Mercado commerce engine.
//!
//! Commands:
//! - `mercado rate` - Show or refresh the USD→VES exchange rate
//! - `mercado quote` - Price a cart without placing an order
//! - `mercado checkout` - Run a full checkout and store the order
//! - `mercado orders` - Browse and manage stored orders
//! - `mercado config` - Manage configuration

mod commands;
mod config;
mod context;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{CheckoutArgs, ConfigArgs, OrdersArgs, QuoteArgs, RateArgs};

/// Mercado CLI - Price carts, place orders and track them
#[derive(Parser)]
#[command(name = "mercado")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use JSON output format
    #[arg(long, global = true)]
    json: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or refresh the exchange rate
    Rate(RateArgs),

    /// Price a cart in USD or VES
    Quote(QuoteArgs),

    /// Check out a cart and store the order
    Checkout(CheckoutArgs),

    /// Browse and manage stored orders
    Orders(OrdersArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output = output::Output::new(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    let ctx = context::Context::load(config_path, output)?;

    logging::init(&ctx.config.log, cli.verbose);

    let result = match cli.command {
        Commands::Rate(args) => commands::rate::run(args, &ctx).await,
        Commands::Quote(args) => commands::quote::run(args, &ctx).await,
        Commands::Checkout(args) => commands::checkout::run(args, &ctx).await,
        Commands::Orders(args) => commands::orders::run(args, &ctx).await,
        Commands::Config(args) => commands::config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        ctx.output.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
