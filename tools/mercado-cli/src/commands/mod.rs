//! CLI command implementations.

pub mod checkout;
pub mod config;
pub mod orders;
pub mod quote;
pub mod rate;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use mercado_commerce::prelude::*;
use rust_decimal::Decimal;

/// Arguments for the rate command.
#[derive(Args)]
pub struct RateArgs {
    /// Query the providers even if the saved rate is fresh.
    #[arg(short, long)]
    pub refresh: bool,

    /// Convert an amount with the current rate.
    #[arg(long)]
    pub convert: Option<Decimal>,

    /// Currency of the amount passed to --convert.
    #[arg(long, default_value = "USD")]
    pub from: String,
}

/// Cart lines and display currency, shared by quote and checkout.
#[derive(Args)]
pub struct CartArgs {
    /// Cart line as SKU:PRICE:QTY[:UNIT]; repeat for more lines.
    #[arg(short, long = "line", required = true)]
    pub lines: Vec<String>,

    /// Display currency (USD or VES).
    #[arg(long, default_value = "USD")]
    pub currency: String,
}

/// Arguments for the quote command.
#[derive(Args)]
pub struct QuoteArgs {
    #[command(flatten)]
    pub cart: CartArgs,
}

/// Arguments for the checkout command.
#[derive(Args)]
pub struct CheckoutArgs {
    #[command(flatten)]
    pub cart: CartArgs,

    /// Buyer tax ID (RIF), e.g. J-40123456-1.
    #[arg(long)]
    pub tax_id: Option<String>,

    /// Registered business name.
    #[arg(long)]
    pub business_name: Option<String>,

    /// Fiscal address.
    #[arg(long)]
    pub fiscal_address: Option<String>,

    /// Delivery street address.
    #[arg(long)]
    pub address: Option<String>,

    /// Delivery city.
    #[arg(long)]
    pub city: Option<String>,

    /// Delivery state.
    #[arg(long)]
    pub state: Option<String>,

    /// Contact phone for the delivery.
    #[arg(long)]
    pub phone: Option<String>,

    /// Delivery notes.
    #[arg(long)]
    pub notes: Option<String>,

    /// Payment method: installments, mobile_payment, bank_transfer,
    /// cash_on_delivery.
    #[arg(short, long, default_value = "installments")]
    pub method: String,

    /// Number of installments (installments method only).
    #[arg(long)]
    pub installments: Option<u32>,

    /// Bank reference for mobile payment or bank transfer.
    #[arg(long)]
    pub reference: Option<String>,

    /// Skip confirmation and prompts.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the orders command.
#[derive(Args)]
pub struct OrdersArgs {
    #[command(subcommand)]
    pub command: Option<OrdersCommand>,

    /// Only list orders with this status.
    #[arg(short, long)]
    pub status: Option<String>,

    /// Show only the last N orders.
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum OrdersCommand {
    /// List orders, newest first.
    List,
    /// Show one order.
    Show {
        /// Order ID or order number.
        order: String,
    },
    /// Move an order to a new status.
    Status {
        /// Order ID or order number.
        order: String,
        /// New status.
        status: String,
    },
    /// Cancel an order.
    Cancel {
        /// Order ID or order number.
        order: String,
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
    /// Remove every stored order.
    Clear {
        /// Reset an unreadable order record instead.
        #[arg(long)]
        corrupted: bool,
        /// Skip confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}

/// Parse a display currency code.
pub fn parse_currency(code: &str) -> Result<Currency> {
    match Currency::from_code(code) {
        Some(currency) => Ok(currency),
        None => bail!("Unknown currency '{}' (expected USD or VES)", code),
    }
}

/// Parse one `SKU:PRICE:QTY[:UNIT]` cart line. Prices are in USD.
pub fn parse_line(spec: &str) -> Result<CartLine> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    let (sku, price, quantity, unit) = match parts.as_slice() {
        [sku, price, quantity] => (*sku, *price, *quantity, "unit"),
        [sku, price, quantity, unit] => (*sku, *price, *quantity, *unit),
        _ => bail!("Invalid line '{}': expected SKU:PRICE:QTY[:UNIT]", spec),
    };

    if sku.is_empty() {
        bail!("Invalid line '{}': SKU is empty", spec);
    }
    let price: Decimal = price
        .parse()
        .with_context(|| format!("Invalid price '{}' in line '{}'", price, spec))?;
    let quantity: u32 = quantity
        .parse()
        .with_context(|| format!("Invalid quantity '{}' in line '{}'", quantity, spec))?;

    CartLine::new(sku, sku, Money::usd(price), quantity, unit)
        .with_context(|| format!("Invalid line '{}'", spec))
}

/// Build a cart from repeated `--line` arguments. Repeated SKUs merge.
pub fn build_cart(lines: &[String]) -> Result<Cart> {
    let mut cart = Cart::new();
    for spec in lines {
        cart.add_line(parse_line(spec)?)?;
    }
    Ok(cart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_line() {
        let line = parse_line("harina-pan:1.25:40:kg").unwrap();
        assert_eq!(line.product_id().as_str(), "harina-pan");
        assert_eq!(line.unit_price(), Money::usd(dec!(1.25)));
        assert_eq!(line.quantity(), 40);
        assert_eq!(line.unit(), "kg");

        let line = parse_line("water-5l:1:60").unwrap();
        assert_eq!(line.unit(), "unit");
    }

    #[test]
    fn test_parse_line_rejects_bad_input() {
        assert!(parse_line("water-5l:1").is_err());
        assert!(parse_line(":1:10").is_err());
        assert!(parse_line("water-5l:abc:10").is_err());
        assert!(parse_line("water-5l:1:-3").is_err());
        assert!(parse_line("water-5l:0:10").is_err());

        // Below the wholesale minimum.
        let err = parse_line("water-5l:1:2").unwrap_err();
        assert!(format!("{:#}", err).contains("water-5l"));
    }

    #[test]
    fn test_build_cart_merges_repeated_sku() {
        let cart = build_cart(&[
            "aceite:2.80:12:l".to_string(),
            "aceite:2.80:8:l".to_string(),
            "arroz:1.10:20:kg".to_string(),
        ])
        .unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity(), 20);
        assert_eq!(cart.subtotal_usd().unwrap(), Money::usd(dec!(78.00)));
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("ves").unwrap(), Currency::VES);
        assert_eq!(parse_currency("USD").unwrap(), Currency::USD);
        assert!(parse_currency("EUR").is_err());
    }
}
