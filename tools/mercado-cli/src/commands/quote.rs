//! Price a cart without placing an order.

use anyhow::Result;
use mercado_commerce::prelude::*;
use serde::Serialize;

use super::{build_cart, parse_currency, QuoteArgs};
use crate::context::Context;
use crate::output::Output;

#[derive(Serialize)]
struct Quote<'a> {
    lines: &'a [CartLine],
    #[serde(flatten)]
    priced: &'a PricedCart,
}

/// Run the quote command.
pub async fn run(args: QuoteArgs, ctx: &Context) -> Result<()> {
    let cart = build_cart(&args.cart.lines)?;
    let currency = parse_currency(&args.cart.currency)?;

    let kv = ctx.kv_store()?;
    let service = ctx.currency_service(&kv)?;
    let rate = ctx.current_rate(&kv, &service).await?;

    let priced = price(cart.lines(), currency, &rate, &ctx.config.commerce.pricing)?;

    if ctx.output.is_json() {
        ctx.output.json(&Quote {
            lines: cart.lines(),
            priced: &priced,
        });
        return Ok(());
    }

    ctx.output.header(&format!("Quote in {}", currency.code()));
    print_priced_cart(&ctx.output, &cart, &priced)?;

    if !priced.free_shipping {
        let threshold = ctx
            .config
            .commerce
            .pricing
            .free_shipping
            .threshold_in(currency, rate.rate());
        ctx.output.info(&format!(
            "Free logistics from {}",
            Money::new(threshold, currency).rounded().display()
        ));
    }

    Ok(())
}

/// Print cart lines and the display breakdown.
pub fn print_priced_cart(output: &Output, cart: &Cart, priced: &PricedCart) -> Result<()> {
    let widths = [20, 10, 14, 14];
    output.table_row(&["PRODUCT", "QTY", "UNIT PRICE", "LINE TOTAL"], &widths);
    for line in cart.lines() {
        let unit_price = priced.rate.convert(&line.unit_price(), priced.currency)?;
        let line_total = priced.rate.convert(&line.line_total()?, priced.currency)?;
        output.table_row(
            &[
                line.name(),
                &format!("{} {}", line.quantity(), line.unit()),
                &unit_price.display(),
                &line_total.display(),
            ],
            &widths,
        );
    }

    output.info("");
    output.kv("Subtotal", &priced.subtotal().display());
    if priced.free_shipping {
        output.kv("Logistics", "free");
    } else {
        output.kv("Logistics", &priced.logistics().display());
    }
    output.kv("Tax", &priced.tax().display());
    output.kv("Total", &priced.total().display());
    output.kv("Weight", &format!("{} units", priced.total_weight));
    if priced.currency != Currency::USD {
        output.kv(
            "Rate",
            &format!("{} per USD", Money::ves(priced.rate.rate()).display()),
        );
    }
    Ok(())
}
