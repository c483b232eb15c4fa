//! Run a checkout from the command line.

use anyhow::{bail, Context as _, Result};
use dialoguer::{Confirm, Input};
use mercado_commerce::prelude::*;

use super::{build_cart, parse_currency, CheckoutArgs};
use crate::commands::quote::print_priced_cart;
use crate::context::Context;
use crate::output::{status_badge, Output};

/// Run the checkout command.
pub async fn run(args: CheckoutArgs, ctx: &Context) -> Result<()> {
    let interactive = !args.yes && !ctx.output.is_json();

    let cart = build_cart(&args.cart.lines)?;
    let currency = parse_currency(&args.cart.currency)?;
    let method = match PaymentMethod::from_str_opt(&args.method) {
        Some(method) => method,
        None => bail!(
            "Unknown payment method '{}' (expected installments, mobile_payment, bank_transfer or cash_on_delivery)",
            args.method
        ),
    };

    let kv = ctx.kv_store()?;
    let service = ctx.currency_service(&kv)?;
    let rate = ctx.current_rate(&kv, &service).await?;
    let priced = price(cart.lines(), currency, &rate, &ctx.config.commerce.pricing)?;

    ctx.output.header("Checkout");
    print_priced_cart(&ctx.output, &cart, &priced)?;

    let mut session = CheckoutSession::new();
    ctx.output.debug(&format!("Checkout session {}", session.id()));

    ctx.output.info("");
    ctx.output.step(1, 3, CheckoutStep::FiscalData.display_name());
    let fiscal = FiscalData::new(
        &field(args.tax_id, "Tax ID (RIF)", interactive)?,
        &field(args.business_name, "Business name", interactive)?,
        &field(args.fiscal_address, "Fiscal address", interactive)?,
    )?;
    session.submit_fiscal_data(fiscal)?;

    ctx.output.step(2, 3, CheckoutStep::Shipping.display_name());
    let mut delivery = DeliveryInfo::new(
        field(args.address, "Delivery address", interactive)?,
        field(args.city, "City", interactive)?,
        field(args.state, "State", interactive)?,
        field(args.phone, "Contact phone", interactive)?,
    );
    if let Some(notes) = args.notes {
        delivery = delivery.with_notes(notes);
    }
    session.submit_delivery_info(delivery)?;

    ctx.output.step(3, 3, CheckoutStep::Payment.display_name());
    session.select_payment_method(method)?;
    ctx.output.kv("Payment", method.display_name());

    if interactive {
        ctx.output.info("");
        let confirmed = Confirm::new()
            .with_prompt(format!("Place order for {}?", priced.total().display()))
            .default(true)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Checkout cancelled");
            return Ok(());
        }
    }

    let store = ctx.order_store(kv);
    let placement = ctx.placement(store);

    let order = match method {
        PaymentMethod::Installments => {
            let installments = args
                .installments
                .unwrap_or(placement.processor().terms().default_installments);
            pay_in_installments(ctx, &placement, &session, &cart, &priced, installments).await?
        }
        _ => {
            if args.installments.is_some() {
                ctx.output
                    .warn("--installments only applies to the installments method");
            }
            let reference = match args.reference {
                Some(reference) => Some(reference),
                None if method.needs_reference() && interactive => {
                    Some(prompt("Payment reference")?)
                }
                None => None,
            };
            placement.place_order_with_reference(&session, &cart, &priced, reference.as_deref())?
        }
    };

    if let Some(error) = placement.store().last_error() {
        ctx.output
            .warn(&format!("Order placed but not saved to disk: {}", error));
    }

    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }

    ctx.output.success(&format!("Order {} placed", order.order_number));
    ctx.output.kv("Status", &status_badge(order.status));
    ctx.output.kv("Total", &order.display_total()?.display());
    if let Some(schedule) = order.schedule() {
        print_schedule(&ctx.output, schedule, &order)?;
    }

    Ok(())
}

async fn pay_in_installments(
    ctx: &Context,
    placement: &OrderPlacement,
    session: &CheckoutSession,
    cart: &Cart,
    priced: &PricedCart,
    installments: u32,
) -> Result<Order> {
    let spinner = ctx.output.spinner("Starting installment payment...");
    let result = tokio::select! {
        result = placement.place_installment_order(session, cart, priced, installments, |event| {
            spinner.set_message(event.stage().display_name());
        }) => result.context("Installment payment did not complete"),
        _ = tokio::signal::ctrl_c() => {
            Err(anyhow::anyhow!("Installment payment interrupted"))
        }
    };
    spinner.finish_and_clear();
    result
}

/// Print an installment plan in the order's display currency.
pub fn print_schedule(output: &Output, schedule: &InstallmentSchedule, order: &Order) -> Result<()> {
    let show = |money: &Money| -> Result<String> {
        Ok(order.display_amount(money)?.display())
    };

    output.info("");
    output.info(&format!(
        "{} installments, {} today",
        schedule.installments,
        show(&schedule.initial_payment)?
    ));
    let widths = [4, 12, 14];
    output.table_row(&["#", "DUE", "AMOUNT"], &widths);
    for due in &schedule.payment_schedule {
        output.table_row(
            &[
                &due.installment_index.to_string(),
                &due.due_date.format("%Y-%m-%d").to_string(),
                &show(&due.amount)?,
            ],
            &widths,
        );
    }
    Ok(())
}

/// Use a flag value, or prompt for it when running interactively.
fn field(value: Option<String>, label: &str, interactive: bool) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None if interactive => prompt(label),
        None => bail!(
            "Missing {} (pass it as a flag or run without --yes/--json)",
            label.to_lowercase()
        ),
    }
}

fn prompt(label: &str) -> Result<String> {
    Ok(Input::<String>::new().with_prompt(label).interact_text()?)
}
