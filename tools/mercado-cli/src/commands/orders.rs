//! Order history commands.

use anyhow::{bail, Result};
use dialoguer::Confirm;
use mercado_commerce::prelude::*;

use super::{OrdersArgs, OrdersCommand};
use crate::commands::checkout::print_schedule;
use crate::context::Context;
use crate::output::status_badge;

/// Run the orders command.
pub async fn run(args: OrdersArgs, ctx: &Context) -> Result<()> {
    let store = ctx.order_store(ctx.kv_store()?);

    match args.command {
        Some(OrdersCommand::List) | None => list_orders(&store, args.status, args.limit, ctx),
        Some(OrdersCommand::Show { order }) => show_order(&store, &order, ctx),
        Some(OrdersCommand::Status { order, status }) => set_status(&store, &order, &status, ctx),
        Some(OrdersCommand::Cancel { order, yes }) => cancel_order(&store, &order, yes, ctx),
        Some(OrdersCommand::Clear { corrupted, yes }) => clear_orders(&store, corrupted, yes, ctx),
    }
}

fn list_orders(
    store: &OrderStore,
    status: Option<String>,
    limit: Option<usize>,
    ctx: &Context,
) -> Result<()> {
    let mut orders = match status {
        Some(status) => store.with_status(parse_status(&status)?),
        None => store.orders(),
    };
    if let Some(limit) = limit {
        orders.truncate(limit);
    }

    if ctx.output.is_json() {
        ctx.output.json(&orders);
        return Ok(());
    }

    ctx.output.header("Orders");

    if orders.is_empty() {
        ctx.output.info("No orders found.");
        ctx.output.info("Run `mercado checkout` to place one.");
        return Ok(());
    }

    let widths = [24, 18, 12, 8, 16];
    ctx.output
        .table_row(&["ORDER", "PLACED", "STATUS", "ITEMS", "TOTAL"], &widths);
    for order in &orders {
        ctx.output.table_row(
            &[
                &order.order_number,
                &order.created_at.format("%Y-%m-%d %H:%M").to_string(),
                &status_badge(order.status),
                &order.item_count().to_string(),
                &order.display_total()?.display(),
            ],
            &widths,
        );
    }

    Ok(())
}

fn show_order(store: &OrderStore, reference: &str, ctx: &Context) -> Result<()> {
    let order = find(store, reference)?;

    if ctx.output.is_json() {
        ctx.output.json(&order);
        return Ok(());
    }

    ctx.output.header(&format!("Order {}", order.order_number));
    ctx.output.kv("ID", order.id.as_str());
    ctx.output.kv("Status", &status_badge(order.status));
    ctx.output
        .kv("Placed", &order.created_at.format("%Y-%m-%d %H:%M UTC").to_string());
    ctx.output
        .kv("Updated", &order.updated_at.format("%Y-%m-%d %H:%M UTC").to_string());
    ctx.output.kv("Payment", order.payment_method.display_name());
    match &order.payment_details {
        PaymentDetails::MobilePayment { reference } | PaymentDetails::BankTransfer { reference } => {
            ctx.output.kv("Reference", reference)
        }
        PaymentDetails::Installments { .. } | PaymentDetails::CashOnDelivery => {}
    }

    if let Some(fiscal) = &order.fiscal_data {
        ctx.output.kv("Buyer", &format!("{} ({})", fiscal.business_name, fiscal.tax_id));
    }
    if let Some(delivery) = &order.delivery_info {
        ctx.output.kv(
            "Deliver to",
            &format!("{}, {}, {}", delivery.address, delivery.city, delivery.state),
        );
        ctx.output.kv("Phone", &delivery.contact_phone);
        if let Some(notes) = &delivery.notes {
            ctx.output.kv("Notes", notes);
        }
    }

    let show = |money: &Money| -> Result<String> {
        Ok(order.display_amount(money)?.display())
    };

    ctx.output.info("");
    for item in &order.items {
        ctx.output.list_item(&format!(
            "{} × {} {} = {}",
            item.name,
            item.quantity,
            item.unit,
            show(&item.line_total)?
        ));
    }
    ctx.output.kv("Subtotal", &show(&order.subtotal)?);
    ctx.output.kv("Logistics", &show(&order.logistics)?);
    ctx.output.kv("Tax", &show(&order.tax)?);
    ctx.output.kv("Total", &show(&order.total)?);
    match &order.exchange_rate {
        Some(rate) if order.currency != Currency::USD => ctx.output.kv(
            "Rate",
            &format!("{} per USD ({})", Money::ves(rate.rate()).display(), rate.source()),
        ),
        None if order.currency != Currency::USD => {
            ctx.output.kv("Rate", "not recorded; amounts shown in USD")
        }
        _ => {}
    }

    if let Some(schedule) = order.schedule() {
        print_schedule(&ctx.output, schedule, &order)?;
    }

    Ok(())
}

fn set_status(store: &OrderStore, reference: &str, status: &str, ctx: &Context) -> Result<()> {
    let order = find(store, reference)?;
    let status = parse_status(status)?;

    let updated = store.set_status(&order.id, status)?;
    warn_if_unsaved(store, ctx);

    if ctx.output.is_json() {
        ctx.output.json(&updated);
        return Ok(());
    }

    ctx.output.success(&format!(
        "Order {}: {} → {}",
        updated.order_number,
        order.status.display_name(),
        status_badge(updated.status)
    ));
    Ok(())
}

fn cancel_order(store: &OrderStore, reference: &str, yes: bool, ctx: &Context) -> Result<()> {
    let order = find(store, reference)?;
    if !order.status.can_cancel() {
        bail!(
            "Order {} is {} and can no longer be cancelled",
            order.order_number,
            order.status.display_name().to_lowercase()
        );
    }

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new()
            .with_prompt(format!("Cancel order {}?", order.order_number))
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.info("Nothing changed");
            return Ok(());
        }
    }

    let cancelled = store.cancel(&order.id)?;
    warn_if_unsaved(store, ctx);

    if ctx.output.is_json() {
        ctx.output.json(&cancelled);
        return Ok(());
    }

    ctx.output
        .success(&format!("Order {} cancelled", cancelled.order_number));
    Ok(())
}

fn clear_orders(store: &OrderStore, corrupted: bool, yes: bool, ctx: &Context) -> Result<()> {
    let prompt = if corrupted {
        format!("Reset the order record under '{}'?", store.key())
    } else {
        format!("Delete all {} stored order(s)?", store.len())
    };

    if !yes && !ctx.output.is_json() {
        let confirmed = Confirm::new().with_prompt(prompt).default(false).interact()?;
        if !confirmed {
            ctx.output.info("Nothing changed");
            return Ok(());
        }
    }

    if corrupted {
        store.clear_corrupted();
    } else {
        store.clear();
    }
    warn_if_unsaved(store, ctx);

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "cleared": store.key() }));
        return Ok(());
    }

    ctx.output.success("Orders cleared");
    Ok(())
}

fn find(store: &OrderStore, reference: &str) -> Result<Order> {
    match store.find(reference) {
        Some(order) => Ok(order),
        None => bail!("Order not found: {}", reference),
    }
}

fn parse_status(status: &str) -> Result<OrderStatus> {
    match OrderStatus::from_str_opt(status) {
        Some(status) => Ok(status),
        None => {
            let known: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
            bail!("Unknown status '{}' (expected one of: {})", status, known.join(", "))
        }
    }
}

fn warn_if_unsaved(store: &OrderStore, ctx: &Context) {
    if let Some(error) = store.last_error() {
        ctx.output
            .warn(&format!("Change kept in memory but not saved: {}", error));
    }
}
