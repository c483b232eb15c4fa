//! Exchange rate commands.

use anyhow::Result;
use mercado_commerce::prelude::*;
use serde::Serialize;

use super::{parse_currency, RateArgs};
use crate::context::Context;
use crate::output::source_badge;

#[derive(Serialize)]
struct RateReport {
    rate: ExchangeRate,
    stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    converted: Option<Conversion>,
}

#[derive(Serialize)]
struct Conversion {
    from: Money,
    to: Money,
}

/// Run the rate command.
pub async fn run(args: RateArgs, ctx: &Context) -> Result<()> {
    let kv = ctx.kv_store()?;
    let currency = ctx.currency_service(&kv)?;

    let outcome = if args.refresh {
        let spinner = ctx.output.spinner("Querying rate providers...");
        let outcome = currency.refresh().await;
        spinner.finish_and_clear();
        Some(outcome)
    } else {
        currency.refresh_if_stale().await
    };

    if let Some(outcome) = &outcome {
        ctx.save_rate(&kv, &outcome.rate)?;
        match &outcome.error {
            Some(error) => ctx
                .output
                .warn(&format!("Refresh failed, keeping last known rate: {}", error)),
            None => ctx.output.debug(&format!(
                "Refreshed from {}",
                outcome.rate.source().as_str()
            )),
        }
    }

    let rate = currency.get_rate();
    let converted = match args.convert {
        Some(amount) => {
            let from = Money::new(amount, parse_currency(&args.from)?);
            let to = match from.currency {
                Currency::USD => Currency::VES,
                Currency::VES => Currency::USD,
            };
            Some(Conversion {
                to: rate.convert(&from, to)?.rounded(),
                from,
            })
        }
        None => None,
    };

    let report = RateReport {
        stale: currency.is_stale(&rate),
        refresh_error: outcome.and_then(|o| o.error),
        rate,
        converted,
    };

    if ctx.output.is_json() {
        ctx.output.json(&report);
        return Ok(());
    }

    ctx.output.header("Exchange Rate");
    ctx.output.kv(
        "USD → VES",
        &format!("{} per USD", Money::ves(report.rate.rate()).display()),
    );
    ctx.output.kv("Source", &source_badge(report.rate.source()));
    ctx.output.kv(
        "Updated",
        &report
            .rate
            .last_updated_at()
            .format("%Y-%m-%d %H:%M UTC")
            .to_string(),
    );
    if report.stale {
        ctx.output.warn(&format!(
            "Rate is older than {} hours",
            currency.stale_after().num_hours()
        ));
    }

    if let Some(conversion) = &report.converted {
        ctx.output.info(&format!(
            "{} = {}",
            conversion.from.display(),
            conversion.to.display()
        ));
    }

    Ok(())
}
