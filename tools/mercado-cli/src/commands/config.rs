//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};
use mercado_commerce::config::{CommerceConfig, FreeShippingPolicy, ProviderConfig};
use rust_decimal::Decimal;

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx),
        ConfigCommand::Init { force } => init_config(force, ctx),
        ConfigCommand::Validate => validate_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    if ctx.output.is_json() {
        ctx.output.json(&ctx.config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match &ctx.config_path {
        Some(path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(defaults, no mercado.toml found)"),
    }
    ctx.output.info("");

    let rendered =
        toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;
    println!("{}", rendered);

    Ok(())
}

fn init_config(force: bool, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("mercado.toml");

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    fs::write(&config_path, generate_default_config())
        .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    let (errors, warnings) = check(&ctx.config.commerce);

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": errors.is_empty(),
            "errors": errors,
            "warnings": warnings,
        }));
    }

    if errors.is_empty() && warnings.is_empty() {
        ctx.output.success("Configuration is valid");
        return Ok(());
    }

    for error in &errors {
        ctx.output.error(&format!("Error: {}", error));
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if !errors.is_empty() {
        bail!("Configuration has {} error(s)", errors.len());
    }

    ctx.output.success("Configuration is valid (with warnings)");

    Ok(())
}

/// Collect configuration errors and warnings.
fn check(config: &CommerceConfig) -> (Vec<String>, Vec<String>) {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    let pricing = &config.pricing;
    if pricing.base_fee.is_sign_negative() || pricing.weight_rate.is_sign_negative() {
        errors.push("pricing.base_fee and pricing.weight_rate must not be negative".to_string());
    }
    if pricing.bulk_discount_factor <= Decimal::ZERO || pricing.bulk_discount_factor > Decimal::ONE {
        errors.push("pricing.bulk_discount_factor must be in (0, 1]".to_string());
    }
    match &pricing.free_shipping {
        FreeShippingPolicy::PerCurrency { usd, ves } => {
            if *usd <= Decimal::ZERO || *ves <= Decimal::ZERO {
                errors.push("pricing.free_shipping thresholds must be positive".to_string());
            } else if ves < usd {
                warnings.push(
                    "pricing.free_shipping.ves is below the USD threshold; check the units"
                        .to_string(),
                );
            }
        }
        FreeShippingPolicy::ConvertedFromUsd { usd } => {
            if *usd <= Decimal::ZERO {
                errors.push("pricing.free_shipping.usd must be positive".to_string());
            }
        }
    }

    let currency = &config.currency;
    if currency.bootstrap_rate <= Decimal::ZERO {
        errors.push("currency.bootstrap_rate must be positive".to_string());
    }
    if currency.stale_after_hours == 0 {
        warnings.push("currency.stale_after_hours is 0; every command will refresh".to_string());
    }
    if currency.providers.is_empty() {
        warnings.push(
            "currency.providers is empty; the bootstrap rate will be used until one is added"
                .to_string(),
        );
    }
    for (i, provider) in currency.providers.iter().enumerate() {
        match provider {
            ProviderConfig::Http {
                url, rate_pointer, ..
            } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    errors.push(format!("currency.providers[{}].url must be http(s)", i));
                }
                if !rate_pointer.is_empty() && !rate_pointer.starts_with('/') {
                    errors.push(format!(
                        "currency.providers[{}].rate_pointer must start with '/'",
                        i
                    ));
                }
            }
            ProviderConfig::Fixed { rate } => {
                if *rate <= Decimal::ZERO {
                    errors.push(format!("currency.providers[{}].rate must be positive", i));
                }
            }
        }
    }

    let terms = &config.installments;
    if terms.initial_payment_ratio < Decimal::ZERO || terms.initial_payment_ratio >= Decimal::ONE {
        errors.push("installments.initial_payment_ratio must be in [0, 1)".to_string());
    }
    if terms.interest_rate.is_sign_negative() {
        errors.push("installments.interest_rate must not be negative".to_string());
    }
    if terms.max_installments == 0 {
        errors.push("installments.max_installments must be at least 1".to_string());
    }
    if terms.default_installments == 0 || terms.default_installments > terms.max_installments {
        errors.push(format!(
            "installments.default_installments must be between 1 and {}",
            terms.max_installments
        ));
    }

    if config.orders.environment.trim().is_empty() {
        errors.push("orders.environment must not be empty".to_string());
    }

    (errors, warnings)
}
