//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use mercado_commerce::config::CommerceConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LogFormat;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["mercado.toml", ".mercado.toml", "mercado.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where orders and the rate snapshot are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Diagnostic logging.
    #[serde(default)]
    pub log: LogConfig,

    /// Pricing, currency, installment and order settings.
    #[serde(default)]
    pub commerce: CommerceConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory, relative to the config file's directory.
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

fn default_storage_dir() -> String {
    ".mercado".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Logging configuration. `MERCADO_LOG` and `RUST_LOG` take precedence over
/// `filter`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub format: LogFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Generate a default mercado.toml config file.
pub fn generate_default_config() -> String {
    r#"# Mercado configuration

[storage]
# Orders and the last exchange rate live here, relative to this file.
dir = ".mercado"

[log]
format = "human"
# filter = "warn,mercado=info"

[commerce.pricing]
base_fee = "2.5"
weight_rate = "0.5"
bulk_weight_threshold = 50
bulk_discount_factor = "0.8"

[commerce.pricing.free_shipping]
# "per_currency" compares the displayed subtotal with a threshold per
# currency; "converted_from_usd" compares the USD subtotal with `usd`.
mode = "per_currency"
usd = "100"
ves = "3600"

[commerce.currency]
stale_after_hours = 6
bootstrap_rate = "36.50"
fetch_timeout_ms = 5000
fetch_retries = 1

# Providers are tried in order; the first valid quote wins.
# [[commerce.currency.providers]]
# kind = "http"
# name = "central-bank"
# url = "https://rates.example.com/latest?base=USD"
# rate_pointer = "/rates/VES"
# updated_at_pointer = "/updated_at"
# source = "official"
#
# [[commerce.currency.providers]]
# kind = "fixed"
# rate = "36.50"

[commerce.installments]
redirect_ms = 2000
processing_ms = 3000
validating_ms = 2000
close_grace_ms = 3000
initial_payment_ratio = "0.40"
interest_rate = "0"
default_installments = 3
max_installments = 12

[commerce.orders]
environment = "default"
"#
    .to_string()
}
