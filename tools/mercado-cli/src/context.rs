//! CLI execution context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use mercado_cache::{Cache, FileStore, KvStore};
use mercado_commerce::prelude::*;
use tracing::warn;

use crate::config::{CliConfig, CONFIG_NAMES};
use crate::output::Output;

/// Key holding the last published exchange rate between runs.
pub const RATE_KEY: &str = "exchange-rate";

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
    /// Config file in use, if any.
    pub config_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let config_path = match config_path {
            Some(path) => Some(resolve(&cwd, path)),
            None => Self::find_config(&cwd),
        };
        let config = match &config_path {
            Some(path) => CliConfig::load(path)?,
            None => CliConfig::default(),
        };

        Ok(Self {
            config,
            output,
            cwd,
            config_path,
            clock: Arc::new(SystemClock),
        })
    }

    /// Find a config file in the directory tree.
    fn find_config(start: &Path) -> Option<PathBuf> {
        start.ancestors().find_map(|dir| {
            CONFIG_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
        })
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Directory that relative config paths are resolved against.
    pub fn base_dir(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }

    /// Get the data directory, creating it if needed.
    pub fn data_dir(&self) -> Result<PathBuf> {
        let dir = resolve(&self.base_dir(), &self.config.storage.dir);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;
        Ok(dir)
    }

    /// Open the on-disk key-value store.
    pub fn kv_store(&self) -> Result<Arc<dyn KvStore>> {
        let dir = self.data_dir()?;
        let store = FileStore::open(&dir)
            .with_context(|| format!("Failed to open data directory: {}", dir.display()))?;
        Ok(Arc::new(store))
    }

    /// Currency service seeded with the rate saved by the previous run.
    pub fn currency_service(&self, kv: &Arc<dyn KvStore>) -> Result<CurrencyService> {
        let seed = match Cache::new(kv.clone()).get::<ExchangeRate>(RATE_KEY) {
            Ok(seed) => seed,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable saved exchange rate");
                None
            }
        };
        CurrencyService::from_config(&self.config.commerce.currency, self.clock(), seed)
            .context("Invalid currency configuration")
    }

    /// Persist the current rate so the next run starts from it.
    pub fn save_rate(&self, kv: &Arc<dyn KvStore>, rate: &ExchangeRate) -> Result<()> {
        Cache::new(kv.clone())
            .set(RATE_KEY, rate)
            .context("Failed to save exchange rate")
    }

    /// Refresh the rate if it is stale and save whatever the service now holds.
    pub async fn current_rate(
        &self,
        kv: &Arc<dyn KvStore>,
        currency: &CurrencyService,
    ) -> Result<ExchangeRate> {
        if let Some(outcome) = currency.refresh_if_stale().await {
            if let Some(error) = &outcome.error {
                self.output
                    .warn(&format!("Using last known rate, refresh failed: {}", error));
            }
            self.save_rate(kv, &outcome.rate)?;
        }
        Ok(currency.get_rate())
    }

    /// Open the order store and report anything unusual found on load.
    pub fn order_store(&self, kv: Arc<dyn KvStore>) -> Arc<OrderStore> {
        let (store, report) =
            OrderStore::open(kv, &self.config.commerce.orders.environment, self.clock());

        if report.corrupted {
            self.output.warn(&format!(
                "Stored orders under '{}' are unreadable; run `mercado orders clear --corrupted` to reset",
                store.key()
            ));
        }
        if report.dropped > 0 {
            self.output.warn(&format!(
                "Skipped {} unreadable order record(s); changes will not be saved until `mercado orders clear --corrupted`",
                report.dropped
            ));
        }
        if report.repaired > 0 {
            self.output.debug(&format!(
                "Repaired timestamps on {} order(s)",
                report.repaired
            ));
        }

        Arc::new(store)
    }

    /// Order placement wired to `store` and the configured installment terms.
    pub fn placement(&self, store: Arc<OrderStore>) -> OrderPlacement {
        let processor =
            InstallmentProcessor::new(self.config.commerce.installments.clone(), self.clock());
        OrderPlacement::new(store, processor, self.clock())
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_walks_up() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("mercado.toml"), "").unwrap();

        assert_eq!(
            Context::find_config(&nested),
            Some(root.path().join("mercado.toml"))
        );
    }

    #[test]
    fn test_find_config_prefers_nearest() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("shop");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join("mercado.toml"), "").unwrap();
        std::fs::write(nested.join("mercado.json"), "{}").unwrap();

        assert_eq!(Context::find_config(&nested), Some(nested.join("mercado.json")));
    }

    #[test]
    fn test_resolve() {
        let base = Path::new("/srv/shop");
        assert_eq!(resolve(base, ".mercado"), PathBuf::from("/srv/shop/.mercado"));
        assert_eq!(resolve(base, "/var/lib/mercado"), PathBuf::from("/var/lib/mercado"));
    }
}
