//! Terminal output for the CLI.

use std::fmt::Display;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use mercado_commerce::checkout::OrderStatus;
use mercado_commerce::currency::RateSource;
use serde::Serialize;

/// Where a line goes. Diagnostics use stderr so stdout can be piped.
#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Output handler for CLI messages.
///
/// In JSON mode only [`json`](Self::json) and errors print; everything
/// else is suppressed so stdout stays machine-readable.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    fn emit(&self, stream: Stream, line: impl Display) {
        if self.json {
            return;
        }
        match stream {
            Stream::Stdout => println!("{}", line),
            Stream::Stderr => eprintln!("{}", line),
        }
    }

    pub fn info(&self, msg: &str) {
        self.emit(Stream::Stdout, format_args!("{} {}", style("ℹ").blue(), msg));
    }

    pub fn success(&self, msg: &str) {
        self.emit(Stream::Stdout, format_args!("{} {}", style("✓").green(), msg));
    }

    pub fn warn(&self, msg: &str) {
        self.emit(Stream::Stderr, format_args!("{} {}", style("⚠").yellow(), msg));
    }

    /// Errors print in both modes; JSON mode wraps them in an object.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        } else {
            eprintln!("{} {}", style("✗").red(), style(msg).red());
        }
    }

    /// Only shown with `--verbose`.
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            self.emit(
                Stream::Stderr,
                format_args!("{} {}", style("→").dim(), style(msg).dim()),
            );
        }
    }

    pub fn header(&self, title: &str) {
        self.emit(Stream::Stdout, format_args!("\n{}", style(title).bold().underlined()));
    }

    /// `[2/3] Shipping`
    pub fn step(&self, num: usize, total: usize, msg: &str) {
        let counter = format!("[{}/{}]", num, total);
        self.emit(Stream::Stdout, format_args!("{} {}", style(counter).dim(), msg));
    }

    pub fn kv(&self, key: &str, value: &str) {
        self.emit(Stream::Stdout, format_args!("  {}: {}", style(key).dim(), value));
    }

    pub fn list_item(&self, item: &str) {
        self.emit(Stream::Stdout, format_args!("  {} {}", style("•").dim(), item));
    }

    /// Left-aligned columns; `widths` pads each one.
    pub fn table_row(&self, cols: &[&str], widths: &[usize]) {
        let row = cols
            .iter()
            .zip(widths)
            .map(|(col, width)| format!("{:width$}", col, width = width))
            .collect::<Vec<_>>()
            .join("  ");
        self.emit(Stream::Stdout, format_args!("  {}", row.trim_end()));
    }

    /// Pretty JSON on stdout, whatever the mode.
    pub fn json<T: Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Ticking spinner; hidden in JSON mode.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let spinner = ProgressBar::new_spinner().with_style(style);
        spinner.set_message(msg.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Colored order status.
pub fn status_badge(status: OrderStatus) -> String {
    let name = status.display_name();
    match status {
        OrderStatus::Delivered => style(name).green().to_string(),
        OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Shipped => {
            style(name).cyan().to_string()
        }
        OrderStatus::Pending => style(name).yellow().to_string(),
        OrderStatus::Cancelled => style(name).dim().to_string(),
    }
}

/// Colored rate source; fallback and bootstrap rates stand out.
pub fn source_badge(source: RateSource) -> String {
    match source {
        RateSource::Official | RateSource::Parallel | RateSource::Configured => {
            style(source.as_str()).green().to_string()
        }
        RateSource::Bootstrap | RateSource::Fallback => style(source.as_str()).yellow().to_string(),
    }
}
