use anyhow::Result;
use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::cli::config::{LogConfig, LogFormat};

/// Build the filter: `RUST_LOG` wins, otherwise the configured level, and
/// `verbose` forces debug
pub fn build_filter(config: &LogConfig, verbose: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return Ok(EnvFilter::try_new(directives)?);
    }

    let level = if verbose { "debug" } else { config.level.as_str() };
    Ok(EnvFilter::try_new(level)?)
}

/// Initialize the logging system
pub fn init_logging(config: &LogConfig, verbose: bool) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let env_filter = build_filter(config, verbose, rust_log.as_deref())?;

    let fmt_layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .with_file(config.caller)
            .with_line_number(config.caller)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .with_file(config.caller)
            .with_line_number(config.caller)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
