//! Logging system configuration and initialization
//!
//! - Console output and/or a non-blocking log file
//! - Optional JSON formatting for the file layer
//! - `RUST_LOG` overrides the configured level
//! - Dependency noise (`sqlx`, `reqwest`, `hyper`) suppressed below TRACE

#![allow(clippy::uninlined_format_args)]

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use tracing::{Subscriber, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::AppConfig;

// Keeps the file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn get_log_directory(config: &LoggingConfig) -> PathBuf {
    config
        .directory
        .clone()
        .unwrap_or_else(|| AppConfig::app_data_dir().join("logs"))
}

/// Builds the filter from the configured level and module filters.
///
/// ```bash
/// # Show SQL statements while debugging
/// RUST_LOG="debug,sqlx::query=debug" covid-census
/// ```
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for (module, level) in &config.module_filters {
            let directive = format!("{}={}", module, level)
                .parse()
                .map_err(|e| anyhow!("Invalid log filter {}={}: {}", module, level, e))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

/// Stdout layer for whichever subscriber stack it is added to.
fn console_layer<S>(enabled: bool) -> Option<impl Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    enabled.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false)
    })
}

/// Initialize logging with the given configuration. Fails if called twice.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;
    let registry = Registry::default().with(env_filter);

    match (config.file_output, config.console_output) {
        (false, false) => return Err(anyhow!("No logging output configured")),
        (true, _) => {
            let log_dir = get_log_directory(config);
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;

            let file_appender = rolling::never(&log_dir, &config.file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("Log guard registry poisoned"))?
                .push(file_guard);

            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_target(true)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console_layer(config.console_output))
                    .try_init()
                    .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                    .with_target(false)
                    .with_ansi(false);
                registry
                    .with(file_layer)
                    .with(console_layer(config.console_output))
                    .try_init()
                    .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;
            }
            info!("Log directory: {:?}", log_dir);
        }
        (false, true) => {
            registry
                .with(console_layer(config.console_output))
                .try_init()
                .map_err(|e| anyhow!("Failed to install subscriber: {}", e))?;
        }
    }

    info!("Logging system initialized (level: {}, json: {})", config.level, config.json_format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        let config = LoggingConfig::default();
        assert!(build_env_filter(&config).is_ok());
    }

    #[test]
    fn rejects_configuration_without_outputs() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }

    #[test]
    fn installs_file_and_console_layers_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            json_format: true,
            file_output: true,
            directory: Some(dir.path().join("logs")),
            ..LoggingConfig::default()
        };

        init_logging_with_config(&config).unwrap();
        assert!(dir.path().join("logs").is_dir());

        let console_only = LoggingConfig::default();
        assert!(init_logging_with_config(&console_only).is_err());
    }

    #[test]
    fn explicit_directory_wins() {
        let config = LoggingConfig {
            directory: Some(PathBuf::from("/var/log/covid")),
            ..LoggingConfig::default()
        };
        assert_eq!(get_log_directory(&config), PathBuf::from("/var/log/covid"));
    }
}
