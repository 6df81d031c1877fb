// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging setup for embedders of the controllers

use crate::config::{ConfigError, LogConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. Output goes to
/// the configured file, or stderr, through a non-blocking writer; keep the
/// returned guard alive to flush it.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard, ConfigError> {
    let filter = log_filter(config)?;

    let (writer, guard) = match &config.file {
        Some(path) => {
            let (dir, name) = match (path.parent(), path.file_name()) {
                (Some(dir), Some(name)) => (dir, name),
                _ => {
                    return Err(ConfigError::Invalid(format!(
                        "log file {} has no file name",
                        path.display()
                    )))
                }
            };
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(config.file.is_none()))
        .try_init()
        .map_err(|e| ConfigError::Invalid(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}

fn log_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| ConfigError::Invalid(format!("log filter {:?}: {}", config.filter, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_filter_is_parsed() {
        let config = LogConfig {
            filter: "relay_engine=debug,warn".to_string(),
            file: None,
        };
        assert!(log_filter(&config).is_ok());
    }

    #[test]
    fn file_without_name_is_rejected() {
        let config = LogConfig {
            filter: "info".to_string(),
            file: Some("/".into()),
        };
        assert!(matches!(
            init_logging(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
