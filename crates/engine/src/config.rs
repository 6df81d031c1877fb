// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//! Durations use humantime notation (`30s`, `2m`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Namespace to watch; all namespaces when unset
    pub namespace: Option<String>,
    pub workers: WorkerCounts,
    /// Period of the pipeline admission resync
    #[serde(with = "humantime_serde")]
    pub resync_period: Duration,
    #[serde(with = "humantime_serde")]
    pub cache_sync_timeout: Duration,
    /// Running pipelines allowed per namespace
    pub max_running_pipelines: usize,
    pub rate_limit: RateLimitConfig,
    pub storage: StorageServerConfig,
    pub runner: RunnerConfig,
    pub log: LogConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            workers: WorkerCounts::default(),
            resync_period: Duration::from_secs(30),
            cache_sync_timeout: Duration::from_secs(60),
            max_running_pipelines: 5,
            rate_limit: RateLimitConfig::default(),
            storage: StorageServerConfig::default(),
            runner: RunnerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.resync_period.is_zero() {
            return Err(ConfigError::Invalid("resync_period must be positive".into()));
        }
        if self.rate_limit.base_delay > self.rate_limit.max_delay {
            return Err(ConfigError::Invalid(
                "rate_limit.base_delay exceeds rate_limit.max_delay".into(),
            ));
        }
        if self.storage.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "storage.poll_interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Worker pool size per controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerCounts {
    pub pipeline: usize,
    pub stage: usize,
    pub job: usize,
    pub workload: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            pipeline: 2,
            stage: 2,
            job: 4,
            workload: 4,
        }
    }
}

/// Per-key exponential backoff for failed reconciles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_secs(1000),
        }
    }
}

/// Per-pipeline object-storage server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageServerConfig {
    pub image: String,
    pub port: u16,
    #[serde(with = "humantime_serde")]
    pub availability_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for StorageServerConfig {
    fn default() -> Self {
        Self {
            image: "minio/minio:latest".to_string(),
            port: 9000,
            availability_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Worker pod settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Prefix of the per-pipeline service account, role and binding
    pub service_account_prefix: String,
    /// Shell used to run job scripts
    pub shell: String,
    pub backoff_limit: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            service_account_prefix: "relay-runner-".to_string(),
            shell: "/bin/sh".to_string(),
            backoff_limit: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub filter: String,
    /// Log file; stderr when unset
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
