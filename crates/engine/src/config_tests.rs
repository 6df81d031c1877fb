// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn empty_file_uses_defaults() {
    let config = ControllerConfig::from_toml("").unwrap();
    assert_eq!(config, ControllerConfig::default());
    assert_eq!(config.max_running_pipelines, 5);
    assert_eq!(config.resync_period, Duration::from_secs(30));
}

#[test]
fn parses_durations_and_sections() {
    let config = ControllerConfig::from_toml(
        r#"
namespace = "ci"
max_running_pipelines = 1
resync_period = "10s"
cache_sync_timeout = "2m"

[workers]
pipeline = 1

[rate_limit]
base_delay = "100ms"
max_delay = "5m"

[storage]
image = "minio/minio:RELEASE.2024"
availability_timeout = "30s"

[log]
filter = "relay_engine=debug"
file = "/var/log/relay.log"
"#,
    )
    .unwrap();

    assert_eq!(config.namespace.as_deref(), Some("ci"));
    assert_eq!(config.max_running_pipelines, 1);
    assert_eq!(config.resync_period, Duration::from_secs(10));
    assert_eq!(config.cache_sync_timeout, Duration::from_secs(120));
    assert_eq!(config.workers.pipeline, 1);
    assert_eq!(config.workers.job, 4);
    assert_eq!(config.rate_limit.base_delay, Duration::from_millis(100));
    assert_eq!(config.storage.port, 9000);
    assert_eq!(config.storage.availability_timeout, Duration::from_secs(30));
    assert_eq!(config.log.file, Some(PathBuf::from("/var/log/relay.log")));
}

#[parameterized(
    unknown_field = { "max_running = 3" },
    bad_duration = { "resync_period = \"soon\"" },
    zero_resync = { "resync_period = \"0s\"" },
    inverted_backoff = { "[rate_limit]\nbase_delay = \"10m\"\nmax_delay = \"1s\"" },
)]
fn rejects_invalid_config(text: &str) {
    assert!(ControllerConfig::from_toml(text).is_err());
}

#[test]
fn load_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.toml");
    std::fs::write(&path, "max_running_pipelines = 2\n").unwrap();

    let config = ControllerConfig::load(&path).unwrap();
    assert_eq!(config.max_running_pipelines, 2);

    let missing = ControllerConfig::load(&dir.path().join("missing.toml"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));
}
