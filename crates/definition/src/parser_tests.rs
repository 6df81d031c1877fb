// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

const TOML_PIPELINE: &str = r#"
stages = ["build", "test"]
environment = ["CI=true"]

[workspace]
path = "/workspace"

[workspace.storage.s3]
port = 9000
useSSL = false
bucketName = "artifacts"

[[templates]]
name = "rust"
image = "rust:1.80"
environment = ["CARGO_TERM_COLOR=always"]

[[jobs]]
name = "compile"
stage = "build"
extends = ["rust"]
commands = ["cargo", "build"]

[[jobs]]
name = "unit"
stage = "test"
extends = ["rust"]
script = "cargo test"
allowFailure = true
"#;

#[test]
fn parse_toml_manifest() {
    let spec = parse_pipeline_toml(TOML_PIPELINE).unwrap();
    assert_eq!(spec.stages, vec!["build", "test"]);
    assert_eq!(spec.workspace.storage.s3.bucket_name, "artifacts");
    assert_eq!(spec.templates[0].image.as_deref(), Some("rust:1.80"));
    assert_eq!(spec.jobs.len(), 2);
    assert!(spec.jobs[1].allow_failure);
    assert_eq!(spec.jobs[1].script.as_deref(), Some("cargo test"));
}

#[test]
fn parse_json_manifest() {
    let spec = parse_pipeline_json(
        r#"{"stages": ["build"], "jobs": [{"name": "a", "stage": "build", "image": "alpine", "commands": ["true"]}]}"#,
    )
    .unwrap();
    assert_eq!(spec.jobs[0].image.as_deref(), Some("alpine"));
}

#[test]
fn parse_json_reports_syntax_errors() {
    let result = parse_pipeline_json("{ not json");
    assert!(matches!(result, Err(ParseError::Json(_))));
}

#[test]
fn load_pipeline_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.toml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(TOML_PIPELINE.as_bytes())
        .unwrap();

    let spec = load_pipeline(&path).unwrap();
    assert_eq!(spec.jobs[0].name, "compile");
}

#[test]
fn load_pipeline_rejects_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(&path, "stages: []").unwrap();

    assert!(matches!(
        load_pipeline(&path),
        Err(ParseError::UnsupportedFormat(_))
    ));
}

#[test]
fn load_pipeline_reports_missing_file() {
    let result = load_pipeline(Path::new("/nonexistent/pipeline.json"));
    assert!(matches!(result, Err(ParseError::Io { .. })));
}
