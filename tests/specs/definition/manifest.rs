//! Manifests: pipelines loaded from disk run the same as built ones

use crate::prelude::*;
use relay_definition::{expand_job, load_pipeline, parse_pipeline_json, ParseError};
use std::io::Write;

const MANIFEST: &str = r#"
stages = ["build"]
environment = ["CI=true"]

[[templates]]
name = "rust"
image = "rust:1.80"

[[jobs]]
name = "compile"
stage = "build"
extends = ["rust"]
commands = ["cargo", "build"]
"#;

fn write_manifest(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn toml_manifest_runs_to_completion() {
    let file = write_manifest(".toml", MANIFEST);
    let manifest = load_pipeline(file.path()).unwrap();

    let cluster = Cluster::new(Workloads::Succeed).start(ControllerConfig::default());
    cluster.submit("from-disk", manifest);

    cluster.wait_for_phase("from-disk", PipelinePhase::Completed).await;
    cluster.stop().await;
}

#[test]
fn json_manifest_uses_camel_case_keys() {
    let manifest = parse_pipeline_json(
        r#"{
            "stages": ["test"],
            "jobs": [{"name": "unit", "stage": "test", "image": "alpine:3",
                      "script": "make test", "allowFailure": true}]
        }"#,
    )
    .unwrap();

    assert_eq!(manifest.jobs[0].script.as_deref(), Some("make test"));
    assert!(manifest.jobs[0].allow_failure);
}

#[test]
fn unsupported_extension_is_rejected() {
    let file = write_manifest(".yaml", MANIFEST);

    let err = load_pipeline(file.path()).unwrap_err();

    assert!(matches!(err, ParseError::UnsupportedFormat(_)));
}

#[test]
fn expansion_skips_unknown_templates() {
    let manifest = relay_definition::parse_pipeline_toml(MANIFEST).unwrap();
    let mut declared = manifest.jobs[0].clone();
    declared.extends.push("missing".to_string());

    let expanded = expand_job(&declared, &manifest.templates, &manifest.environment);

    assert_eq!(expanded.image.as_deref(), Some("rust:1.80"));
    assert_eq!(expanded.environment, vec!["CI=true".to_string()]);
}
