// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline manifest parsing (JSON or TOML)

use relay_core::PipelineSpec;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while reading a pipeline manifest
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported manifest format: {0} (expected .json or .toml)")]
    UnsupportedFormat(PathBuf),
}

/// Parse a pipeline spec from JSON
pub fn parse_pipeline_json(content: &str) -> Result<PipelineSpec, ParseError> {
    Ok(serde_json::from_str(content)?)
}

/// Parse a pipeline spec from TOML; keys use the same camelCase names as JSON
pub fn parse_pipeline_toml(content: &str) -> Result<PipelineSpec, ParseError> {
    Ok(toml::from_str(content)?)
}

/// Load a pipeline spec from a file, choosing the format by extension
pub fn load_pipeline(path: &Path) -> Result<PipelineSpec, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_pipeline_json(&content),
        Some("toml") => parse_pipeline_toml(&content),
        _ => Err(ParseError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
