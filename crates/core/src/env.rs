// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `KEY=VALUE` environment entries

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing an environment entry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("environment entry {0:?} is not of the form KEY=VALUE")]
    Malformed(String),
    #[error("environment entry {entry:?} has an invalid key {key:?}")]
    InvalidKey { entry: String, key: String },
}

/// A parsed environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Parse a single `KEY=VALUE` entry; the value may itself contain `=`
pub fn parse_env_entry(entry: &str) -> Result<EnvVar, EnvError> {
    let (key, value) = entry
        .split_once('=')
        .ok_or_else(|| EnvError::Malformed(entry.to_string()))?;

    if !is_valid_key(key) {
        return Err(EnvError::InvalidKey {
            entry: entry.to_string(),
            key: key.to_string(),
        });
    }

    Ok(EnvVar {
        name: key.to_string(),
        value: value.to_string(),
    })
}

/// Collapse an ordered entry list into a map; later entries win
pub fn resolve_environment(entries: &[String]) -> Result<BTreeMap<String, String>, EnvError> {
    let mut resolved = BTreeMap::new();
    for entry in entries {
        let var = parse_env_entry(entry)?;
        resolved.insert(var.name, var.value);
    }
    Ok(resolved)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
