// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pipeline definitions: manifest parsing, validation and template expansion

mod parser;
mod template;
mod validate;

pub use parser::{load_pipeline, parse_pipeline_json, parse_pipeline_toml, ParseError};
pub use template::{expand_job, resolve_job, resolve_stage};
pub use validate::{validate_job, validate_pipeline, ValidationError};
