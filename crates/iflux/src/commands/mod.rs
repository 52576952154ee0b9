//! Command handlers.

pub mod config_cmd;
pub mod run;
pub mod validate;

use std::path::Path;

use serde_json::Value;

use iflux_core::{Manifest, ManifestFormat};

use crate::error::CliError;

/// Read and parse a manifest; the format follows the file extension.
pub fn read_manifest(path: &Path) -> Result<Manifest, CliError> {
    let manifest_err = |message: String| CliError::Manifest {
        path: path.display().to_string(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| manifest_err(e.to_string()))?;
    Manifest::parse(&text, ManifestFormat::from_path(path)).map_err(|e| manifest_err(e.to_string()))
}

/// Command-line values are JSON when they parse as JSON (`true`, `42`,
/// `{"a":1}`) and plain strings otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}
