//! JSON Schema check for registry documents.
//!
//! The schema is embedded at build time so the loader and `registry-validate`
//! agree on the document shape without locating files at runtime. It covers
//! structure only; semantic rules (unique ids, recognised formats) live in
//! `index`.

use crate::error::ConfigError;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::sync::OnceLock;

/// Embedded registry schema text.
pub const REGISTRY_SCHEMA: &str = include_str!("../../schema/registry.schema.json");

const EMBEDDED_ORIGIN: &str = "embedded registry schema";

fn compiled_schema() -> Result<&'static JSONSchema, ConfigError> {
    static COMPILED: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
    COMPILED
        .get_or_init(|| {
            let raw: Value = serde_json::from_str(REGISTRY_SCHEMA).map_err(|e| e.to_string())?;
            JSONSchema::compile(&raw).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|message| ConfigError::Schema {
            origin: EMBEDDED_ORIGIN.to_string(),
            details: message.clone(),
        })
}

/// Validate a registry document against the embedded schema.
pub fn validate_document(document: &Value, origin: &str) -> Result<(), ConfigError> {
    let compiled = compiled_schema()?;
    if let Err(errors) = compiled.validate(document) {
        let details = errors
            .map(|err| format!("{} (at {})", err, err.instance_path))
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ConfigError::Schema {
            origin: origin.to_string(),
            details,
        });
    }
    Ok(())
}
