use crate::format::SpecFormat;
use serde::{Deserialize, Serialize};

/// Raw registry document as written on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct RegistryDocument {
    pub apis: Vec<EntryDescriptor>,
}

/// One entry of the `apis` list before validation.
#[derive(Debug, Deserialize, Clone)]
pub struct EntryDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub category: String,
    #[serde(rename = "specPath")]
    pub spec_path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A validated registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub category: String,
    pub spec_path: String,
    #[serde(rename = "type")]
    pub format: SpecFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
