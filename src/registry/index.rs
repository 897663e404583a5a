//! Validated view of the API registry.
//!
//! The registry is strict: empty fields, unknown formats, duplicate ids and
//! overlapping document paths all fail the whole load, so a run never works
//! from a partially valid catalog.

use crate::error::ConfigError;
use crate::format::{SpecFormat, known_type_names, needs_conversion};
use crate::registry::schema::validate_document;
use crate::registry::{EntryDescriptor, RegistryDocument, RegistryEntry};
use crate::resolver::artifact_path;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
/// Registry entries in document order plus an index keyed by id.
pub struct Registry {
    entries: Vec<RegistryEntry>,
    by_id: BTreeMap<String, usize>,
}

impl Registry {
    /// Load and validate a registry file. `.yaml`/`.yml` files are read as
    /// YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let origin = path.display().to_string();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        if is_yaml {
            Self::from_yaml_str(&text, &origin)
        } else {
            Self::from_json_str(&text, &origin)
        }
    }

    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text).map_err(|e| ConfigError::Malformed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(value, origin)
    }

    pub fn from_yaml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_yaml_ng::from_str(text).map_err(|e| ConfigError::Malformed {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Self::from_value(value, origin)
    }

    /// Validate an already parsed document: schema first, then invariants.
    pub fn from_value(value: Value, origin: &str) -> Result<Self, ConfigError> {
        validate_document(&value, origin)?;
        let document: RegistryDocument =
            serde_json::from_value(value).map_err(|e| ConfigError::Malformed {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
        let entries = document
            .apis
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| entry_from_descriptor(index, descriptor))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    /// Build a registry from entries constructed in code.
    pub fn from_entries(entries: Vec<RegistryEntry>) -> Result<Self, ConfigError> {
        let by_id = build_index(&entries)?;
        validate_paths(&entries)?;
        Ok(Self { entries, by_id })
    }

    pub fn get(&self, id: &str) -> Option<&RegistryEntry> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    /// Entries in document order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose format needs conversion, in document order.
    pub fn legacy_entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter().filter(|entry| needs_conversion(entry))
    }

    /// Entries grouped by category. Categories are sorted; entries keep
    /// document order within each category.
    pub fn categories(&self) -> BTreeMap<&str, Vec<&RegistryEntry>> {
        let mut grouped: BTreeMap<&str, Vec<&RegistryEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.category.as_str()).or_default().push(entry);
        }
        grouped
    }
}

fn entry_from_descriptor(
    index: usize,
    descriptor: EntryDescriptor,
) -> Result<RegistryEntry, ConfigError> {
    if descriptor.id.trim().is_empty() {
        return Err(ConfigError::EmptyField { index, field: "id" });
    }
    if descriptor.spec_path.trim().is_empty() {
        return Err(ConfigError::EmptyField {
            index,
            field: "specPath",
        });
    }
    let format = SpecFormat::from_type_name(descriptor.type_name.trim()).ok_or_else(|| {
        ConfigError::UnknownFormat {
            id: descriptor.id.clone(),
            value: descriptor.type_name.clone(),
            expected: known_type_names().join(", "),
        }
    })?;
    Ok(RegistryEntry {
        id: descriptor.id,
        name: descriptor.name,
        version: descriptor.version,
        category: descriptor.category,
        spec_path: descriptor.spec_path,
        format,
        description: descriptor.description,
    })
}

fn build_index(entries: &[RegistryEntry]) -> Result<BTreeMap<String, usize>, ConfigError> {
    let mut map = BTreeMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.id.trim().is_empty() {
            return Err(ConfigError::EmptyField { index, field: "id" });
        }
        if entry.spec_path.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                index,
                field: "specPath",
            });
        }
        if map.insert(entry.id.clone(), index).is_some() {
            return Err(ConfigError::DuplicateId {
                id: entry.id.clone(),
            });
        }
    }
    Ok(map)
}

// Artifacts are written next to their sources; keeping every source and
// derived artifact path distinct means conversions never touch each other's
// files.
fn validate_paths(entries: &[RegistryEntry]) -> Result<(), ConfigError> {
    let mut sources: BTreeMap<String, &str> = BTreeMap::new();
    for entry in entries {
        if escapes_root(&entry.spec_path) {
            return Err(ConfigError::EscapingSpecPath {
                id: entry.id.clone(),
                spec_path: entry.spec_path.clone(),
            });
        }
        let key = normalize(&entry.spec_path);
        if let Some(first) = sources.insert(key, &entry.id) {
            return Err(ConfigError::DuplicateSpecPath {
                first: first.to_string(),
                second: entry.id.clone(),
                spec_path: entry.spec_path.clone(),
            });
        }
    }

    let mut artifacts: BTreeMap<String, &str> = BTreeMap::new();
    for entry in entries.iter().filter(|entry| needs_conversion(entry)) {
        let artifact = artifact_path(&entry.spec_path);
        let key = normalize(&artifact);
        let other = sources
            .get(&key)
            .copied()
            .or_else(|| artifacts.insert(key, &entry.id));
        if let Some(other) = other {
            return Err(ConfigError::ArtifactCollision {
                id: entry.id.clone(),
                other: other.to_string(),
                artifact,
            });
        }
    }
    Ok(())
}

fn escapes_root(spec_path: &str) -> bool {
    spec_path
        .split(['/', '\\'])
        .any(|segment| segment == "..")
}

fn normalize(spec_path: &str) -> String {
    spec_path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
