//! RAML 0.8 / 1.0 source grammar.
//!
//! `parse` checks the header, the YAML syntax and the shape of the inline
//! tree. `resolve` expands includes and libraries, applies resource types and
//! traits, resolves type declarations and flattens nested resources into an
//! `ApiModel`.

mod error;
mod fragments;
mod include;
mod parse;
mod resolve;
mod types;

pub use error::RamlError;

use crate::deadline::Deadline;
use crate::format::{GrammarError, SourceGrammar};
use crate::model::{ApiModel, SourceDocument};
use std::path::Path;

/// Grammar row registered for `SpecFormat::Raml`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RamlGrammar;

impl SourceGrammar for RamlGrammar {
    fn name(&self) -> &'static str {
        "RAML"
    }

    fn parse(&self, text: &str, origin: &Path) -> Result<SourceDocument, GrammarError> {
        Ok(parse::parse_api(text, origin)?)
    }

    fn resolve(
        &self,
        document: SourceDocument,
        deadline: &Deadline,
    ) -> Result<ApiModel, GrammarError> {
        Ok(resolve::resolve_api(document, deadline)?)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RamlVersion {
    V08,
    V10,
}

impl RamlVersion {
    pub(crate) fn parse(value: &str) -> Result<Self, RamlError> {
        match value {
            "0.8" => Ok(RamlVersion::V08),
            "1.0" => Ok(RamlVersion::V10),
            other => Err(RamlError::UnsupportedVersion(other.to_string())),
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            RamlVersion::V08 => "0.8",
            RamlVersion::V10 => "1.0",
        }
    }

    /// RAML 1.0 makes declared parameters required unless marked otherwise.
    pub(crate) fn parameters_required_by_default(&self) -> bool {
        matches!(self, RamlVersion::V10)
    }
}

pub(crate) const ROOT_KEYS: &[&str] = &[
    "title",
    "description",
    "version",
    "baseUri",
    "baseUriParameters",
    "protocols",
    "mediaType",
    "documentation",
    "schemas",
    "types",
    "traits",
    "resourceTypes",
    "annotationTypes",
    "securitySchemes",
    "securedBy",
    "uses",
];

pub(crate) const RESOURCE_KEYS: &[&str] = &[
    "displayName",
    "description",
    "uriParameters",
    "baseUriParameters",
    "type",
    "is",
    "securedBy",
];

pub(crate) const METHOD_KEYS: &[&str] = &[
    "displayName",
    "description",
    "queryParameters",
    "queryString",
    "headers",
    "body",
    "responses",
    "is",
    "securedBy",
    "protocols",
    "baseUriParameters",
];

pub(crate) fn is_annotation_key(key: &str) -> bool {
    key.len() > 2 && key.starts_with('(') && key.ends_with(')')
}
