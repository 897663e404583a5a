//! Error taxonomy for registry loading and per-entry conversion.
//!
//! `ConfigError` is fatal for a run: the registry could not be loaded and no
//! conversion is attempted. `ConversionError` is scoped to a single entry and
//! is collected by the batch driver instead of being propagated.

use crate::format::SpecFormat;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading registry {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing registry {origin}: {message}")]
    Malformed { origin: String, message: String },

    #[error("registry {origin} failed schema validation:\n{details}")]
    Schema { origin: String, details: String },

    #[error("apis[{index}].{field} must not be empty")]
    EmptyField { index: usize, field: &'static str },

    #[error("api '{id}' declares unknown type '{value}' (expected one of: {expected})")]
    UnknownFormat {
        id: String,
        value: String,
        expected: String,
    },

    #[error("duplicate api id '{id}'")]
    DuplicateId { id: String },

    #[error("apis '{first}' and '{second}' share specPath '{spec_path}'")]
    DuplicateSpecPath {
        first: String,
        second: String,
        spec_path: String,
    },

    #[error("api '{id}' specPath '{spec_path}' escapes the document root")]
    EscapingSpecPath { id: String, spec_path: String },

    #[error("converted artifact '{artifact}' of api '{id}' collides with a file of api '{other}'")]
    ArtifactCollision {
        id: String,
        other: String,
        artifact: String,
    },
}

/// Step of the per-entry pipeline at which a conversion stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Parse,
    Resolve,
    Generate,
    Write,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Parse => "parse",
            Stage::Resolve => "resolve",
            Stage::Generate => "generate",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("source document {} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse error in {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("resolve error in {}: {message}", .path.display())]
    Resolve { path: PathBuf, message: String },

    #[error("generate error in {}: {message}", .path.display())]
    Generate { path: PathBuf, message: String },

    #[error("writing artifact {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("api '{id}' is already in {format} format")]
    NotConvertible { id: String, format: SpecFormat },
}

impl ConversionError {
    pub fn stage(&self) -> Stage {
        match self {
            ConversionError::NotFound { .. }
            | ConversionError::Read { .. }
            | ConversionError::NotConvertible { .. } => Stage::Load,
            ConversionError::Parse { .. } => Stage::Parse,
            ConversionError::Resolve { .. } => Stage::Resolve,
            ConversionError::Generate { .. } => Stage::Generate,
            ConversionError::Write { .. } => Stage::Write,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConversionError::NotFound { .. })
    }
}
