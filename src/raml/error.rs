use crate::deadline::DeadlineExceeded;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RamlError {
    #[error("document is empty")]
    Empty,

    #[error("missing '#%RAML <version>' header on the first line")]
    MissingHeader,

    #[error("unsupported RAML version '{0}' (expected 0.8 or 1.0)")]
    UnsupportedVersion(String),

    #[error("expected an API definition, found a '{0}' fragment")]
    NotAnApi(String),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("{pointer}: {message}")]
    Shape { pointer: String, message: String },

    #[error("included file {} does not exist", .path.display())]
    MissingInclude { path: PathBuf },

    #[error("reading included file {}: {source}", .path.display())]
    IncludeRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("included file {} is not valid: {message}", .path.display())]
    IncludeSyntax { path: PathBuf, message: String },

    #[error("cyclic include: {chain}")]
    IncludeCycle { chain: String },

    #[error("includes nested deeper than {limit} levels at {}", .path.display())]
    IncludeTooDeep { path: PathBuf, limit: usize },

    #[error("repeated includes of {} exceed {limit} copied nodes", .path.display())]
    IncludeTooLarge { path: PathBuf, limit: usize },

    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    #[error("cyclic {kind} chain: {chain}")]
    Cycle { kind: &'static str, chain: String },

    #[error("parameter <<{parameter}>> used in {fragment} '{name}' has no value")]
    MissingParameter {
        parameter: String,
        fragment: &'static str,
        name: String,
    },

    #[error("unknown parameter transformer '!{0}'")]
    UnknownTransformer(String),

    #[error("invalid type expression '{expression}': {message}")]
    TypeExpression { expression: String, message: String },

    #[error("type '{name}' embeds an invalid JSON schema: {message}")]
    JsonSchema { name: String, message: String },

    #[error(transparent)]
    TimedOut(#[from] DeadlineExceeded),
}

impl RamlError {
    pub(crate) fn shape(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        RamlError::Shape {
            pointer: pointer.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        RamlError::Unknown {
            kind,
            name: name.into(),
        }
    }
}
