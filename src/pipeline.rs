//! Per-entry conversion: load → parse → resolve → generate → write.
//!
//! Each entry walks an explicit `ConversionState` machine. A failure at any
//! stage ends the walk and nothing is written; on success the artifact is
//! replaced atomically so viewers never observe a half-written file.

use crate::deadline::Deadline;
use crate::error::{ConversionError, Stage};
use crate::format::{SourceGrammar, needs_conversion};
use crate::model::{ApiModel, SourceDocument};
use crate::openapi::{self, GenerateError};
use crate::registry::RegistryEntry;
use crate::resolver::{ArtifactResolver, resolve};
use serde::Serialize;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default)]
pub struct ConvertOptions {
    /// Per-entry limit for the resolve and generate stages.
    pub timeout: Option<Duration>,
}

/// Everything a conversion needs besides the entry itself.
#[derive(Clone, Debug)]
pub struct ConvertContext {
    resolver: ArtifactResolver,
    options: ConvertOptions,
}

impl ConvertContext {
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: ArtifactResolver::new(docs_root),
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn docs_root(&self) -> &Path {
        self.resolver.docs_root()
    }
}

#[derive(Debug)]
pub struct ConversionResult {
    pub entry_id: String,
    /// Artifact path relative to the document root, or why conversion failed.
    pub outcome: Result<String, ConversionError>,
}

impl ConversionResult {
    pub fn output_path(&self) -> Option<&str> {
        self.outcome.as_deref().ok()
    }

    pub fn error(&self) -> Option<&ConversionError> {
        self.outcome.as_ref().err()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Flat view used for `--json` output.
    pub fn record(&self) -> ResultRecord<'_> {
        match &self.outcome {
            Ok(path) => ResultRecord {
                id: &self.entry_id,
                status: "converted",
                output: Some(path),
                stage: None,
                error: None,
            },
            Err(err) => ResultRecord {
                id: &self.entry_id,
                status: "failed",
                output: None,
                stage: Some(err.stage()),
                error: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultRecord<'a> {
    pub id: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where a single conversion currently stands.
#[derive(Debug)]
pub enum ConversionState {
    Start,
    Parsed(SourceDocument),
    Resolved(ApiModel),
    Generated(String),
    Failed(ConversionError),
}

impl ConversionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversionState::Generated(_) | ConversionState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConversionState::Start => "start",
            ConversionState::Parsed(_) => "parsed",
            ConversionState::Resolved(_) => "resolved",
            ConversionState::Generated(_) => "generated",
            ConversionState::Failed(_) => "failed",
        }
    }
}

struct Job<'a> {
    entry: &'a RegistryEntry,
    grammar: &'static dyn SourceGrammar,
    source: PathBuf,
    deadline: Deadline,
}

impl Job<'_> {
    fn step(&self, state: ConversionState) -> ConversionState {
        match state {
            ConversionState::Start => match self.load() {
                Ok(text) => match self.grammar.parse(&text, &self.source) {
                    Ok(document) => ConversionState::Parsed(document),
                    Err(err) => self.fail(Stage::Parse, err.to_string()),
                },
                Err(err) => ConversionState::Failed(err),
            },
            ConversionState::Parsed(document) => {
                match self.grammar.resolve(document, &self.deadline) {
                    Ok(model) => ConversionState::Resolved(model),
                    Err(err) => self.fail(Stage::Resolve, err.to_string()),
                }
            }
            ConversionState::Resolved(model) => {
                match openapi::generate(&model, &self.entry.version, &self.deadline) {
                    Ok(text) => ConversionState::Generated(text),
                    // Running out of time is reported as a resolve failure
                    // regardless of which stage noticed it.
                    Err(GenerateError::TimedOut(err)) => self.fail(Stage::Resolve, err.to_string()),
                    Err(err) => self.fail(Stage::Generate, err.to_string()),
                }
            }
            terminal => terminal,
        }
    }

    fn load(&self) -> Result<String, ConversionError> {
        let bytes = fs::read(&self.source).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ConversionError::NotFound {
                path: self.source.clone(),
            },
            _ => ConversionError::Read {
                path: self.source.clone(),
                source,
            },
        })?;
        String::from_utf8(bytes).map_err(|_| ConversionError::Parse {
            path: self.source.clone(),
            message: "document is not valid UTF-8".to_string(),
        })
    }

    fn fail(&self, stage: Stage, message: String) -> ConversionState {
        let path = self.source.clone();
        ConversionState::Failed(match stage {
            Stage::Parse => ConversionError::Parse { path, message },
            Stage::Generate => ConversionError::Generate { path, message },
            _ => ConversionError::Resolve { path, message },
        })
    }
}

/// Convert one legacy entry and write its artifact.
pub fn convert(entry: &RegistryEntry, ctx: &ConvertContext) -> ConversionResult {
    let outcome = run(entry, ctx);
    match &outcome {
        Ok(artifact) => info!(id = %entry.id, artifact = %artifact, "converted"),
        Err(err) => warn!(id = %entry.id, stage = %err.stage(), error = %err, "conversion failed"),
    }
    ConversionResult {
        entry_id: entry.id.clone(),
        outcome,
    }
}

fn run(entry: &RegistryEntry, ctx: &ConvertContext) -> Result<String, ConversionError> {
    let grammar = match entry.format.grammar() {
        Some(grammar) if needs_conversion(entry) => grammar,
        _ => {
            return Err(ConversionError::NotConvertible {
                id: entry.id.clone(),
                format: entry.format,
            });
        }
    };
    let job = Job {
        entry,
        grammar,
        source: ctx.resolver.source(entry),
        deadline: Deadline::start(ctx.options.timeout),
    };

    let mut state = ConversionState::Start;
    while !state.is_terminal() {
        state = job.step(state);
        debug!(id = %entry.id, state = state.name(), "conversion step");
    }
    let text = match state {
        ConversionState::Generated(text) => text,
        ConversionState::Failed(err) => return Err(err),
        other => {
            return Err(ConversionError::Resolve {
                path: job.source,
                message: format!("conversion stopped in state {}", other.name()),
            });
        }
    };

    let artifact = resolve(entry);
    let target = ctx.resolver.locate(entry);
    write_atomic(&target, &text).map_err(|source| ConversionError::Write {
        path: target.clone(),
        source,
    })?;
    Ok(artifact)
}

/// Replace `target` with `contents` via a temporary file in the same
/// directory, so readers see either the old or the new artifact.
pub fn write_atomic(target: &Path, contents: &str) -> io::Result<()> {
    let dir = target
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SpecFormat;
    use tempfile::TempDir;

    fn entry(spec_path: &str, format: SpecFormat) -> RegistryEntry {
        RegistryEntry {
            id: "notes".to_string(),
            name: "Notes".to_string(),
            version: "7".to_string(),
            category: "Core".to_string(),
            spec_path: spec_path.to_string(),
            format,
            description: None,
        }
    }

    #[test]
    fn canonical_entries_are_not_convertible() {
        let dir = TempDir::new().unwrap();
        let ctx = ConvertContext::new(dir.path());
        assert_eq!(ctx.docs_root(), dir.path());
        let result = convert(&entry("a.yaml", SpecFormat::OpenApi), &ctx);
        assert!(matches!(
            result.error(),
            Some(ConversionError::NotConvertible { .. })
        ));
        assert!(result.output_path().is_none());
    }

    #[test]
    fn invalid_utf8_is_a_parse_failure() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.raml"), [0xff, 0xfe, 0x00]).unwrap();
        let result = convert(&entry("bad.raml", SpecFormat::Raml), &ConvertContext::new(dir.path()));
        assert_eq!(result.error().map(ConversionError::stage), Some(Stage::Parse));
        assert!(!dir.path().join("bad.converted.yaml").exists());
    }

    #[test]
    fn missing_version_falls_back_to_the_registry() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("notes.raml"),
            "#%RAML 1.0\ntitle: Notes\nmediaType: application/json\n/notes:\n  get:\n",
        )
        .unwrap();
        let result = convert(&entry("notes.raml", SpecFormat::Raml), &ConvertContext::new(dir.path()));
        assert_eq!(result.output_path(), Some("notes.converted.yaml"));
        let text = fs::read_to_string(dir.path().join("notes.converted.yaml")).unwrap();
        assert!(text.contains("version: '7'") || text.contains("version: \"7\""), "{text}");
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out.yaml");
        fs::write(&target, "old old old old").unwrap();
        write_atomic(&target, "new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn terminal_states_stop_the_walk() {
        assert!(!ConversionState::Start.is_terminal());
        assert!(ConversionState::Generated(String::new()).is_terminal());
        assert_eq!(ConversionState::Start.name(), "start");
    }
}
