//! `!include` expansion.
//!
//! Includes are resolved relative to the directory of the file that contains
//! them. The expander keeps the chain of files currently being expanded so a
//! file that (directly or indirectly) includes itself is reported instead of
//! recursing forever.
//!
//! Each file is expanded once and reused wherever it is included again. The
//! copies still count towards `MAX_INCLUDED_NODES`, which bounds documents
//! whose include graph fans out (every file including the next one twice).
//!
//! Included documents are trusted like the document that includes them: a
//! target may live outside the document root (`!include ../shared/x.raml`).
//! Only the registry `specPath` is confined to the root.

use super::RamlError;
use super::parse::parse_header;
use crate::deadline::Deadline;
use serde_yaml_ng::value::TaggedValue;
use serde_yaml_ng::{Mapping, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const MAX_INCLUDE_DEPTH: usize = 64;
/// Nodes that repeated includes may copy into one document.
pub(crate) const MAX_INCLUDED_NODES: usize = 500_000;

pub(crate) struct IncludeExpander<'d> {
    stack: Vec<PathBuf>,
    expanded: HashMap<PathBuf, (Value, usize)>,
    copied_nodes: usize,
    deadline: &'d Deadline,
}

impl<'d> IncludeExpander<'d> {
    pub(crate) fn new(deadline: &'d Deadline) -> Self {
        Self {
            stack: Vec::new(),
            expanded: HashMap::new(),
            copied_nodes: 0,
            deadline,
        }
    }

    /// Expand every include inside `value`, which was read from `origin`.
    pub(crate) fn expand_file(&mut self, value: Value, origin: &Path) -> Result<Value, RamlError> {
        let canonical = fs::canonicalize(origin).unwrap_or_else(|_| origin.to_path_buf());
        self.enter(&canonical)?;
        let base = parent_dir(&canonical);
        let expanded = self.expand(value, &base);
        self.stack.pop();
        expanded
    }

    /// Read, parse and expand a file referenced from `base_dir`. Used for
    /// `!include` targets and `uses` libraries alike.
    pub(crate) fn load(&mut self, target: &str, base_dir: &Path) -> Result<Value, RamlError> {
        let path = base_dir.join(target.trim());
        let canonical = fs::canonicalize(&path).map_err(|_| RamlError::MissingInclude {
            path: path.clone(),
        })?;
        if let Some((value, nodes)) = self.expanded.get(&canonical) {
            self.deadline.check()?;
            self.copied_nodes += nodes;
            if self.copied_nodes > MAX_INCLUDED_NODES {
                return Err(RamlError::IncludeTooLarge {
                    path: canonical,
                    limit: MAX_INCLUDED_NODES,
                });
            }
            return Ok(value.clone());
        }
        self.enter(&canonical)?;
        let loaded = fs::read_to_string(&canonical)
            .map_err(|source| RamlError::IncludeRead {
                path: canonical.clone(),
                source,
            })
            .and_then(|text| load_fragment(&text, &canonical))
            .and_then(|value| self.expand(value, &parent_dir(&canonical)));
        self.stack.pop();
        let value = loaded?;
        self.expanded
            .insert(canonical, (value.clone(), count_nodes(&value)));
        Ok(value)
    }

    fn enter(&mut self, canonical: &Path) -> Result<(), RamlError> {
        self.deadline.check()?;
        if let Some(pos) = self.stack.iter().position(|p| p == canonical) {
            let chain = self.stack[pos..]
                .iter()
                .chain(std::iter::once(&canonical.to_path_buf()))
                .map(|p| file_label(p))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(RamlError::IncludeCycle { chain });
        }
        if self.stack.len() >= MAX_INCLUDE_DEPTH {
            return Err(RamlError::IncludeTooDeep {
                path: canonical.to_path_buf(),
                limit: MAX_INCLUDE_DEPTH,
            });
        }
        self.stack.push(canonical.to_path_buf());
        Ok(())
    }

    fn expand(&mut self, value: Value, base_dir: &Path) -> Result<Value, RamlError> {
        match value {
            Value::Tagged(tagged) if tagged.tag == "include" => {
                let Value::String(target) = &tagged.value else {
                    return Err(RamlError::shape(
                        base_dir.display().to_string(),
                        "!include expects a file path",
                    ));
                };
                self.load(target, base_dir)
            }
            Value::Tagged(tagged) => {
                let TaggedValue { tag, value } = *tagged;
                let value = self.expand(value, base_dir)?;
                Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
            }
            Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key, self.expand(value, base_dir)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.expand(item, base_dir))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }
}

fn load_fragment(text: &str, path: &Path) -> Result<Value, RamlError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "raml" | "yaml" | "yml" => {
            if text.trim_start().starts_with("#%RAML") {
                parse_header(text).map_err(|err| RamlError::IncludeSyntax {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })?;
            }
            serde_yaml_ng::from_str(text).map_err(|err| RamlError::IncludeSyntax {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
        }
        "json" => {
            let json: serde_json::Value =
                serde_json::from_str(text).map_err(|err| RamlError::IncludeSyntax {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                })?;
            Ok(Value::String(serde_json::to_string_pretty(&json).map_err(
                |err| RamlError::IncludeSyntax {
                    path: path.to_path_buf(),
                    message: err.to_string(),
                },
            )?))
        }
        _ => Ok(Value::String(text.to_string())),
    }
}

fn count_nodes(value: &Value) -> usize {
    1 + match value {
        Value::Mapping(map) => map.values().map(count_nodes).sum(),
        Value::Sequence(items) => items.iter().map(count_nodes).sum(),
        Value::Tagged(tagged) => count_nodes(&tagged.value),
        _ => 0,
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
