#![allow(dead_code)]

use anyhow::{Context, Result};
use serde_json::{Value, json};
use spec_catalog::{ConvertContext, Registry};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const NOTES_RAML: &str = r#"#%RAML 1.0
title: Notes
version: v1
baseUri: https://api.example.com/{version}
mediaType: application/json
types:
  Note:
    properties:
      id: integer
      text: string
      tags?: string[]
/notes:
  displayName: Notes
  get:
    queryParameters:
      limit:
        type: integer
        required: false
    responses:
      200:
        body: Note[]
  post:
    body: Note
    responses:
      201:
        description: Created
  /{noteId}:
    get:
      responses:
        200:
          body: Note
        404:
"#;

pub const PLAIN_OPENAPI: &str = r#"openapi: 3.0.0
info:
  title: Plain
  version: "1"
paths: {}
"#;

// A project laid out the way the site expects: the registry under
// src/config/ and spec documents under public/.
pub struct DocsFixture {
    dir: TempDir,
}

impl DocsFixture {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("creating fixture dir")?;
        fs::create_dir_all(dir.path().join("public"))?;
        fs::create_dir_all(dir.path().join("src/config"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn docs_root(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.path().join("src/config/apis.json")
    }

    pub fn doc_path(&self, relative: &str) -> PathBuf {
        self.docs_root().join(relative)
    }

    pub fn write_doc(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.doc_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("writing fixture doc {}", path.display()))?;
        Ok(path)
    }

    pub fn read_doc(&self, relative: &str) -> Result<String> {
        let path = self.doc_path(relative);
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    /// Write `src/config/apis.json` from `(id, specPath, type)` triples.
    pub fn write_registry(&self, apis: &[(&str, &str, &str)]) -> Result<Registry> {
        let entries: Vec<Value> = apis
            .iter()
            .map(|(id, spec_path, kind)| {
                json!({
                    "id": id,
                    "name": id.to_uppercase(),
                    "version": "1.0",
                    "category": if *kind == "openapi" { "Current" } else { "Legacy" },
                    "specPath": spec_path,
                    "type": kind,
                })
            })
            .collect();
        let document = json!({ "apis": entries });
        fs::write(self.registry_path(), serde_json::to_string_pretty(&document)?)?;
        Registry::load(&self.registry_path()).context("loading fixture registry")
    }

    pub fn context(&self) -> ConvertContext {
        ConvertContext::new(self.docs_root())
    }
}

/// Parse an artifact with an independent OpenAPI model to prove it is
/// a well-formed 3.0 document.
pub fn parse_openapi(text: &str) -> Result<openapiv3::OpenAPI> {
    serde_yaml_ng::from_str(text).context("artifact is not an OpenAPI 3.0 document")
}

pub fn run_command(mut cmd: Command) -> Result<Output> {
    cmd.output()
        .with_context(|| format!("failed to run {:?}", cmd.get_program()))
}
