//! Artifact resolution for viewers.
//!
//! `resolve` is a pure path computation: legacy entries map to their derived
//! artifact whether or not conversion has run yet. Viewers must treat a
//! missing or unreadable artifact as a load-time error for that entry.

use crate::format::needs_conversion;
use crate::registry::RegistryEntry;
use std::path::{Path, PathBuf};

/// Suffix that replaces the source extension of converted documents.
pub const CONVERTED_SUFFIX: &str = ".converted.yaml";

/// Derive the artifact path for a legacy source path: same directory, final
/// extension replaced by `CONVERTED_SUFFIX`.
pub fn artifact_path(spec_path: &str) -> String {
    let (dir, file) = match spec_path.rfind('/') {
        Some(idx) => spec_path.split_at(idx + 1),
        None => ("", spec_path),
    };
    let stem = match file.rfind('.') {
        Some(idx) if idx > 0 => &file[..idx],
        _ => file,
    };
    format!("{dir}{stem}{CONVERTED_SUFFIX}")
}

/// Path (relative to the document root) a viewer should load for `entry`.
pub fn resolve(entry: &RegistryEntry) -> String {
    if needs_conversion(entry) {
        artifact_path(&entry.spec_path)
    } else {
        entry.spec_path.clone()
    }
}

/// Join registry paths onto a document root.
#[derive(Clone, Debug)]
pub struct ArtifactResolver {
    docs_root: PathBuf,
}

impl ArtifactResolver {
    pub fn new(docs_root: impl Into<PathBuf>) -> Self {
        Self {
            docs_root: docs_root.into(),
        }
    }

    pub fn docs_root(&self) -> &Path {
        &self.docs_root
    }

    /// Filesystem location of the artifact for `entry`. No existence check.
    pub fn locate(&self, entry: &RegistryEntry) -> PathBuf {
        self.join(&resolve(entry))
    }

    /// Filesystem location of the entry's source document.
    pub fn source(&self, entry: &RegistryEntry) -> PathBuf {
        self.join(&entry.spec_path)
    }

    fn join(&self, relative: &str) -> PathBuf {
        self.docs_root.join(relative.trim_start_matches('/'))
    }
}
