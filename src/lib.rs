//! API specification registry and RAML → OpenAPI conversion.
//!
//! The registry (`src/config/apis.json` under the project root) lists every
//! API a documentation viewer can show. Entries in a legacy format are
//! converted to OpenAPI 3.0 YAML next to their source by the batch driver;
//! the artifact resolver tells viewers which file to load for each entry.

pub mod batch;
pub mod deadline;
pub mod error;
pub mod format;
pub mod model;
pub mod openapi;
pub mod pipeline;
pub mod raml;
pub mod registry;
pub mod resolver;

pub use batch::{BatchOptions, BatchSummary, run_all, run_all_with};
pub use deadline::{Deadline, DeadlineExceeded};
pub use error::{ConfigError, ConversionError, Stage};
pub use format::{SourceGrammar, SpecFormat, needs_conversion};
pub use pipeline::{ConversionResult, ConversionState, ConvertContext, ConvertOptions, convert};
pub use registry::{Registry, RegistryEntry};
pub use resolver::{ArtifactResolver, CONVERTED_SUFFIX, artifact_path, resolve};

use anyhow::{Context, Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Overrides project root discovery.
pub const ROOT_ENV: &str = "SPEC_CATALOG_ROOT";
/// Per-entry conversion time limit in seconds.
pub const TIMEOUT_ENV: &str = "SPEC_CATALOG_TIMEOUT_SECS";

fn is_project_root(candidate: &Path) -> bool {
    candidate.join(registry::DEFAULT_REGISTRY_PATH).is_file()
}

fn project_root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !is_project_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_project_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the project root: `SPEC_CATALOG_ROOT`, then the nearest ancestor of
/// the working directory, then of the executable, that holds the registry.
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(env_root) = env::var(ROOT_ENV) {
        if let Some(root) = project_root_from_hint(&env_root) {
            return Ok(root);
        }
        bail!(
            "{ROOT_ENV}={env_root} does not contain {}",
            registry::DEFAULT_REGISTRY_PATH
        );
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root);
        }
    }

    if let Ok(exe_path) = env::current_exe() {
        if let Some(root) = exe_path.parent().and_then(search_upwards) {
            return Ok(root);
        }
    }

    bail!(
        "Unable to locate the project root (a directory containing {}). Set {ROOT_ENV} or pass --root.",
        registry::DEFAULT_REGISTRY_PATH
    );
}

pub fn default_registry_path(root: &Path) -> PathBuf {
    root.join(registry::DEFAULT_REGISTRY_PATH)
}

pub fn default_docs_root(root: &Path) -> PathBuf {
    root.join(registry::DEFAULT_DOCS_ROOT)
}

/// Read `SPEC_CATALOG_TIMEOUT_SECS`; unset or empty means no limit.
pub fn timeout_from_env() -> Result<Option<Duration>> {
    match env::var(TIMEOUT_ENV) {
        Ok(raw) if !raw.trim().is_empty() => parse_timeout(&raw)
            .map(Some)
            .with_context(|| format!("invalid {TIMEOUT_ENV}")),
        _ => Ok(None),
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .with_context(|| format!("'{raw}' is not a number of seconds"))?;
    if !secs.is_finite() || secs < 0.0 {
        bail!("'{raw}' is not a non-negative number of seconds");
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Install the stderr log subscriber used by the binaries. `RUST_LOG`
/// overrides the default `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join(registry::DEFAULT_REGISTRY_PATH);
        fs::create_dir_all(registry.parent().unwrap()).unwrap();
        fs::write(&registry, "{\"apis\": []}").unwrap();
        dir
    }

    #[test]
    fn search_finds_the_registry_from_a_nested_directory() {
        let dir = project();
        let nested = dir.path().join("public/specs/v1");
        fs::create_dir_all(&nested).unwrap();
        let found = search_upwards(&nested).expect("root found");
        assert_eq!(found, fs::canonicalize(dir.path()).unwrap());
    }

    #[test]
    fn hints_must_contain_a_registry() {
        let dir = project();
        assert!(project_root_from_hint(dir.path().to_str().unwrap()).is_some());
        let empty = TempDir::new().unwrap();
        assert!(project_root_from_hint(empty.path().to_str().unwrap()).is_none());
        assert!(project_root_from_hint("").is_none());
    }

    #[test]
    fn default_paths_follow_the_viewer_layout() {
        let root = Path::new("/srv/site");
        assert_eq!(
            default_registry_path(root),
            PathBuf::from("/srv/site/src/config/apis.json")
        );
        assert_eq!(default_docs_root(root), PathBuf::from("/srv/site/public"));
    }

    #[test]
    fn timeouts_accept_fractional_seconds() {
        assert_eq!(parse_timeout("1.5").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_timeout(" 30 ").unwrap(), Duration::from_secs(30));
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("soon").is_err());
    }
}
