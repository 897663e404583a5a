//! Validate a registry file against the registry schema and its invariants.
//!
//! Usage:
//!   registry-validate
//!   registry-validate --file src/config/apis.json --check-sources

use anyhow::{Result, bail};
use clap::Parser;
use spec_catalog::{
    ArtifactResolver, Registry, default_docs_root, default_registry_path, find_project_root,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "registry-validate")]
#[command(about = "Validate the API registry")]
struct Cli {
    /// Registry file; defaults to src/config/apis.json under the project root.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Also require every specPath to exist under the document root.
    #[arg(long = "check-sources")]
    check_sources: bool,
    /// Directory specPath values are relative to (defaults to public/ under the root).
    #[arg(long = "docs-root")]
    docs_root: Option<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = match (&cli.file, &cli.docs_root) {
        (Some(_), Some(_)) => None,
        (Some(_), None) if !cli.check_sources => None,
        _ => Some(find_project_root()?),
    };
    let path = match (cli.file, &root) {
        (Some(file), _) => file,
        (None, Some(root)) => default_registry_path(root),
        (None, None) => bail!("no registry path"),
    };
    let docs_root = match (cli.docs_root, &root) {
        (Some(docs), _) => Some(docs),
        (None, Some(root)) => Some(default_docs_root(root)),
        (None, None) => None,
    };

    let registry = Registry::load(&path)?;

    if let Some(docs_root) = docs_root.filter(|_| cli.check_sources) {
        let resolver = ArtifactResolver::new(&docs_root);
        let missing: Vec<String> = registry
            .iter()
            .filter(|entry| !resolver.source(entry).is_file())
            .map(|entry| format!("{} ({})", entry.id, entry.spec_path))
            .collect();
        if !missing.is_empty() {
            bail!(
                "{} specPath(s) missing under {}:\n  {}",
                missing.len(),
                docs_root.display(),
                missing.join("\n  ")
            );
        }
    }

    println!(
        "{}: {} entries ({} to convert)",
        path.display(),
        registry.len(),
        registry.legacy_entries().count()
    );
    Ok(())
}
