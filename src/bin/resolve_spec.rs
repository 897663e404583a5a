//! Print the document a viewer should load for a registry entry.
//!
//! Usage:
//!   resolve-spec payments
//!   resolve-spec --absolute payments
//!   resolve-spec --all

use anyhow::{Result, bail};
use clap::{ArgGroup, Parser};
use serde::Serialize;
use spec_catalog::{
    ArtifactResolver, Registry, RegistryEntry, SpecFormat, default_docs_root,
    default_registry_path, find_project_root, resolve,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "resolve-spec")]
#[command(about = "Resolve registry entries to the spec file a viewer loads")]
#[command(group(ArgGroup::new("target").required(true).args(["id", "all"])))]
struct Cli {
    /// Registry id to resolve.
    id: Option<String>,
    /// Print a JSON manifest of every entry grouped by category.
    #[arg(long)]
    all: bool,
    /// Print the filesystem path under the document root instead of the relative path.
    #[arg(long, requires = "id")]
    absolute: bool,
    /// Project root; discovered from SPEC_CATALOG_ROOT or the working directory when omitted.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Registry file (defaults to src/config/apis.json under the root).
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[derive(Serialize)]
struct Manifest<'a> {
    categories: Vec<CategoryView<'a>>,
}

#[derive(Serialize)]
struct CategoryView<'a> {
    name: &'a str,
    apis: Vec<ApiView<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiView<'a> {
    id: &'a str,
    name: &'a str,
    version: &'a str,
    format: SpecFormat,
    spec_path: &'a str,
    artifact_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> From<&'a RegistryEntry> for ApiView<'a> {
    fn from(entry: &'a RegistryEntry) -> Self {
        Self {
            id: &entry.id,
            name: &entry.name,
            version: &entry.version,
            format: entry.format,
            spec_path: &entry.spec_path,
            artifact_path: resolve(entry),
            description: entry.description.as_deref(),
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = match cli.root {
        Some(root) => root,
        None => find_project_root()?,
    };
    let registry_path = cli
        .registry
        .unwrap_or_else(|| default_registry_path(&root));
    let registry = Registry::load(&registry_path)?;

    if cli.all {
        let manifest = Manifest {
            categories: registry
                .categories()
                .into_iter()
                .map(|(name, entries)| CategoryView {
                    name,
                    apis: entries.into_iter().map(ApiView::from).collect(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&manifest)?);
        return Ok(());
    }

    let Some(id) = cli.id else {
        bail!("an api id or --all is required");
    };
    let Some(entry) = registry.get(&id) else {
        bail!("unknown api id '{id}' in {}", registry_path.display());
    };
    if cli.absolute {
        let resolver = ArtifactResolver::new(default_docs_root(&root));
        println!("{}", resolver.locate(entry).display());
    } else {
        println!("{}", resolve(entry));
    }
    Ok(())
}
