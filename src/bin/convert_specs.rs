//! Convert every legacy API specification in the registry to OpenAPI.
//!
//! Usage:
//!   convert-specs
//!   convert-specs --root /srv/site --jobs 4
//!   convert-specs --registry apis.json --docs-root public --json --strict
//!
//! Per-entry failures are logged and never abort the batch. The exit status
//! is 0 unless the registry cannot be loaded (1) or `--strict` is set and at
//! least one entry failed (2).

use anyhow::{Context, Result, bail};
use clap::Parser;
use spec_catalog::{
    BatchOptions, BatchSummary, ConvertContext, ConvertOptions, Registry, default_docs_root,
    default_registry_path, find_project_root, init_tracing, run_all_with, timeout_from_env,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "convert-specs")]
#[command(about = "Convert legacy registry entries to OpenAPI 3.0 artifacts")]
struct Cli {
    /// Project root; discovered from SPEC_CATALOG_ROOT or the working directory when omitted.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Registry file (defaults to src/config/apis.json under the root).
    #[arg(long)]
    registry: Option<PathBuf>,
    /// Directory specPath values are relative to (defaults to public/ under the root).
    #[arg(long = "docs-root")]
    docs_root: Option<PathBuf>,
    /// Number of entries converted in parallel.
    #[arg(long, default_value_t = 1)]
    jobs: usize,
    /// Per-entry time limit; overrides SPEC_CATALOG_TIMEOUT_SECS.
    #[arg(long = "timeout-secs")]
    timeout_secs: Option<f64>,
    /// Print one JSON result record per converted entry on stdout.
    #[arg(long)]
    json: bool,
    /// Exit with status 2 when any entry fails.
    #[arg(long)]
    strict: bool,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = match (&cli.root, &cli.registry, &cli.docs_root) {
        (Some(root), _, _) => Some(root.clone()),
        (None, Some(_), Some(_)) => None,
        _ => Some(find_project_root()?),
    };
    let registry_path = match (cli.registry, &root) {
        (Some(path), _) => path,
        (None, Some(root)) => default_registry_path(root),
        (None, None) => bail!("no registry path"),
    };
    let docs_root = match (cli.docs_root, &root) {
        (Some(path), _) => path,
        (None, Some(root)) => default_docs_root(root),
        (None, None) => bail!("no document root"),
    };
    let timeout = match cli.timeout_secs {
        Some(secs) if !secs.is_finite() || secs < 0.0 => {
            bail!("--timeout-secs must be a non-negative number, got {secs}")
        }
        Some(secs) => Some(Duration::from_secs_f64(secs)),
        None => timeout_from_env()?,
    };

    let registry = Registry::load(&registry_path)
        .with_context(|| format!("loading registry {}", registry_path.display()))?;
    let ctx = ConvertContext::new(docs_root).with_options(ConvertOptions { timeout });
    let results = run_all_with(
        &registry,
        &ctx,
        &BatchOptions {
            jobs: cli.jobs.max(1),
        },
    );

    if cli.json {
        for result in &results {
            let line = serde_json::to_string(&result.record())
                .context("serializing conversion result")?;
            println!("{line}");
        }
    }

    let summary = BatchSummary::from_results(&registry, &results);
    info!(
        converted = summary.converted,
        failed = summary.failed,
        skipped = summary.skipped,
        "conversion finished"
    );
    if summary.has_failures() {
        for result in results.iter().filter(|result| !result.is_success()) {
            if let Some(err) = result.error() {
                warn!(id = %result.entry_id, stage = %err.stage(), "{err}");
            }
        }
        if cli.strict {
            return Ok(2);
        }
    }
    Ok(0)
}
