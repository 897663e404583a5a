//! Batch conversion of every legacy registry entry.

use crate::pipeline::{ConversionResult, ConvertContext, convert};
use crate::registry::{Registry, RegistryEntry};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    /// Worker threads; 1 converts on the calling thread.
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Convert every legacy entry sequentially, in registry order.
pub fn run_all(registry: &Registry, ctx: &ConvertContext) -> Vec<ConversionResult> {
    run_all_with(registry, ctx, &BatchOptions::default())
}

/// Convert every legacy entry. Results are in registry order whatever the
/// number of jobs, and one failing entry never stops the others.
pub fn run_all_with(
    registry: &Registry,
    ctx: &ConvertContext,
    options: &BatchOptions,
) -> Vec<ConversionResult> {
    let selected: Vec<&RegistryEntry> = registry.legacy_entries().collect();
    if selected.is_empty() {
        info!("no legacy entries in the registry; nothing to convert");
        return Vec::new();
    }
    info!(count = selected.len(), jobs = options.jobs, "converting legacy entries");

    if options.jobs <= 1 {
        return sequential(&selected, ctx);
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
    {
        Ok(pool) => pool.install(|| {
            selected
                .par_iter()
                .map(|entry| convert(entry, ctx))
                .collect()
        }),
        Err(err) => {
            warn!(error = %err, "could not start worker pool; converting sequentially");
            sequential(&selected, ctx)
        }
    }
}

fn sequential(selected: &[&RegistryEntry], ctx: &ConvertContext) -> Vec<ConversionResult> {
    selected.iter().map(|entry| convert(entry, ctx)).collect()
}

/// Counts reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: usize,
    /// Canonical entries, which need no conversion.
    pub skipped: usize,
}

impl BatchSummary {
    pub fn from_results(registry: &Registry, results: &[ConversionResult]) -> Self {
        let converted = results.iter().filter(|r| r.is_success()).count();
        Self {
            converted,
            failed: results.len() - converted,
            skipped: registry.len().saturating_sub(results.len()),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}
