use crate::commands::Outcome;
use crate::output::{BarProgress, OutputManager};
use anyhow::{Context, Result};
use clap::Args;
use ormbench_engine::dataset::TripGenerator;
use ormbench_engine::simulated::default_registry;
use ormbench_engine::{BackendSelection, BenchmarkEngine, EngineConfig, RawRow};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Backend to run, or "both"
    #[arg(short, long)]
    pub backend: Option<BackendSelection>,

    /// Number of records to insert
    #[arg(short = 'n', long)]
    pub sample_size: Option<usize>,

    /// Records per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Write batch size passed to the backends
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Number of lookups in the query pass
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Pause between insert and query pass in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Seed for the generated trip data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Newline-delimited JSON rows to use instead of generated data
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Directory for result files
    #[arg(long)]
    pub results_dir: Option<PathBuf>,

    /// Do not write result files
    #[arg(long)]
    pub no_persist: bool,
}

impl RunArgs {
    /// Command line values win over file and environment
    pub fn apply_to(&self, config: &mut EngineConfig) {
        let bench = &mut config.benchmark;
        if let Some(backend) = &self.backend {
            bench.backend = backend.clone();
        }
        if let Some(n) = self.sample_size {
            bench.sample_size = n;
        }
        if let Some(n) = self.chunk_size {
            bench.chunk_size = n;
        }
        if let Some(n) = self.batch_size {
            bench.batch_size = n;
        }
        if let Some(n) = self.iterations {
            bench.query_iterations = n;
        }
        if let Some(ms) = self.settle_ms {
            bench.settle_delay_ms = ms;
        }
        if let Some(seed) = self.seed {
            config.dataset.seed = seed;
        }
        if let Some(dir) = &self.results_dir {
            config.storage.results_dir = dir.clone();
        }
        if self.no_persist {
            config.storage.persist = false;
        }
    }
}

pub async fn execute(args: RunArgs, config: EngineConfig, output: &OutputManager) -> Result<Outcome> {
    let dataset = match &args.input {
        Some(path) => read_rows(path, config.benchmark.sample_size)?,
        None => TripGenerator::new(config.dataset.seed)
            .with_null_share(config.dataset.null_share)
            .rows(config.benchmark.sample_size),
    };
    tracing::info!(rows = dataset.len(), "Dataset ready");

    let bar = Arc::new(BarProgress::new(output.create_progress_bar()));
    let engine = BenchmarkEngine::new(config)?.with_progress(bar.clone());
    let registry = default_registry();

    let ctx = engine
        .run_selected(&registry, &engine.config().benchmark.backend, &dataset)
        .await?;
    bar.finish();

    let metrics = engine.metrics().export_prometheus()?;
    output.print_run(&ctx, &metrics)?;

    if ctx.results.is_empty() {
        anyhow::bail!("No backend completed the benchmark");
    }
    if ctx.is_partial() {
        output.print_warning(&format!(
            "Only {} of {} backends completed",
            ctx.results.len(),
            ctx.requested.len()
        ));
        return Ok(Outcome::Partial);
    }
    Ok(Outcome::Complete)
}

/// Read up to `limit` rows, one JSON object per line
pub fn read_rows(path: &Path, limit: usize) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        if rows.len() >= limit {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: RawRow = serde_json::from_str(&line)
            .with_context(|| format!("{}:{} is not a JSON object", path.display(), number + 1))?;
        rows.push(row);
    }
    Ok(rows)
}
