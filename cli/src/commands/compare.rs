use crate::output::OutputManager;
use anyhow::{bail, Result};
use clap::Args;
use ormbench_engine::aggregator::run_delta;
use ormbench_engine::report::ReportGenerator;
use ormbench_engine::{compare, PersistedRecord, ResultStore, RunDelta};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Baseline result or comparison file
    pub baseline: PathBuf,

    /// Result or comparison file to compare against the baseline
    pub candidate: PathBuf,
}

pub async fn execute(args: CompareArgs, output: &OutputManager) -> Result<()> {
    let baseline = ResultStore::load(&args.baseline)?;
    let candidate = ResultStore::load(&args.candidate)?;

    match (baseline.result(), candidate.result()) {
        (Some(a), Some(b)) => {
            if a.backend_name == b.backend_name {
                output.print_deltas(&[run_delta(&a, &b)])
            } else {
                output.print_comparison(&ReportGenerator::comparison(&compare(&a, &b)))
            }
        }
        (None, None) => output.print_deltas(&comparison_deltas(&baseline, &candidate)?),
        _ => bail!("Cannot compare a single result with a comparison"),
    }
}

/// Per-backend improvement between two saved comparisons
fn comparison_deltas(
    baseline: &PersistedRecord,
    candidate: &PersistedRecord,
) -> Result<Vec<RunDelta>> {
    let (Some(before), Some(after)) = (baseline.comparison(), candidate.comparison()) else {
        bail!("Both files must hold comparisons");
    };

    let deltas: Vec<RunDelta> = [&before.result_a, &before.result_b]
        .into_iter()
        .filter_map(|old| after.result_for(&old.backend_name).map(|new| run_delta(old, new)))
        .collect();

    if deltas.is_empty() {
        bail!(
            "No backend appears in both comparisons ({} vs {})",
            baseline.source_label,
            candidate.source_label
        );
    }
    Ok(deltas)
}
