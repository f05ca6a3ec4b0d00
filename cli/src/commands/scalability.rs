use crate::output::OutputManager;
use anyhow::{anyhow, Result};
use clap::Args;
use ormbench_engine::store::PersistedRecord;
use ormbench_engine::{Comparison, ResultStore, ScalabilityReport};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct ScalabilityArgs {
    /// Comparison file of the smaller run
    pub small: PathBuf,

    /// Comparison file of the larger run
    pub large: PathBuf,

    /// Volume ratio between the runs; defaults to the ratio of sample sizes
    #[arg(long)]
    pub scale_factor: Option<f64>,
}

pub async fn execute(args: ScalabilityArgs, output: &OutputManager) -> Result<()> {
    let small = load_comparison(&args.small)?;
    let large = load_comparison(&args.large)?;

    let scale_factor = args
        .scale_factor
        .unwrap_or_else(|| sample_ratio(&small, &large));
    let report = ScalabilityReport::build(&small, &large, scale_factor)?;
    output.print_scalability(&report)
}

fn load_comparison(path: &Path) -> Result<Comparison> {
    let record: PersistedRecord = ResultStore::load(path)?;
    record
        .comparison()
        .cloned()
        .ok_or_else(|| anyhow!("{} does not hold a comparison", path.display()))
}

fn sample_ratio(small: &Comparison, large: &Comparison) -> f64 {
    large.result_a.sample_size as f64 / small.result_a.sample_size.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbench_engine::aggregator::to_benchmark_result;
    use ormbench_engine::{compare, MetricSample, OperationKind};

    fn comparison(size: usize) -> Comparison {
        let result = |name: &str| {
            to_benchmark_result(
                name,
                MetricSample::new(OperationKind::Insert, size as u64, 1.0, 0.0),
                MetricSample::new(OperationKind::Query, 10, 1.0, 0.0),
                size,
            )
        };
        compare(&result("caspyorm"), &result("cqlengine"))
    }

    #[test]
    fn test_default_scale_is_sample_ratio() {
        assert_eq!(sample_ratio(&comparison(1000), &comparison(5000)), 5.0);
    }

    #[test]
    fn test_result_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ResultStore::new(dir.path());
        let path = store
            .save_result(&comparison(10).result_a)
            .unwrap();
        assert!(load_comparison(&path).is_err());
    }
}
