//! Combining samples into results, and results into comparisons
//!
//! Everything here is pure: inputs are borrowed, outputs are new values.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};
use crate::sample::{MetricSample, OperationKind};

/// One complete run against one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub backend_name: String,
    pub sample_size: usize,
    pub insert_sample: MetricSample,
    pub query_sample: MetricSample,
}

impl BenchmarkResult {
    pub fn insert_ops_per_second(&self) -> f64 {
        self.insert_sample.ops_per_second()
    }

    pub fn query_ops_per_second(&self) -> f64 {
        self.query_sample.ops_per_second()
    }

    pub fn total_time(&self) -> f64 {
        self.insert_sample.elapsed_seconds + self.query_sample.elapsed_seconds
    }

    /// Sum of both memory deltas; may be negative
    pub fn total_memory(&self) -> f64 {
        self.insert_sample.memory_delta_mb + self.query_sample.memory_delta_mb
    }

    pub fn rate(&self, operation: OperationKind) -> f64 {
        match operation {
            OperationKind::Insert => self.insert_ops_per_second(),
            OperationKind::Query => self.query_ops_per_second(),
        }
    }
}

pub fn to_benchmark_result(
    backend_name: &str,
    insert_sample: MetricSample,
    query_sample: MetricSample,
    sample_size: usize,
) -> BenchmarkResult {
    BenchmarkResult {
        backend_name: backend_name.to_string(),
        sample_size,
        insert_sample,
        query_sample,
    }
}

/// Fold per-chunk samples into one; counts, times and memory deltas add up
///
/// The merged sample is stamped with the latest input timestamp.
pub fn merge_samples(operation: OperationKind, samples: &[MetricSample]) -> MetricSample {
    let mut merged = MetricSample::empty(operation);
    for sample in samples {
        merged.item_count += sample.item_count;
        merged.elapsed_seconds += sample.elapsed_seconds;
        merged.memory_delta_mb += sample.memory_delta_mb;
        merged.timestamp = sample.timestamp;
    }
    merged
}

/// `(a - b) / b * 100`, or 0 when `b` is not positive or the result is not finite
pub fn percent_difference(a: f64, b: f64) -> f64 {
    if !(b > 0.0) {
        return 0.0;
    }
    let pct = (a - b) / b * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// Cross-backend comparison; positive percentages mean A's value is larger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub backend_a: String,
    pub backend_b: String,
    pub insert_performance: f64,
    pub query_performance: f64,
    pub memory_difference: f64,
    pub total_time_difference: f64,
    pub result_a: BenchmarkResult,
    pub result_b: BenchmarkResult,
}

pub fn compare(a: &BenchmarkResult, b: &BenchmarkResult) -> Comparison {
    Comparison {
        backend_a: a.backend_name.clone(),
        backend_b: b.backend_name.clone(),
        insert_performance: percent_difference(
            a.insert_ops_per_second(),
            b.insert_ops_per_second(),
        ),
        query_performance: percent_difference(a.query_ops_per_second(), b.query_ops_per_second()),
        memory_difference: percent_difference(a.total_memory(), b.total_memory()),
        total_time_difference: percent_difference(a.total_time(), b.total_time()),
        result_a: a.clone(),
        result_b: b.clone(),
    }
}

impl Comparison {
    pub fn result_for(&self, backend: &str) -> Option<&BenchmarkResult> {
        [&self.result_a, &self.result_b]
            .into_iter()
            .find(|r| r.backend_name == backend)
    }
}

/// Outcome of a head-to-head metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Backend(String),
    Tie,
}

impl Winner {
    /// Higher value wins; equal values tie
    pub fn higher(a: (&str, f64), b: (&str, f64)) -> Self {
        if a.1 > b.1 {
            Winner::Backend(a.0.to_string())
        } else if b.1 > a.1 {
            Winner::Backend(b.0.to_string())
        } else {
            Winner::Tie
        }
    }

    /// Lower value wins; equal values tie
    pub fn lower(a: (&str, f64), b: (&str, f64)) -> Self {
        Self::higher((a.0, -a.1), (b.0, -b.1))
    }

    pub fn name(&self) -> &str {
        match self {
            Winner::Backend(name) => name,
            Winner::Tie => "tie",
        }
    }
}

impl std::fmt::Display for Winner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `(rate_large / rate_small) / scale_factor`; 1.0 is linear scaling
pub fn efficiency_from_rates(rate_small: f64, rate_large: f64, scale_factor: f64) -> f64 {
    if !(rate_small > 0.0) || !(scale_factor > 0.0) {
        return 0.0;
    }
    let efficiency = (rate_large / rate_small) / scale_factor;
    if efficiency.is_finite() {
        efficiency
    } else {
        0.0
    }
}

pub fn scalability_efficiency(
    small: &BenchmarkResult,
    large: &BenchmarkResult,
    operation: OperationKind,
    scale_factor: f64,
) -> f64 {
    efficiency_from_rates(small.rate(operation), large.rate(operation), scale_factor)
}

/// `large / small * 100`, 0 when `small` is not positive
fn growth(small: f64, large: f64) -> f64 {
    if !(small > 0.0) {
        return 0.0;
    }
    let pct = large / small * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

/// How one backend behaved across the two volumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendScaling {
    pub backend_name: String,
    pub insert_efficiency: f64,
    pub query_efficiency: f64,
    /// Large-run value as a percentage of the small-run value
    pub insert_rate_growth: f64,
    pub query_rate_growth: f64,
    pub memory_growth: f64,
    pub time_growth: f64,
}

impl BackendScaling {
    pub fn between(small: &BenchmarkResult, large: &BenchmarkResult, scale_factor: f64) -> Self {
        Self {
            backend_name: large.backend_name.clone(),
            insert_efficiency: scalability_efficiency(
                small,
                large,
                OperationKind::Insert,
                scale_factor,
            ),
            query_efficiency: scalability_efficiency(
                small,
                large,
                OperationKind::Query,
                scale_factor,
            ),
            insert_rate_growth: growth(small.insert_ops_per_second(), large.insert_ops_per_second()),
            query_rate_growth: growth(small.query_ops_per_second(), large.query_ops_per_second()),
            memory_growth: growth(small.total_memory(), large.total_memory()),
            time_growth: growth(small.total_time(), large.total_time()),
        }
    }
}

/// Two comparisons of the same backends at different data volumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalabilityReport {
    pub scale_factor: f64,
    pub backends: Vec<BackendScaling>,
    pub insert_winner: Winner,
    pub query_winner: Winner,
}

impl ScalabilityReport {
    pub fn build(small: &Comparison, large: &Comparison, scale_factor: f64) -> Result<Self> {
        if !(scale_factor > 0.0) {
            return Err(BenchError::invalid_config("Scale factor must be greater than 0"));
        }

        let backends = [&small.result_a, &small.result_b]
            .into_iter()
            .map(|small_result| {
                let name = &small_result.backend_name;
                let large_result = large.result_for(name).ok_or_else(|| {
                    BenchError::invalid_config(format!(
                        "Backend {} missing from the larger run",
                        name
                    ))
                })?;
                Ok(BackendScaling::between(small_result, large_result, scale_factor))
            })
            .collect::<Result<Vec<_>>>()?;

        let (a, b) = (&backends[0], &backends[1]);
        let insert_winner = Winner::higher(
            (a.backend_name.as_str(), a.insert_efficiency),
            (b.backend_name.as_str(), b.insert_efficiency),
        );
        let query_winner = Winner::higher(
            (a.backend_name.as_str(), a.query_efficiency),
            (b.backend_name.as_str(), b.query_efficiency),
        );

        Ok(Self {
            scale_factor,
            backends,
            insert_winner,
            query_winner,
        })
    }
}

/// Improvement of a candidate run over a baseline of the same backend
///
/// Rates improve when they grow, memory and time when they shrink; positive
/// values are improvements in every column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDelta {
    pub backend_name: String,
    pub insert_improvement: f64,
    pub query_improvement: f64,
    pub memory_improvement: f64,
    pub time_improvement: f64,
}

fn improvement(baseline: f64, candidate: f64) -> f64 {
    if !(baseline > 0.0) {
        return 0.0;
    }
    let pct = (candidate / baseline - 1.0) * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

pub fn run_delta(baseline: &BenchmarkResult, candidate: &BenchmarkResult) -> RunDelta {
    RunDelta {
        backend_name: candidate.backend_name.clone(),
        insert_improvement: improvement(
            baseline.insert_ops_per_second(),
            candidate.insert_ops_per_second(),
        ),
        query_improvement: improvement(
            baseline.query_ops_per_second(),
            candidate.query_ops_per_second(),
        ),
        memory_improvement: improvement(candidate.total_memory(), baseline.total_memory()),
        time_improvement: improvement(candidate.total_time(), baseline.total_time()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(
        name: &str,
        inserted: u64,
        insert_s: f64,
        queried: u64,
        query_s: f64,
        mem: f64,
    ) -> BenchmarkResult {
        to_benchmark_result(
            name,
            MetricSample::new(OperationKind::Insert, inserted, insert_s, mem),
            MetricSample::new(OperationKind::Query, queried, query_s, 0.0),
            inserted as usize,
        )
    }

    #[test]
    fn test_result_totals() {
        let r = result("a", 1000, 2.0, 500, 0.5, 12.0);
        assert_eq!(r.insert_ops_per_second(), 500.0);
        assert_eq!(r.query_ops_per_second(), 1000.0);
        assert_eq!(r.total_time(), 2.5);
        assert_eq!(r.total_memory(), 12.0);
    }

    #[test]
    fn test_merge_samples() {
        let samples = vec![
            MetricSample::new(OperationKind::Insert, 400, 1.0, 2.0),
            MetricSample::new(OperationKind::Insert, 400, 1.5, -1.0),
            MetricSample::new(OperationKind::Insert, 200, 0.5, 0.0),
        ];
        let merged = merge_samples(OperationKind::Insert, &samples);
        assert_eq!(merged.item_count, 1000);
        assert_eq!(merged.elapsed_seconds, 3.0);
        assert_eq!(merged.memory_delta_mb, 1.0);
        assert_eq!(merge_samples(OperationKind::Query, &[]).item_count, 0);
    }

    #[test]
    fn test_negative_memory_is_kept() {
        let samples = vec![
            MetricSample::new(OperationKind::Insert, 10, 1.0, -4.0),
            MetricSample::new(OperationKind::Insert, 10, 1.0, 1.5),
        ];
        let merged = merge_samples(OperationKind::Insert, &samples);
        assert_eq!(merged.memory_delta_mb, -2.5);

        let a = result("caspyorm", 1000, 1.0, 10, 1.0, -2.5);
        let b = result("cqlengine", 1000, 1.0, 10, 1.0, 5.0);
        assert_eq!(a.total_memory(), -2.5);
        assert_eq!(compare(&a, &b).memory_difference, -150.0);
    }

    #[test]
    fn test_compare_signs_and_idempotence() {
        let a = result("caspyorm", 1000, 1.0, 100, 1.0, 10.0);
        let b = result("cqlengine", 1000, 2.0, 100, 0.5, 20.0);

        let ab = compare(&a, &b);
        assert_eq!(ab, compare(&a, &b));
        assert_eq!(ab.insert_performance, 100.0);
        assert_eq!(ab.query_performance, -50.0);
        assert_eq!(ab.memory_difference, -50.0);

        let ba = compare(&b, &a);
        assert!(ab.insert_performance > 0.0 && ba.insert_performance < 0.0);
        assert!(ab.query_performance < 0.0 && ba.query_performance > 0.0);
    }

    #[test]
    fn test_compare_with_zero_denominator() {
        let a = result("a", 1000, 1.0, 10, 1.0, 5.0);
        let b = result("b", 1000, 1.0, 10, 1.0, 0.0);
        let c = compare(&a, &b);
        assert_eq!(c.memory_difference, 0.0);
        assert!(c.insert_performance.is_finite());

        let idle = result("idle", 0, 0.0, 0, 0.0, 0.0);
        let c = compare(&a, &idle);
        assert_eq!(c.insert_performance, 0.0);
        assert_eq!(c.total_time_difference, 0.0);
    }

    #[test]
    fn test_scalability_efficiency() {
        let small = result("a", 10_000, 10.0, 100, 1.0, 1.0);
        let linear = result("a", 50_000, 10.0, 100, 1.0, 1.0);
        let flat = result("a", 50_000, 50.0, 100, 1.0, 1.0);

        let eff = scalability_efficiency(&small, &linear, OperationKind::Insert, 5.0);
        assert!((eff - 1.0).abs() < 1e-9);

        let eff = scalability_efficiency(&small, &flat, OperationKind::Insert, 5.0);
        assert!((eff - 0.2).abs() < 1e-9);

        assert_eq!(efficiency_from_rates(0.0, 10.0, 5.0), 0.0);
        assert_eq!(efficiency_from_rates(10.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_scalability_report() {
        let small = compare(
            &result("caspyorm", 10_000, 1.0, 100, 1.0, 1.0),
            &result("cqlengine", 10_000, 2.0, 100, 1.0, 1.0),
        );
        let large = compare(
            &result("caspyorm", 50_000, 4.0, 100, 1.0, 2.0),
            &result("cqlengine", 50_000, 12.0, 100, 2.0, 4.0),
        );

        let report = ScalabilityReport::build(&small, &large, 5.0).unwrap();
        assert_eq!(report.backends.len(), 2);
        assert_eq!(report.insert_winner, Winner::Backend("caspyorm".to_string()));
        assert_eq!(report.query_winner, Winner::Backend("caspyorm".to_string()));
        assert_eq!(report.backends[0].memory_growth, 200.0);

        assert!(ScalabilityReport::build(&small, &large, 0.0).is_err());

        let other = compare(
            &result("x", 1, 1.0, 1, 1.0, 1.0),
            &result("y", 1, 1.0, 1, 1.0, 1.0),
        );
        assert!(ScalabilityReport::build(&small, &other, 5.0).is_err());
    }

    #[test]
    fn test_run_delta_directionality() {
        let baseline = result("a", 1000, 2.0, 100, 1.0, 20.0);
        let candidate = result("a", 1000, 1.0, 100, 1.0, 10.0);
        let delta = run_delta(&baseline, &candidate);

        assert_eq!(delta.insert_improvement, 100.0);
        assert_eq!(delta.query_improvement, 0.0);
        assert_eq!(delta.memory_improvement, 100.0);
        assert!((delta.time_improvement - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_winner() {
        assert_eq!(Winner::higher(("a", 2.0), ("b", 1.0)), Winner::Backend("a".to_string()));
        assert_eq!(Winner::lower(("a", 2.0), ("b", 1.0)), Winner::Backend("b".to_string()));
        assert_eq!(Winner::higher(("a", 1.0), ("b", 1.0)), Winner::Tie);
    }
}
