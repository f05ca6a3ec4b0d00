//! Prometheus metrics owned by one engine instance

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::aggregator::BenchmarkResult;
use crate::chunk::{ChunkProgress, ProgressSink};
use crate::error::{BenchError, Result};

pub struct EngineMetrics {
    registry: Registry,
    insert_ops_per_second: GaugeVec,
    query_ops_per_second: GaugeVec,
    memory_used_mb: GaugeVec,
    total_time_seconds: GaugeVec,
    chunk_duration: Histogram,
    failed_runs: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let insert_ops_per_second = GaugeVec::new(
            Opts::new("ormbench_insert_ops_per_second", "Insert throughput of the last run"),
            &["backend"],
        )?;
        registry.register(Box::new(insert_ops_per_second.clone()))?;

        let query_ops_per_second = GaugeVec::new(
            Opts::new("ormbench_query_ops_per_second", "Query throughput of the last run"),
            &["backend"],
        )?;
        registry.register(Box::new(query_ops_per_second.clone()))?;

        let memory_used_mb = GaugeVec::new(
            Opts::new("ormbench_memory_used_mb", "Memory delta of the last run in MB"),
            &["backend"],
        )?;
        registry.register(Box::new(memory_used_mb.clone()))?;

        let total_time_seconds = GaugeVec::new(
            Opts::new("ormbench_total_time_seconds", "Insert plus query time of the last run"),
            &["backend"],
        )?;
        registry.register(Box::new(total_time_seconds.clone()))?;

        let chunk_duration = Histogram::with_opts(
            HistogramOpts::new("ormbench_chunk_duration_seconds", "Time spent per chunk")
                .buckets(prometheus::exponential_buckets(0.001, 4.0, 10)?),
        )?;
        registry.register(Box::new(chunk_duration.clone()))?;

        let failed_runs = IntCounterVec::new(
            Opts::new("ormbench_failed_runs_total", "Backend runs that ended in an error"),
            &["backend", "category"],
        )?;
        registry.register(Box::new(failed_runs.clone()))?;

        Ok(Self {
            registry,
            insert_ops_per_second,
            query_ops_per_second,
            memory_used_mb,
            total_time_seconds,
            chunk_duration,
            failed_runs,
        })
    }

    pub fn record_result(&self, result: &BenchmarkResult) {
        let labels = [result.backend_name.as_str()];
        self.insert_ops_per_second
            .with_label_values(&labels)
            .set(result.insert_ops_per_second());
        self.query_ops_per_second
            .with_label_values(&labels)
            .set(result.query_ops_per_second());
        self.memory_used_mb
            .with_label_values(&labels)
            .set(result.total_memory());
        self.total_time_seconds
            .with_label_values(&labels)
            .set(result.total_time());
    }

    pub fn record_failure(&self, backend: &str, error: &BenchError) {
        self.failed_runs
            .with_label_values(&[backend, error.category()])
            .inc();
    }

    pub fn failures(&self, backend: &str, category: &str) -> u64 {
        self.failed_runs
            .with_label_values(&[backend, category])
            .get()
    }

    pub fn chunks_observed(&self) -> u64 {
        self.chunk_duration.get_sample_count()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| BenchError::Serialization(e.to_string()))
    }
}

impl ProgressSink for EngineMetrics {
    fn on_chunk(&self, progress: &ChunkProgress) {
        self.chunk_duration.observe(progress.elapsed_seconds);
    }
}
