//! Full benchmark runs against one or more backends
//!
//! A run connects the adapter, inserts the dataset chunk by chunk, pauses so
//! the store settles, repeats the configured lookup, and always disconnects
//! once it has connected. Every outcome is recorded in the caller's
//! [`RunContext`]; nothing is kept in globals.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::adapter::{BackendAdapter, BackendRegistry, BackendSelection};
use crate::aggregator::{
    compare, merge_samples, to_benchmark_result, BenchmarkResult, Comparison,
};
use crate::chunk::{
    ChunkPlan, ChunkProcessor, ChunkProgress, CompositeProgress, ProgressSink, TracingProgress,
};
use crate::config::EngineConfig;
use crate::error::{BenchError, Result};
use crate::memory::{MemoryProbe, ProcessMemoryProbe};
use crate::sample::OperationKind;
use crate::schema::RawRow;
use crate::store::ResultStore;
use crate::telemetry::EngineMetrics;

/// A backend run that did not produce a result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendFailure {
    pub backend: String,
    pub category: String,
    pub message: String,
}

impl BackendFailure {
    fn new(backend: &str, error: &BenchError) -> Self {
        Self {
            backend: backend.to_string(),
            category: error.category().to_string(),
            message: error.to_string(),
        }
    }
}

/// Everything one invocation produced
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Backends the caller asked for
    pub requested: Vec<String>,
    pub results: Vec<BenchmarkResult>,
    pub failures: Vec<BackendFailure>,
    /// Chunk events per backend
    pub progress: BTreeMap<String, Vec<ChunkProgress>>,
    pub comparison: Option<Comparison>,
    pub persisted: Vec<PathBuf>,
    /// Non-fatal problems, such as results that could not be saved
    pub warnings: Vec<String>,
}

impl RunContext {
    pub fn new(requested: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            requested,
            results: Vec::new(),
            failures: Vec::new(),
            progress: BTreeMap::new(),
            comparison: None,
            persisted: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Fewer results than requested backends
    pub fn is_partial(&self) -> bool {
        self.results.len() < self.requested.len()
    }

    pub fn result_for(&self, backend: &str) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.backend_name == backend)
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }
}

pub struct BenchmarkEngine {
    config: EngineConfig,
    processor: ChunkProcessor,
    store: Option<ResultStore>,
    metrics: Arc<EngineMetrics>,
}

impl BenchmarkEngine {
    /// Build an engine from a validated configuration
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_probe(config, Arc::new(ProcessMemoryProbe::new()))
    }

    pub fn with_probe(config: EngineConfig, probe: Arc<dyn MemoryProbe>) -> Result<Self> {
        config.validate()?;

        let metrics = Arc::new(EngineMetrics::new()?);
        let sink = CompositeProgress::new(vec![
            Arc::new(TracingProgress) as Arc<dyn ProgressSink>,
            metrics.clone() as Arc<dyn ProgressSink>,
        ]);
        let store = config
            .storage
            .persist
            .then(|| ResultStore::new(config.storage.results_dir.clone()));

        Ok(Self {
            processor: ChunkProcessor::new(probe, Arc::new(sink)),
            config,
            store,
            metrics,
        })
    }

    /// Also send chunk progress to `sink`
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        let defaults = CompositeProgress::new(vec![
            Arc::new(TracingProgress) as Arc<dyn ProgressSink>,
            self.metrics.clone() as Arc<dyn ProgressSink>,
            sink,
        ]);
        self.processor = self.processor.with_sink(Arc::new(defaults));
        self
    }

    pub fn with_store(mut self, store: Option<ResultStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn store(&self) -> Option<&ResultStore> {
        self.store.as_ref()
    }

    fn check_inputs(&self, dataset: &[RawRow]) -> Result<ChunkPlan> {
        if dataset.is_empty() {
            return Err(BenchError::invalid_config("Sample size must be greater than 0"));
        }
        if self.config.benchmark.query_iterations == 0 {
            return Err(BenchError::invalid_config(
                "Query iterations must be greater than 0",
            ));
        }
        ChunkPlan::new(dataset.len(), self.config.benchmark.chunk_size)
    }

    /// Benchmark one backend over the whole dataset
    pub async fn run_benchmark(
        &self,
        adapter: &mut dyn BackendAdapter,
        dataset: &[RawRow],
        ctx: &mut RunContext,
    ) -> Result<BenchmarkResult> {
        let backend = adapter.name().to_string();

        let outcome = self.run_connected(adapter, dataset, ctx).await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    backend = %backend,
                    category = e.category(),
                    "Benchmark failed: {}",
                    e
                );
                self.metrics.record_failure(&backend, &e);
                ctx.failures.push(BackendFailure::new(&backend, &e));
                return Err(e);
            }
        };

        self.metrics.record_result(&result);
        if let Some(store) = &self.store {
            match store.save_result(&result) {
                Ok(path) => ctx.persisted.push(path),
                Err(e) => ctx.warn(format!("Could not save {} result: {}", backend, e)),
            }
        }

        tracing::info!(
            backend = %backend,
            insert_ops_per_second = result.insert_ops_per_second(),
            query_ops_per_second = result.query_ops_per_second(),
            total_time = result.total_time(),
            memory_mb = result.total_memory(),
            "Benchmark completed"
        );

        ctx.results.push(result.clone());
        Ok(result)
    }

    async fn run_connected(
        &self,
        adapter: &mut dyn BackendAdapter,
        dataset: &[RawRow],
        ctx: &mut RunContext,
    ) -> Result<BenchmarkResult> {
        let plan = self.check_inputs(dataset)?;
        let settings = &self.config.benchmark;

        if settings.parallel_processing {
            tracing::warn!("Parallel processing is not supported; chunks run sequentially");
        }

        tracing::info!(
            backend = adapter.name(),
            style = %adapter.execution_style(),
            rows = dataset.len(),
            chunks = plan.chunk_count,
            "Starting benchmark"
        );

        adapter.connect().await?;

        let outcome = self.exercise(&mut *adapter, dataset, ctx).await;

        // Disconnect runs whatever happened above; the operation error wins
        let disconnected = adapter.disconnect().await;
        match (outcome, disconnected) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(result), Err(e)) => {
                ctx.warn(format!("Disconnecting {} failed: {}", adapter.name(), e));
                Ok(result)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disconnect_error)) => {
                tracing::warn!(
                    backend = adapter.name(),
                    "Disconnect after failure also failed: {}",
                    disconnect_error
                );
                Err(e)
            }
        }
    }

    async fn exercise(
        &self,
        adapter: &mut dyn BackendAdapter,
        dataset: &[RawRow],
        ctx: &mut RunContext,
    ) -> Result<BenchmarkResult> {
        let settings = &self.config.benchmark;
        let backend = adapter.name().to_string();

        let run = self
            .processor
            .process_with(
                &mut *adapter,
                dataset,
                settings.chunk_size,
                |adapter, first, chunk| {
                    Box::pin(async move {
                        let records = adapter.prepare(chunk, first)?;
                        adapter.insert(&records).await
                    })
                },
            )
            .await?;

        let insert_sample = merge_samples(OperationKind::Insert, &run.results);
        ctx.progress.insert(backend.clone(), run.progress);

        let settle = settings.settle_delay();
        if !settle.is_zero() {
            tracing::debug!(backend = %backend, "Waiting {:?} before queries", settle);
            tokio::time::sleep(settle).await;
        }

        let criterion = self.config.query.criterion();
        let query_sample = adapter
            .query(&criterion, settings.query_iterations)
            .await?;

        Ok(to_benchmark_result(
            &backend,
            insert_sample,
            query_sample,
            dataset.len(),
        ))
    }

    /// Run every selected backend, isolating failures per backend
    ///
    /// Fatal errors abort the invocation; any other failure is recorded in the
    /// returned context and the remaining backends still run.
    pub async fn run_selected(
        &self,
        registry: &BackendRegistry,
        selection: &BackendSelection,
        dataset: &[RawRow],
    ) -> Result<RunContext> {
        let names = registry.resolve(selection)?;
        self.check_inputs(dataset)?;

        let mut ctx = RunContext::new(names.clone());
        tracing::info!(run_id = %ctx.run_id, backends = ?names, "Starting run");

        for name in &names {
            let mut adapter = match registry.create(name, &self.config.benchmark) {
                Ok(adapter) => adapter,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(backend = %name, "Could not create adapter: {}", e);
                    self.metrics.record_failure(name, &e);
                    ctx.failures.push(BackendFailure::new(name, &e));
                    continue;
                }
            };

            if let Err(e) = self.run_benchmark(adapter.as_mut(), dataset, &mut ctx).await {
                if e.is_fatal() {
                    return Err(e);
                }
            }
        }

        if let [a, b, ..] = ctx.results.as_slice() {
            let comparison = compare(a, b);
            if let Some(store) = &self.store {
                match store.save_comparison(&comparison) {
                    Ok(path) => ctx.persisted.push(path),
                    Err(e) => ctx.warn(format!("Could not save comparison: {}", e)),
                }
            }
            ctx.comparison = Some(comparison);
        }

        if ctx.is_partial() {
            tracing::warn!(
                requested = ctx.requested.len(),
                succeeded = ctx.results.len(),
                "Run only partially fulfilled"
            );
        }

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ExecutionStyle;
    use crate::dataset::TripGenerator;
    use crate::memory::ConstantProbe;
    use crate::simulated::{default_registry, LatencyProfile, SimulatedBackend};

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.benchmark.chunk_size = 40;
        config.benchmark.query_iterations = 5;
        config.benchmark.settle_delay_ms = 0;
        config.storage.persist = false;
        config
    }

    fn engine(config: EngineConfig) -> BenchmarkEngine {
        BenchmarkEngine::with_probe(config, Arc::new(ConstantProbe(32.0))).unwrap()
    }

    #[tokio::test]
    async fn test_single_backend_run() {
        let engine = engine(config());
        let rows = TripGenerator::new(42).rows(100);
        let mut adapter = SimulatedBackend::new("sim", ExecutionStyle::Cooperative, 16)
            .with_latency(LatencyProfile::ZERO);
        let mut ctx = RunContext::new(vec!["sim".to_string()]);

        let result = engine.run_benchmark(&mut adapter, &rows, &mut ctx).await.unwrap();

        assert_eq!(result.sample_size, 100);
        assert_eq!(result.insert_sample.item_count, 100);
        assert_eq!(ctx.progress["sim"].len(), 3);
        assert!(!adapter.is_connected());
        assert!(!ctx.is_partial());
    }

    #[tokio::test]
    async fn test_empty_dataset_rejected() {
        let engine = engine(config());
        let mut adapter = SimulatedBackend::new("sim", ExecutionStyle::Blocking, 16);
        let mut ctx = RunContext::new(vec!["sim".to_string()]);

        let err = engine.run_benchmark(&mut adapter, &[], &mut ctx).await.unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfiguration(_)));
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn test_run_selected_both() {
        let engine = engine(config());
        let rows = TripGenerator::new(42).rows(120);

        let ctx = engine
            .run_selected(&default_registry(), &BackendSelection::Both, &rows)
            .await
            .unwrap();

        assert_eq!(ctx.results.len(), 2);
        assert!(ctx.comparison.is_some());
        assert!(ctx.failures.is_empty());
        assert!(ctx.persisted.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_backend_is_fatal() {
        let engine = engine(config());
        let rows = TripGenerator::new(42).rows(10);
        let err = engine
            .run_selected(
                &default_registry(),
                &BackendSelection::One("hibernate".to_string()),
                &rows,
            )
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = config();
        config.benchmark.chunk_size = 0;
        assert!(BenchmarkEngine::with_probe(config, Arc::new(ConstantProbe(0.0))).is_err());
    }
}
