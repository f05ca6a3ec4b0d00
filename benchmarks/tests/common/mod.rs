//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ormbench_engine::adapter::{BackendAdapter, BackendRegistry, ExecutionStyle, QueryCriterion};
use ormbench_engine::config::{BenchmarkSettings, EngineConfig};
use ormbench_engine::dataset::TripGenerator;
use ormbench_engine::schema::{RawRow, Record, SchemaMapping};
use ormbench_engine::{BenchError, MetricSample, OperationKind, Result};

/// Lifecycle and call counters shared between a mock and its test
#[derive(Default)]
pub struct Calls {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub inserts: AtomicUsize,
    pub queries: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Scripted adapter: fixed per-record cost, optional failures
pub struct MockAdapter {
    pub name: String,
    pub style: ExecutionStyle,
    pub seconds_per_record: f64,
    pub memory_delta_mb: f64,
    pub fail_connect: bool,
    /// 1-based insert call that fails
    pub fail_insert_on: Option<usize>,
    pub calls: Arc<Calls>,
    mapping: SchemaMapping,
    stored: Vec<Record>,
}

impl MockAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            style: ExecutionStyle::Blocking,
            seconds_per_record: 0.0001,
            memory_delta_mb: 0.0,
            fail_connect: false,
            fail_insert_on: None,
            calls: Arc::new(Calls::default()),
            mapping: SchemaMapping::taxi_trips(),
            stored: Vec::new(),
        }
    }

    pub fn with_calls(mut self, calls: Arc<Calls>) -> Self {
        self.calls = calls;
        self
    }
}

#[async_trait]
impl BackendAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn execution_style(&self) -> ExecutionStyle {
        self.style
    }

    fn mapping(&self) -> &SchemaMapping {
        &self.mapping
    }

    async fn connect(&mut self) -> Result<()> {
        self.calls.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(BenchError::connection(&self.name, "connection refused"));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.calls.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(&mut self, records: &[Record]) -> Result<MetricSample> {
        let call = self.calls.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_on == Some(call) {
            return Err(BenchError::operation(&self.name, "insert", "write timeout"));
        }
        self.stored.extend_from_slice(records);
        Ok(MetricSample::new(
            OperationKind::Insert,
            records.len() as u64,
            records.len() as f64 * self.seconds_per_record,
            self.memory_delta_mb,
        ))
    }

    async fn query(&mut self, criterion: &QueryCriterion, iterations: u32) -> Result<MetricSample> {
        self.calls.queries.fetch_add(1, Ordering::SeqCst);
        let matching = self
            .stored
            .iter()
            .filter(|r| {
                r.get(&criterion.field)
                    .and_then(|v| v.as_text())
                    .is_some_and(|v| v == criterion.value)
            })
            .take(criterion.limit)
            .count();
        Ok(MetricSample::new(
            OperationKind::Query,
            (matching * iterations as usize) as u64,
            iterations as f64 * 0.001,
            0.0,
        ))
    }
}

/// Registry with two mocks; `fast` inserts twice as quickly as `slow`
pub fn mock_registry(slow_fails_connect: bool) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register("fast", |_: &BenchmarkSettings| {
        let mut adapter = MockAdapter::new("fast");
        adapter.seconds_per_record = 0.00005;
        adapter.memory_delta_mb = 0.0;
        Ok(Box::new(adapter) as Box<dyn BackendAdapter>)
    });
    registry.register("slow", move |_: &BenchmarkSettings| {
        let mut adapter = MockAdapter::new("slow");
        adapter.memory_delta_mb = 1.5;
        adapter.fail_connect = slow_fails_connect;
        Ok(Box::new(adapter) as Box<dyn BackendAdapter>)
    });
    registry
}

pub fn test_config(chunk_size: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.benchmark.chunk_size = chunk_size;
    config.benchmark.query_iterations = 10;
    config.benchmark.settle_delay_ms = 0;
    config.storage.persist = false;
    config
}

pub fn rows(count: usize) -> Vec<RawRow> {
    TripGenerator::new(42).with_null_share(0.1).rows(count)
}
