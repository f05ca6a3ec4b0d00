//! In-memory column-family backends
//!
//! These stand in for the real mapping libraries so the engine can be run and
//! tested end to end without a cluster. Records are stored per partition key
//! and ordered by the clustering columns; writing a record whose primary key
//! already exists replaces it, as a column-family store would.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::{BackendAdapter, BackendRegistry, ExecutionStyle, QueryCriterion};
use crate::config::BenchmarkSettings;
use crate::error::{BenchError, Result};
use crate::executor::InstrumentedExecutor;
use crate::memory::MemoryProbe;
use crate::sample::{MetricSample, OperationKind};
use crate::schema::{FieldValue, Record, SchemaMapping};

/// One keyspace table
#[derive(Debug, Clone)]
pub struct ColumnFamilyStore {
    mapping: Arc<SchemaMapping>,
    partitions: BTreeMap<String, BTreeMap<Vec<String>, Record>>,
}

impl ColumnFamilyStore {
    pub fn new(mapping: Arc<SchemaMapping>) -> Self {
        Self {
            mapping,
            partitions: BTreeMap::new(),
        }
    }

    fn key_of(record: &Record, column: &str) -> String {
        record
            .get(column)
            .map(FieldValue::to_string)
            .unwrap_or_else(|| "null".to_string())
    }

    /// Upsert a batch; returns how many records were written
    pub fn write(&mut self, batch: &[Record]) -> usize {
        for record in batch {
            let partition = Self::key_of(record, self.mapping.partition_key);
            let clustering = self
                .mapping
                .clustering_keys
                .iter()
                .map(|column| Self::key_of(record, column))
                .collect();
            self.partitions
                .entry(partition)
                .or_default()
                .insert(clustering, record.clone());
        }
        batch.len()
    }

    /// Partition-key lookup in clustering order
    pub fn select(&self, criterion: &QueryCriterion) -> Result<Vec<&Record>> {
        if criterion.field != self.mapping.partition_key {
            return Err(BenchError::operation(
                self.mapping.table,
                "query",
                format!(
                    "cannot filter on {} without ALLOW FILTERING; partition key is {}",
                    criterion.field, self.mapping.partition_key
                ),
            ));
        }

        Ok(self
            .partitions
            .get(&criterion.value)
            .map(|rows| rows.values().take(criterion.limit).collect())
            .unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// Simulated round-trip costs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyProfile {
    pub per_batch: Duration,
    pub per_record: Duration,
    pub per_query: Duration,
}

impl LatencyProfile {
    pub const ZERO: LatencyProfile = LatencyProfile {
        per_batch: Duration::ZERO,
        per_record: Duration::ZERO,
        per_query: Duration::ZERO,
    };

    fn batch_cost(&self, records: usize) -> Duration {
        self.per_batch + self.per_record * records as u32
    }
}

impl Default for LatencyProfile {
    fn default() -> Self {
        Self {
            per_batch: Duration::from_millis(2),
            per_record: Duration::from_micros(5),
            per_query: Duration::ZERO,
        }
    }
}

/// Wait out a simulated cost under the given contract
async fn pause(style: ExecutionStyle, cost: Duration) {
    match style {
        ExecutionStyle::Blocking => {
            if !cost.is_zero() {
                std::thread::sleep(cost);
            }
        }
        ExecutionStyle::Cooperative => {
            if cost.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(cost).await;
            }
        }
    }
}

/// Adapter over a [`ColumnFamilyStore`]
pub struct SimulatedBackend {
    name: String,
    style: ExecutionStyle,
    latency: LatencyProfile,
    batch_size: usize,
    mapping: Arc<SchemaMapping>,
    executor: InstrumentedExecutor,
    store: Option<ColumnFamilyStore>,
}

impl SimulatedBackend {
    pub fn new(name: &str, style: ExecutionStyle, batch_size: usize) -> Self {
        Self {
            name: name.to_string(),
            style,
            latency: LatencyProfile::default(),
            batch_size: batch_size.max(1),
            mapping: Arc::new(SchemaMapping::taxi_trips()),
            executor: InstrumentedExecutor::default(),
            store: None,
        }
    }

    pub fn with_latency(mut self, latency: LatencyProfile) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.executor = InstrumentedExecutor::new(probe);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    pub fn stored_records(&self) -> usize {
        self.store.as_ref().map_or(0, ColumnFamilyStore::len)
    }

    fn store_mut(&mut self, operation: &str) -> Result<&mut ColumnFamilyStore> {
        let name = &self.name;
        self.store
            .as_mut()
            .ok_or_else(|| BenchError::operation(name, operation, "not connected"))
    }
}

#[async_trait]
impl BackendAdapter for SimulatedBackend {
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
        if self.store.is_none() {
            self.mapping.validate()?;
            self.store = Some(ColumnFamilyStore::new(self.mapping.clone()));
            tracing::debug!(backend = %self.name, table = self.mapping.table, "Connected");
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if self.store.take().is_some() {
            tracing::debug!(backend = %self.name, "Disconnected");
        }
        Ok(())
    }

    async fn insert(&mut self, records: &[Record]) -> Result<MetricSample> {
        let style = self.style;
        let latency = self.latency;
        let batch_size = self.batch_size;
        let executor = self.executor.clone();
        let store = self.store_mut("insert")?;

        let measured = match style {
            ExecutionStyle::Blocking => executor.measure_blocking(OperationKind::Insert, || {
                let mut written = Vec::with_capacity(records.len());
                for batch in records.chunks(batch_size) {
                    if !latency.batch_cost(batch.len()).is_zero() {
                        std::thread::sleep(latency.batch_cost(batch.len()));
                    }
                    store.write(batch);
                    written.extend(batch.iter());
                }
                Ok::<_, BenchError>(written)
            })?,
            ExecutionStyle::Cooperative => {
                executor
                    .measure_cooperative(OperationKind::Insert, async {
                        let mut written = Vec::with_capacity(records.len());
                        for batch in records.chunks(batch_size) {
                            pause(style, latency.batch_cost(batch.len())).await;
                            store.write(batch);
                            written.extend(batch.iter());
                        }
                        Ok::<_, BenchError>(written)
                    })
                    .await?
            }
        };

        Ok(measured.sample)
    }

    async fn query(
        &mut self,
        criterion: &QueryCriterion,
        iterations: u32,
    ) -> Result<MetricSample> {
        let style = self.style;
        let latency = self.latency;
        let executor = self.executor.clone();
        let store: &ColumnFamilyStore = self.store_mut("query")?;

        let measured = match style {
            ExecutionStyle::Blocking => executor.measure_blocking(OperationKind::Query, || {
                let mut rows = Vec::new();
                for _ in 0..iterations {
                    if !latency.per_query.is_zero() {
                        std::thread::sleep(latency.per_query);
                    }
                    rows.extend(store.select(criterion)?);
                }
                Ok::<_, BenchError>(rows)
            })?,
            ExecutionStyle::Cooperative => {
                executor
                    .measure_cooperative(OperationKind::Query, async {
                        let mut rows = Vec::new();
                        for _ in 0..iterations {
                            pause(style, latency.per_query).await;
                            rows.extend(store.select(criterion)?);
                        }
                        Ok::<_, BenchError>(rows)
                    })
                    .await?
            }
        };

        Ok(measured.sample)
    }
}

pub const CASPYORM: &str = "caspyorm";
pub const CQLENGINE: &str = "cqlengine";

/// Registry holding the two simulated mapping libraries
pub fn default_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(CASPYORM, |settings: &BenchmarkSettings| {
        Ok(Box::new(SimulatedBackend::new(
            CASPYORM,
            ExecutionStyle::Cooperative,
            settings.batch_size,
        )) as Box<dyn BackendAdapter>)
    });
    registry.register(CQLENGINE, |settings: &BenchmarkSettings| {
        Ok(Box::new(
            SimulatedBackend::new(CQLENGINE, ExecutionStyle::Blocking, settings.batch_size)
                .with_latency(LatencyProfile {
                    per_batch: Duration::from_millis(3),
                    ..LatencyProfile::default()
                }),
        ) as Box<dyn BackendAdapter>)
    });
    registry
}
