//! ormbench engine
//!
//! Instrumented benchmark execution for interchangeable column-family mapping
//! backends:
//!
//! - Timed, memory-profiled execution of blocking and cooperative operations
//! - Bounded, sequential chunk processing with progress events
//! - A shared schema mapping so every backend receives identical records
//! - Aggregation into per-backend results, comparisons and scalability reports
//! - Timestamped result files and Prometheus export

pub mod adapter;
pub mod aggregator;
pub mod chunk;
pub mod config;
pub mod dataset;
pub mod error;
pub mod executor;
pub mod memory;
pub mod report;
pub mod runner;
pub mod sample;
pub mod schema;
pub mod simulated;
pub mod store;
pub mod telemetry;

pub use adapter::{BackendAdapter, BackendRegistry, BackendSelection, ExecutionStyle, QueryCriterion};
pub use aggregator::{compare, BenchmarkResult, Comparison, RunDelta, ScalabilityReport, Winner};
pub use chunk::{ChunkPlan, ChunkProcessor, ChunkProgress, ProgressSink};
pub use config::EngineConfig;
pub use error::{BenchError, ConversionError, Result};
pub use executor::{Blocking, Cooperative, InstrumentedExecutor, Measured};
pub use report::ReportGenerator;
pub use runner::{BackendFailure, BenchmarkEngine, RunContext};
pub use sample::{MetricSample, OperationKind};
pub use schema::{RawRow, Record, SchemaMapping};
pub use store::{PersistedRecord, ResultStore};
