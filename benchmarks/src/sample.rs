//! Single timed, memory-profiled measurements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Operation being measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Query,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Query => write!(f, "query"),
        }
    }
}

/// One measurement of one operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub operation: OperationKind,
    pub item_count: u64,
    pub elapsed_seconds: f64,
    /// Resident-set delta; negative when the process shrank during the call
    pub memory_delta_mb: f64,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        operation: OperationKind,
        item_count: u64,
        elapsed_seconds: f64,
        memory_delta_mb: f64,
    ) -> Self {
        Self {
            operation,
            item_count,
            elapsed_seconds: elapsed_seconds.max(0.0),
            memory_delta_mb,
            timestamp: Utc::now(),
        }
    }

    /// A sample for an operation that legitimately touched nothing
    pub fn empty(operation: OperationKind) -> Self {
        Self::new(operation, 0, 0.0, 0.0)
    }

    pub fn ops_per_second(&self) -> f64 {
        rate(self.item_count, self.elapsed_seconds)
    }
}

/// Items per second; zero whenever either side is zero
pub fn rate(item_count: u64, elapsed_seconds: f64) -> f64 {
    if item_count == 0 || elapsed_seconds.is_nan() || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    item_count as f64 / elapsed_seconds
}

/// Anything whose size becomes a sample's `item_count`
pub trait ItemCount {
    fn item_count(&self) -> u64;
}

impl<T> ItemCount for Vec<T> {
    fn item_count(&self) -> u64 {
        self.len() as u64
    }
}

impl<T> ItemCount for [T] {
    fn item_count(&self) -> u64 {
        self.len() as u64
    }
}

impl<T> ItemCount for VecDeque<T> {
    fn item_count(&self) -> u64 {
        self.len() as u64
    }
}

impl<K, V> ItemCount for HashMap<K, V> {
    fn item_count(&self) -> u64 {
        self.len() as u64
    }
}

impl<K, V> ItemCount for BTreeMap<K, V> {
    fn item_count(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ItemCount + ?Sized> ItemCount for &T {
    fn item_count(&self) -> u64 {
        (**self).item_count()
    }
}
