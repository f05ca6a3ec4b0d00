//! Backend adapter capability and registry
//!
//! An adapter is the engine's only view of a mapping library: it turns raw rows
//! into records, bulk-writes them, and runs a repeated lookup, reporting each
//! pass as a [`MetricSample`]. Which scheduler contract it uses internally is
//! its own business; the engine drives every adapter the same way.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::BenchmarkSettings;
use crate::error::{BenchError, Result};
use crate::sample::MetricSample;
use crate::schema::{RawRow, Record, SchemaMapping};

/// Scheduler contract a backend's operations run under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStyle {
    Blocking,
    Cooperative,
}

impl fmt::Display for ExecutionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStyle::Blocking => write!(f, "blocking"),
            ExecutionStyle::Cooperative => write!(f, "cooperative"),
        }
    }
}

/// Equality lookup repeated by the query pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCriterion {
    pub field: String,
    pub value: String,
    pub limit: usize,
}

impl Default for QueryCriterion {
    fn default() -> Self {
        Self {
            field: "vendor_id".to_string(),
            value: "1".to_string(),
            limit: 10,
        }
    }
}

impl fmt::Display for QueryCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {:?} LIMIT {}", self.field, self.value, self.limit)
    }
}

/// Capability every benchmarked backend provides
#[async_trait]
pub trait BackendAdapter: Send {
    fn name(&self) -> &str;

    fn execution_style(&self) -> ExecutionStyle;

    /// Table mapping this adapter writes through
    fn mapping(&self) -> &SchemaMapping;

    async fn connect(&mut self) -> Result<()>;

    /// Must be safe to call after a failed insert or query
    async fn disconnect(&mut self) -> Result<()>;

    /// Map raw rows onto backend records; `first_row` is the dataset index of `rows[0]`
    fn prepare(&self, rows: &[RawRow], first_row: usize) -> Result<Vec<Record>> {
        Ok(self.mapping().prepare(rows, first_row)?)
    }

    /// Bulk-write records; batching below this call is adapter-owned
    async fn insert(&mut self, records: &[Record]) -> Result<MetricSample>;

    /// Run the lookup `iterations` times, counting every row returned
    async fn query(&mut self, criterion: &QueryCriterion, iterations: u32)
        -> Result<MetricSample>;
}

/// Which registered backends a run covers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackendSelection {
    One(String),
    Both,
}

impl FromStr for BackendSelection {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BenchError::invalid_config("backend selector must not be empty"));
        }
        if s.eq_ignore_ascii_case("both") {
            Ok(BackendSelection::Both)
        } else {
            Ok(BackendSelection::One(s.to_ascii_lowercase()))
        }
    }
}

impl TryFrom<String> for BackendSelection {
    type Error = BenchError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BackendSelection> for String {
    fn from(selection: BackendSelection) -> Self {
        selection.to_string()
    }
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendSelection::One(name) => write!(f, "{}", name),
            BackendSelection::Both => write!(f, "both"),
        }
    }
}

pub type AdapterFactory =
    Box<dyn Fn(&BenchmarkSettings) -> Result<Box<dyn BackendAdapter>> + Send + Sync>;

/// Named adapter factories
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, AdapterFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&BenchmarkSettings) -> Result<Box<dyn BackendAdapter>> + Send + Sync + 'static,
    {
        if self
            .factories
            .insert(name.to_ascii_lowercase(), Box::new(factory))
            .is_some()
        {
            tracing::warn!(backend = name, "Replaced previously registered backend");
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    /// Backend names a selection expands to, in registry order
    pub fn resolve(&self, selection: &BackendSelection) -> Result<Vec<String>> {
        match selection {
            BackendSelection::One(name) => {
                if self.contains(name) {
                    Ok(vec![name.to_ascii_lowercase()])
                } else {
                    Err(BenchError::invalid_config(format!(
                        "Unknown backend {:?}; registered: {}",
                        name,
                        self.names().join(", ")
                    )))
                }
            }
            BackendSelection::Both => {
                if self.factories.len() < 2 {
                    return Err(BenchError::invalid_config(
                        "Selecting both backends needs two registered adapters",
                    ));
                }
                Ok(self.factories.keys().take(2).cloned().collect())
            }
        }
    }

    pub fn create(
        &self,
        name: &str,
        settings: &BenchmarkSettings,
    ) -> Result<Box<dyn BackendAdapter>> {
        let factory = self
            .factories
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| BenchError::invalid_config(format!("Unknown backend {:?}", name)))?;
        factory(settings)
    }
}
