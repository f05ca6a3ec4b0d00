//! Timestamped result files
//!
//! Each completed run is written once as `<label>_<YYYYmmdd_HHMMSS>.json` under
//! the results directory and only ever read back for offline analysis. A file
//! holds either one backend's result or a comparison; readers ignore fields
//! they do not know.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::{to_benchmark_result, BenchmarkResult, Comparison};
use crate::error::Result;
use crate::sample::{MetricSample, OperationKind};

const FILE_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// One backend's result in its persisted shape
///
/// The flat figures are always present. The raw samples are written by this
/// crate but may be missing from files produced elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub backend_name: String,
    pub sample_size: usize,
    pub insert_ops_per_second: f64,
    pub query_ops_per_second: f64,
    pub total_time: f64,
    pub memory_used: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_sample: Option<MetricSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_sample: Option<MetricSample>,
}

impl From<&BenchmarkResult> for ResultRecord {
    fn from(result: &BenchmarkResult) -> Self {
        Self {
            backend_name: result.backend_name.clone(),
            sample_size: result.sample_size,
            insert_ops_per_second: result.insert_ops_per_second(),
            query_ops_per_second: result.query_ops_per_second(),
            total_time: result.total_time(),
            memory_used: result.total_memory(),
            insert_sample: Some(result.insert_sample.clone()),
            query_sample: Some(result.query_sample.clone()),
        }
    }
}

impl ResultRecord {
    /// Rebuild the result; `recorded_at` stamps samples rebuilt from flat figures
    pub fn to_result(&self, recorded_at: DateTime<Utc>) -> BenchmarkResult {
        let (insert_sample, query_sample) = match (&self.insert_sample, &self.query_sample) {
            (Some(insert), Some(query)) => (insert.clone(), query.clone()),
            _ => self.samples_from_figures(recorded_at),
        };
        to_benchmark_result(&self.backend_name, insert_sample, query_sample, self.sample_size)
    }

    /// Samples that reproduce the flat rates, total time and memory
    fn samples_from_figures(&self, recorded_at: DateTime<Utc>) -> (MetricSample, MetricSample) {
        let insert_time = if self.insert_ops_per_second > 0.0 {
            self.sample_size as f64 / self.insert_ops_per_second
        } else {
            0.0
        };
        let query_time = (self.total_time - insert_time).max(0.0);
        let queried = (self.query_ops_per_second * query_time).round().max(0.0) as u64;

        let mut insert = MetricSample::new(
            OperationKind::Insert,
            self.sample_size as u64,
            insert_time,
            self.memory_used,
        );
        let mut query = MetricSample::new(OperationKind::Query, queried, query_time, 0.0);
        insert.timestamp = recorded_at;
        query.timestamp = recorded_at;
        (insert, query)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Comparison { comparison: Comparison },
    Result(ResultRecord),
}

impl From<&BenchmarkResult> for Payload {
    fn from(result: &BenchmarkResult) -> Self {
        Payload::Result(result.into())
    }
}

impl From<&Comparison> for Payload {
    fn from(comparison: &Comparison) -> Self {
        Payload::Comparison {
            comparison: comparison.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(flatten)]
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source_label: String,
}

impl PersistedRecord {
    pub fn result(&self) -> Option<BenchmarkResult> {
        match &self.payload {
            Payload::Result(record) => Some(record.to_result(self.timestamp)),
            Payload::Comparison { .. } => None,
        }
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match &self.payload {
            Payload::Comparison { comparison } => Some(comparison),
            Payload::Result(_) => None,
        }
    }
}

/// Directory of persisted records
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a record and return its path; never overwrites an earlier file
    pub fn save(&self, label: &str, payload: Payload) -> Result<PathBuf> {
        let label = sanitize_label(label);
        let record = PersistedRecord {
            payload,
            timestamp: Utc::now(),
            source_label: label.clone(),
        };
        let content = serde_json::to_string_pretty(&record)?;

        fs::create_dir_all(&self.dir)?;
        let stem = format!("{}_{}", label, record.timestamp.format(FILE_TIMESTAMP));
        let mut path = self.dir.join(format!("{}.json", stem));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.json", stem, suffix));
            suffix += 1;
        }

        fs::write(&path, content)?;
        tracing::info!(path = %path.display(), "Results saved");
        Ok(path)
    }

    pub fn save_result(&self, result: &BenchmarkResult) -> Result<PathBuf> {
        self.save(&result.backend_name, result.into())
    }

    pub fn save_comparison(&self, comparison: &Comparison) -> Result<PathBuf> {
        self.save("comparison", comparison.into())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<PersistedRecord> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Record files, oldest first; only those for `label` when given
    ///
    /// Files written within the same second are ordered by their numeric
    /// collision suffix.
    pub fn list(&self, label: Option<&str>) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let wanted = label.map(sanitize_label);
        let mut files: Vec<(NaiveDateTime, u32, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((file_label, stamp, suffix)) = split_file_name(name) else {
                continue;
            };
            if wanted.as_deref().is_some_and(|w| w != file_label) {
                continue;
            }
            files.push((stamp, suffix, path));
        }

        files.sort();
        Ok(files.into_iter().map(|(_, _, path)| path).collect())
    }

    pub fn load_latest(&self, label: &str) -> Result<Option<PersistedRecord>> {
        match self.list(Some(label))?.last() {
            Some(path) => Ok(Some(Self::load(path)?)),
            None => Ok(None),
        }
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "result".to_string()
    } else {
        cleaned
    }
}

/// `label_YYYYmmdd_HHMMSS[_n].json` into its label, timestamp and suffix (0 when absent)
fn split_file_name(name: &str) -> Option<(&str, NaiveDateTime, u32)> {
    let stem = name.strip_suffix(".json")?;

    // Labels may contain underscores, so try every split point from the right
    stem.match_indices('_').rev().find_map(|(pos, _)| {
        let rest = &stem[pos + 1..];
        let stamp = rest.get(..15)?;
        let suffix = match &rest[15..] {
            "" => 0,
            tail => tail
                .strip_prefix('_')
                .filter(|n| n.chars().all(|c| c.is_ascii_digit()))?
                .parse()
                .ok()?,
        };
        if pos == 0 {
            return None;
        }
        NaiveDateTime::parse_from_str(stamp, FILE_TIMESTAMP)
            .ok()
            .map(|ts| (&stem[..pos], ts, suffix))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::compare;
    use tempfile::TempDir;

    fn result(name: &str) -> BenchmarkResult {
        to_benchmark_result(
            name,
            MetricSample::new(OperationKind::Insert, 1000, 0.123456789, -3.25),
            MetricSample::new(OperationKind::Query, 10_000, 2.5, 0.75),
            1000,
        )
    }

    #[test]
    fn test_result_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ResultStore::new(temp_dir.path().join("results"));

        let original = result("caspyorm");
        let path = store.save_result(&original).unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("caspyorm_"));

        let record = ResultStore::load(&path).unwrap();
        assert_eq!(record.source_label, "caspyorm");
        let loaded = record.result().unwrap();
        assert!((loaded.insert_ops_per_second() - original.insert_ops_per_second()).abs() < 1e-6);
        assert!((loaded.total_memory() - original.total_memory()).abs() < 1e-9);
        assert_eq!(loaded.sample_size, 1000);
    }

    #[test]
    fn test_comparison_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ResultStore::new(temp_dir.path());

        let comparison = compare(&result("caspyorm"), &result("cqlengine"));
        store.save_comparison(&comparison).unwrap();

        let record = store.load_latest("comparison").unwrap().unwrap();
        assert!(record.result().is_none());
        let loaded = record.comparison().unwrap();
        assert_eq!(loaded.backend_b, "cqlengine");
        assert_eq!(loaded.result_a.sample_size, 1000);
        assert!((loaded.insert_performance - comparison.insert_performance).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("legacy_20250705_211558.json");
        let mut value = serde_json::to_value(PersistedRecord {
            payload: (&result("cqlengine")).into(),
            timestamp: Utc::now(),
            source_label: "legacy".to_string(),
        })
        .unwrap();
        value["host"] = serde_json::json!("bench-01");
        std::fs::write(&path, value.to_string()).unwrap();

        let record = ResultStore::load(&path).unwrap();
        assert_eq!(record.result().unwrap().backend_name, "cqlengine");
    }

    #[test]
    fn test_flat_result_without_samples() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("caspyorm_20250705_211558.json");
        std::fs::write(
            &path,
            r#"{
                "backend_name": "caspyorm",
                "sample_size": 1000,
                "insert_ops_per_second": 500.0,
                "query_ops_per_second": 200.0,
                "total_time": 2.5,
                "memory_used": -1.5,
                "timestamp": "2025-07-05T21:15:58Z"
            }"#,
        )
        .unwrap();

        let record = ResultStore::load(&path).unwrap();
        assert_eq!(record.source_label, "");
        let loaded = record.result().unwrap();
        assert_eq!(loaded.sample_size, 1000);
        assert!((loaded.insert_ops_per_second() - 500.0).abs() < 1e-9);
        assert!((loaded.query_ops_per_second() - 200.0).abs() < 1e-9);
        assert!((loaded.total_time() - 2.5).abs() < 1e-9);
        assert_eq!(loaded.total_memory(), -1.5);
        assert_eq!(loaded.insert_sample.timestamp, record.timestamp);
    }

    #[test]
    fn test_list_filters_and_orders() {
        let temp_dir = TempDir::new().unwrap();
        let store = ResultStore::new(temp_dir.path());
        assert!(store.list(None).unwrap().is_empty());

        let first = store.save_result(&result("caspyorm")).unwrap();
        let second = store.save_result(&result("caspyorm")).unwrap();
        store.save_result(&result("cqlengine")).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "x").unwrap();

        let caspy = store.list(Some("caspyorm")).unwrap();
        assert_eq!(caspy, vec![first, second.clone()]);
        assert_eq!(store.list(None).unwrap().len(), 3);
        assert!(store.load_latest("missing").unwrap().is_none());
    }

    #[test]
    fn test_collision_suffixes_sort_numerically() {
        let temp_dir = TempDir::new().unwrap();
        let store = ResultStore::new(temp_dir.path());

        for n in 0..12usize {
            let name = match n {
                0 => "burst_20250705_211558.json".to_string(),
                n => format!("burst_20250705_211558_{}.json", n),
            };
            let mut saved = result("burst");
            saved.sample_size = n + 1;
            let record = PersistedRecord {
                payload: (&saved).into(),
                timestamp: Utc::now(),
                source_label: "burst".to_string(),
            };
            let content = serde_json::to_string(&record).unwrap();
            std::fs::write(temp_dir.path().join(name), content).unwrap();
        }

        let files = store.list(Some("burst")).unwrap();
        assert_eq!(files.len(), 12);
        assert!(files[9].ends_with("burst_20250705_211558_9.json"));
        assert!(files[11].ends_with("burst_20250705_211558_11.json"));

        let latest = store.load_latest("burst").unwrap().unwrap();
        assert_eq!(latest.result().unwrap().sample_size, 12);
    }

    #[test]
    fn test_split_file_name() {
        let (label, _, suffix) = split_file_name("comparison_20250705_211558.json").unwrap();
        assert_eq!((label, suffix), ("comparison", 0));
        let (label, _, suffix) = split_file_name("ultra_run_20250705_211558_12.json").unwrap();
        assert_eq!((label, suffix), ("ultra_run", 12));
        assert!(split_file_name("run_20250705_211558_x.json").is_none());
        assert!(split_file_name("comparison.json").is_none());
    }
}
