//! Configuration management for the benchmark engine

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::adapter::{BackendSelection, QueryCriterion};
use crate::error::{BenchError, Result};

const ENV_PREFIX: &str = "ORMBENCH_";

/// Main engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub benchmark: BenchmarkSettings,
    pub query: QuerySettings,
    pub dataset: DatasetSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    pub sample_size: usize,
    pub chunk_size: usize,
    /// Hint passed to adapters for their internal write batching
    pub batch_size: usize,
    pub query_iterations: u32,
    /// Pause between the insert and the query pass
    pub settle_delay_ms: u64,
    /// Accepted for compatibility; chunks always run sequentially
    pub parallel_processing: bool,
    pub backend: BackendSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub field: String,
    pub value: String,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    pub seed: u64,
    /// Share of optional fields left null in generated rows
    pub null_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub results_dir: PathBuf,
    pub persist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            sample_size: 50_000,
            chunk_size: 50_000,
            batch_size: 2_000,
            query_iterations: 1_000,
            settle_delay_ms: 1_000,
            parallel_processing: false,
            backend: BackendSelection::Both,
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        let criterion = QueryCriterion::default();
        Self {
            field: criterion.field,
            value: criterion.value,
            limit: criterion.limit,
        }
    }
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            null_share: 0.02,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("benchmark/results"),
            persist: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BenchmarkSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl QuerySettings {
    pub fn criterion(&self) -> QueryCriterion {
        QueryCriterion {
            field: self.field.clone(),
            value: self.value.clone(),
            limit: self.limit,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let mut config = EngineConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `ORMBENCH_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Override fields from any key lookup; keys are given without the prefix
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("SAMPLE_SIZE") {
            self.benchmark.sample_size = parse_var("SAMPLE_SIZE", &value)?;
        }
        if let Some(value) = lookup("CHUNK_SIZE") {
            self.benchmark.chunk_size = parse_var("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = lookup("BATCH_SIZE") {
            self.benchmark.batch_size = parse_var("BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("QUERY_ITERATIONS") {
            self.benchmark.query_iterations = parse_var("QUERY_ITERATIONS", &value)?;
        }
        if let Some(value) = lookup("SETTLE_DELAY_MS") {
            self.benchmark.settle_delay_ms = parse_var("SETTLE_DELAY_MS", &value)?;
        }
        if let Some(value) = lookup("PARALLEL_PROCESSING") {
            self.benchmark.parallel_processing = parse_var("PARALLEL_PROCESSING", &value)?;
        }
        if let Some(value) = lookup("BACKEND") {
            self.benchmark.backend = parse_var("BACKEND", &value)?;
        }
        if let Some(value) = lookup("SEED") {
            self.dataset.seed = parse_var("SEED", &value)?;
        }
        if let Some(value) = lookup("RESULTS_DIR") {
            self.storage.results_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("PERSIST") {
            self.storage.persist = parse_var("PERSIST", &value)?;
        }
        if let Some(value) = lookup("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = lookup("LOG_JSON") {
            self.logging.json = parse_var("LOG_JSON", &value)?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let bench = &self.benchmark;

        if bench.sample_size == 0 {
            return Err(BenchError::invalid_config("Sample size must be greater than 0"));
        }

        if bench.chunk_size == 0 {
            return Err(BenchError::invalid_config("Chunk size must be greater than 0"));
        }

        if bench.batch_size == 0 {
            return Err(BenchError::invalid_config("Batch size must be greater than 0"));
        }

        if bench.query_iterations == 0 {
            return Err(BenchError::invalid_config(
                "Query iterations must be greater than 0",
            ));
        }

        if self.query.field.trim().is_empty() {
            return Err(BenchError::invalid_config("Query field must not be empty"));
        }

        if self.query.limit == 0 {
            return Err(BenchError::invalid_config("Query limit must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.dataset.null_share) {
            return Err(BenchError::invalid_config(
                "Null share must be between 0.0 and 1.0",
            ));
        }

        if !matches!(
            self.logging.level.to_ascii_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(BenchError::invalid_config(format!(
                "Unknown log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        BenchError::invalid_config(format!("{}{}={:?}: {}", ENV_PREFIX, key, value, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.benchmark.sample_size, 50_000);
        assert_eq!(config.benchmark.batch_size, 2_000);
        assert_eq!(config.benchmark.query_iterations, 1_000);
        assert!(!config.benchmark.parallel_processing);
        assert_eq!(config.benchmark.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.query.criterion(), QueryCriterion::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_sizes() {
        let mut config = EngineConfig::default();
        config.benchmark.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(BenchError::InvalidConfiguration(_))
        ));

        let mut config = EngineConfig::default();
        config.benchmark.sample_size = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.benchmark.query_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("ormbench.toml");

        let mut config = EngineConfig::default();
        config.benchmark.backend = BackendSelection::One("cqlengine".to_string());
        config.benchmark.chunk_size = 400;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [benchmark]
            sample_size = 1000
            backend = "caspyorm"
            "#,
        )
        .unwrap();

        assert_eq!(config.benchmark.sample_size, 1000);
        assert_eq!(config.benchmark.chunk_size, 50_000);
        assert_eq!(config.benchmark.backend, BackendSelection::One("caspyorm".to_string()));
        assert_eq!(config.query.field, "vendor_id");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SAMPLE_SIZE", "1000"),
            ("CHUNK_SIZE", "400"),
            ("BACKEND", "both"),
            ("PERSIST", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.benchmark.sample_size, 1000);
        assert_eq!(config.benchmark.chunk_size, 400);
        assert_eq!(config.benchmark.backend, BackendSelection::Both);
        assert!(!config.storage.persist);

        let err = config
            .apply_overrides(|key| (key == "CHUNK_SIZE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ORMBENCH_CHUNK_SIZE"));
    }
}
