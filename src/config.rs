//! Pipeline configuration
//!
//! Defaults, optional JSON file, then `CASTLE_PIPELINE_*` environment
//! overrides, applied in that order.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{DispatcherConfig, SinkFailurePolicy};
use crate::sink::SqliteSinkConfig;
use crate::{PipelineError, Result};

const ENV_PREFIX: &str = "CASTLE_PIPELINE_";

/// Top-level configuration for a narrative run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Items per batch
    pub batch_size: usize,
    /// Pause between batches in milliseconds; 0 disables pacing
    pub pacing_delay_ms: u64,
    /// Per-item operation timeout in milliseconds
    pub item_timeout_ms: Option<u64>,
    /// Behavior when the sink rejects a write
    pub sink_failure_policy: SinkFailurePolicy,
    /// SQLite sink settings
    pub sink: SqliteSinkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pacing_delay_ms: 1000,
            item_timeout_ms: None,
            sink_failure_policy: SinkFailurePolicy::Downgrade,
            sink: SqliteSinkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&contents)?;
        debug!(path = %path.as_ref().display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up through `lookup`, keyed by full variable name
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

        if let Some(value) = var("BATCH_SIZE") {
            self.batch_size = parse_var("BATCH_SIZE", &value)?;
        }
        if let Some(value) = var("PACING_DELAY_MS") {
            self.pacing_delay_ms = parse_var("PACING_DELAY_MS", &value)?;
        }
        if let Some(value) = var("ITEM_TIMEOUT_MS") {
            self.item_timeout_ms = if value.trim().is_empty() {
                None
            } else {
                Some(parse_var("ITEM_TIMEOUT_MS", &value)?)
            };
        }
        if let Some(value) = var("SINK_FAILURE_POLICY") {
            self.sink_failure_policy = match value.trim().to_ascii_lowercase().as_str() {
                "downgrade" => SinkFailurePolicy::Downgrade,
                "abort" => SinkFailurePolicy::Abort,
                other => {
                    return Err(PipelineError::Configuration(format!(
                        "{}SINK_FAILURE_POLICY: unknown policy '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(value) = var("DATABASE_URL") {
            self.sink.database_url = value;
        }
        if let Some(value) = var("TABLE_NAME") {
            self.sink.table_name = value;
        }
        if let Some(value) = var("MAX_CONNECTIONS") {
            self.sink.max_connections = parse_var("MAX_CONNECTIONS", &value)?;
        }

        Ok(self)
    }

    /// Check every setting before anything connects or runs
    pub fn validate(&self) -> Result<()> {
        self.dispatcher_config().validate()?;
        self.sink
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))
    }

    /// Dispatcher settings
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let config = DispatcherConfig::default()
            .with_batch_size(self.batch_size)
            .with_pacing_delay(Duration::from_millis(self.pacing_delay_ms))
            .with_sink_failure_policy(self.sink_failure_policy);

        match self.item_timeout_ms {
            Some(ms) => config.with_item_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// SQLite sink settings
    pub fn sink_config(&self) -> SqliteSinkConfig {
        self.sink.clone()
    }
}

fn parse_var<T>(suffix: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        PipelineError::Configuration(format!("{}{}: {}", ENV_PREFIX, suffix, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.dispatcher_config().pacing_delay, Duration::from_secs(1));
        assert_eq!(config.dispatcher_config().item_timeout, None);
        assert_eq!(config.sink.table_name, "castle_narratives");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_file_with_partial_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"batch_size": 10, "item_timeout_ms": 2500, "sink": {{"table_name": "narratives"}}}}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.pacing_delay_ms, 1000);
        assert_eq!(
            config.dispatcher_config().item_timeout,
            Some(Duration::from_millis(2500))
        );
        assert_eq!(config.sink.table_name, "narratives");
        assert_eq!(config.sink.max_connections, 5);
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::default()
            .with_overrides_from(lookup(&[
                ("CASTLE_PIPELINE_BATCH_SIZE", "8"),
                ("CASTLE_PIPELINE_PACING_DELAY_MS", "0"),
                ("CASTLE_PIPELINE_SINK_FAILURE_POLICY", "Abort"),
                ("CASTLE_PIPELINE_TABLE_NAME", "runs_2024"),
            ]))
            .unwrap();

        assert_eq!(config.batch_size, 8);
        assert_eq!(config.dispatcher_config().pacing_delay, Duration::ZERO);
        assert_eq!(config.sink_failure_policy, SinkFailurePolicy::Abort);
        assert_eq!(config.sink_config().table_name, "runs_2024");
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let bad_number = PipelineConfig::default()
            .with_overrides_from(lookup(&[("CASTLE_PIPELINE_BATCH_SIZE", "many")]));
        assert!(matches!(bad_number, Err(PipelineError::Configuration(_))));

        let bad_policy = PipelineConfig::default()
            .with_overrides_from(lookup(&[("CASTLE_PIPELINE_SINK_FAILURE_POLICY", "retry")]));
        assert!(matches!(bad_policy, Err(PipelineError::Configuration(_))));

        let zero_batch = PipelineConfig {
            batch_size: 0,
            ..PipelineConfig::default()
        };
        assert!(zero_batch.validate().is_err());

        let mut bad_table = PipelineConfig::default();
        bad_table.sink.table_name = "drop table;".to_string();
        assert!(matches!(
            bad_table.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }
}
