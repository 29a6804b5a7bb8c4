//! SQLite-backed outcome sink

use crate::sink::{OutcomeRecord, ResultSink, SinkError};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

lazy_static! {
    static ref TABLE_NAME: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap();
}

/// SQLite configuration for the outcome sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteSinkConfig {
    /// `sqlite:` connection URL; the file is created if missing
    pub database_url: String,
    /// Outcome table, a plain SQL identifier
    pub table_name: String,
    /// Pool size
    pub max_connections: u32,
    /// How long a writer waits on SQLite's lock
    pub busy_timeout_secs: u64,
    /// How long to wait for a free pool connection
    pub acquire_timeout_secs: u64,
}

impl Default for SqliteSinkConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:castle_narratives.db".to_string(),
            table_name: "castle_narratives".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl SqliteSinkConfig {
    /// Configuration pointing at a database file
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        Self {
            database_url: format!("sqlite://{}", path.as_ref().display()),
            ..Self::default()
        }
    }

    /// Set the table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Reject settings that cannot produce a working sink
    pub fn validate(&self) -> Result<(), SinkError> {
        if !TABLE_NAME.is_match(&self.table_name) {
            return Err(SinkError::InvalidConfig(format!(
                "table name '{}' is not a plain SQL identifier",
                self.table_name
            )));
        }
        if self.max_connections == 0 {
            return Err(SinkError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if !self.database_url.starts_with("sqlite:") {
            return Err(SinkError::InvalidConfig(format!(
                "database url '{}' is not a sqlite url",
                self.database_url
            )));
        }
        Ok(())
    }
}

/// SQLite-backed outcome sink.
///
/// Concurrent writers share one pool; SQLite's single-writer lock serializes
/// them and the busy timeout makes waiting writers block instead of failing.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
    config: SqliteSinkConfig,
}

impl SqliteSink {
    /// Open (creating if missing) the database and initialize the schema
    pub async fn connect(config: SqliteSinkConfig) -> Result<Self, SinkError> {
        config.validate()?;
        info!(table = %config.table_name, "Opening SQLite outcome sink");

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| SinkError::InvalidConfig(format!("{}: {}", config.database_url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to open SQLite database");
                SinkError::SetupFailed(e.to_string())
            })?;

        let sink = Self { pool, config };
        sink.setup().await?;

        Ok(sink)
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Table holding the outcome records
    pub fn table_name(&self) -> &str {
        &self.config.table_name
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn decode_row(row: (String, String, f64, f64)) -> Result<OutcomeRecord, SinkError> {
        let (key, payload, timestamp, quality_score) = row;
        let payload = serde_json::from_str(&payload)
            .map_err(|e| SinkError::InvalidData(format!("payload for '{}': {}", key, e)))?;

        Ok(OutcomeRecord {
            key,
            payload,
            timestamp,
            quality_score,
        })
    }
}

#[async_trait]
impl ResultSink for SqliteSink {
    async fn setup(&self) -> Result<(), SinkError> {
        let create_table_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                "key" TEXT PRIMARY KEY NOT NULL,
                payload TEXT NOT NULL,
                timestamp REAL NOT NULL,
                quality_score REAL NOT NULL
            )
            "#,
            self.config.table_name
        );

        sqlx::query(&create_table_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::SetupFailed(format!("create table: {}", e)))?;

        debug!(table = %self.config.table_name, "Outcome table ready");
        Ok(())
    }

    async fn upsert(&self, record: &OutcomeRecord) -> Result<(), SinkError> {
        record.validate()?;
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| SinkError::InvalidData(e.to_string()))?;

        let upsert_sql = format!(
            r#"
            INSERT INTO {} ("key", payload, timestamp, quality_score)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT("key") DO UPDATE SET
                payload = excluded.payload,
                timestamp = excluded.timestamp,
                quality_score = excluded.quality_score
            "#,
            self.config.table_name
        );

        sqlx::query(&upsert_sql)
            .bind(&record.key)
            .bind(payload)
            .bind(record.timestamp)
            .bind(record.quality_score)
            .execute(&self.pool)
            .await
            .map_err(|e| SinkError::WriteFailed(format!("upsert '{}': {}", record.key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<OutcomeRecord>, SinkError> {
        let query_sql = format!(
            r#"SELECT "key", payload, timestamp, quality_score FROM {} WHERE "key" = ?1"#,
            self.config.table_name
        );

        let row = sqlx::query_as::<_, (String, String, f64, f64)>(&query_sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SinkError::ReadFailed(e.to_string()))?;

        row.map(Self::decode_row).transpose()
    }

    async fn scan(&self) -> Result<Vec<OutcomeRecord>, SinkError> {
        let query_sql = format!(
            r#"SELECT "key", payload, timestamp, quality_score FROM {} ORDER BY "key""#,
            self.config.table_name
        );

        let rows = sqlx::query_as::<_, (String, String, f64, f64)>(&query_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SinkError::ReadFailed(e.to_string()))?;

        rows.into_iter().map(Self::decode_row).collect()
    }

    async fn count(&self) -> Result<usize, SinkError> {
        let query_sql = format!("SELECT COUNT(*) FROM {}", self.config.table_name);

        let (count,) = sqlx::query_as::<_, (i64,)>(&query_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SinkError::ReadFailed(e.to_string()))?;

        Ok(count.max(0) as usize)
    }
}
