//! SQLite-backed alarm and settings store
//!
//! Schema and default settings mirror what the settings UI and dashboard
//! expect: an `alarms` table whose INTEGER PRIMARY KEY provides the atomic,
//! monotonically increasing alarm id, and a `settings` key/value table
//! seeded with the per-transport defaults on first start.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::core::sink::{AlarmRecord, AlarmSource};
use crate::error::Result;
use crate::storage::{AlarmStats, AlarmStore, Setting, SettingsStore};

/// Default settings seeded on first start, `(key, value, description)`
const DEFAULT_SETTINGS: &[(&str, &str, &str)] = &[
    ("serial_enabled", "false", "Enable serial port monitoring"),
    ("serial_port", "/dev/ttyUSB0", "Serial port device path"),
    ("serial_baud_rate", "9600", "Serial port baud rate"),
    ("tap_enabled", "true", "Enable TAP over IP"),
    ("tap_host", "localhost", "TAP over IP bind address"),
    ("tap_port", "18001", "TAP over IP port"),
    ("serial_ip_enabled", "true", "Enable Serial over IP"),
    ("serial_ip_host", "localhost", "Serial over IP bind address"),
    ("serial_ip_port", "5001", "Serial over IP port"),
];

/// SQLite store for alarms and settings
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `path` and initialize the
    /// schema and default settings.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        info!(db = %path, "Database initialized");
        Ok(store)
    }

    /// Wrap an existing pool (tests, embedding).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alarms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                message TEXT NOT NULL,
                raw_data TEXT,
                received_at TIMESTAMP NOT NULL,
                sent_to_app BOOLEAN NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&self.pool)
        .await?;

        for (key, value, description) in DEFAULT_SETTINGS {
            sqlx::query(
                "INSERT OR IGNORE INTO settings (key, value, description) VALUES (?, ?, ?)",
            )
            .bind(key)
            .bind(value)
            .bind(description)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AlarmRecord> {
        let source: String = row.try_get("source")?;
        Ok(AlarmRecord {
            id: row.try_get("id")?,
            source: AlarmSource::from_str(&source)?,
            message: row.try_get("message")?,
            raw_data: row.try_get::<Option<String>, _>("raw_data")?.unwrap_or_default(),
            received_at: row.try_get::<DateTime<Utc>, _>("received_at")?,
            sent_to_app: row.try_get("sent_to_app")?,
        })
    }
}

#[async_trait]
impl AlarmStore for SqliteStore {
    async fn insert_alarm(
        &self,
        source: AlarmSource,
        message: &str,
        raw_data: &str,
    ) -> Result<AlarmRecord> {
        let received_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO alarms (source, message, raw_data, received_at, sent_to_app)
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(source.as_str())
        .bind(message)
        .bind(raw_data)
        .bind(received_at)
        .execute(&self.pool)
        .await?;

        Ok(AlarmRecord {
            id: result.last_insert_rowid(),
            source,
            message: message.to_string(),
            raw_data: raw_data.to_string(),
            received_at,
            sent_to_app: false,
        })
    }

    async fn mark_sent(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE alarms SET sent_to_app = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn recent_alarms(&self, limit: u32) -> Result<Vec<AlarmRecord>> {
        let rows = sqlx::query("SELECT * FROM alarms ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_record).collect()
    }

    async fn alarm_stats(&self) -> Result<AlarmStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN sent_to_app = 1 THEN 1 ELSE 0 END), 0) AS sent,
                COUNT(DISTINCT source) AS sources
             FROM alarms",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AlarmStats {
            total: row.try_get("total")?,
            sent: row.try_get("sent")?,
            sources: row.try_get("sources")?,
        })
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str, default: &str) -> Result<String> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("value")?),
            None => Ok(default.to_string()),
        }
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn all_settings(&self) -> Result<Vec<Setting>> {
        let rows = sqlx::query("SELECT key, value, description FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(Setting {
                    key: row.try_get("key")?,
                    value: row.try_get("value")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }
}
