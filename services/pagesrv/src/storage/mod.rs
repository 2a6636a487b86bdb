//! Persistence collaborators for alarms and runtime settings
//!
//! The ingestion core only requires two narrow contracts: atomically assign
//! the next alarm id and append ([`AlarmStore`]), and read a string value by
//! key ([`SettingsStore`]). [`sqlite::SqliteStore`] implements both over a
//! shared pool; [`memory::MemoryStore`] is the in-process implementation
//! used by tests and embedders.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::sink::{AlarmRecord, AlarmSource};
use crate::error::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Aggregate alarm counters for the external dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmStats {
    pub total: i64,
    pub sent: i64,
    pub sources: i64,
}

/// One settings row, for the external settings view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// Alarm persistence contract
///
/// `insert_alarm` is the single point of serialization for id assignment:
/// it must be indivisible even when multiple handler tasks call it
/// concurrently, so ids come out unique and monotonically increasing.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Assign the next unique id and append one alarm record.
    async fn insert_alarm(
        &self,
        source: AlarmSource,
        message: &str,
        raw_data: &str,
    ) -> Result<AlarmRecord>;

    /// Flag an alarm as delivered to the subscriber app. Owned by the
    /// external API layer; the ingestion core never calls this.
    async fn mark_sent(&self, id: i64) -> Result<()>;

    /// Most recent alarms, newest first.
    async fn recent_alarms(&self, limit: u32) -> Result<Vec<AlarmRecord>>;

    /// Aggregate counters across all stored alarms.
    async fn alarm_stats(&self) -> Result<AlarmStats>;
}

/// Runtime settings contract
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Value for `key`, or `default` when the key is absent.
    async fn get_setting(&self, key: &str, default: &str) -> Result<String>;

    /// Insert or update one setting.
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    /// Every settings row, ordered by key.
    async fn all_settings(&self) -> Result<Vec<Setting>>;
}
