//! In-process alarm and settings store
//!
//! Used by tests and embedders in place of SQLite. A single mutex guards
//! the id counter and the append target together, which keeps id
//! assignment indivisible under concurrent `insert_alarm` calls.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use crate::core::sink::{AlarmRecord, AlarmSource};
use crate::error::Result;
use crate::storage::{AlarmStats, AlarmStore, Setting, SettingsStore};

#[derive(Debug, Default)]
struct AlarmLog {
    next_id: i64,
    alarms: Vec<AlarmRecord>,
}

/// Memory-backed store for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: Mutex<AlarmLog>,
    settings: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored alarm in insertion (id) order.
    pub async fn snapshot(&self) -> Vec<AlarmRecord> {
        self.log.lock().await.alarms.clone()
    }

    /// Number of stored alarms.
    pub async fn len(&self) -> usize {
        self.log.lock().await.alarms.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    async fn insert_alarm(
        &self,
        source: AlarmSource,
        message: &str,
        raw_data: &str,
    ) -> Result<AlarmRecord> {
        let mut log = self.log.lock().await;
        log.next_id += 1;
        let record = AlarmRecord {
            id: log.next_id,
            source,
            message: message.to_string(),
            raw_data: raw_data.to_string(),
            received_at: Utc::now(),
            sent_to_app: false,
        };
        log.alarms.push(record.clone());
        Ok(record)
    }

    async fn mark_sent(&self, id: i64) -> Result<()> {
        let mut log = self.log.lock().await;
        if let Some(alarm) = log.alarms.iter_mut().find(|a| a.id == id) {
            alarm.sent_to_app = true;
        }
        Ok(())
    }

    async fn recent_alarms(&self, limit: u32) -> Result<Vec<AlarmRecord>> {
        let log = self.log.lock().await;
        Ok(log
            .alarms
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn alarm_stats(&self) -> Result<AlarmStats> {
        let log = self.log.lock().await;
        let sources: std::collections::HashSet<AlarmSource> =
            log.alarms.iter().map(|a| a.source).collect();
        Ok(AlarmStats {
            total: log.alarms.len() as i64,
            sent: log.alarms.iter().filter(|a| a.sent_to_app).count() as i64,
            sources: sources.len() as i64,
        })
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str, default: &str) -> Result<String> {
        let settings = self.settings.read().await;
        Ok(settings
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut settings = self.settings.write().await;
        settings.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn all_settings(&self) -> Result<Vec<Setting>> {
        let settings = self.settings.read().await;
        let mut rows: Vec<Setting> = settings
            .iter()
            .map(|(key, value)| Setting {
                key: key.clone(),
                value: value.clone(),
                description: None,
            })
            .collect();
        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(rows)
    }
}
