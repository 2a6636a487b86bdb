//! Alarm record types and the persistence/notification funnel
//!
//! Every transport handler normalizes its frames into [`AlarmRecord`]s by
//! calling [`AlarmSink::record`]. The sink delegates id assignment and
//! storage to the [`AlarmStore`] collaborator and then invokes the single
//! registered [`AlarmNotifier`]. Notifier failures are isolated here so a
//! broken downstream subscriber can never stop ingestion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::error::{PageSrvError, Result};
use crate::storage::AlarmStore;

/// Originating transport of an alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmSource {
    Serial,
    SerialIp,
    Tap,
}

impl AlarmSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmSource::Serial => "serial",
            AlarmSource::SerialIp => "serial_ip",
            AlarmSource::Tap => "tap",
        }
    }
}

impl std::fmt::Display for AlarmSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmSource {
    type Err = PageSrvError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "serial" => Ok(AlarmSource::Serial),
            "serial_ip" => Ok(AlarmSource::SerialIp),
            "tap" => Ok(AlarmSource::Tap),
            other => Err(PageSrvError::data(format!("unknown alarm source '{other}'"))),
        }
    }
}

/// Normalized representation of one ingested notification, independent of
/// its originating transport.
///
/// Created exclusively by [`AlarmSink::record`] and never mutated by the
/// ingestion core afterwards; `sent_to_app` is owned by the external API
/// layer through [`AlarmStore::mark_sent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRecord {
    /// Unique, monotonically increasing id assigned by the store
    pub id: i64,
    pub source: AlarmSource,
    /// Trimmed, non-empty message text
    pub message: String,
    /// Transport-specific diagnostic payload (may include the client address)
    pub raw_data: String,
    pub received_at: DateTime<Utc>,
    pub sent_to_app: bool,
}

/// Subscriber invoked with each freshly created alarm record
#[async_trait]
pub trait AlarmNotifier: Send + Sync {
    async fn notify(&self, record: &AlarmRecord) -> Result<()>;
}

/// Persistence + notification funnel shared by all transport handlers
pub struct AlarmSink {
    store: Arc<dyn AlarmStore>,
    notifier: RwLock<Option<Arc<dyn AlarmNotifier>>>,
}

impl AlarmSink {
    pub fn new(store: Arc<dyn AlarmStore>) -> Self {
        Self {
            store,
            notifier: RwLock::new(None),
        }
    }

    /// Register the single active subscriber, replacing any previous one.
    pub async fn set_notifier(&self, notifier: Arc<dyn AlarmNotifier>) {
        let mut slot = self.notifier.write().await;
        if slot.replace(notifier).is_some() {
            info!("Alarm notifier replaced");
        }
    }

    /// Persist one alarm and notify the registered subscriber.
    ///
    /// The store assigns the next unique id atomically, so concurrent calls
    /// from different handler tasks always produce distinct, increasing ids.
    /// A store failure is logged and returned; the message is lost (there is
    /// no retry queue). A notifier failure is logged and swallowed.
    pub async fn record(
        &self,
        source: AlarmSource,
        message: &str,
        raw_data: &str,
    ) -> Result<AlarmRecord> {
        let record = match self.store.insert_alarm(source, message, raw_data).await {
            Ok(record) => record,
            Err(e) => {
                error!(source = %source, "Failed to persist alarm: {e}");
                return Err(e);
            }
        };

        info!(
            id = record.id,
            source = %source,
            message = %preview(&record.message),
            "Received alarm"
        );

        let notifier = self.notifier.read().await.clone();
        if let Some(notifier) = notifier {
            if let Err(e) = notifier.notify(&record).await {
                error!(id = record.id, "Alarm notifier failed: {e}");
            }
        }

        Ok(record)
    }

    /// Access to the underlying store, for the external API layer
    /// (`mark_sent`, recent-alarm queries, statistics).
    pub fn store(&self) -> &Arc<dyn AlarmStore> {
        &self.store
    }
}

impl std::fmt::Debug for AlarmSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlarmSink").finish_non_exhaustive()
    }
}

/// First 100 characters of a message for log output
fn preview(message: &str) -> String {
    message.chars().take(100).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trip() {
        for source in [AlarmSource::Serial, AlarmSource::SerialIp, AlarmSource::Tap] {
            assert_eq!(source.as_str().parse::<AlarmSource>().unwrap(), source);
        }
        assert!("smoke_signal".parse::<AlarmSource>().is_err());
    }

    #[test]
    fn test_source_serde_names() {
        let json = serde_json::to_string(&AlarmSource::SerialIp).unwrap();
        assert_eq!(json, "\"serial_ip\"");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "ä".repeat(200);
        assert_eq!(preview(&long).chars().count(), 100);
        assert_eq!(preview("short"), "short");
    }
}
