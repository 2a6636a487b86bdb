//! AlarmSink properties: id assignment under concurrency and notifier
//! isolation

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use pagesrv::core::sink::{AlarmNotifier, AlarmRecord, AlarmSink, AlarmSource};
use pagesrv::error::{PageSrvError, Result};
use pagesrv::storage::MemoryStore;

/// Notifier that forwards every record to a channel
struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AlarmRecord>,
}

#[async_trait]
impl AlarmNotifier for ChannelNotifier {
    async fn notify(&self, record: &AlarmRecord) -> Result<()> {
        self.tx
            .send(record.clone())
            .map_err(|e| PageSrvError::internal(e.to_string()))
    }
}

/// Notifier that always fails
struct FailingNotifier;

#[async_trait]
impl AlarmNotifier for FailingNotifier {
    async fn notify(&self, _record: &AlarmRecord) -> Result<()> {
        Err(PageSrvError::internal("subscriber gone"))
    }
}

#[tokio::test]
async fn test_concurrent_records_get_unique_increasing_ids() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(AlarmSink::new(store.clone()));

    // two simulated transports interleaving record calls
    let serial_sink = Arc::clone(&sink);
    let serial = tokio::spawn(async move {
        for i in 0..50 {
            serial_sink
                .record(AlarmSource::Serial, &format!("serial {i}"), "raw")
                .await
                .unwrap();
        }
    });
    let tap_sink = Arc::clone(&sink);
    let tap = tokio::spawn(async move {
        for i in 0..50 {
            tap_sink
                .record(AlarmSource::Tap, &format!("tap {i}"), "raw")
                .await
                .unwrap();
        }
    });
    serial.await.unwrap();
    tap.await.unwrap();

    let alarms = store.snapshot().await;
    assert_eq!(alarms.len(), 100);

    // strictly increasing in insertion order, no duplicates, no gaps
    let ids: Vec<i64> = alarms.iter().map(|a| a.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids, (1..=100).collect::<Vec<i64>>());

    // per-transport arrival order is preserved
    let serial_msgs: Vec<&str> = alarms
        .iter()
        .filter(|a| a.source == AlarmSource::Serial)
        .map(|a| a.message.as_str())
        .collect();
    let expected: Vec<String> = (0..50).map(|i| format!("serial {i}")).collect();
    assert_eq!(serial_msgs, expected.iter().map(String::as_str).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_notifier_receives_created_record() {
    let store = Arc::new(MemoryStore::new());
    let sink = AlarmSink::new(store);

    let (tx, mut rx) = mpsc::unbounded_channel();
    sink.set_notifier(Arc::new(ChannelNotifier { tx })).await;

    let record = sink
        .record(AlarmSource::SerialIp, "hello", "From peer: hello")
        .await
        .unwrap();

    let notified = rx.recv().await.unwrap();
    assert_eq!(notified, record);
    assert_eq!(notified.id, 1);
    assert!(!notified.sent_to_app);
}

#[tokio::test]
async fn test_notifier_failure_never_stops_ingestion() {
    let store = Arc::new(MemoryStore::new());
    let sink = AlarmSink::new(store.clone());
    sink.set_notifier(Arc::new(FailingNotifier)).await;

    // record succeeds and the alarm is persisted despite the broken
    // subscriber
    let record = sink
        .record(AlarmSource::Tap, "msg", "msg")
        .await
        .expect("record must not propagate notifier errors");
    assert_eq!(record.id, 1);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_reregistering_replaces_previous_notifier() {
    let store = Arc::new(MemoryStore::new());
    let sink = AlarmSink::new(store);

    let (first_tx, mut first_rx) = mpsc::unbounded_channel();
    let (second_tx, mut second_rx) = mpsc::unbounded_channel();

    sink.set_notifier(Arc::new(ChannelNotifier { tx: first_tx })).await;
    sink.record(AlarmSource::Serial, "one", "one").await.unwrap();

    sink.set_notifier(Arc::new(ChannelNotifier { tx: second_tx })).await;
    sink.record(AlarmSource::Serial, "two", "two").await.unwrap();

    assert_eq!(first_rx.recv().await.unwrap().message, "one");
    assert!(first_rx.try_recv().is_err());
    assert_eq!(second_rx.recv().await.unwrap().message, "two");
}

#[tokio::test]
async fn test_record_without_notifier_still_persists() {
    let store = Arc::new(MemoryStore::new());
    let sink = AlarmSink::new(store.clone());

    sink.record(AlarmSource::Serial, "quiet", "quiet").await.unwrap();
    assert_eq!(store.len().await, 1);
}
