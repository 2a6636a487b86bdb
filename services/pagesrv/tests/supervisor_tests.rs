//! Settings-driven lifecycle tests for the handler supervisor

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use pagesrv::core::settings;
use pagesrv::core::sink::{AlarmSink, AlarmSource};
use pagesrv::core::supervisor::HandlerSupervisor;
use pagesrv::storage::{MemoryStore, SettingsStore};

async fn store_with(settings: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for (key, value) in settings {
        store.set_setting(key, value).await.unwrap();
    }
    store
}

fn supervisor_for(store: &Arc<MemoryStore>) -> HandlerSupervisor {
    let sink = Arc::new(AlarmSink::new(store.clone()));
    HandlerSupervisor::new(store.clone(), sink)
}

#[tokio::test]
async fn test_starts_only_enabled_transports() {
    let store = store_with(&[
        (settings::SERIAL_IP_ENABLED, "true"),
        (settings::SERIAL_IP_HOST, "127.0.0.1"),
        (settings::SERIAL_IP_PORT, "0"),
        (settings::TAP_ENABLED, "true"),
        (settings::TAP_HOST, "127.0.0.1"),
        (settings::TAP_PORT, "0"),
        (settings::SERIAL_ENABLED, "false"),
    ])
    .await;
    let mut supervisor = supervisor_for(&store);

    supervisor.start().await;
    let status = supervisor.status();
    assert!(!status.serial);
    assert!(status.serial_ip);
    assert!(status.tap);
    assert!(status.serial_ip_addr.is_some());
    assert!(status.tap_addr.is_some());

    supervisor.stop().await;
    let status = supervisor.status();
    assert!(!status.serial_ip);
    assert!(!status.tap);
    assert!(status.serial_ip_addr.is_none());
}

#[tokio::test]
async fn test_started_handlers_feed_the_shared_sink() {
    let store = store_with(&[
        (settings::SERIAL_IP_ENABLED, "true"),
        (settings::SERIAL_IP_HOST, "127.0.0.1"),
        (settings::SERIAL_IP_PORT, "0"),
        (settings::TAP_ENABLED, "true"),
        (settings::TAP_HOST, "127.0.0.1"),
        (settings::TAP_PORT, "0"),
    ])
    .await;
    let mut supervisor = supervisor_for(&store);
    supervisor.start().await;
    let status = supervisor.status();

    let mut line_client = TcpStream::connect(status.serial_ip_addr.unwrap())
        .await
        .unwrap();
    line_client.write_all(b"from line\n").await.unwrap();

    let mut tap_client = TcpStream::connect(status.tap_addr.unwrap()).await.unwrap();
    tap_client.write_all(b"from tap\x1b\x04").await.unwrap();
    let mut ack = [0u8; 1];
    timeout(Duration::from_secs(2), tap_client.read_exact(&mut ack))
        .await
        .expect("ACK within deadline")
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while store.len().await < 2 {
        assert!(tokio::time::Instant::now() < deadline, "alarms not recorded");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let alarms = store.snapshot().await;
    let sources: Vec<AlarmSource> = alarms.iter().map(|a| a.source).collect();
    assert!(sources.contains(&AlarmSource::SerialIp));
    assert!(sources.contains(&AlarmSource::Tap));

    supervisor.stop().await;
}

#[tokio::test]
async fn test_invalid_transport_config_does_not_block_others() {
    let store = store_with(&[
        (settings::TAP_ENABLED, "true"),
        (settings::TAP_HOST, "127.0.0.1"),
        (settings::TAP_PORT, "not-a-port"),
        (settings::SERIAL_IP_ENABLED, "true"),
        (settings::SERIAL_IP_HOST, "127.0.0.1"),
        (settings::SERIAL_IP_PORT, "0"),
    ])
    .await;
    let mut supervisor = supervisor_for(&store);

    supervisor.start().await;
    let status = supervisor.status();
    assert!(!status.tap, "invalid TAP settings must skip that transport");
    assert!(status.serial_ip, "other transports must still start");

    supervisor.stop().await;
}

#[tokio::test]
async fn test_restart_rereads_settings() {
    let store = store_with(&[
        (settings::SERIAL_IP_ENABLED, "true"),
        (settings::SERIAL_IP_HOST, "127.0.0.1"),
        (settings::SERIAL_IP_PORT, "0"),
        (settings::TAP_ENABLED, "false"),
    ])
    .await;
    let mut supervisor = supervisor_for(&store);

    supervisor.start().await;
    assert!(supervisor.status().serial_ip);
    assert!(!supervisor.status().tap);

    // flip the settings; they only take effect on restart
    store
        .set_setting(settings::SERIAL_IP_ENABLED, "false")
        .await
        .unwrap();
    store.set_setting(settings::TAP_ENABLED, "true").await.unwrap();
    store.set_setting(settings::TAP_HOST, "127.0.0.1").await.unwrap();
    store.set_setting(settings::TAP_PORT, "0").await.unwrap();
    assert!(supervisor.status().serial_ip);

    supervisor.restart().await;
    let status = supervisor.status();
    assert!(!status.serial_ip);
    assert!(status.tap);

    supervisor.stop().await;
}

#[tokio::test]
async fn test_restart_keeps_one_listener_per_transport() {
    let store = store_with(&[
        (settings::TAP_ENABLED, "true"),
        (settings::TAP_HOST, "127.0.0.1"),
        (settings::TAP_PORT, "0"),
    ])
    .await;
    let mut supervisor = supervisor_for(&store);

    supervisor.start().await;
    let first = supervisor.status().tap_addr.unwrap();

    // pin the restart to the port the first cycle got, proving the old
    // listener is fully gone before the new one binds
    store
        .set_setting(settings::TAP_PORT, &first.port().to_string())
        .await
        .unwrap();
    supervisor.restart().await;

    let status = supervisor.status();
    assert!(status.tap);
    assert_eq!(status.tap_addr.unwrap().port(), first.port());

    supervisor.stop().await;
    assert!(!supervisor.status().tap);
}

#[tokio::test]
async fn test_stop_without_start_is_harmless() {
    let store = store_with(&[]).await;
    let mut supervisor = supervisor_for(&store);
    supervisor.stop().await;
    let status = supervisor.status();
    assert!(!status.serial && !status.serial_ip && !status.tap);
}
