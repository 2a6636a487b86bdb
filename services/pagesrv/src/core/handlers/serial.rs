//! Serial line handler
//!
//! Owns the physical serial device and a single monitor task. The device is
//! opened lazily inside the loop and reopened after a 5 second backoff on
//! any device-level failure, indefinitely, for as long as the handler is
//! running. Reads are poll-bounded so the loop observes shutdown within one
//! poll window.

use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{MESSAGE_RETRY_DELAY, POLL_INTERVAL, STOP_JOIN_TIMEOUT, TRANSPORT_RETRY_DELAY};
use crate::core::framing;
use crate::core::settings::SerialConfig;
use crate::core::sink::{AlarmSink, AlarmSource};
use crate::error::{PageSrvError, Result};

/// Serial line transport handler
pub struct SerialLineHandler {
    config: SerialConfig,
    sink: Arc<AlarmSink>,
    cancel: CancellationToken,
    monitor_task: Option<JoinHandle<()>>,
}

impl SerialLineHandler {
    pub fn new(config: SerialConfig, sink: Arc<AlarmSink>) -> Self {
        Self {
            config,
            sink,
            cancel: CancellationToken::new(),
            monitor_task: None,
        }
    }

    /// Spawn the monitor task and return immediately. No-op when already
    /// running. Opening the device happens inside the loop, so an absent
    /// device does not fail `start()`; the monitor retries with backoff.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Serial handler already running");
            return Ok(());
        }

        self.config.validate()?;
        self.cancel = CancellationToken::new();

        let config = self.config.clone();
        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        self.monitor_task = Some(tokio::spawn(monitor_loop(config, sink, cancel)));

        info!(
            device = %self.config.device,
            baud_rate = self.config.baud_rate,
            "Serial handler started"
        );
        Ok(())
    }

    /// Cancel the monitor task and join it with a bounded wait; the device
    /// handle is dropped by the task on exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.monitor_task.take() {
            match timeout(STOP_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Serial monitor panicked: {e}"),
                Err(_) => warn!("Serial monitor did not exit within {STOP_JOIN_TIMEOUT:?}"),
            }
        }
        info!("Serial handler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .monitor_task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }
}

async fn monitor_loop(config: SerialConfig, sink: Arc<AlarmSink>, cancel: CancellationToken) {
    let mut port: Option<SerialStream> = None;
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    while !cancel.is_cancelled() {
        if port.is_none() {
            match open_port(&config) {
                Ok(stream) => {
                    info!(device = %config.device, "Connected to serial port");
                    buffer.clear();
                    port = Some(stream);
                }
                Err(e) => {
                    error!(device = %config.device, "Serial port error: {e}");
                    backoff(TRANSPORT_RETRY_DELAY, &cancel).await;
                    continue;
                }
            }
        }
        let Some(stream) = port.as_mut() else {
            continue;
        };

        // poll-bounded read so the loop can observe shutdown
        match timeout(POLL_INTERVAL, stream.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Ok(0)) => {
                error!(device = %config.device, "Serial port closed");
                port = None;
                backoff(TRANSPORT_RETRY_DELAY, &cancel).await;
            }
            Ok(Ok(n)) => {
                buffer.extend_from_slice(&chunk[..n]);
                for line in framing::drain_lines(&mut buffer) {
                    if line.is_empty() {
                        continue;
                    }
                    if sink.record(AlarmSource::Serial, &line, &line).await.is_err() {
                        // logged by the sink; isolate the failure to this
                        // message and keep the device open
                        backoff(MESSAGE_RETRY_DELAY, &cancel).await;
                    }
                }
            }
            Ok(Err(e)) => {
                error!(device = %config.device, "Serial port error: {e}");
                port = None;
                backoff(TRANSPORT_RETRY_DELAY, &cancel).await;
            }
        }
    }
}

fn open_port(config: &SerialConfig) -> Result<SerialStream> {
    let mut stream = tokio_serial::new(&config.device, config.baud_rate)
        .open_native_async()
        .map_err(|e| {
            PageSrvError::connection(format!(
                "failed to open serial port {}: {e}",
                config.device
            ))
        })?;

    #[cfg(unix)]
    stream
        .set_exclusive(false)
        .map_err(|e| PageSrvError::io(format!("failed to set exclusive mode: {e}")))?;

    Ok(stream)
}

async fn backoff(delay: std::time::Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}
