//! Serial-over-IP handler
//!
//! A TCP listener for devices that tunnel their serial output over the
//! network: newline-delimited text, no acknowledgement. Each accepted
//! connection gets its own task; there is no connection cap. When a peer
//! closes mid-line, the trailing partial buffer is flushed as one final
//! message.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{bind_listener, POLL_INTERVAL, STOP_JOIN_TIMEOUT};
use crate::core::framing;
use crate::core::settings::SerialIpConfig;
use crate::core::sink::{AlarmSink, AlarmSource};
use crate::error::Result;

/// Serial-over-IP transport handler
pub struct SerialIpHandler {
    config: SerialIpConfig,
    sink: Arc<AlarmSink>,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl SerialIpHandler {
    pub fn new(config: SerialIpConfig, sink: Arc<AlarmSink>) -> Self {
        Self {
            config,
            sink,
            cancel: CancellationToken::new(),
            accept_task: None,
            local_addr: None,
        }
    }

    /// Bind the listener and spawn the accept loop. No-op when already
    /// running; a bind failure is returned to the caller.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Serial-over-IP handler already running");
            return Ok(());
        }

        self.config.validate()?;
        let listener = bind_listener(&self.config.host, self.config.port).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        self.cancel = CancellationToken::new();

        let sink = Arc::clone(&self.sink);
        let cancel = self.cancel.clone();
        self.accept_task = Some(tokio::spawn(accept_loop(listener, sink, cancel)));

        info!(addr = %local_addr, "Serial-over-IP handler started");
        Ok(())
    }

    /// Cancel the accept loop and join it with a bounded wait. Connection
    /// tasks observe the same cancellation and exit on their own.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            match timeout(STOP_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Serial-over-IP accept loop panicked: {e}"),
                Err(_) => warn!(
                    "Serial-over-IP accept loop did not exit within {STOP_JOIN_TIMEOUT:?}"
                ),
            }
        }
        info!("Serial-over-IP handler stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .accept_task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// Bound address, available after a successful `start()`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

async fn accept_loop(listener: TcpListener, sink: Arc<AlarmSink>, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        // short accept window so shutdown is observed promptly
        match timeout(POLL_INTERVAL, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok((stream, peer))) => {
                info!(%peer, "Serial-over-IP client connected");
                let sink = Arc::clone(&sink);
                let cancel = cancel.clone();
                tokio::spawn(handle_client(stream, peer, sink, cancel));
            }
            Ok(Err(e)) => {
                if !cancel.is_cancelled() {
                    error!("Error accepting serial-over-IP connection: {e}");
                }
            }
        }
    }
}

async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<AlarmSink>,
    cancel: CancellationToken,
) {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut chunk) => read,
        };

        match read {
            // peer closed: flush any remaining undelimited content as one
            // final message before exiting
            Ok(0) => {
                if let Some(rest) = framing::take_remainder(&mut buffer) {
                    record_line(&sink, peer, &rest).await;
                }
                break;
            }
            Ok(n) => {
                debug!(%peer, bytes = n, "Received serial-over-IP data");
                buffer.extend_from_slice(&chunk[..n]);
                for line in framing::drain_lines(&mut buffer) {
                    if !line.is_empty() {
                        record_line(&sink, peer, &line).await;
                    }
                }
            }
            Err(e) => {
                error!(%peer, "Error handling serial-over-IP client: {e}");
                break;
            }
        }
    }

    info!(%peer, "Serial-over-IP client disconnected");
}

async fn record_line(sink: &AlarmSink, peer: SocketAddr, line: &str) {
    let raw_data = format!("From {peer}: {line}");
    // store failures are logged by the sink; the message is dropped
    let _ = sink.record(AlarmSource::SerialIp, line, &raw_data).await;
}
