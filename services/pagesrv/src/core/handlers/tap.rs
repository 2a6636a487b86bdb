//! TAP (Telocator Alphanumeric Protocol) handler
//!
//! Simplified TAP over TCP: messages are framed by ESC (0x1B) + EOT (0x04)
//! and each accepted non-empty message is answered with a single ACK byte.
//! No checksum, NAK, retransmission, or multi-message blocks. Unlike the
//! serial-over-IP handler, a trailing undelimited buffer is discarded when
//! the peer disconnects.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{bind_listener, POLL_INTERVAL, STOP_JOIN_TIMEOUT};
use crate::core::framing;
use crate::core::settings::TapConfig;
use crate::core::sink::{AlarmSink, AlarmSource};
use crate::error::Result;

/// Acknowledgement byte sent after each accepted message
pub const ACK: u8 = 0x06;

/// TAP transport handler
pub struct TapHandler {
    config: TapConfig,
    sink: Arc<AlarmSink>,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl TapHandler {
    pub fn new(config: TapConfig, sink: Arc<AlarmSink>) -> Self {
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
            warn!("TAP handler already running");
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

        info!(addr = %local_addr, "TAP handler started");
        Ok(())
    }

    /// Cancel the accept loop and join it with a bounded wait.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            match timeout(STOP_JOIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("TAP accept loop panicked: {e}"),
                Err(_) => warn!("TAP accept loop did not exit within {STOP_JOIN_TIMEOUT:?}"),
            }
        }
        info!("TAP handler stopped");
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
        match timeout(POLL_INTERVAL, listener.accept()).await {
            Err(_) => continue,
            Ok(Ok((stream, peer))) => {
                info!(%peer, "TAP client connected");
                let sink = Arc::clone(&sink);
                let cancel = cancel.clone();
                tokio::spawn(handle_client(stream, peer, sink, cancel));
            }
            Ok(Err(e)) => {
                if !cancel.is_cancelled() {
                    error!("Error accepting TAP connection: {e}");
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

    'conn: loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = stream.read(&mut chunk) => read,
        };

        match read {
            // peer closed: trailing undelimited bytes are discarded
            Ok(0) => break,
            Ok(n) => {
                debug!(%peer, bytes = n, "Received TAP data");
                buffer.extend_from_slice(&chunk[..n]);
                for message in framing::drain_frames(&mut buffer) {
                    // an empty segment produces neither a record nor an ACK
                    if message.is_empty() {
                        continue;
                    }
                    // store failures are logged by the sink; the ACK is
                    // still sent so the pager does not retransmit
                    let _ = sink.record(AlarmSource::Tap, &message, &message).await;
                    if let Err(e) = stream.write_all(&[ACK]).await {
                        error!(%peer, "Failed to send TAP acknowledgement: {e}");
                        break 'conn;
                    }
                }
            }
            Err(e) => {
                error!(%peer, "Error handling TAP client: {e}");
                break;
            }
        }
    }

    info!(%peer, "TAP client disconnected");
}
