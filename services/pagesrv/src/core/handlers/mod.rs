//! Transport handlers
//!
//! One handler per transport, each owning its listening resource and
//! background task(s). Lifecycle is uniform: `start()` spawns and returns
//! immediately, `stop()` cancels cooperatively and joins with a bounded
//! wait, `is_running()` reports flag-and-task liveness.

pub mod serial;
pub mod serial_ip;
pub mod tap;

use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpSocket};

use crate::error::{PageSrvError, Result};

/// Delay before reopening a failed transport (serial device reconnect)
pub const TRANSPORT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay after a failed message-level operation on the serial line
pub const MESSAGE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Accept/read poll window, bounding how long a loop runs without
/// observing a shutdown request
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded wait for a background task to exit during `stop()`
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP listen backlog for both IP transports
const LISTEN_BACKLOG: u32 = 5;

/// Resolve `host:port` and bind a reusable listening socket.
pub(crate) async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let addr = lookup_host((host, port))
        .await
        .map_err(|e| PageSrvError::connection(format!("failed to resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| PageSrvError::connection(format!("no address for {host}:{port}")))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_listener_ephemeral_port() {
        let listener = bind_listener("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.port() > 0);
    }

    #[tokio::test]
    async fn test_bind_listener_resolves_hostname() {
        let listener = bind_listener("localhost", 0).await.unwrap();
        assert!(listener.local_addr().is_ok());
    }

    #[tokio::test]
    async fn test_bind_listener_unresolvable_host() {
        let result = bind_listener("no.such.host.invalid", 0).await;
        assert!(result.is_err());
    }
}
