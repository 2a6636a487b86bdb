//! Handler lifecycle supervision
//!
//! The supervisor owns the three optional transport handlers exclusively
//! and drives their lifecycle from runtime settings: construct and start
//! each enabled transport, stop them all, or restart after a settings
//! change. A failure in one transport never prevents the others from
//! starting.

use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::handlers::serial::SerialLineHandler;
use crate::core::handlers::serial_ip::SerialIpHandler;
use crate::core::handlers::tap::TapHandler;
use crate::core::settings;
use crate::core::sink::AlarmSink;
use crate::storage::SettingsStore;

/// Per-transport running state, for the external dashboard and debug views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub serial: bool,
    pub serial_ip: bool,
    pub tap: bool,
    /// Bound address of the serial-over-IP listener, when running
    pub serial_ip_addr: Option<SocketAddr>,
    /// Bound address of the TAP listener, when running
    pub tap_addr: Option<SocketAddr>,
}

/// Owns and supervises the transport handlers
pub struct HandlerSupervisor {
    settings: Arc<dyn SettingsStore>,
    sink: Arc<AlarmSink>,
    serial: Option<SerialLineHandler>,
    serial_ip: Option<SerialIpHandler>,
    tap: Option<TapHandler>,
}

impl HandlerSupervisor {
    pub fn new(settings: Arc<dyn SettingsStore>, sink: Arc<AlarmSink>) -> Self {
        Self {
            settings,
            sink,
            serial: None,
            serial_ip: None,
            tap: None,
        }
    }

    /// Read settings and start every enabled transport. Config and start
    /// failures are logged per transport; the others proceed.
    pub async fn start(&mut self) {
        self.start_serial().await;
        self.start_tap().await;
        self.start_serial_ip().await;
    }

    /// Stop every active handler, ignoring ones that were never started.
    pub async fn stop(&mut self) {
        if let Some(mut handler) = self.serial.take() {
            handler.stop().await;
        }
        if let Some(mut handler) = self.tap.take() {
            handler.stop().await;
        }
        if let Some(mut handler) = self.serial_ip.take() {
            handler.stop().await;
        }
    }

    /// Stop everything and re-run the start sequence with freshly read
    /// settings. Used after a configuration change.
    pub async fn restart(&mut self) {
        info!("Restarting handlers with current settings");
        self.stop().await;
        self.start().await;
    }

    pub fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            serial: self.serial.as_ref().is_some_and(SerialLineHandler::is_running),
            serial_ip: self
                .serial_ip
                .as_ref()
                .is_some_and(SerialIpHandler::is_running),
            tap: self.tap.as_ref().is_some_and(TapHandler::is_running),
            serial_ip_addr: self
                .serial_ip
                .as_ref()
                .filter(|h| h.is_running())
                .and_then(SerialIpHandler::local_addr),
            tap_addr: self
                .tap
                .as_ref()
                .filter(|h| h.is_running())
                .and_then(TapHandler::local_addr),
        }
    }

    async fn start_serial(&mut self) {
        if self.serial.as_ref().is_some_and(SerialLineHandler::is_running) {
            debug!("Serial handler already running");
            return;
        }
        match settings::load_serial(self.settings.as_ref()).await {
            Ok(Some(config)) => {
                let mut handler = SerialLineHandler::new(config, Arc::clone(&self.sink));
                match handler.start().await {
                    Ok(()) => self.serial = Some(handler),
                    Err(e) => error!("Failed to start serial handler: {e}"),
                }
            }
            Ok(None) => debug!("Serial transport disabled"),
            Err(e) => error!("Failed to start serial handler: {e}"),
        }
    }

    async fn start_tap(&mut self) {
        if self.tap.as_ref().is_some_and(TapHandler::is_running) {
            debug!("TAP handler already running");
            return;
        }
        match settings::load_tap(self.settings.as_ref()).await {
            Ok(Some(config)) => {
                let mut handler = TapHandler::new(config, Arc::clone(&self.sink));
                match handler.start().await {
                    Ok(()) => self.tap = Some(handler),
                    Err(e) => error!("Failed to start TAP handler: {e}"),
                }
            }
            Ok(None) => debug!("TAP transport disabled"),
            Err(e) => error!("Failed to start TAP handler: {e}"),
        }
    }

    async fn start_serial_ip(&mut self) {
        if self
            .serial_ip
            .as_ref()
            .is_some_and(SerialIpHandler::is_running)
        {
            debug!("Serial-over-IP handler already running");
            return;
        }
        match settings::load_serial_ip(self.settings.as_ref()).await {
            Ok(Some(config)) => {
                let mut handler = SerialIpHandler::new(config, Arc::clone(&self.sink));
                match handler.start().await {
                    Ok(()) => self.serial_ip = Some(handler),
                    Err(e) => error!("Failed to start serial-over-IP handler: {e}"),
                }
            }
            Ok(None) => debug!("Serial-over-IP transport disabled"),
            Err(e) => error!("Failed to start serial-over-IP handler: {e}"),
        }
    }
}

impl std::fmt::Debug for HandlerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSupervisor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
