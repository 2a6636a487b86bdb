//! Paging Service Library (pagesrv)
//!
//! An alarm/paging ingestion service. Notifications arrive over three
//! heterogeneous transports (a physical serial line, a raw TCP socket with
//! newline framing, and a TCP socket speaking a simplified TAP framing with
//! acknowledgement) and are normalized into a single alarm record,
//! persisted, and handed to one registered subscriber.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │ SerialLineHandler│   │ SerialIpHandler  │   │   TapHandler     │
//! │ (device + retry) │   │ (newline frames) │   │ (ESC+EOT + ACK)  │
//! └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!          │                      │                      │
//!          └──────────────────────┼──────────────────────┘
//!                                 ▼
//!                        ┌──────────────────┐
//!                        │    AlarmSink     │──► AlarmNotifier (one
//!                        │ (id + persist)   │    registered subscriber)
//!                        └────────┬─────────┘
//!                                 ▼
//!                        ┌──────────────────┐
//!                        │   AlarmStore     │ (SQLite / memory)
//!                        └──────────────────┘
//! ```
//!
//! The [`core::supervisor::HandlerSupervisor`] reads the per-transport
//! enable flags from the [`storage::SettingsStore`] and owns every handler;
//! a settings change takes effect through its `restart()`.

pub mod core;
pub mod error;
pub mod storage;

pub use crate::core::sink::{AlarmNotifier, AlarmRecord, AlarmSink, AlarmSource};
pub use crate::core::supervisor::{HandlerSupervisor, SupervisorStatus};
pub use crate::error::{PageSrvError, Result};
