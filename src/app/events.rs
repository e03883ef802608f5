//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them — log to serial today, push to a telemetry
//! uplink tomorrow.

use super::ports::Output;
use crate::health::HealthReport;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The application service finished starting.
    Started,

    /// `system_ready` changed.
    ReadinessChanged { ready: bool },

    /// A state-driven output transitioned (change-only actuation makes
    /// each physical toggle individually observable).
    OutputChanged { output: Output, on: bool },

    /// The toolbox opener pulse started.
    ToolboxActivated,

    /// The toolbox opener pulse ended after `after_ms`.
    ToolboxTimedOut { after_ms: u32 },

    /// A gated toolbox request was refused (not ready / parked / unlocked).
    ToolboxDenied,

    /// The manual bed-light override changed. `active` = override engaged,
    /// `on` = the manual lamp state while engaged.
    LampOverrideChanged { active: bool, on: bool },

    /// The health watchdog tripped; carries the one-shot report.
    HealthTriggered(HealthReport),

    /// All health conditions cleared.
    HealthRecovered,

    /// Terminal safe shutdown: all actuators forced off, external reset
    /// required.
    SafeShutdown,
}
