//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC in production). A future telemetry uplink
//! would implement the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => {
                info!("START | listen-only monitor up");
            }
            AppEvent::ReadinessChanged { ready } => {
                info!("READY | {}", if *ready { "READY" } else { "NOT_READY" });
            }
            AppEvent::OutputChanged { output, on } => {
                info!(
                    "OUT   | {} -> {}",
                    output.name(),
                    if *on { "ON" } else { "OFF" }
                );
            }
            AppEvent::ToolboxActivated => {
                info!("TOOL  | opener pulse started");
            }
            AppEvent::ToolboxTimedOut { after_ms } => {
                info!("TOOL  | opener off after {} ms", after_ms);
            }
            AppEvent::ToolboxDenied => {
                warn!("TOOL  | activation denied (gate conditions not met)");
            }
            AppEvent::LampOverrideChanged { active, on } => {
                info!(
                    "LAMP  | override {} (manual state {})",
                    if *active { "engaged" } else { "cleared" },
                    if *on { "ON" } else { "OFF" }
                );
            }
            AppEvent::HealthTriggered(report) => {
                error!(
                    "HLTH  | TRIGGERED faults=0b{:04b} transport={} decode={} critical={} \
                     activity={}ms ok={}ms heap={}B",
                    report.fault_flags,
                    report.transport_errors,
                    report.decode_errors,
                    report.critical_errors,
                    report.ms_since_activity,
                    report.ms_since_ok,
                    report.free_heap_bytes,
                );
            }
            AppEvent::HealthRecovered => {
                info!("HLTH  | recovered");
            }
            AppEvent::SafeShutdown => {
                error!("HLTH  | SAFE SHUTDOWN — all outputs off, reset required");
            }
        }
    }
}
