//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world — in this
//! firmware that is the serial diagnostic channel — which the
//! [`AppService`](super::service::AppService) interprets and acts upon.

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Zero every health counter and refresh the liveness stamps.
    ResetHealthCounters,

    /// Toggle the manual bed-light override (same effect as the
    /// double-click gesture, without the unlock gate — the serial channel
    /// implies physical access).
    ToggleLampOverride,

    /// Drop the manual override and return the bed light to automatic
    /// control.
    ClearLampOverride,

    /// Zero the button press counter.
    ResetButtonPressCount,
}
