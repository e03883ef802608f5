//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (CAN transport, GPIO, event sinks) implement these
//! traits. The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly — tests
//! substitute fakes instead of re-implementing decode logic.
//!
//! Every port call is non-blocking: frames, levels and timestamps are
//! samples taken at call time. Nothing here suspends.

use core::fmt;

use crate::can::CanFrame;

// ───────────────────────────────────────────────────────────────
// Frame source port (driven adapter: CAN transport → domain)
// ───────────────────────────────────────────────────────────────

/// Snapshot of the transport's own health, safe to query repeatedly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStatus {
    /// Controller is up and receiving (not bus-off, not stopped).
    pub connected: bool,
    /// Receive-side error count reported by the controller.
    pub rx_errors: u32,
    /// Times the controller has entered bus-off since start.
    pub bus_off_count: u32,
}

/// Read-side port: the domain drains received frames through this.
///
/// The transport is listen-only; there is no transmit counterpart by
/// design.
pub trait FrameSource {
    /// Take the next pending frame, if any. Never blocks.
    fn poll_frame(&mut self) -> Option<CanFrame>;

    /// Current transport health. Side-effect free.
    fn status(&self) -> TransportStatus;

    /// Attempt to bring a dead transport back (controller restart,
    /// bus-off recovery). Invoked only by the health recovery path.
    fn recover(&mut self) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → GPIO)
// ───────────────────────────────────────────────────────────────

/// The four outputs the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Output {
    BedLight = 0,
    ParkedLed = 1,
    UnlockedLed = 2,
    ToolboxOpener = 3,
}

impl Output {
    pub const ALL: [Self; 4] = [
        Self::BedLight,
        Self::ParkedLed,
        Self::UnlockedLed,
        Self::ToolboxOpener,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BedLight => "Bed light",
            Self::ParkedLed => "Parked LED",
            Self::UnlockedLed => "Unlocked LED",
            Self::ToolboxOpener => "Toolbox opener",
        }
    }
}

/// Write-side port: the domain commands actuators and samples the button.
///
/// Writes are assumed immediate; the core never reads an output back to
/// verify one.
pub trait ActuatorPort {
    /// Drive an output. Idempotent at the hardware level.
    fn set_output(&mut self, output: Output, on: bool);

    /// Sample the toolbox button, pre-inverted: `true` = pressed.
    fn read_button_raw(&mut self) -> bool;

    /// Re-apply pin modes and pull configuration (recovery heuristic for
    /// a possibly reset GPIO block).
    fn reassert_pins(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (serial log today; a
/// telemetry uplink would implement the same trait).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`FrameSource::recover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The controller driver is not installed / failed to start.
    NotInstalled,
    /// The controller is bus-off and refused to re-enter the bus.
    BusOff,
    /// Underlying driver error code.
    Driver(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInstalled => write!(f, "transport not installed"),
            Self::BusOff => write!(f, "bus-off recovery failed"),
            Self::Driver(code) => write!(f, "driver error {}", code),
        }
    }
}
