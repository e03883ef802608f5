//! Hardware adapter — combines the TWAI transport and GPIO bank behind
//! the port traits.
//!
//! The service tick wants a single value satisfying both [`FrameSource`]
//! and [`ActuatorPort`]; this adapter owns both concrete peripherals and
//! delegates. It is the only composition point that touches real
//! hardware.

use crate::app::ports::{ActuatorPort, FrameSource, Output, TransportError, TransportStatus};
use crate::can::CanFrame;

use super::gpio::GpioAdapter;
use super::twai::TwaiTransport;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    transport: TwaiTransport,
    gpio: GpioAdapter,
}

impl HardwareAdapter {
    pub fn new(transport: TwaiTransport, gpio: GpioAdapter) -> Self {
        Self { transport, gpio }
    }

    /// Simulation hook: reach the underlying transport (frame injection).
    #[cfg(not(target_os = "espidf"))]
    pub fn transport_mut(&mut self) -> &mut TwaiTransport {
        &mut self.transport
    }

    /// Simulation hook: reach the underlying GPIO bank.
    #[cfg(not(target_os = "espidf"))]
    pub fn gpio_mut(&mut self) -> &mut GpioAdapter {
        &mut self.gpio
    }

    /// Simulation hook: read a commanded output level.
    #[cfg(not(target_os = "espidf"))]
    pub fn output_state(&self, output: Output) -> bool {
        self.gpio.output_state(output)
    }
}

// ── FrameSource delegation ────────────────────────────────────

impl FrameSource for HardwareAdapter {
    fn poll_frame(&mut self) -> Option<CanFrame> {
        self.transport.poll_frame()
    }

    fn status(&self) -> TransportStatus {
        self.transport.status()
    }

    fn recover(&mut self) -> Result<(), TransportError> {
        self.transport.recover()
    }
}

// ── ActuatorPort delegation ───────────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_output(&mut self, output: Output, on: bool) {
        self.gpio.set_output(output, on);
    }

    fn read_button_raw(&mut self) -> bool {
        self.gpio.read_button_raw()
    }

    fn reassert_pins(&mut self) {
        self.gpio.reassert_pins();
    }
}
