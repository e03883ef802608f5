//! Generic latching relay/LED driver over an `embedded-hal` output pin.
//!
//! Tracks the last commanded level so callers can interrogate the driven
//! state without a read-back (the hardware has none), and so a re-command
//! to the same level is a register-level no-op.

use embedded_hal::digital::OutputPin;

pub struct Relay<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap a configured output pin, driving it to a known off level.
    pub fn new(mut pin: P) -> Self {
        let _ = pin.set_low();
        Self { pin, on: false }
    }

    /// Drive the output. Failed writes leave the tracked state unchanged.
    pub fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_ok() {
            self.on = on;
        }
    }

    /// Last successfully commanded level.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Re-drive the current level (pin-reassertion recovery path).
    pub fn reassert(&mut self) {
        let on = self.on;
        self.set(on);
    }
}
