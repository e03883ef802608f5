//! GPIO adapter — implements [`ActuatorPort`] over the four output pins
//! and the toolbox button input.
//!
//! Outputs go through the generic [`Relay`] driver so the commanded level
//! is tracked without hardware read-back. The button is active-low with a
//! pull-up; this adapter performs the inversion so the domain only ever
//! sees "is pressed".

use log::info;

use crate::app::ports::{ActuatorPort, Output};
use crate::drivers::relay::Relay;

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod pin_impl {
    use esp_idf_hal::gpio::{AnyIOPin, Input, Output as HalOutput, PinDriver, Pull};

    use crate::app::ports::TransportError;
    use crate::pins;

    pub type OutPin = PinDriver<'static, AnyIOPin, HalOutput>;
    pub type ButtonPin = PinDriver<'static, AnyIOPin, Input>;

    pub fn output_pin(gpio: i32) -> Result<OutPin, TransportError> {
        // SAFETY: each GPIO number is claimed exactly once, in
        // GpioAdapter::new, before the control loop starts.
        let pin = unsafe { AnyIOPin::new(gpio) };
        PinDriver::output(pin).map_err(|e| TransportError::Driver(e.code()))
    }

    pub fn button_pin() -> Result<ButtonPin, TransportError> {
        // SAFETY: see output_pin.
        let pin = unsafe { AnyIOPin::new(pins::TOOLBOX_BUTTON_GPIO) };
        let mut driver = PinDriver::input(pin).map_err(|e| TransportError::Driver(e.code()))?;
        driver
            .set_pull(Pull::Up)
            .map_err(|e| TransportError::Driver(e.code()))?;
        Ok(driver)
    }
}

#[cfg(target_os = "espidf")]
pub struct GpioAdapter {
    bed_light: Relay<pin_impl::OutPin>,
    parked_led: Relay<pin_impl::OutPin>,
    unlocked_led: Relay<pin_impl::OutPin>,
    toolbox_opener: Relay<pin_impl::OutPin>,
    button: pin_impl::ButtonPin,
}

#[cfg(target_os = "espidf")]
impl GpioAdapter {
    /// Claim and configure every pin; all outputs start off.
    pub fn new() -> Result<Self, crate::app::ports::TransportError> {
        use crate::pins;

        let adapter = Self {
            bed_light: Relay::new(pin_impl::output_pin(pins::BEDLIGHT_GPIO)?),
            parked_led: Relay::new(pin_impl::output_pin(pins::PARKED_LED_GPIO)?),
            unlocked_led: Relay::new(pin_impl::output_pin(pins::UNLOCKED_LED_GPIO)?),
            toolbox_opener: Relay::new(pin_impl::output_pin(pins::TOOLBOX_OPENER_GPIO)?),
            button: pin_impl::button_pin()?,
        };
        info!(
            "GPIO configured: bedlight={} parked={} unlocked={} toolbox={} button={}",
            pins::BEDLIGHT_GPIO,
            pins::PARKED_LED_GPIO,
            pins::UNLOCKED_LED_GPIO,
            pins::TOOLBOX_OPENER_GPIO,
            pins::TOOLBOX_BUTTON_GPIO
        );
        Ok(adapter)
    }

    fn relay(&mut self, output: Output) -> &mut Relay<pin_impl::OutPin> {
        match output {
            Output::BedLight => &mut self.bed_light,
            Output::ParkedLed => &mut self.parked_led,
            Output::UnlockedLed => &mut self.unlocked_led,
            Output::ToolboxOpener => &mut self.toolbox_opener,
        }
    }
}

#[cfg(target_os = "espidf")]
impl ActuatorPort for GpioAdapter {
    fn set_output(&mut self, output: Output, on: bool) {
        self.relay(output).set(on);
    }

    fn read_button_raw(&mut self) -> bool {
        // Active low with pull-up.
        self.button.is_low()
    }

    fn reassert_pins(&mut self) {
        info!("GPIO: reasserting output levels");
        self.bed_light.reassert();
        self.parked_led.reassert();
        self.unlocked_led.reassert();
        self.toolbox_opener.reassert();
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Infallible in-memory pin for the host build.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimPin {
    level: bool,
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::ErrorType for SimPin {
    type Error = core::convert::Infallible;
}

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::digital::OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level = false;
        Ok(())
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level = true;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
pub struct GpioAdapter {
    outputs: [Relay<SimPin>; 4],
    button_pressed: bool,
    reassert_count: u32,
}

#[cfg(not(target_os = "espidf"))]
impl GpioAdapter {
    pub fn new() -> Result<Self, crate::app::ports::TransportError> {
        info!("GPIO(sim): in-memory pins");
        Ok(Self {
            outputs: [
                Relay::new(SimPin::default()),
                Relay::new(SimPin::default()),
                Relay::new(SimPin::default()),
                Relay::new(SimPin::default()),
            ],
            button_pressed: false,
            reassert_count: 0,
        })
    }

    /// Drive the simulated button level.
    pub fn press_button(&mut self, pressed: bool) {
        self.button_pressed = pressed;
    }

    /// Current commanded level of an output.
    pub fn output_state(&self, output: Output) -> bool {
        self.outputs[output as usize].is_on()
    }

    pub fn reassert_count(&self) -> u32 {
        self.reassert_count
    }
}

#[cfg(not(target_os = "espidf"))]
impl ActuatorPort for GpioAdapter {
    fn set_output(&mut self, output: Output, on: bool) {
        self.outputs[output as usize].set(on);
    }

    fn read_button_raw(&mut self) -> bool {
        self.button_pressed
    }

    fn reassert_pins(&mut self) {
        self.reassert_count += 1;
        for relay in &mut self.outputs {
            relay.reassert();
        }
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn sim_tracks_output_levels() {
        let mut gpio = GpioAdapter::new().unwrap();
        assert!(!gpio.output_state(Output::BedLight));

        gpio.set_output(Output::BedLight, true);
        gpio.set_output(Output::ToolboxOpener, true);
        assert!(gpio.output_state(Output::BedLight));
        assert!(gpio.output_state(Output::ToolboxOpener));
        assert!(!gpio.output_state(Output::ParkedLed));
    }

    #[test]
    fn sim_button_is_sampled_not_latched() {
        let mut gpio = GpioAdapter::new().unwrap();
        assert!(!gpio.read_button_raw());
        gpio.press_button(true);
        assert!(gpio.read_button_raw());
        assert!(gpio.read_button_raw());
        gpio.press_button(false);
        assert!(!gpio.read_button_raw());
    }
}
