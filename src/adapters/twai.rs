//! TWAI (CAN) transport adapter — implements [`FrameSource`].
//!
//! The controller runs in **listen-only** mode: it never acknowledges,
//! arbitrates or transmits, so attaching the device cannot disturb the
//! vehicle bus. Both TX and RX pins are still wired to the transceiver —
//! the TWAI peripheral requires them even when it only listens.
//!
//! On host targets the adapter is a simple frame queue so integration
//! tests and the simulation loop can inject traffic.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{FrameSource, TransportError, TransportStatus};
use crate::can::CanFrame;

#[cfg(target_os = "espidf")]
use crate::pins;

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct TwaiTransport {
    installed: bool,
    bus_off_count: u32,
}

#[cfg(target_os = "espidf")]
impl TwaiTransport {
    /// Install and start the TWAI driver in listen-only mode at 500 kbit/s.
    pub fn new() -> Result<Self, TransportError> {
        let mut transport = Self {
            installed: false,
            bus_off_count: 0,
        };
        transport.install()?;
        info!(
            "TWAI started: listen-only, 500 kbit/s (tx=GPIO{} rx=GPIO{})",
            pins::CAN_TX_GPIO,
            pins::CAN_RX_GPIO
        );
        Ok(transport)
    }

    fn install(&mut self) -> Result<(), TransportError> {
        use esp_idf_svc::sys::*;

        // SAFETY: zeroed twai_general_config_t is valid; every field the
        // driver reads is assigned below. Install/start are called from
        // the single-threaded init or recovery path only.
        unsafe {
            let mut general: twai_general_config_t = core::mem::zeroed();
            general.mode = twai_mode_t_TWAI_MODE_LISTEN_ONLY;
            general.tx_io = pins::CAN_TX_GPIO;
            general.rx_io = pins::CAN_RX_GPIO;
            general.clkout_io = -1;
            general.bus_off_io = -1;
            general.tx_queue_len = 0; // listen-only: no transmit queue
            general.rx_queue_len = 32;
            general.alerts_enabled = TWAI_ALERT_NONE;
            general.clkout_divider = 0;

            // 500 kbit/s timing (80 MHz source clock).
            let mut timing: twai_timing_config_t = core::mem::zeroed();
            timing.brp = 8;
            timing.tseg_1 = 15;
            timing.tseg_2 = 4;
            timing.sjw = 3;
            timing.triple_sampling = false;

            // Accept everything; filtering happens in software by ID.
            let mut filter: twai_filter_config_t = core::mem::zeroed();
            filter.acceptance_code = 0;
            filter.acceptance_mask = 0xFFFF_FFFF;
            filter.single_filter = true;

            let ret = twai_driver_install(&general, &timing, &filter);
            if ret != ESP_OK {
                return Err(TransportError::Driver(ret));
            }
            let ret = twai_start();
            if ret != ESP_OK {
                twai_driver_uninstall();
                return Err(TransportError::Driver(ret));
            }
        }

        self.installed = true;
        Ok(())
    }

    fn teardown(&mut self) {
        use esp_idf_svc::sys::*;
        if self.installed {
            // SAFETY: stop/uninstall on an installed driver; recovery path
            // is single-threaded with the poll path.
            unsafe {
                twai_stop();
                twai_driver_uninstall();
            }
            self.installed = false;
        }
    }
}

#[cfg(target_os = "espidf")]
impl FrameSource for TwaiTransport {
    fn poll_frame(&mut self) -> Option<CanFrame> {
        use esp_idf_svc::sys::*;

        if !self.installed {
            return None;
        }

        // SAFETY: zeroed twai_message_t is a valid receive buffer; zero
        // timeout makes this a non-blocking queue pop.
        let mut message: twai_message_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { twai_receive(&mut message, 0) };
        if ret != ESP_OK {
            return None;
        }

        let length = message.data_length_code.min(8);
        Some(CanFrame {
            id: message.identifier,
            length,
            data: message.data,
        })
    }

    fn status(&self) -> TransportStatus {
        use esp_idf_svc::sys::*;

        if !self.installed {
            return TransportStatus::default();
        }

        // SAFETY: zeroed status struct is a valid out-parameter.
        let mut info: twai_status_info_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { twai_get_status_info(&mut info) };
        if ret != ESP_OK {
            return TransportStatus::default();
        }

        TransportStatus {
            connected: info.state == twai_state_t_TWAI_STATE_RUNNING,
            rx_errors: info.rx_error_counter,
            bus_off_count: self.bus_off_count,
        }
    }

    fn recover(&mut self) -> Result<(), TransportError> {
        warn!("TWAI recovery: reinstalling driver");
        self.bus_off_count = self.bus_off_count.saturating_add(1);
        self.teardown();
        self.install()?;
        info!("TWAI recovery complete");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Same depth as the real driver's RX queue: a full queue drops frames,
/// exactly like hardware.
#[cfg(not(target_os = "espidf"))]
const SIM_RX_QUEUE_LEN: usize = 32;

#[cfg(not(target_os = "espidf"))]
pub struct TwaiTransport {
    queue: heapless::Deque<CanFrame, SIM_RX_QUEUE_LEN>,
    connected: bool,
    rx_errors: u32,
    bus_off_count: u32,
    recovery_fails: bool,
}

#[cfg(not(target_os = "espidf"))]
impl TwaiTransport {
    pub fn new() -> Result<Self, TransportError> {
        info!("TWAI(sim): in-memory frame queue");
        Ok(Self {
            queue: heapless::Deque::new(),
            connected: true,
            rx_errors: 0,
            bus_off_count: 0,
            recovery_fails: false,
        })
    }

    /// Inject a frame as if it arrived from the bus. A full RX queue
    /// drops the frame and counts an overrun, like the real controller.
    pub fn inject_frame(&mut self, frame: CanFrame) {
        if self.queue.push_back(frame).is_err() {
            self.rx_errors = self.rx_errors.saturating_add(1);
        }
    }

    /// Simulate a transport fault (disconnect + error count).
    pub fn inject_fault(&mut self, rx_errors: u32) {
        self.connected = false;
        self.rx_errors = self.rx_errors.saturating_add(rx_errors);
    }

    /// Make subsequent [`FrameSource::recover`] calls fail (dead bus).
    pub fn set_recovery_fails(&mut self, fails: bool) {
        self.recovery_fails = fails;
    }
}

#[cfg(not(target_os = "espidf"))]
impl FrameSource for TwaiTransport {
    fn poll_frame(&mut self) -> Option<CanFrame> {
        if !self.connected {
            return None;
        }
        self.queue.pop_front()
    }

    fn status(&self) -> TransportStatus {
        TransportStatus {
            connected: self.connected,
            rx_errors: self.rx_errors,
            bus_off_count: self.bus_off_count,
        }
    }

    fn recover(&mut self) -> Result<(), TransportError> {
        if self.recovery_fails {
            return Err(TransportError::BusOff);
        }
        self.bus_off_count = self.bus_off_count.saturating_add(1);
        self.connected = true;
        info!("TWAI(sim): recovered");
        Ok(())
    }
}
