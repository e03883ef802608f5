//! Toolbox button debounce and gesture detection.
//!
//! A flat state machine polled once per tick with the raw (pre-inverted,
//! `true` = pressed) level and the wrapping millisecond clock. The physical
//! switch is active-low with a pull-up; the GPIO adapter performs the
//! inversion so this module only ever sees "is pressed".
//!
//! | Gesture      | Condition                                       |
//! |--------------|-------------------------------------------------|
//! | Press edge   | debounced 0→1 transition                        |
//! | Release edge | debounced 1→0 transition                        |
//! | Held         | debounced 1 for >= `hold_threshold_ms`          |
//! | Double click | two presses < `double_click_window_ms` apart,   |
//! |              | first press not itself a hold                   |
//!
//! Edge flags are read-and-clear: `take_*` hands each physical event to
//! exactly one consumer.

use log::{debug, info};

use crate::config::SystemConfig;

/// Debounce / gesture state for the toolbox button.
pub struct ButtonMonitor {
    // -- Levels --
    raw_state: bool,
    debounced_state: bool,
    prev_debounced_state: bool,

    // -- Read-and-clear edge flags --
    pressed_edge: bool,
    released_edge: bool,
    double_click_pending: bool,

    // -- Hold tracking --
    is_held: bool,
    hold_duration_ms: u32,
    /// True if the most recent press turned into a hold; such a press
    /// cannot be the first half of a double click.
    last_press_was_hold: bool,

    // -- Timing --
    press_count: u32,
    last_press_ms: u32,
    last_change_ms: u32,

    debounce_ms: u32,
    double_click_window_ms: u32,
    hold_threshold_ms: u32,
}

impl ButtonMonitor {
    pub fn new(config: &SystemConfig, now_ms: u32) -> Self {
        Self {
            raw_state: false,
            debounced_state: false,
            prev_debounced_state: false,
            pressed_edge: false,
            released_edge: false,
            double_click_pending: false,
            is_held: false,
            hold_duration_ms: 0,
            last_press_was_hold: false,
            press_count: 0,
            last_press_ms: 0,
            last_change_ms: now_ms,
            debounce_ms: config.debounce_ms,
            double_click_window_ms: config.double_click_window_ms,
            hold_threshold_ms: config.hold_threshold_ms,
        }
    }

    /// Advance the state machine by one poll.
    pub fn poll(&mut self, raw_pressed: bool, now_ms: u32) {
        self.raw_state = raw_pressed;
        self.prev_debounced_state = self.debounced_state;

        if raw_pressed != self.debounced_state {
            // Pending level change — commit once it has been stable for the
            // debounce window.
            if now_ms.wrapping_sub(self.last_change_ms) >= self.debounce_ms {
                self.debounced_state = raw_pressed;
                self.last_change_ms = now_ms;
            }
        } else {
            // Level agrees with the committed state — restart the window.
            self.last_change_ms = now_ms;
        }

        if self.debounced_state && !self.prev_debounced_state {
            self.on_press(now_ms);
        } else if !self.debounced_state && self.prev_debounced_state {
            self.on_release(now_ms);
        }

        if self.debounced_state {
            self.hold_duration_ms = now_ms.wrapping_sub(self.last_press_ms);
            if self.hold_duration_ms >= self.hold_threshold_ms && !self.is_held {
                self.is_held = true;
                self.last_press_was_hold = true;
                info!("Toolbox button held ({} ms)", self.hold_duration_ms);
            }
        } else {
            self.hold_duration_ms = 0;
            self.is_held = false;
        }
    }

    fn on_press(&mut self, now_ms: u32) {
        self.pressed_edge = true;

        let since_last_press = now_ms.wrapping_sub(self.last_press_ms);
        if self.press_count > 0
            && since_last_press <= self.double_click_window_ms
            && since_last_press > self.debounce_ms
            && !self.last_press_was_hold
        {
            self.double_click_pending = true;
            info!("Toolbox button double-clicked ({} ms gap)", since_last_press);
        }

        self.last_press_ms = now_ms;
        self.press_count = self.press_count.wrapping_add(1);
        self.hold_duration_ms = 0;
        self.last_press_was_hold = false;

        info!("Toolbox button pressed (count: {})", self.press_count);
    }

    fn on_release(&mut self, now_ms: u32) {
        self.released_edge = true;
        self.is_held = false;

        let press_duration = now_ms.wrapping_sub(self.last_press_ms);
        debug!("Toolbox button released (held {} ms)", press_duration);
        self.hold_duration_ms = 0;
    }

    // ── Read-and-clear accessors ──────────────────────────────

    /// True once per debounced press.
    pub fn take_pressed(&mut self) -> bool {
        core::mem::take(&mut self.pressed_edge)
    }

    /// True once per debounced release.
    pub fn take_released(&mut self) -> bool {
        core::mem::take(&mut self.released_edge)
    }

    /// True once per detected double click.
    pub fn take_double_click(&mut self) -> bool {
        core::mem::take(&mut self.double_click_pending)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Last raw (undebounced) sample — diagnostics only.
    pub fn raw_state(&self) -> bool {
        self.raw_state
    }

    pub fn is_held(&self) -> bool {
        self.is_held
    }

    pub fn hold_duration_ms(&self) -> u32 {
        self.hold_duration_ms
    }

    pub fn press_count(&self) -> u32 {
        self.press_count
    }

    /// Reset the press counter (diagnostic hook).
    pub fn reset_press_count(&mut self) {
        info!("Button press count reset (was {})", self.press_count);
        self.press_count = 0;
    }
}
