//! Decision logic and output control.
//!
//! The gate predicates are pure, total functions — invalid or stale
//! upstream data has already been folded into safe derived flags by the
//! vehicle monitor before it gets here, so nothing on this path can fail.
//!
//! [`OutputController`] turns a [`VehicleSnapshot`] into actuator commands
//! on a throttled cadence, writing an output **only when its computed
//! target differs from the last value applied** so every physical
//! transition is individually observable. When the system is not ready,
//! every state-driven output is forced to its safe-off value regardless of
//! the underlying signals.
//!
//! The toolbox opener is the one event-driven output: a gated button press
//! starts the pulse, and a timing check ends it after the configured
//! duration, wraparound-safe and without ever holding the solenoid.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ActuatorPort, EventSink, Output};
use crate::config::SystemConfig;
use crate::vehicle::VehicleSnapshot;

// ---------------------------------------------------------------------------
// Gate predicates
// ---------------------------------------------------------------------------

/// The toolbox solenoid may fire only when the system has fresh data and
/// the truck is parked and unlocked.
pub fn toolbox_may_activate(system_ready: bool, is_parked: bool, is_unlocked: bool) -> bool {
    system_ready && is_parked && is_unlocked
}

/// Target state for the bed light relay.
pub fn bed_light_target(snap: &VehicleSnapshot) -> bool {
    if !snap.system_ready {
        return false;
    }
    snap.lamp_override.unwrap_or(snap.lamp_should_be_on)
}

/// Target state for the "parked" indicator.
pub fn parked_led_target(snap: &VehicleSnapshot) -> bool {
    snap.system_ready && snap.is_parked
}

/// Target state for the "unlocked" indicator.
pub fn unlocked_led_target(snap: &VehicleSnapshot) -> bool {
    snap.system_ready && snap.is_unlocked
}

// ---------------------------------------------------------------------------
// Output controller
// ---------------------------------------------------------------------------

/// Applies decision outcomes to the actuator port with change-only writes.
pub struct OutputController {
    // Last value applied per state-driven output; `None` until the first
    // write so the initial target always reaches the hardware.
    bed_light: Option<bool>,
    parked_led: Option<bool>,
    unlocked_led: Option<bool>,

    toolbox_active: bool,
    toolbox_started_ms: u32,

    last_refresh_ms: Option<u32>,

    update_interval_ms: u32,
    toolbox_duration_ms: u32,
}

impl OutputController {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            bed_light: None,
            parked_led: None,
            unlocked_led: None,
            toolbox_active: false,
            toolbox_started_ms: 0,
            last_refresh_ms: None,
            update_interval_ms: config.output_update_interval_ms,
            toolbox_duration_ms: config.toolbox_opener_duration_ms,
        }
    }

    /// Recompute and apply the state-driven outputs. Throttled to the
    /// configured interval; returns early between refreshes.
    pub fn refresh(
        &mut self,
        now_ms: u32,
        snap: &VehicleSnapshot,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if let Some(last) = self.last_refresh_ms {
            if now_ms.wrapping_sub(last) < self.update_interval_ms {
                return;
            }
        }
        self.last_refresh_ms = Some(now_ms);

        Self::apply(
            &mut self.bed_light,
            Output::BedLight,
            bed_light_target(snap),
            hw,
            sink,
        );
        Self::apply(
            &mut self.parked_led,
            Output::ParkedLed,
            parked_led_target(snap),
            hw,
            sink,
        );
        Self::apply(
            &mut self.unlocked_led,
            Output::UnlockedLed,
            unlocked_led_target(snap),
            hw,
            sink,
        );
    }

    /// Start the toolbox opener pulse. Idempotent: re-requesting while the
    /// solenoid is already energised does not restart the timer.
    pub fn request_toolbox(
        &mut self,
        now_ms: u32,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if self.toolbox_active {
            return;
        }
        self.toolbox_active = true;
        self.toolbox_started_ms = now_ms;
        hw.set_output(Output::ToolboxOpener, true);
        sink.emit(&AppEvent::ToolboxActivated);
        info!("Toolbox opener activated for {} ms", self.toolbox_duration_ms);
    }

    /// End the toolbox pulse once its duration has elapsed. Runs every
    /// tick, independent of the button.
    pub fn service_toolbox(
        &mut self,
        now_ms: u32,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if !self.toolbox_active {
            return;
        }

        let elapsed = now_ms.wrapping_sub(self.toolbox_started_ms);
        if elapsed >= self.toolbox_duration_ms {
            self.toolbox_active = false;
            hw.set_output(Output::ToolboxOpener, false);
            sink.emit(&AppEvent::ToolboxTimedOut { after_ms: elapsed });
            info!("Toolbox opener timed out after {} ms", elapsed);
        }
    }

    /// Unconditionally drive every output off (safe shutdown path).
    pub fn force_all_off(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        warn!("Forcing all outputs off");
        for output in Output::ALL {
            hw.set_output(output, false);
        }
        self.bed_light = Some(false);
        self.parked_led = Some(false);
        self.unlocked_led = Some(false);
        if self.toolbox_active {
            self.toolbox_active = false;
            sink.emit(&AppEvent::ToolboxTimedOut { after_ms: 0 });
        }
    }

    /// True when no tracked output is currently driven. Used by the
    /// recovery heuristic ("maybe the GPIO block got reset").
    pub fn all_outputs_off(&self) -> bool {
        self.bed_light != Some(true)
            && self.parked_led != Some(true)
            && self.unlocked_led != Some(true)
            && !self.toolbox_active
    }

    pub fn toolbox_active(&self) -> bool {
        self.toolbox_active
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply(
        slot: &mut Option<bool>,
        output: Output,
        target: bool,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if *slot == Some(target) {
            return;
        }
        *slot = Some(target);
        hw.set_output(output, target);
        sink.emit(&AppEvent::OutputChanged { output, on: target });
        info!("{} changed to {}", output.name(), if target { "ON" } else { "OFF" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::RAW_UNKNOWN;

    struct MockHw {
        writes: Vec<(Output, bool)>,
    }

    impl MockHw {
        fn new() -> Self {
            Self { writes: Vec::new() }
        }
    }

    impl ActuatorPort for MockHw {
        fn set_output(&mut self, output: Output, on: bool) {
            self.writes.push((output, on));
        }
        fn read_button_raw(&mut self) -> bool {
            false
        }
        fn reassert_pins(&mut self) {}
    }

    struct NullSink;
    impl EventSink for NullSink {
        fn emit(&mut self, _event: &AppEvent) {}
    }

    fn snapshot(ready: bool, parked: bool, unlocked: bool, lamp: bool) -> VehicleSnapshot {
        VehicleSnapshot {
            pud_lamp: RAW_UNKNOWN,
            lock_status: RAW_UNKNOWN,
            park_status: 1,
            battery_soc: RAW_UNKNOWN,
            is_unlocked: unlocked,
            is_parked: parked,
            lamp_should_be_on: lamp,
            system_ready: ready,
            lamp_override: None,
        }
    }

    #[test]
    fn toolbox_gate_is_true_for_exactly_one_combination() {
        for ready in [false, true] {
            for parked in [false, true] {
                for unlocked in [false, true] {
                    let expected = ready && parked && unlocked;
                    assert_eq!(toolbox_may_activate(ready, parked, unlocked), expected);
                }
            }
        }
    }

    #[test]
    fn not_ready_forces_every_target_off() {
        let snap = snapshot(false, true, true, true);
        assert!(!bed_light_target(&snap));
        assert!(!parked_led_target(&snap));
        assert!(!unlocked_led_target(&snap));
    }

    #[test]
    fn override_beats_automatic_lamp_state() {
        let mut snap = snapshot(true, true, true, false);
        snap.lamp_override = Some(true);
        assert!(bed_light_target(&snap));

        snap.lamp_should_be_on = true;
        snap.lamp_override = Some(false);
        assert!(!bed_light_target(&snap));

        // Fail-safe still wins over the override.
        snap.system_ready = false;
        snap.lamp_override = Some(true);
        assert!(!bed_light_target(&snap));
    }

    #[test]
    fn refresh_writes_each_output_once_until_targets_change() {
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;
        let snap = snapshot(true, true, false, true);

        ctl.refresh(0, &snap, &mut hw, &mut sink);
        assert_eq!(hw.writes.len(), 3, "initial state always reaches hardware");

        // Same targets on the next refresh: no further writes.
        ctl.refresh(100, &snap, &mut hw, &mut sink);
        assert_eq!(hw.writes.len(), 3);

        // One signal flips: exactly one write.
        let snap = snapshot(true, true, true, true);
        ctl.refresh(200, &snap, &mut hw, &mut sink);
        assert_eq!(hw.writes.len(), 4);
        assert_eq!(*hw.writes.last().unwrap(), (Output::UnlockedLed, true));
    }

    #[test]
    fn refresh_is_throttled_between_intervals() {
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        ctl.refresh(0, &snapshot(true, true, true, true), &mut hw, &mut sink);
        let writes = hw.writes.len();

        // 99 ms later the targets changed, but the throttle holds.
        ctl.refresh(99, &snapshot(false, false, false, false), &mut hw, &mut sink);
        assert_eq!(hw.writes.len(), writes);

        ctl.refresh(100, &snapshot(false, false, false, false), &mut hw, &mut sink);
        assert!(hw.writes.len() > writes);
    }

    #[test]
    fn fail_safe_turns_all_state_outputs_off() {
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        ctl.refresh(0, &snapshot(true, true, true, true), &mut hw, &mut sink);
        hw.writes.clear();

        ctl.refresh(100, &snapshot(false, true, true, true), &mut hw, &mut sink);
        let mut off = hw.writes.clone();
        off.sort_by_key(|(o, _)| *o as u8);
        assert_eq!(
            off,
            vec![
                (Output::BedLight, false),
                (Output::ParkedLed, false),
                (Output::UnlockedLed, false),
            ]
        );
    }

    #[test]
    fn toolbox_pulse_times_out_at_exactly_the_duration() {
        let duration = SystemConfig::default().toolbox_opener_duration_ms;
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        ctl.request_toolbox(1000, &mut hw, &mut sink);
        assert!(ctl.toolbox_active());
        assert_eq!(hw.writes, vec![(Output::ToolboxOpener, true)]);

        ctl.service_toolbox(1000 + duration - 1, &mut hw, &mut sink);
        assert!(ctl.toolbox_active(), "one ms early must not release");

        ctl.service_toolbox(1000 + duration, &mut hw, &mut sink);
        assert!(!ctl.toolbox_active());
        assert_eq!(*hw.writes.last().unwrap(), (Output::ToolboxOpener, false));
    }

    #[test]
    fn toolbox_restart_while_active_does_not_reset_the_timer() {
        let duration = SystemConfig::default().toolbox_opener_duration_ms;
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        ctl.request_toolbox(0, &mut hw, &mut sink);
        ctl.request_toolbox(duration - 100, &mut hw, &mut sink); // ignored
        ctl.service_toolbox(duration, &mut hw, &mut sink);
        assert!(!ctl.toolbox_active(), "timer runs from the first request");
    }

    #[test]
    fn toolbox_timeout_survives_clock_wraparound() {
        let duration = SystemConfig::default().toolbox_opener_duration_ms;
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        let start = u32::MAX - 100;
        ctl.request_toolbox(start, &mut hw, &mut sink);

        ctl.service_toolbox(u32::MAX, &mut hw, &mut sink);
        assert!(ctl.toolbox_active());

        // duration - 101 ms after the wrap → exactly `duration` elapsed.
        ctl.service_toolbox(duration - 101, &mut hw, &mut sink);
        assert!(!ctl.toolbox_active());
    }

    #[test]
    fn force_all_off_writes_every_output() {
        let mut ctl = OutputController::new(&SystemConfig::default());
        let mut hw = MockHw::new();
        let mut sink = NullSink;

        ctl.refresh(0, &snapshot(true, true, true, true), &mut hw, &mut sink);
        ctl.request_toolbox(0, &mut hw, &mut sink);
        hw.writes.clear();

        ctl.force_all_off(&mut hw, &mut sink);
        assert_eq!(hw.writes.len(), Output::ALL.len());
        assert!(hw.writes.iter().all(|(_, on)| !on));
        assert!(ctl.all_outputs_off());
    }
}
