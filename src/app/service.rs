//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the vehicle monitor, button detector, output
//! controller and health watchdog, and exposes a clean, hardware-agnostic
//! API. All I/O flows through port traits injected at call sites, making
//! the entire service testable with mock adapters.
//!
//! ```text
//!  FrameSource ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                  │         AppService         │
//!  ActuatorPort ◀──│ decode · aggregate · decide│
//!                  └────────────────────────────┘
//! ```
//!
//! One [`tick`](AppService::tick) is one pass of the cooperative loop:
//! drain frames, re-derive readiness, sample the button, run the toolbox
//! timer and output refresh, then evaluate health on its own cadence.
//! Nothing blocks; `now_ms` and `free_heap_bytes` are samples supplied by
//! the caller.

use log::{debug, error, info, warn};

use crate::button::ButtonMonitor;
use crate::can::{
    BATTERY_MGMT_3_FD1_ID, BCM_LAMP_STAT_FD1_ID, CanFrame, LOCKING_SYSTEMS_2_FD1_ID,
    POWERTRAIN_DATA_10_ID, signals,
};
use crate::config::SystemConfig;
use crate::control::{self, OutputController};
use crate::health::{HealthMonitor, HealthState, HealthTransition};
use crate::vehicle::{VehicleMonitor, VehicleSnapshot};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, FrameSource};

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    vehicle: VehicleMonitor,
    button: ButtonMonitor,
    outputs: OutputController,
    health: HealthMonitor,

    /// Transport rx-error count at the last tick, for delta accounting.
    last_rx_errors: u32,
    /// Latched by safe shutdown; only an external reset restarts the
    /// controller once this is set.
    halted: bool,
    tick_count: u64,
}

impl AppService {
    pub fn new(config: SystemConfig, now_ms: u32) -> Self {
        let vehicle = VehicleMonitor::new(&config);
        let button = ButtonMonitor::new(&config, now_ms);
        let outputs = OutputController::new(&config);
        let health = HealthMonitor::new(&config, now_ms);

        Self {
            config,
            vehicle,
            button,
            outputs,
            health,
            last_rx_errors: 0,
            halted: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started);
        info!("AppService started (listen-only CAN monitor)");
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter satisfies **both** [`FrameSource`] and
    /// [`ActuatorPort`] — this avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u32,
        free_heap_bytes: u32,
        hw: &mut (impl FrameSource + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        if self.halted {
            return;
        }
        self.tick_count += 1;

        // 1. Drain pending frames (bounded, to keep tick latency bounded
        //    even with a backed-up transport queue).
        self.drain_frames(now_ms, hw);

        // 2. Re-derive readiness from the freshness stamps.
        if self.vehicle.recompute_readiness(now_ms) {
            sink.emit(&AppEvent::ReadinessChanged {
                ready: self.vehicle.system_ready(),
            });
        }

        // 3. Button sampling and gesture handling.
        self.process_button(now_ms, hw, sink);

        // 4. Toolbox pulse timing (independent of the button) and the
        //    throttled state-driven output refresh.
        self.outputs.service_toolbox(now_ms, hw, sink);
        self.outputs
            .refresh(now_ms, &self.vehicle.snapshot(), hw, sink);

        // 5. Health bookkeeping and the watchdog cadence.
        self.run_health(now_ms, free_heap_bytes, hw, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (serial diagnostic channel).
    pub fn handle_command(&mut self, cmd: AppCommand, now_ms: u32, sink: &mut impl EventSink) {
        match cmd {
            AppCommand::ResetHealthCounters => {
                self.health.reset_counters(now_ms);
            }
            AppCommand::ToggleLampOverride => {
                self.vehicle.toggle_lamp_override();
                self.emit_override_state(sink);
            }
            AppCommand::ClearLampOverride => {
                self.vehicle.clear_lamp_override();
                self.emit_override_state(sink);
            }
            AppCommand::ResetButtonPressCount => {
                self.button.reset_press_count();
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn vehicle_snapshot(&self) -> VehicleSnapshot {
        self.vehicle.snapshot()
    }

    pub fn health_state(&self) -> HealthState {
        self.health.state()
    }

    /// True once safe shutdown has latched.
    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn drain_frames(&mut self, now_ms: u32, hw: &mut impl FrameSource) {
        let mut processed = 0u32;
        while processed < self.config.max_frames_per_tick {
            let Some(frame) = hw.poll_frame() else { break };
            processed += 1;

            // Any traffic proves the bus is alive; only monitored IDs are
            // decoded.
            self.health.note_frame_activity(now_ms);
            if CanFrame::is_monitored(frame.id) {
                self.dispatch_frame(&frame, now_ms);
            }
        }

        if processed >= self.config.max_frames_per_tick {
            debug!(
                "Frame intake limit reached ({} frames), continuing next tick",
                processed
            );
        }
    }

    fn dispatch_frame(&mut self, frame: &CanFrame, now_ms: u32) {
        let parsed = match frame.id {
            BCM_LAMP_STAT_FD1_ID => {
                let report = signals::decode_lamp_status(frame, now_ms);
                self.vehicle.update_lamp(&report);
                report.valid
            }
            LOCKING_SYSTEMS_2_FD1_ID => {
                let report = signals::decode_lock_status(frame, now_ms);
                self.vehicle.update_lock(&report);
                report.valid
            }
            POWERTRAIN_DATA_10_ID => {
                let report = signals::decode_park_status(frame, now_ms);
                self.vehicle.update_park(&report);
                report.valid
            }
            BATTERY_MGMT_3_FD1_ID => {
                let report = signals::decode_battery_soc(frame, now_ms);
                self.vehicle.update_battery(&report);
                report.valid
            }
            // Everything else on the bus is simply not ours.
            _ => return,
        };

        if !parsed {
            self.health.note_decode_error();
            warn!("Failed to decode monitored frame id=0x{:03X}", frame.id);
        }
    }

    fn process_button(
        &mut self,
        now_ms: u32,
        hw: &mut (impl FrameSource + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        let raw_pressed = hw.read_button_raw();
        self.button.poll(raw_pressed, now_ms);

        if self.button.take_pressed() {
            let snap = self.vehicle.snapshot();
            if control::toolbox_may_activate(snap.system_ready, snap.is_parked, snap.is_unlocked) {
                info!("Toolbox activation requested — conditions met");
                self.outputs.request_toolbox(now_ms, hw, sink);
            } else {
                warn!(
                    "Toolbox activation denied (ready={} parked={} unlocked={})",
                    snap.system_ready, snap.is_parked, snap.is_unlocked
                );
                sink.emit(&AppEvent::ToolboxDenied);
            }
        }

        if self.button.take_released() {
            debug!("Button released");
        }

        if self.button.take_double_click() {
            // Security gate: gestures only count while the truck is
            // unlocked.
            if self.vehicle.is_unlocked() {
                self.vehicle.toggle_lamp_override();
                self.emit_override_state(sink);
            } else {
                warn!("Double-click ignored while vehicle is locked");
            }
        }
    }

    fn run_health(
        &mut self,
        now_ms: u32,
        free_heap_bytes: u32,
        hw: &mut (impl FrameSource + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        let status = hw.status();

        // Fold the transport's own error counter into ours as a delta.
        let delta = status.rx_errors.saturating_sub(self.last_rx_errors);
        if delta > 0 {
            self.health.note_transport_errors(delta);
        }
        self.last_rx_errors = status.rx_errors;

        if status.connected && self.vehicle.system_ready() {
            self.health.note_system_ok(now_ms);
        }

        match self.health.check(now_ms, free_heap_bytes) {
            Some(HealthTransition::Triggered(report)) => {
                sink.emit(&AppEvent::HealthTriggered(report));
            }
            Some(HealthTransition::Recovered) => {
                sink.emit(&AppEvent::HealthRecovered);
            }
            Some(HealthTransition::SafeShutdown) => {
                self.enter_safe_shutdown(hw, sink);
                return;
            }
            None => {}
        }

        if self.health.recovery_due(now_ms) {
            self.attempt_recovery(now_ms, hw);
        }
    }

    /// Ordered, individually retryable recovery actions.
    fn attempt_recovery(&mut self, now_ms: u32, hw: &mut (impl FrameSource + ActuatorPort)) {
        info!("Attempting system recovery...");

        // 1. Transport first — nothing downstream works without frames.
        if !hw.status().connected {
            match hw.recover() {
                Ok(()) => {
                    info!("Recovery: transport recovered");
                    self.health.clear_transport_errors();
                }
                Err(e) => {
                    // A transport that cannot be revived is the one fault
                    // this controller cannot work around.
                    error!("Recovery: transport recovery failed: {}", e);
                    self.health.note_critical_error();
                }
            }
        }

        // 2. The channel was just proven (or believed) good — treat data
        //    as current. Raw values keep their fail-safe defaults.
        self.vehicle.reset_freshness(now_ms);

        // 3. Every output reads off: the GPIO block may have been reset.
        if self.outputs.all_outputs_off() {
            info!("Recovery: reasserting output pin configuration");
            hw.reassert_pins();
        }

        // 4. Clear error history only once the transport reports healthy.
        if hw.status().connected {
            self.health.clear_transport_errors();
            self.health.clear_decode_errors();
        }
    }

    fn enter_safe_shutdown(
        &mut self,
        hw: &mut (impl FrameSource + ActuatorPort),
        sink: &mut impl EventSink,
    ) {
        error!("=== PERFORMING SAFE SYSTEM SHUTDOWN ===");
        self.outputs.force_all_off(hw, sink);
        sink.emit(&AppEvent::SafeShutdown);
        error!("All outputs disabled; manual reset required to restore operation");
        self.halted = true;
    }

    fn emit_override_state(&self, sink: &mut impl EventSink) {
        let snap = self.vehicle.snapshot();
        sink.emit(&AppEvent::LampOverrideChanged {
            active: snap.lamp_override.is_some(),
            on: snap.lamp_override.unwrap_or(false),
        });
    }
}
