//! Vehicle state aggregation.
//!
//! [`VehicleMonitor`] is the single owner of everything the controller
//! believes about the truck: the latest and previous raw value of each
//! monitored signal, per-source freshness stamps, and the derived flags
//! the decision logic consumes. It is a plain struct threaded by `&mut`
//! through the tick loop — no statics, so tests run against isolated
//! instances.
//!
//! Every derived flag is recomputed only when its owning raw value is
//! updated by a validated report; `system_ready` additionally depends on
//! the freshness stamps and the current time. Consumers only ever see
//! [`VehicleSnapshot`] copies.

use log::info;

use crate::can::signals::{
    BatteryReport, LampReport, LockReport, ParkReport, PudLampRequest, VehicleLockStatus, park,
};
use crate::config::SystemConfig;

/// Sentinel for "no validated value seen yet". Deliberately not zero —
/// zero aliases a real enum value on every monitored signal.
pub const RAW_UNKNOWN: u8 = 0xFF;

/// Read-only copy of the aggregated state handed to consumers.
#[derive(Debug, Clone, Copy)]
pub struct VehicleSnapshot {
    pub pud_lamp: u8,
    pub lock_status: u8,
    pub park_status: u8,
    pub battery_soc: u8,

    pub is_unlocked: bool,
    pub is_parked: bool,
    pub lamp_should_be_on: bool,
    pub system_ready: bool,

    /// `Some(state)` while the bed light is manually overridden.
    pub lamp_override: Option<bool>,
}

/// Aggregates validated signal reports into vehicle state.
pub struct VehicleMonitor {
    // -- Raw signal values (current / previous) --
    pud_lamp: u8,
    prev_pud_lamp: u8,
    lock_status: u8,
    prev_lock_status: u8,
    park_status: u8,
    prev_park_status: u8,
    battery_soc: u8,
    prev_battery_soc: u8,

    // -- Per-source freshness (None = never seen) --
    last_lamp_ms: Option<u32>,
    last_lock_ms: Option<u32>,
    last_park_ms: Option<u32>,
    last_battery_ms: Option<u32>,

    // -- Derived flags --
    is_unlocked: bool,
    is_parked: bool,
    lamp_should_be_on: bool,
    system_ready: bool,

    // -- Manual bed-light override (double-click gesture) --
    lamp_override: Option<bool>,

    readiness_timeout_ms: u32,
}

impl VehicleMonitor {
    /// Construct with fail-safe defaults.
    ///
    /// Park status deliberately defaults to PARK (`is_parked = true`):
    /// absence of powertrain data must not read as "not parked" and lock
    /// the owner out of the toolbox feature they already rely on.
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            pud_lamp: RAW_UNKNOWN,
            prev_pud_lamp: RAW_UNKNOWN,
            lock_status: RAW_UNKNOWN,
            prev_lock_status: RAW_UNKNOWN,
            park_status: park::PARK,
            prev_park_status: park::PARK,
            battery_soc: RAW_UNKNOWN,
            prev_battery_soc: RAW_UNKNOWN,

            last_lamp_ms: None,
            last_lock_ms: None,
            last_park_ms: None,
            last_battery_ms: None,

            is_unlocked: false,
            is_parked: true,
            lamp_should_be_on: false,
            system_ready: false,

            lamp_override: None,

            readiness_timeout_ms: config.readiness_timeout_ms,
        }
    }

    // ── Per-source updates ────────────────────────────────────

    /// Apply a validated lamp report; recomputes only `lamp_should_be_on`.
    pub fn update_lamp(&mut self, report: &LampReport) {
        if !report.valid {
            return;
        }

        self.prev_pud_lamp = self.pud_lamp;
        self.pud_lamp = report.pud_lamp;
        self.last_lamp_ms = Some(report.timestamp_ms);

        self.lamp_should_be_on = matches!(
            PudLampRequest::from_raw(self.pud_lamp),
            Some(PudLampRequest::On | PudLampRequest::RampUp)
        );

        if self.prev_pud_lamp != self.pud_lamp {
            info!(
                "PudLamp changed: {} -> {} (bed light should be {})",
                PudLampRequest::name(self.prev_pud_lamp),
                PudLampRequest::name(self.pud_lamp),
                if self.lamp_should_be_on { "ON" } else { "OFF" }
            );
        }
    }

    /// Apply a validated lock report; recomputes only `is_unlocked`.
    pub fn update_lock(&mut self, report: &LockReport) {
        if !report.valid {
            return;
        }

        self.prev_lock_status = self.lock_status;
        self.lock_status = report.lock_status;
        self.last_lock_ms = Some(report.timestamp_ms);

        self.is_unlocked = matches!(
            VehicleLockStatus::from_raw(self.lock_status),
            Some(VehicleLockStatus::UnlockAll | VehicleLockStatus::UnlockDriver)
        );

        // Locking the truck takes the bed light back to automatic control.
        if !self.is_unlocked && self.lamp_override.is_some() {
            self.lamp_override = None;
            info!("Bed light manual override cleared by vehicle lock");
        }

        if self.prev_lock_status != self.lock_status {
            info!(
                "Vehicle lock changed: {} -> {} (unlocked: {})",
                VehicleLockStatus::name(self.prev_lock_status),
                VehicleLockStatus::name(self.lock_status),
                self.is_unlocked
            );
        }
    }

    /// Apply a validated park report; recomputes only `is_parked`.
    pub fn update_park(&mut self, report: &ParkReport) {
        if !report.valid {
            return;
        }

        self.prev_park_status = self.park_status;
        self.park_status = report.park_status;
        self.last_park_ms = Some(report.timestamp_ms);

        self.is_parked = self.park_status == park::PARK;

        if self.prev_park_status != self.park_status {
            info!(
                "Transmission park changed: {} -> {} (parked: {})",
                park::name(self.prev_park_status),
                park::name(self.park_status),
                self.is_parked
            );
        }
    }

    /// Apply a validated battery report; updates the stored percentage only
    /// (no derived flag owns the SOC).
    pub fn update_battery(&mut self, report: &BatteryReport) {
        if !report.valid {
            return;
        }

        self.prev_battery_soc = self.battery_soc;
        self.battery_soc = report.soc_percent;
        self.last_battery_ms = Some(report.timestamp_ms);

        if self.prev_battery_soc != RAW_UNKNOWN
            && self.prev_battery_soc.abs_diff(self.battery_soc) >= 5
        {
            info!(
                "Battery SOC changed: {}% -> {}%",
                self.prev_battery_soc, self.battery_soc
            );
        }
    }

    // ── Readiness ─────────────────────────────────────────────

    /// Re-derive `system_ready`: ready while ANY source produced a
    /// validated report within the readiness window. Returns `true` when
    /// the flag changed so the caller can report the transition once.
    pub fn recompute_readiness(&mut self, now_ms: u32) -> bool {
        let timeout = self.readiness_timeout_ms;
        let fresh =
            move |stamp: Option<u32>| stamp.is_some_and(|ts| now_ms.wrapping_sub(ts) < timeout);

        let ready = fresh(self.last_lamp_ms)
            || fresh(self.last_lock_ms)
            || fresh(self.last_park_ms)
            || fresh(self.last_battery_ms);

        let changed = ready != self.system_ready;
        self.system_ready = ready;

        if changed {
            info!(
                "System readiness changed: {} (lamp:{} lock:{} park:{} batt:{})",
                if ready { "READY" } else { "NOT_READY" },
                fresh(self.last_lamp_ms),
                fresh(self.last_lock_ms),
                fresh(self.last_park_ms),
                fresh(self.last_battery_ms),
            );
        }

        changed
    }

    /// Re-stamp every source as fresh. Called by the recovery path after
    /// the transport proves the channel works again — an intentional side
    /// effect: raw values keep their fail-safe defaults, only staleness is
    /// forgiven.
    pub fn reset_freshness(&mut self, now_ms: u32) {
        self.last_lamp_ms = Some(now_ms);
        self.last_lock_ms = Some(now_ms);
        self.last_park_ms = Some(now_ms);
        self.last_battery_ms = Some(now_ms);
        info!("Signal freshness stamps reset");
    }

    // ── Manual bed-light override ─────────────────────────────

    /// Toggle the manual bed-light override. Entering override picks the
    /// opposite of the current automatic state; toggling again flips it.
    pub fn toggle_lamp_override(&mut self) {
        match self.lamp_override {
            Some(state) => {
                self.lamp_override = Some(!state);
                info!(
                    "Bed light manual override toggled: {}",
                    if !state { "ON" } else { "OFF" }
                );
            }
            None => {
                let manual = !self.lamp_should_be_on;
                self.lamp_override = Some(manual);
                info!(
                    "Bed light manual override activated: {} (automatic was {})",
                    if manual { "ON" } else { "OFF" },
                    if self.lamp_should_be_on { "ON" } else { "OFF" }
                );
            }
        }
    }

    /// Drop the override and return to automatic control.
    pub fn clear_lamp_override(&mut self) {
        if self.lamp_override.take().is_some() {
            info!("Bed light manual override cleared, returning to automatic");
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_unlocked(&self) -> bool {
        self.is_unlocked
    }

    pub fn system_ready(&self) -> bool {
        self.system_ready
    }

    /// Read-only copy of the aggregated state.
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            pud_lamp: self.pud_lamp,
            lock_status: self.lock_status,
            park_status: self.park_status,
            battery_soc: self.battery_soc,
            is_unlocked: self.is_unlocked,
            is_parked: self.is_parked,
            lamp_should_be_on: self.lamp_should_be_on,
            system_ready: self.system_ready,
            lamp_override: self.lamp_override,
        }
    }
}
