//! Health watchdog.
//!
//! Periodically evaluates system health and escalates through three tiers:
//!
//! 1. **Triggered** — a fault condition was observed; a structured health
//!    report is logged exactly once per transition (not on every poll).
//! 2. **Recovering** — bounded recovery actions run, throttled to the
//!    configured interval. The actions themselves (transport recovery,
//!    freshness reset, pin reassertion, counter clearing) are sequenced by
//!    the application service; this module only owns the policy.
//! 3. **SafeShutdown** — the critical-error counter passed twice the
//!    trigger threshold despite recovery. All actuators are forced off and
//!    the state machine halts. Terminal: only an external reset restores
//!    operation, because the controller drives a physical solenoid.
//!
//! Fault conditions accumulate in a bitmask so simultaneous faults are
//! tracked individually; `Triggered → Healthy` requires every condition to
//! clear at the same evaluation.

use core::fmt;

use log::{debug, error, info};

use crate::config::SystemConfig;

// ---------------------------------------------------------------------------
// Fault conditions
// ---------------------------------------------------------------------------

/// Conditions evaluated by the watchdog, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthFault {
    /// No validated frame activity inside the activity window.
    NoFrameActivity = 0b0000_0001,
    /// `system_ready` has been false for longer than the ready window.
    NotReady = 0b0000_0010,
    /// Critical-error counter reached the trigger threshold.
    CriticalErrors = 0b0000_0100,
    /// Free heap dropped below the configured floor.
    LowMemory = 0b0000_1000,
}

impl HealthFault {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for HealthFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoFrameActivity => write!(f, "no frame activity"),
            Self::NotReady => write!(f, "system not ready"),
            Self::CriticalErrors => write!(f, "critical errors"),
            Self::LowMemory => write!(f, "low memory"),
        }
    }
}

// ---------------------------------------------------------------------------
// Counters and report
// ---------------------------------------------------------------------------

/// Monotonic error counters plus liveness stamps. Counters are reset only
/// by explicit recovery success or a diagnostic command, never silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCounters {
    pub transport_errors: u32,
    pub decode_errors: u32,
    pub critical_errors: u32,
    pub last_data_activity_ms: u32,
    pub last_known_good_ms: u32,
    pub watchdog_triggered: bool,
    pub recovery_in_progress: bool,
}

/// Point-in-time health report emitted on a `Healthy → Triggered`
/// transition.
#[derive(Debug, Clone, Copy)]
pub struct HealthReport {
    pub fault_flags: u8,
    pub transport_errors: u32,
    pub decode_errors: u32,
    pub critical_errors: u32,
    pub ms_since_activity: u32,
    pub ms_since_ok: u32,
    pub free_heap_bytes: u32,
}

/// Watchdog tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Triggered,
    Recovering,
    SafeShutdown,
}

/// State-machine transition reported by [`HealthMonitor::check`].
#[derive(Debug, Clone, Copy)]
pub enum HealthTransition {
    Triggered(HealthReport),
    Recovered,
    SafeShutdown,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct HealthMonitor {
    state: HealthState,
    counters: HealthCounters,
    last_check_ms: u32,
    last_recovery_ms: Option<u32>,

    check_interval_ms: u32,
    activity_timeout_ms: u32,
    ready_timeout_ms: u32,
    recovery_interval_ms: u32,
    critical_error_threshold: u32,
    min_free_heap_bytes: u32,
}

impl HealthMonitor {
    pub fn new(config: &SystemConfig, now_ms: u32) -> Self {
        Self {
            state: HealthState::Healthy,
            counters: HealthCounters {
                last_data_activity_ms: now_ms,
                last_known_good_ms: now_ms,
                ..HealthCounters::default()
            },
            last_check_ms: now_ms,
            last_recovery_ms: None,
            check_interval_ms: config.health_check_interval_ms,
            activity_timeout_ms: config.activity_timeout_ms,
            ready_timeout_ms: config.ready_timeout_ms,
            recovery_interval_ms: config.recovery_interval_ms,
            critical_error_threshold: config.critical_error_threshold,
            min_free_heap_bytes: config.min_free_heap_bytes,
        }
    }

    // ── Observations fed by the tick loop ─────────────────────

    /// A validated frame was drained from the transport.
    pub fn note_frame_activity(&mut self, now_ms: u32) {
        self.counters.last_data_activity_ms = now_ms;
    }

    /// Transport connected and system ready at this instant.
    pub fn note_system_ok(&mut self, now_ms: u32) {
        self.counters.last_known_good_ms = now_ms;
    }

    /// A monitored frame failed decoding.
    pub fn note_decode_error(&mut self) {
        self.counters.decode_errors = self.counters.decode_errors.saturating_add(1);
    }

    /// Transport-reported errors (delta since the last observation).
    pub fn note_transport_errors(&mut self, count: u32) {
        self.counters.transport_errors = self.counters.transport_errors.saturating_add(count);
    }

    /// An unrecoverable fault on the frame-processing path.
    pub fn note_critical_error(&mut self) {
        self.counters.critical_errors = self.counters.critical_errors.saturating_add(1);
    }

    // ── Periodic evaluation ───────────────────────────────────

    /// Evaluate health on the configured cadence. Returns a transition
    /// when the tier changed; `None` on a quiet check or between checks.
    pub fn check(&mut self, now_ms: u32, free_heap_bytes: u32) -> Option<HealthTransition> {
        if now_ms.wrapping_sub(self.last_check_ms) < self.check_interval_ms {
            return None;
        }
        self.last_check_ms = now_ms;

        if self.state == HealthState::SafeShutdown {
            return None;
        }

        // Escalation: recovery has had its chance once we are past the
        // trigger tier; double the threshold means it is not working.
        if self.state != HealthState::Healthy
            && self.counters.critical_errors >= self.critical_error_threshold * 2
        {
            error!(
                "Critical error count {} exceeds shutdown threshold, entering safe shutdown",
                self.counters.critical_errors
            );
            self.state = HealthState::SafeShutdown;
            self.counters.recovery_in_progress = false;
            return Some(HealthTransition::SafeShutdown);
        }

        let ms_since_activity = now_ms.wrapping_sub(self.counters.last_data_activity_ms);
        let ms_since_ok = now_ms.wrapping_sub(self.counters.last_known_good_ms);

        let mut flags = 0u8;
        if ms_since_activity > self.activity_timeout_ms {
            flags |= HealthFault::NoFrameActivity.mask();
        }
        if ms_since_ok > self.ready_timeout_ms {
            flags |= HealthFault::NotReady.mask();
        }
        if self.counters.critical_errors >= self.critical_error_threshold {
            flags |= HealthFault::CriticalErrors.mask();
        }
        if free_heap_bytes < self.min_free_heap_bytes {
            flags |= HealthFault::LowMemory.mask();
        }

        if flags != 0 && self.state == HealthState::Healthy {
            self.state = HealthState::Triggered;
            self.counters.watchdog_triggered = true;
            self.counters.recovery_in_progress = true;

            let report = HealthReport {
                fault_flags: flags,
                transport_errors: self.counters.transport_errors,
                decode_errors: self.counters.decode_errors,
                critical_errors: self.counters.critical_errors,
                ms_since_activity,
                ms_since_ok,
                free_heap_bytes,
            };
            error!("=== WATCHDOG TRIGGERED — entering recovery mode ===");
            error!(
                "Health report: faults=0b{:04b} transport={} decode={} critical={} \
                 activity={}ms ago ok={}ms ago heap={}B",
                flags,
                report.transport_errors,
                report.decode_errors,
                report.critical_errors,
                ms_since_activity,
                ms_since_ok,
                free_heap_bytes
            );
            return Some(HealthTransition::Triggered(report));
        }

        if flags == 0 && self.state != HealthState::Healthy {
            self.state = HealthState::Healthy;
            self.counters.watchdog_triggered = false;
            self.counters.recovery_in_progress = false;
            self.last_recovery_ms = None;
            info!("=== WATCHDOG CLEARED — recovery successful ===");
            return Some(HealthTransition::Recovered);
        }

        if flags == 0 {
            debug!(
                "Watchdog: healthy — transport={} decode={} critical={} heap={}B",
                self.counters.transport_errors,
                self.counters.decode_errors,
                self.counters.critical_errors,
                free_heap_bytes
            );
        }

        None
    }

    /// True when a throttled recovery attempt should run now. Marks the
    /// attempt as started.
    pub fn recovery_due(&mut self, now_ms: u32) -> bool {
        if !matches!(self.state, HealthState::Triggered | HealthState::Recovering) {
            return false;
        }
        let due = match self.last_recovery_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.recovery_interval_ms,
        };
        if due {
            self.last_recovery_ms = Some(now_ms);
            self.state = HealthState::Recovering;
        }
        due
    }

    // ── Counter management ────────────────────────────────────

    /// Transport came back: forget its error history.
    pub fn clear_transport_errors(&mut self) {
        if self.counters.transport_errors > 0 {
            info!(
                "Clearing transport error counter (was {})",
                self.counters.transport_errors
            );
            self.counters.transport_errors = 0;
        }
    }

    /// Channel proven good: forget decode errors.
    pub fn clear_decode_errors(&mut self) {
        if self.counters.decode_errors > 0 {
            info!(
                "Clearing decode error counter (was {})",
                self.counters.decode_errors
            );
            self.counters.decode_errors = 0;
        }
    }

    /// Diagnostic command: zero every counter and refresh the stamps.
    pub fn reset_counters(&mut self, now_ms: u32) {
        info!("Health counters reset by command");
        self.counters.transport_errors = 0;
        self.counters.decode_errors = 0;
        self.counters.critical_errors = 0;
        self.counters.last_data_activity_ms = now_ms;
        self.counters.last_known_good_ms = now_ms;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn counters(&self) -> &HealthCounters {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAP_OK: u32 = 200_000;
    const CHECK: u32 = 60_000;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(&SystemConfig::default(), 0)
    }

    #[test]
    fn quiet_system_stays_healthy() {
        let mut m = monitor();
        let mut now = 0;
        for _ in 0..5 {
            now += CHECK;
            m.note_frame_activity(now);
            m.note_system_ok(now);
            assert!(m.check(now, HEAP_OK).is_none());
            assert_eq!(m.state(), HealthState::Healthy);
        }
    }

    #[test]
    fn checks_are_throttled_to_the_interval() {
        let mut m = monitor();
        for _ in 0..10 {
            m.note_critical_error();
        }
        assert!(m.check(CHECK - 1, HEAP_OK).is_none(), "between checks");
        assert!(matches!(
            m.check(CHECK, HEAP_OK),
            Some(HealthTransition::Triggered(_))
        ));
    }

    #[test]
    fn trigger_fires_exactly_once() {
        let mut m = monitor();
        let threshold = SystemConfig::default().critical_error_threshold;
        for _ in 0..threshold {
            m.note_critical_error();
        }

        let first = m.check(CHECK, HEAP_OK);
        assert!(matches!(first, Some(HealthTransition::Triggered(_))));
        assert_eq!(m.state(), HealthState::Triggered);
        assert!(m.counters().watchdog_triggered);

        // Same fault on the next evaluation: no duplicate report.
        m.note_frame_activity(CHECK * 2);
        m.note_system_ok(CHECK * 2);
        assert!(m.check(CHECK * 2, HEAP_OK).is_none());
    }

    #[test]
    fn triggered_report_carries_the_fault_flags() {
        let mut m = monitor();
        // No activity for well past both windows, plus low memory.
        let Some(HealthTransition::Triggered(report)) = m.check(CHECK * 2, 1024) else {
            panic!("expected trigger");
        };
        assert_ne!(report.fault_flags & HealthFault::NoFrameActivity.mask(), 0);
        assert_ne!(report.fault_flags & HealthFault::NotReady.mask(), 0);
        assert_ne!(report.fault_flags & HealthFault::LowMemory.mask(), 0);
        assert_eq!(report.fault_flags & HealthFault::CriticalErrors.mask(), 0);
        assert_eq!(report.free_heap_bytes, 1024);
    }

    #[test]
    fn recovers_only_when_every_condition_clears() {
        let mut m = monitor();
        assert!(matches!(
            m.check(CHECK * 2, HEAP_OK),
            Some(HealthTransition::Triggered(_))
        ));

        // Activity restored but readiness still stale: no recovery.
        m.note_frame_activity(CHECK * 3);
        assert!(m.check(CHECK * 3, HEAP_OK).is_none());
        assert_ne!(m.state(), HealthState::Healthy);

        // Everything fresh: recovered.
        m.note_frame_activity(CHECK * 4);
        m.note_system_ok(CHECK * 4);
        assert!(matches!(
            m.check(CHECK * 4, HEAP_OK),
            Some(HealthTransition::Recovered)
        ));
        assert_eq!(m.state(), HealthState::Healthy);
        assert!(!m.counters().watchdog_triggered);
    }

    #[test]
    fn double_threshold_escalates_to_safe_shutdown() {
        let mut m = monitor();
        let threshold = SystemConfig::default().critical_error_threshold;

        for _ in 0..threshold {
            m.note_critical_error();
        }
        assert!(matches!(
            m.check(CHECK, HEAP_OK),
            Some(HealthTransition::Triggered(_))
        ));

        for _ in 0..threshold {
            m.note_critical_error();
        }
        assert!(matches!(
            m.check(CHECK * 2, HEAP_OK),
            Some(HealthTransition::SafeShutdown)
        ));
        assert_eq!(m.state(), HealthState::SafeShutdown);
    }

    #[test]
    fn safe_shutdown_is_terminal() {
        let mut m = monitor();
        let threshold = SystemConfig::default().critical_error_threshold;
        for _ in 0..threshold * 2 {
            m.note_critical_error();
        }
        let _ = m.check(CHECK, HEAP_OK);
        let _ = m.check(CHECK * 2, HEAP_OK);
        assert_eq!(m.state(), HealthState::SafeShutdown);

        // Even a fully healthy picture does not bring it back.
        m.reset_counters(CHECK * 3);
        m.note_frame_activity(CHECK * 3);
        m.note_system_ok(CHECK * 3);
        assert!(m.check(CHECK * 3, HEAP_OK).is_none());
        assert_eq!(m.state(), HealthState::SafeShutdown);
        assert!(!m.recovery_due(CHECK * 3));
    }

    #[test]
    fn recovery_attempts_are_throttled() {
        let interval = SystemConfig::default().recovery_interval_ms;
        let mut m = monitor();
        let _ = m.check(CHECK * 2, HEAP_OK); // trigger via stale data

        assert!(m.recovery_due(CHECK * 2), "first attempt runs immediately");
        assert_eq!(m.state(), HealthState::Recovering);
        assert!(!m.recovery_due(CHECK * 2 + interval - 1));
        assert!(m.recovery_due(CHECK * 2 + interval));
    }

    #[test]
    fn recovery_not_due_while_healthy() {
        let mut m = monitor();
        assert!(!m.recovery_due(CHECK));
    }

    #[test]
    fn counter_clears_are_observable() {
        let mut m = monitor();
        m.note_transport_errors(3);
        m.note_decode_error();
        assert_eq!(m.counters().transport_errors, 3);
        assert_eq!(m.counters().decode_errors, 1);

        m.clear_transport_errors();
        m.clear_decode_errors();
        assert_eq!(m.counters().transport_errors, 0);
        assert_eq!(m.counters().decode_errors, 0);
    }
}
