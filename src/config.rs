//! System configuration parameters
//!
//! All tunable parameters for the Bedlink controller.
//! Values can be overridden at runtime via the serial diagnostic channel.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Button ---
    /// Debounce time (milliseconds) before a raw level change is committed
    pub debounce_ms: u32,
    /// Maximum gap (milliseconds) between two presses for a double-click
    pub double_click_window_ms: u32,
    /// Hold time (milliseconds) before a press counts as "held"
    pub hold_threshold_ms: u32,

    // --- Actuation ---
    /// How long the toolbox opener solenoid stays energised (milliseconds)
    pub toolbox_opener_duration_ms: u32,
    /// Minimum interval between output re-evaluations (milliseconds)
    pub output_update_interval_ms: u32,

    // --- Readiness ---
    /// A signal source is fresh if it produced a validated record within
    /// this window (milliseconds); the system is ready while any source
    /// is fresh
    pub readiness_timeout_ms: u32,

    // --- Frame intake ---
    /// Upper bound on frames drained from the transport per tick
    pub max_frames_per_tick: u32,

    // --- Health watchdog ---
    /// Interval between health evaluations (milliseconds)
    pub health_check_interval_ms: u32,
    /// No validated frame activity for this long trips the watchdog (ms)
    pub activity_timeout_ms: u32,
    /// System not ready for this long trips the watchdog (ms)
    pub ready_timeout_ms: u32,
    /// Minimum interval between recovery attempts (milliseconds)
    pub recovery_interval_ms: u32,
    /// Critical-error count that trips the watchdog; twice this count
    /// forces safe shutdown
    pub critical_error_threshold: u32,
    /// Free heap below this is treated as resource pressure (bytes)
    pub min_free_heap_bytes: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Button
            debounce_ms: 50,
            double_click_window_ms: 300,
            hold_threshold_ms: 1000,

            // Actuation
            toolbox_opener_duration_ms: 500,
            output_update_interval_ms: 100,

            // Readiness — a parked truck lets most modules sleep, so the
            // window is minutes, not seconds
            readiness_timeout_ms: 600_000,

            // Frame intake
            max_frames_per_tick: 10,

            // Health watchdog
            health_check_interval_ms: 60_000,
            activity_timeout_ms: 30_000,
            ready_timeout_ms: 60_000,
            recovery_interval_ms: 5_000,
            critical_error_threshold: 10,
            min_free_heap_bytes: 10_240,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.debounce_ms > 0);
        assert!(c.double_click_window_ms > c.debounce_ms);
        assert!(c.hold_threshold_ms > c.double_click_window_ms);
        assert!(c.toolbox_opener_duration_ms > 0);
        assert!(c.max_frames_per_tick > 0);
        assert!(c.critical_error_threshold > 0);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.debounce_ms, c2.debounce_ms);
        assert_eq!(c.readiness_timeout_ms, c2.readiness_timeout_ms);
        assert_eq!(c.critical_error_threshold, c2.critical_error_threshold);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(
            c.output_update_interval_ms < c.readiness_timeout_ms,
            "outputs must re-evaluate well inside the readiness window"
        );
        assert!(
            c.recovery_interval_ms < c.health_check_interval_ms,
            "recovery must be able to run between health checks"
        );
        assert!(
            c.activity_timeout_ms <= c.ready_timeout_ms,
            "activity loss should trip before the ready timeout"
        );
    }
}
