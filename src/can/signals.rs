//! Per-message signal decoders.
//!
//! One pure function per monitored message. Each validates the frame shape
//! (expected ID, 8 data bytes), extracts the signal fields at their fixed
//! bit coordinates and returns a validity-flagged report stamped with the
//! caller's clock. An invalid report carries no meaningful numeric fields
//! and must not be consumed downstream — the `valid` flag is the sole
//! error-signalling mechanism on this path.
//!
//! Bit coordinates were validated against captured frames from the vehicle
//! (lock/unlock sequences, lamp ON/RAMP_UP/RAMP_DOWN transitions, known SOC
//! readings); they are the authoritative map for this bus.

use log::{debug, warn};

use super::bits;
use super::{
    BATTERY_MGMT_3_FD1_ID, BCM_LAMP_STAT_FD1_ID, CanFrame, LOCKING_SYSTEMS_2_FD1_ID,
    POWERTRAIN_DATA_10_ID,
};

// ---------------------------------------------------------------------------
// Signal value vocabularies
// ---------------------------------------------------------------------------

/// PudLamp_D_Rq — BCM request for the puddle/bed lamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PudLampRequest {
    Off = 0,
    On = 1,
    RampUp = 2,
    RampDown = 3,
}

impl PudLampRequest {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::On),
            2 => Some(Self::RampUp),
            3 => Some(Self::RampDown),
            _ => None,
        }
    }

    pub fn name(raw: u8) -> &'static str {
        match raw {
            0 => "OFF",
            1 => "ON",
            2 => "RAMP_UP",
            3 => "RAMP_DOWN",
            _ => "UNKNOWN",
        }
    }
}

/// Veh_Lock_Status — central locking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VehicleLockStatus {
    LockDouble = 0,
    LockAll = 1,
    UnlockAll = 2,
    UnlockDriver = 3,
}

impl VehicleLockStatus {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::LockDouble),
            1 => Some(Self::LockAll),
            2 => Some(Self::UnlockAll),
            3 => Some(Self::UnlockDriver),
            _ => None,
        }
    }

    pub fn name(raw: u8) -> &'static str {
        match raw {
            0 => "LOCK_DBL",
            1 => "LOCK_ALL",
            2 => "UNLOCK_ALL",
            3 => "UNLOCK_DRV",
            _ => "UNKNOWN",
        }
    }
}

/// TrnPrkSys_D_Actl values. The field is 4 bits wide; only PARK matters to
/// the decision logic, the rest are carried for logging.
pub mod park {
    pub const UNKNOWN: u8 = 0;
    pub const PARK: u8 = 1;
    pub const TRANSITION_CLOSE_TO_PARK: u8 = 2;
    pub const AT_NO_SPRING: u8 = 3;
    pub const TRANSITION_CLOSE_TO_OUT_OF_PARK: u8 = 4;
    pub const OUT_OF_PARK: u8 = 5;

    pub fn name(raw: u8) -> &'static str {
        match raw {
            UNKNOWN => "UNKNOWN",
            PARK => "PARK",
            TRANSITION_CLOSE_TO_PARK => "CLOSE_TO_PARK",
            AT_NO_SPRING => "AT_NO_SPRING",
            TRANSITION_CLOSE_TO_OUT_OF_PARK => "CLOSE_TO_OUT_OF_PARK",
            OUT_OF_PARK => "OUT_OF_PARK",
            _ => "OTHER",
        }
    }
}

// ---------------------------------------------------------------------------
// Bit coordinates (DBC MSB start bit, length) — capture-validated
// ---------------------------------------------------------------------------

const PUD_LAMP_START: u8 = 11;
const PUD_LAMP_LEN: u8 = 2;
const ILLUM_ENTRY_START: u8 = 63;
const ILLUM_ENTRY_LEN: u8 = 1;
const COURTESY_LIGHT_START: u8 = 49;
const COURTESY_LIGHT_LEN: u8 = 1;

const LOCK_STATUS_START: u8 = 34;
const LOCK_STATUS_LEN: u8 = 2;

const PARK_STATUS_START: u8 = 31;
const PARK_STATUS_LEN: u8 = 4;

const BATT_SOC_START: u8 = 22;
const BATT_SOC_LEN: u8 = 7;

// Documented upper bounds; anything above marks the report invalid even
// though the bit width already constrains most fields. Guards against a
// misconfigured offset silently producing plausible garbage.
const PUD_LAMP_MAX: u8 = 3;
const LOCK_STATUS_MAX: u8 = 3;
const PARK_STATUS_MAX: u8 = 15;
const BATT_SOC_MAX: u8 = 127;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Decoded BCM_Lamp_Stat_FD1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LampReport {
    pub pud_lamp: u8,
    pub illuminated_entry: u8,
    pub courtesy_light: u8,
    pub valid: bool,
    pub timestamp_ms: u32,
}

/// Decoded Locking_Systems_2_FD1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LockReport {
    pub lock_status: u8,
    pub valid: bool,
    pub timestamp_ms: u32,
}

/// Decoded PowertrainData_10.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParkReport {
    pub park_status: u8,
    pub valid: bool,
    pub timestamp_ms: u32,
}

/// Decoded Battery_Mgmt_3_FD1.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatteryReport {
    pub soc_percent: u8,
    pub valid: bool,
    pub timestamp_ms: u32,
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

fn frame_matches(frame: &CanFrame, expected_id: u32, msg: &str) -> bool {
    if frame.id != expected_id || frame.length != 8 {
        warn!(
            "Invalid {} frame: id=0x{:03X}, length={}",
            msg, frame.id, frame.length
        );
        return false;
    }
    true
}

/// Decode BCM_Lamp_Stat_FD1 (0x3C3).
pub fn decode_lamp_status(frame: &CanFrame, now_ms: u32) -> LampReport {
    if !frame_matches(frame, BCM_LAMP_STAT_FD1_ID, "BCM_Lamp_Stat_FD1") {
        return LampReport::default();
    }

    let pud_lamp = bits::extract(&frame.data, PUD_LAMP_START, PUD_LAMP_LEN) as u8;
    let illuminated_entry = bits::extract(&frame.data, ILLUM_ENTRY_START, ILLUM_ENTRY_LEN) as u8;
    let courtesy_light = bits::extract(&frame.data, COURTESY_LIGHT_START, COURTESY_LIGHT_LEN) as u8;

    let valid = pud_lamp <= PUD_LAMP_MAX;
    if valid {
        debug!(
            "BCM_Lamp_Stat_FD1: PudLamp={} IllumEntry={} Courtesy={}",
            PudLampRequest::name(pud_lamp),
            illuminated_entry,
            courtesy_light
        );
    }

    LampReport {
        pud_lamp,
        illuminated_entry,
        courtesy_light,
        valid,
        timestamp_ms: now_ms,
    }
}

/// Decode Locking_Systems_2_FD1 (0x331).
pub fn decode_lock_status(frame: &CanFrame, now_ms: u32) -> LockReport {
    if !frame_matches(frame, LOCKING_SYSTEMS_2_FD1_ID, "Locking_Systems_2_FD1") {
        return LockReport::default();
    }

    let lock_status = bits::extract(&frame.data, LOCK_STATUS_START, LOCK_STATUS_LEN) as u8;

    let valid = lock_status <= LOCK_STATUS_MAX;
    if valid {
        debug!(
            "Locking_Systems_2_FD1: VehLockStatus={}",
            VehicleLockStatus::name(lock_status)
        );
    }

    LockReport {
        lock_status,
        valid,
        timestamp_ms: now_ms,
    }
}

/// Decode PowertrainData_10 (0x176).
pub fn decode_park_status(frame: &CanFrame, now_ms: u32) -> ParkReport {
    if !frame_matches(frame, POWERTRAIN_DATA_10_ID, "PowertrainData_10") {
        return ParkReport::default();
    }

    let park_status = bits::extract(&frame.data, PARK_STATUS_START, PARK_STATUS_LEN) as u8;

    let valid = park_status <= PARK_STATUS_MAX;
    if valid {
        debug!("PowertrainData_10: TrnPrkSys={}", park::name(park_status));
    }

    ParkReport {
        park_status,
        valid,
        timestamp_ms: now_ms,
    }
}

/// Decode Battery_Mgmt_3_FD1 (0x43C).
pub fn decode_battery_soc(frame: &CanFrame, now_ms: u32) -> BatteryReport {
    if !frame_matches(frame, BATTERY_MGMT_3_FD1_ID, "Battery_Mgmt_3_FD1") {
        return BatteryReport::default();
    }

    let soc_percent = bits::extract(&frame.data, BATT_SOC_START, BATT_SOC_LEN) as u8;

    let valid = soc_percent <= BATT_SOC_MAX;
    if valid {
        debug!("Battery_Mgmt_3_FD1: BattSOC={}%", soc_percent);
    }

    BatteryReport {
        soc_percent,
        valid,
        timestamp_ms: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lamp_frame(data: [u8; 8]) -> CanFrame {
        CanFrame::new(BCM_LAMP_STAT_FD1_ID, data)
    }

    #[test]
    fn lamp_on_pattern_decodes() {
        let report = decode_lamp_status(
            &lamp_frame([0x40, 0xC4, 0, 0, 0, 0, 0x81, 0]),
            1000,
        );
        assert!(report.valid);
        assert_eq!(report.pud_lamp, PudLampRequest::On as u8);
        assert_eq!(report.timestamp_ms, 1000);
    }

    #[test]
    fn lamp_ramp_patterns_decode() {
        let up = decode_lamp_status(&lamp_frame([0x40, 0xC8, 0, 0, 0, 0, 0x80, 0x40]), 0);
        assert!(up.valid);
        assert_eq!(up.pud_lamp, PudLampRequest::RampUp as u8);

        let down = decode_lamp_status(&lamp_frame([0x40, 0xCC, 0, 0, 0, 0, 0x80, 0]), 0);
        assert!(down.valid);
        assert_eq!(down.pud_lamp, PudLampRequest::RampDown as u8);
    }

    #[test]
    fn lamp_rejects_wrong_id_and_length() {
        let wrong_id = CanFrame::new(0x3C4, [0x40, 0xC4, 0, 0, 0, 0, 0, 0]);
        assert!(!decode_lamp_status(&wrong_id, 0).valid);

        let mut short = lamp_frame([0x40, 0xC4, 0, 0, 0, 0, 0, 0]);
        short.length = 7;
        assert!(!decode_lamp_status(&short, 0).valid);
    }

    #[test]
    fn lock_all_and_unlock_all_patterns_decode() {
        let lock = decode_lock_status(
            &CanFrame::new(
                LOCKING_SYSTEMS_2_FD1_ID,
                [0x00, 0x0F, 0x00, 0x00, 0x02, 0xC7, 0x44, 0x10],
            ),
            0,
        );
        assert!(lock.valid);
        assert_eq!(lock.lock_status, VehicleLockStatus::LockAll as u8);

        let unlock = decode_lock_status(
            &CanFrame::new(
                LOCKING_SYSTEMS_2_FD1_ID,
                [0x00, 0x0F, 0x00, 0x00, 0x05, 0xC2, 0x44, 0x10],
            ),
            0,
        );
        assert!(unlock.valid);
        assert_eq!(unlock.lock_status, VehicleLockStatus::UnlockAll as u8);
    }

    #[test]
    fn lock_rejects_wrong_shape() {
        let wrong_id = CanFrame::new(0x330, [0, 0x0F, 0, 0, 0x02, 0xC7, 0x44, 0x10]);
        assert!(!decode_lock_status(&wrong_id, 0).valid);

        let mut short = CanFrame::new(LOCKING_SYSTEMS_2_FD1_ID, [0; 8]);
        short.length = 4;
        assert!(!decode_lock_status(&short, 0).valid);
    }

    #[test]
    fn park_pattern_decodes() {
        for data in [
            [0x00, 0x00, 0x00, 0x10, 0, 0, 0, 0],
            [0x00, 0x01, 0xFD, 0x10, 0, 0, 0, 0],
            [0x00, 0x0F, 0xEF, 0x10, 0, 0, 0, 0],
        ] {
            let report = decode_park_status(&CanFrame::new(POWERTRAIN_DATA_10_ID, data), 0);
            assert!(report.valid);
            assert_eq!(report.park_status, park::PARK);
        }
    }

    #[test]
    fn park_rejects_wrong_shape() {
        let wrong_id = CanFrame::new(0x177, [0, 0, 0, 0x10, 0, 0, 0, 0]);
        assert!(!decode_park_status(&wrong_id, 0).valid);
    }

    #[test]
    fn battery_soc_patterns_decode() {
        let soc65 = decode_battery_soc(
            &CanFrame::new(
                BATTERY_MGMT_3_FD1_ID,
                [0x32, 0x00, 0x41, 0x57, 0x40, 0xD9, 0x88, 0xC8],
            ),
            0,
        );
        assert!(soc65.valid);
        assert_eq!(soc65.soc_percent, 65);

        let soc66 = decode_battery_soc(
            &CanFrame::new(
                BATTERY_MGMT_3_FD1_ID,
                [0x32, 0x00, 0x42, 0x57, 0x40, 0xD9, 0x88, 0xC8],
            ),
            0,
        );
        assert!(soc66.valid);
        assert_eq!(soc66.soc_percent, 66);
    }

    #[test]
    fn battery_rejects_wrong_shape() {
        let wrong_id = CanFrame::new(0x43D, [0x32, 0, 0x41, 0, 0, 0, 0, 0]);
        assert!(!decode_battery_soc(&wrong_id, 0).valid);
    }

    #[test]
    fn value_enums_round_trip_raw() {
        for raw in 0..=3u8 {
            assert_eq!(PudLampRequest::from_raw(raw).unwrap() as u8, raw);
            assert_eq!(VehicleLockStatus::from_raw(raw).unwrap() as u8, raw);
        }
        assert!(PudLampRequest::from_raw(4).is_none());
        assert!(VehicleLockStatus::from_raw(255).is_none());
    }
}
