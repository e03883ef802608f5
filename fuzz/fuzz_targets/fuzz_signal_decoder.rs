//! Fuzz target: CAN signal decoders.
//!
//! Drives arbitrary frame shapes and payloads through all four decoders
//! and asserts that they never panic and that a `valid` report always
//! carries an in-range value — the safe-garbage contract of the bit codec
//! must hold under any input.
//!
//! cargo fuzz run fuzz_signal_decoder

#![no_main]

use bedlink::can::{signals, CanFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: &[u8]| {
    if input.len() < 13 {
        return;
    }

    let id = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
    let length = input[4] % 9;
    let mut data = [0u8; 8];
    data.copy_from_slice(&input[5..13]);

    let frame = CanFrame { id, length, data };

    let lamp = signals::decode_lamp_status(&frame, 0);
    if lamp.valid {
        assert!(lamp.pud_lamp <= 3);
    }

    let lock = signals::decode_lock_status(&frame, 0);
    if lock.valid {
        assert!(lock.lock_status <= 3);
    }

    let park = signals::decode_park_status(&frame, 0);
    if park.valid {
        assert!(park.park_status <= 15);
    }

    let battery = signals::decode_battery_soc(&frame, 0);
    if battery.valid {
        assert!(battery.soc_percent <= 127);
    }
});
