//! GPIO / peripheral pin assignments for the Bedlink controller board.
//!
//! Single source of truth — every adapter references this module rather than
//! hard-coding pin numbers. Change a pin here and it propagates everywhere.
//!
//! Pin assignments match the AutoSport Labs ESP32-CAN-X2 carrier wiring.

#![allow(dead_code)] // Consumed only by the espidf adapters on target builds.

// ---------------------------------------------------------------------------
// Outputs (relay / LED drivers, all active HIGH)
// ---------------------------------------------------------------------------

/// Bed light relay.
pub const BEDLIGHT_GPIO: i32 = 5;
/// "Vehicle parked" indicator LED.
pub const PARKED_LED_GPIO: i32 = 16;
/// "Vehicle unlocked" indicator LED.
pub const UNLOCKED_LED_GPIO: i32 = 15;
/// Toolbox opener solenoid relay (pulsed, never held).
pub const TOOLBOX_OPENER_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Toolbox unlock button — momentary, active-low with internal pull-up.
pub const TOOLBOX_BUTTON_GPIO: i32 = 17;

// ---------------------------------------------------------------------------
// TWAI (CAN) controller — X1/CAN1 interface on the carrier board
// ---------------------------------------------------------------------------
//
// Both TX and RX pins are wired to the onboard transceiver even though the
// controller runs in listen-only mode; TX/RX name the ESP32↔transceiver
// connection, not CAN_H/CAN_L.

pub const CAN_TX_GPIO: i32 = 7;
pub const CAN_RX_GPIO: i32 = 6;

/// 500 kbit/s — the HS-CAN rate of the Gen14 body bus.
pub const CAN_BITRATE: u32 = 500_000;
