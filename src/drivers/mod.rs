//! Low-level drivers shared by the adapters.

pub mod relay;
pub mod watchdog;
