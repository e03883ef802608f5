//! Application layer — ports, commands, events and the orchestrating
//! service.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
