//! Bedlink Firmware — Main Entry Point
//!
//! Hexagonal architecture over a cooperative polling super-loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  TwaiTransport     GpioAdapter     LogEventSink  Esp32Time     │
//! │  (FrameSource)     (ActuatorPort)  (EventSink)   (clock)       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  decode · aggregate · gesture · decide · health        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The loop never blocks on the bus, the button or a timer: every tick
//! samples its inputs, runs to completion and sleeps for the loop delay.
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
mod button;
mod can;
mod control;
mod health;
mod pins;
mod vehicle;

pub mod app;
mod adapters;
mod diagnostics;
mod drivers;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{debug, info};

use adapters::gpio::GpioAdapter;
use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::time::Esp32TimeAdapter;
use adapters::twai::TwaiTransport;
use app::service::AppService;
use config::SystemConfig;

/// Loop pacing — short enough that the 100 ms output cadence and 50 ms
/// debounce window always get fresh samples.
const LOOP_DELAY_MS: u64 = 10;
const HEARTBEAT_INTERVAL_MS: u32 = 10_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("=== Bedlink v{} — F-150 Gen14 CAN bed controller ===", env!("CARGO_PKG_VERSION"));

    let watchdog = drivers::watchdog::Watchdog::new();
    let time = Esp32TimeAdapter::new();
    let config = SystemConfig::default();

    // ── 2. Construct adapters ─────────────────────────────────
    let transport = match TwaiTransport::new() {
        Ok(t) => t,
        Err(e) => anyhow::bail!("TWAI init failed: {}", e),
    };
    let gpio = match GpioAdapter::new() {
        Ok(g) => g,
        Err(e) => anyhow::bail!("GPIO init failed: {}", e),
    };
    let mut hw = HardwareAdapter::new(transport, gpio);
    let mut sink = LogEventSink::new();

    // ── 3. Construct app service ──────────────────────────────
    let mut app = AppService::new(config, time.now_ms());
    app.start(&mut sink);

    info!("System ready. Entering control loop.");

    // ── 4. Control loop ───────────────────────────────────────
    let mut last_heartbeat = time.now_ms();

    loop {
        let now_ms = time.now_ms();

        app.tick(now_ms, diagnostics::free_heap_bytes(), &mut hw, &mut sink);

        // The TWDT is fed even after safe shutdown: the latched state is
        // intentional, a hung loop is not.
        watchdog.feed();

        if now_ms.wrapping_sub(last_heartbeat) >= HEARTBEAT_INTERVAL_MS {
            debug!(
                "Heartbeat — uptime={}s ticks={} health={:?} heap={}B",
                time.uptime_secs(),
                app.tick_count(),
                app.health_state(),
                diagnostics::free_heap_bytes(),
            );
            last_heartbeat = now_ms;
        }

        std::thread::sleep(std::time::Duration::from_millis(LOOP_DELAY_MS));
    }
}
