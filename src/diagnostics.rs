//! Runtime resource probes.
//!
//! The health watchdog treats heap exhaustion as a fault condition; this
//! module supplies the free-heap sample. On host targets a synthetic value
//! keeps the simulation exercising the same branches as real hardware.

/// Free heap in bytes.
#[cfg(target_os = "espidf")]
pub fn free_heap_bytes() -> u32 {
    // SAFETY: esp_get_free_heap_size is a read-only allocator query.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

/// Free heap in bytes (host simulation — comfortably above any threshold).
#[cfg(not(target_os = "espidf"))]
pub fn free_heap_bytes() -> u32 {
    307_200
}
