//! Timestamped sensor readings.

use serde::Serialize;

/// A single reading delivered through the event queue.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[repr(C)]
pub struct SensorEvent {
    /// Size of this record, used as the sensor version
    pub version: i32,
    /// Handle of the producing sensor
    pub sensor: i32,
    /// Sensor type tag
    #[serde(rename = "type")]
    pub sensor_type: i32,
    /// Monotonic timestamp in nanoseconds
    pub timestamp: i64,
    /// Illuminance in lux
    pub light: f32,
}

impl SensorEvent {
    /// Size of the event record in bytes.
    pub const SIZE: i32 = std::mem::size_of::<SensorEvent>() as i32;
}

/// Returns the current `CLOCK_MONOTONIC` time in nanoseconds.
pub fn monotonic_nanos() -> i64 {
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };

    // SAFETY: clock_gettime only writes to the timespec we pass in
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    if rc != 0 {
        return 0;
    }

    (ts.tv_sec as i64) * 1_000_000_000 + ts.tv_nsec as i64
}
