//! AS3677 Ambient Light Sensor Hardware Library
//!
//! Provides a polling driver for the AS3677 ambient light sensor exposed
//! through sysfs, along with the worker, attribute and event queue plumbing
//! it runs on.

pub mod error;
pub mod event;
pub mod fifo;
pub mod light;
pub mod registry;
pub mod sensor;
pub mod sysfs;
pub mod worker;

pub use error::{Error, Result};
pub use event::SensorEvent;
pub use fifo::{EventFifo, EventSink};
pub use light::LightSensor;
pub use registry::SensorRegistry;
pub use sensor::{SensorDriver, SensorInfo, SensorState, SensorType};
pub use sysfs::{AttributeAccess, Sysfs};
pub use worker::{PeriodicWorker, ThreadWorker};

/// Default sysfs directory of the AS3677 device.
///
/// Overridden at build time by setting `ALS_PATH`.
pub const AS3677_DEV: &str = match option_env!("ALS_PATH") {
    Some(path) => path,
    None => "/sys/devices/i2c-10/10-0040",
};

/// Handle id of the ambient light sensor.
pub const SENSOR_LIGHTSENSOR_HANDLE: i32 = 5;

/// Maximum reportable illuminance in lux.
pub const LIGHT_RANGE: f32 = 12_288.0;
