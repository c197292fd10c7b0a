//! Sensor framework contract: metadata and the driver trait.

use crate::Result;

/// Sensor type tags understood by the framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SensorType {
    Accelerometer = 1,
    MagneticField = 2,
    Orientation = 3,
    Gyroscope = 4,
    /// Ambient light in lux.
    Light = 5,
    Pressure = 6,
    Temperature = 7,
    Proximity = 8,
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorType::Accelerometer => write!(f, "accelerometer"),
            SensorType::MagneticField => write!(f, "magnetic_field"),
            SensorType::Orientation => write!(f, "orientation"),
            SensorType::Gyroscope => write!(f, "gyroscope"),
            SensorType::Light => write!(f, "light"),
            SensorType::Pressure => write!(f, "pressure"),
            SensorType::Temperature => write!(f, "temperature"),
            SensorType::Proximity => write!(f, "proximity"),
        }
    }
}

/// Static sensor metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorInfo {
    /// Human readable name
    pub name: &'static str,
    /// Vendor string
    pub vendor: &'static str,
    /// Driver version, equal to the event record size
    pub version: i32,
    /// Stable handle id
    pub handle: i32,
    /// Type tag
    pub sensor_type: SensorType,
    /// Maximum range in sensor units
    pub max_range: f32,
    /// Resolution in sensor units
    pub resolution: f32,
    /// Power draw in mA
    pub power: f32,
}

/// Activation state of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorState {
    #[default]
    Inactive,
    Active,
}

impl std::fmt::Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorState::Inactive => write!(f, "inactive"),
            SensorState::Active => write!(f, "active"),
        }
    }
}

/// Operations every sensor driver provides to the framework.
///
/// The framework calls them in lifecycle order: `init`, `activate(true)`,
/// `activate(false)`, `close`. `set_delay` may be called at any point.
pub trait SensorDriver: Send {
    /// Returns the static metadata.
    fn info(&self) -> &SensorInfo;

    /// Wires up collaborators. Does not start polling.
    fn init(&mut self) -> Result<()>;

    /// Powers the sensor on or off and starts or stops polling.
    fn activate(&mut self, enable: bool) -> Result<()>;

    /// Sets the polling interval in nanoseconds.
    fn set_delay(&mut self, ns: i64) -> Result<()>;

    /// Tears down the worker.
    fn close(&mut self);
}
