//! Error types for the ambient light sensor library.

use std::path::PathBuf;
use thiserror::Error;

use crate::sensor::SensorState;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when driving the sensor.
#[derive(Error, Debug)]
pub enum Error {
    /// Formatted sysfs path does not fit the path buffer.
    #[error("Path too long ({len} >= {capacity}): {}", path.display())]
    PathTooLong {
        path: PathBuf,
        len: usize,
        capacity: usize,
    },

    /// Opening the raw value attribute failed.
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation not allowed in the current activation state.
    #[error("Sensor {handle} is already {state}")]
    InvalidState { handle: i32, state: SensorState },

    /// Reading or writing a sysfs attribute failed.
    #[error("Sysfs I/O error on {}: {source}", path.display())]
    Sysfs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Attribute contents could not be parsed.
    #[error("Invalid value in {}: {value:?}", path.display())]
    InvalidAttribute { path: PathBuf, value: String },

    /// A driver with this handle is already registered.
    #[error("Sensor handle {0} already registered")]
    DuplicateHandle(i32),

    /// No driver registered under this handle.
    #[error("Unknown sensor handle: {0}")]
    UnknownHandle(i32),

    /// Worker thread could not be started.
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    /// Returns the negative status code reported to the sensor framework.
    pub fn status(&self) -> i32 {
        match self {
            Error::PathTooLong { .. } => -libc::ENAMETOOLONG,
            Error::OpenFailed { source, .. } | Error::Sysfs { source, .. } => {
                -source.raw_os_error().unwrap_or(libc::EIO)
            }
            Error::InvalidState { .. } => -libc::EBUSY,
            Error::InvalidAttribute { .. } => -libc::EINVAL,
            Error::DuplicateHandle(_) => -libc::EEXIST,
            Error::UnknownHandle(_) => -libc::ENODEV,
            Error::Worker(_) => -libc::EAGAIN,
        }
    }
}
