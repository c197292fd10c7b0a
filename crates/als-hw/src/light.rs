//! AS3677 ambient light sensor driver.
//!
//! Polls the `adc_als_value` sysfs attribute, converts the raw reading to lux
//! and publishes it to an event sink.

use crate::event::monotonic_nanos;
use crate::fifo::EventSink;
use crate::sensor::{SensorDriver, SensorInfo, SensorState, SensorType};
use crate::sysfs::{AttributeAccess, Sysfs};
use crate::worker::{PeriodicWorker, ThreadWorker};
use crate::{Error, Result, SensorEvent, AS3677_DEV, LIGHT_RANGE, SENSOR_LIGHTSENSOR_HANDLE};
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, trace, warn};

/// Attribute holding the raw ADC reading.
pub const DATA_ATTR: &str = "adc_als_value";

/// Attribute toggling device power.
pub const POWER_ATTR: &str = "als_on";

/// Capacity of the data attribute path buffer, including the terminator.
pub const PATH_CAPACITY: usize = 64;

/// Bytes read from the data attribute per poll.
const READ_SIZE: usize = 20;

/// Raw ADC units to lux.
const LUX_SCALE: f64 = 12.0;

/// Returns the metadata of the AS3677 light sensor.
pub fn light_sensor_info() -> SensorInfo {
    SensorInfo {
        name: "AS3677 based light sensor",
        vendor: "Austria Micro Systems",
        version: SensorEvent::SIZE,
        handle: SENSOR_LIGHTSENSOR_HANDLE,
        sensor_type: SensorType::Light,
        max_range: LIGHT_RANGE,
        resolution: 1.0,
        power: 1.0,
    }
}

/// Parses the leading number in `buf` the way C's `atof` does.
///
/// Leading whitespace is skipped and parsing stops at the first byte that
/// cannot extend the number. Decimal, hexadecimal (`0x1.8p3`), `inf` and
/// `nan` forms are recognised. Returns 0.0 when no digits are found.
pub fn parse_leading_float(buf: &[u8]) -> f64 {
    let text = buf.split(|&b| b == 0).next().unwrap_or_default();
    let mut i = 0;

    while i < text.len() && text[i].is_ascii_whitespace() {
        i += 1;
    }

    let negative = match text.get(i) {
        Some(b'-') => {
            i += 1;
            true
        }
        Some(b'+') => {
            i += 1;
            false
        }
        _ => false,
    };

    let rest = &text[i..];
    let magnitude = parse_special(rest)
        .or_else(|| parse_hex(rest))
        .unwrap_or_else(|| parse_decimal(rest));

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn parse_special(text: &[u8]) -> Option<f64> {
    if starts_with_ignore_case(text, b"inf") {
        Some(f64::INFINITY)
    } else if starts_with_ignore_case(text, b"nan") {
        Some(f64::NAN)
    } else {
        None
    }
}

/// Parses `0x<hex>[.<hex>][p[+-]<dec>]`, or returns None if no hex digits follow `0x`.
fn parse_hex(text: &[u8]) -> Option<f64> {
    if !starts_with_ignore_case(text, b"0x") {
        return None;
    }

    let len = text.len();
    let mut i = 2;
    let mut mantissa = 0.0f64;
    let mut exponent: i32 = 0;
    let mut digits = 0;

    while let Some(d) = text.get(i).and_then(|&b| (b as char).to_digit(16)) {
        mantissa = mantissa * 16.0 + d as f64;
        i += 1;
        digits += 1;
    }
    if i < len && text[i] == b'.' {
        i += 1;
        while let Some(d) = text.get(i).and_then(|&b| (b as char).to_digit(16)) {
            mantissa = mantissa * 16.0 + d as f64;
            exponent -= 4;
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    // Binary exponent only counts if it has digits
    if i < len && (text[i] == b'p' || text[i] == b'P') {
        let mut j = i + 1;
        let negative = match text.get(j) {
            Some(b'-') => {
                j += 1;
                true
            }
            Some(b'+') => {
                j += 1;
                false
            }
            _ => false,
        };
        let mut power: i32 = 0;
        let exp_start = j;
        while j < len && text[j].is_ascii_digit() {
            power = (power * 10 + (text[j] - b'0') as i32).min(100_000);
            j += 1;
        }
        if j > exp_start {
            exponent += if negative { -power } else { power };
        }
    }

    Some(mantissa * 2f64.powi(exponent))
}

fn parse_decimal(text: &[u8]) -> f64 {
    let len = text.len();
    let mut i = 0;

    let mut digits = 0;
    while i < len && text[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < len && text[i] == b'.' {
        i += 1;
        while i < len && text[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts if it has digits
    if i < len && (text[i] == b'e' || text[i] == b'E') {
        let mut j = i + 1;
        if j < len && (text[j] == b'+' || text[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < len && text[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    std::str::from_utf8(&text[..i])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

/// Converts a raw reading to lux, truncating toward zero.
///
/// Non-positive results are reported as 1 lux.
pub fn lux_from_value(value: f64) -> i32 {
    let lux = (value * LUX_SCALE) as i32;
    if lux <= 0 {
        1
    } else {
        lux
    }
}

/// Builds the data attribute path, enforcing the path buffer capacity.
fn data_path(base: &Path) -> Result<PathBuf> {
    let path = base.join(DATA_ATTR);
    let len = path.as_os_str().len();
    if len >= PATH_CAPACITY {
        return Err(Error::PathTooLong {
            path,
            len,
            capacity: PATH_CAPACITY,
        });
    }
    Ok(path)
}

/// Locks the descriptor slot, ignoring poison left by a panicked poll.
fn lock_fd(fd: &Mutex<Option<File>>) -> MutexGuard<'_, Option<File>> {
    fd.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the worker thread.
struct LightPoller {
    info: SensorInfo,
    fd: Arc<Mutex<Option<File>>>,
    sink: Arc<dyn EventSink>,
}

impl LightPoller {
    fn poll(&self) {
        let mut buf = [0u8; READ_SIZE];
        if let Some(file) = lock_fd(&self.fd).as_ref() {
            if let Err(e) = file.read_at(&mut buf, 0) {
                trace!("Light read failed: {}", e);
            }
        }

        let lux = lux_from_value(parse_leading_float(&buf));
        trace!("Light poll: {} lux", lux);

        self.sink.put(SensorEvent {
            version: self.info.version,
            sensor: self.info.handle,
            sensor_type: self.info.sensor_type as i32,
            timestamp: monotonic_nanos(),
            light: lux as f32,
        });
    }
}

/// AS3677 light sensor driver.
///
/// The data attribute is open exactly while the sensor is active.
pub struct LightSensor<W = ThreadWorker, S = Sysfs> {
    info: SensorInfo,
    worker: W,
    sysfs: S,
    sink: Arc<dyn EventSink>,
    fd: Arc<Mutex<Option<File>>>,
    state: SensorState,
}

impl LightSensor {
    /// Creates a driver for the device at the default sysfs path.
    pub fn as3677(sink: Arc<dyn EventSink>) -> Self {
        Self::with_device(AS3677_DEV, sink)
    }

    /// Creates a driver for the device directory at `device`.
    pub fn with_device<P: AsRef<Path>>(device: P, sink: Arc<dyn EventSink>) -> Self {
        Self::new(ThreadWorker::new("als-poll"), Sysfs::new(device), sink)
    }
}

impl<W: PeriodicWorker, S: AttributeAccess> LightSensor<W, S> {
    /// Creates a driver from its collaborators.
    pub fn new(worker: W, sysfs: S, sink: Arc<dyn EventSink>) -> Self {
        Self {
            info: light_sensor_info(),
            worker,
            sysfs,
            sink,
            fd: Arc::new(Mutex::new(None)),
            state: SensorState::Inactive,
        }
    }

    /// Returns the current activation state.
    pub fn state(&self) -> SensorState {
        self.state
    }

    /// Returns true if the data attribute is open.
    pub fn is_open(&self) -> bool {
        lock_fd(&self.fd).is_some()
    }

    /// Returns the device directory.
    pub fn device(&self) -> &Path {
        self.sysfs.base()
    }

    fn set_power(&self, on: bool) {
        if let Err(e) = self.sysfs.write_int(POWER_ATTR, on as i64) {
            warn!("Failed to switch light sensor {}: {}", if on { "on" } else { "off" }, e);
        }
    }

    fn enable(&mut self) -> Result<()> {
        if self.state == SensorState::Active {
            return Err(Error::InvalidState {
                handle: self.info.handle,
                state: self.state,
            });
        }

        self.set_power(true);

        let path = data_path(self.sysfs.base()).map_err(|e| {
            error!("Light activate: {}", e);
            e
        })?;

        let file = File::open(&path).map_err(|source| {
            error!("Failed to open sysfs {}: {}", path.display(), source);
            Error::OpenFailed {
                path: path.clone(),
                source,
            }
        })?;

        *lock_fd(&self.fd) = Some(file);
        self.worker.resume();
        self.state = SensorState::Active;
        info!("Light sensor enabled ({})", path.display());
        Ok(())
    }

    fn disable(&mut self) {
        self.worker.suspend();
        lock_fd(&self.fd).take();
        self.set_power(false);
        self.state = SensorState::Inactive;
        info!("Light sensor disabled");
    }
}

impl<W: PeriodicWorker, S: AttributeAccess> SensorDriver for LightSensor<W, S> {
    fn info(&self) -> &SensorInfo {
        &self.info
    }

    fn init(&mut self) -> Result<()> {
        let poller = LightPoller {
            info: self.info.clone(),
            fd: self.fd.clone(),
            sink: self.sink.clone(),
        };
        self.worker.init(Box::new(move || poller.poll()))?;
        debug!("Light sensor initialized at {}", self.sysfs.base().display());
        Ok(())
    }

    fn activate(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.enable()
        } else {
            self.disable();
            Ok(())
        }
    }

    fn set_delay(&mut self, ns: i64) -> Result<()> {
        self.worker.set_delay(ns);
        Ok(())
    }

    fn close(&mut self) {
        debug!("Light sensor close");
        self.worker.destroy();
    }
}
