//! Registry of sensor drivers keyed by handle.

use crate::sensor::{SensorDriver, SensorInfo};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Sensor drivers available to the framework.
#[derive(Default)]
pub struct SensorRegistry {
    drivers: BTreeMap<i32, Box<dyn SensorDriver>>,
}

impl SensorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a driver under its handle.
    pub fn register(&mut self, driver: Box<dyn SensorDriver>) -> Result<()> {
        let handle = driver.info().handle;
        if self.drivers.contains_key(&handle) {
            return Err(Error::DuplicateHandle(handle));
        }
        info!("Registered sensor {} ({})", handle, driver.info().name);
        self.drivers.insert(handle, driver);
        Ok(())
    }

    /// Returns the driver registered under `handle`.
    pub fn get(&self, handle: i32) -> Result<&dyn SensorDriver> {
        self.drivers
            .get(&handle)
            .map(|d| d.as_ref())
            .ok_or(Error::UnknownHandle(handle))
    }

    /// Returns the driver registered under `handle` for mutation.
    pub fn get_mut(&mut self, handle: i32) -> Result<&mut (dyn SensorDriver + 'static)> {
        self.drivers
            .get_mut(&handle)
            .map(|d| d.as_mut())
            .ok_or(Error::UnknownHandle(handle))
    }

    /// Lists the metadata of every driver, ordered by handle.
    pub fn list(&self) -> Vec<SensorInfo> {
        self.drivers.values().map(|d| d.info().clone()).collect()
    }

    /// Number of registered drivers.
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Returns true if no drivers are registered.
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// Initializes every driver, stopping at the first failure.
    pub fn init_all(&mut self) -> Result<()> {
        for (handle, driver) in self.drivers.iter_mut() {
            driver.init().map_err(|e| {
                warn!("Sensor {} failed to initialize: {}", handle, e);
                e
            })?;
        }
        Ok(())
    }

    /// Closes every driver.
    pub fn close_all(&mut self) {
        for driver in self.drivers.values_mut() {
            driver.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorType;
    use crate::{EventFifo, LightSensor};
    use std::sync::{Arc, Mutex};

    struct FakeDriver {
        info: SensorInfo,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeDriver {
        fn new(handle: i32, log: Arc<Mutex<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                info: SensorInfo {
                    name: "fake",
                    vendor: "test",
                    version: 1,
                    handle,
                    sensor_type: SensorType::Proximity,
                    max_range: 1.0,
                    resolution: 1.0,
                    power: 0.0,
                },
                log,
            })
        }

        fn record(&self, op: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.info.handle, op));
        }
    }

    impl SensorDriver for FakeDriver {
        fn info(&self) -> &SensorInfo {
            &self.info
        }

        fn init(&mut self) -> Result<()> {
            self.record("init");
            Ok(())
        }

        fn activate(&mut self, enable: bool) -> Result<()> {
            self.record(if enable { "on" } else { "off" });
            Ok(())
        }

        fn set_delay(&mut self, _ns: i64) -> Result<()> {
            self.record("delay");
            Ok(())
        }

        fn close(&mut self) {
            self.record("close");
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = SensorRegistry::new();
        let fifo = Arc::new(EventFifo::default());
        registry
            .register(Box::new(LightSensor::as3677(fifo)))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let info = registry.get(crate::SENSOR_LIGHTSENSOR_HANDLE).unwrap().info();
        assert_eq!(info.sensor_type, SensorType::Light);
        assert!(matches!(registry.get(99), Err(Error::UnknownHandle(99))));
    }

    #[test]
    fn test_duplicate_handle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SensorRegistry::new();
        registry.register(FakeDriver::new(3, log.clone())).unwrap();

        let err = registry.register(FakeDriver::new(3, log)).unwrap_err();
        assert!(matches!(err, Error::DuplicateHandle(3)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lifecycle_fan_out() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SensorRegistry::new();
        registry.register(FakeDriver::new(8, log.clone())).unwrap();
        registry.register(FakeDriver::new(2, log.clone())).unwrap();

        registry.init_all().unwrap();
        registry.get_mut(8).unwrap().activate(true).unwrap();
        registry.close_all();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["2:init", "8:init", "8:on", "2:close", "8:close"]
        );
        let handles: Vec<i32> = registry.list().iter().map(|i| i.handle).collect();
        assert_eq!(handles, vec![2, 8]);
    }
}
