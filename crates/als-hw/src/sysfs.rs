//! Integer attribute access under a sysfs device directory.

use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes named attributes of a device.
pub trait AttributeAccess: Send {
    /// Returns the device directory.
    fn base(&self) -> &Path;

    /// Writes a decimal integer to `attr`.
    fn write_int(&self, attr: &str, value: i64) -> Result<()>;

    /// Reads a decimal integer from `attr`.
    fn read_int(&self, attr: &str) -> Result<i64>;

    /// Returns the full path of `attr`.
    fn attribute_path(&self, attr: &str) -> PathBuf {
        self.base().join(attr)
    }
}

/// Sysfs attribute accessor bound to an absolute device path.
#[derive(Debug, Clone)]
pub struct Sysfs {
    base: PathBuf,
}

impl Sysfs {
    /// Creates an accessor for the device directory at `base`.
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }
}

impl AttributeAccess for Sysfs {
    fn base(&self) -> &Path {
        &self.base
    }

    fn write_int(&self, attr: &str, value: i64) -> Result<()> {
        let path = self.attribute_path(attr);
        fs::write(&path, format!("{}\n", value)).map_err(|source| Error::Sysfs {
            path: path.clone(),
            source,
        })?;
        debug!("Wrote {} to {}", value, path.display());
        Ok(())
    }

    fn read_int(&self, attr: &str) -> Result<i64> {
        let path = self.attribute_path(attr);
        let content = fs::read_to_string(&path).map_err(|source| Error::Sysfs {
            path: path.clone(),
            source,
        })?;
        content
            .trim()
            .parse()
            .map_err(|_| Error::InvalidAttribute {
                path,
                value: content.trim().to_string(),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Creates an empty scratch directory removed when the guard drops.
    pub(crate) fn scratch_dir(tag: &str) -> TempDir {
        tempfile::Builder::new()
            .prefix(&format!("als-hw-{}-", tag))
            .tempdir()
            .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let tmp = scratch_dir("sysfs-rw");
        let dir = tmp.path();
        let sysfs = Sysfs::new(dir);

        sysfs.write_int("als_on", 1).unwrap();
        assert_eq!(fs::read_to_string(dir.join("als_on")).unwrap(), "1\n");
        assert_eq!(sysfs.read_int("als_on").unwrap(), 1);

        sysfs.write_int("als_on", 0).unwrap();
        assert_eq!(sysfs.read_int("als_on").unwrap(), 0);
    }

    #[test]
    fn test_missing_directory() {
        let tmp = scratch_dir("sysfs-missing");
        let dir = tmp.path().join("gone");
        let sysfs = Sysfs::new(&dir);

        let err = sysfs.write_int("als_on", 1).unwrap_err();
        assert!(matches!(err, Error::Sysfs { .. }));
        assert_eq!(err.status(), -libc::ENOENT);
    }

    #[test]
    fn test_invalid_contents() {
        let tmp = scratch_dir("sysfs-invalid");
        fs::write(tmp.path().join("als_on"), "on\n").unwrap();
        let sysfs = Sysfs::new(tmp.path());

        assert!(matches!(
            sysfs.read_int("als_on"),
            Err(Error::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn test_attribute_path() {
        let sysfs = Sysfs::new("/sys/devices/i2c-10/10-0040");
        assert_eq!(
            sysfs.attribute_path("adc_als_value"),
            PathBuf::from("/sys/devices/i2c-10/10-0040/adc_als_value")
        );
    }
}
