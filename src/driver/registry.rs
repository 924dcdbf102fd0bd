//! Device registry.
//!
//! A fixed-capacity table of named devices. Drivers register their static
//! facade once; application code looks devices up by name, either as the
//! generic [`Device`] handle or as a concrete facade type.

use heapless::Vec;

use super::device::Device;
use super::error::{Error, Result};
use crate::sync::CriticalSectionCell;

/// Table of up to `N` devices.
pub struct DeviceRegistry<const N: usize> {
    devices: CriticalSectionCell<Vec<&'static dyn Device, N>>,
}

impl<const N: usize> DeviceRegistry<N> {
    /// Create an empty registry (const, suitable for static initialization).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            devices: CriticalSectionCell::new(Vec::new()),
        }
    }

    /// Add a device.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the name is taken, [`Error::NoMemory`]
    /// if the table is full.
    pub fn register(&self, device: &'static dyn Device) -> Result<()> {
        self.devices.with(|devices| {
            if devices.iter().any(|d| d.name() == device.name()) {
                return Err(Error::InvalidParameter);
            }
            devices.push(device).map_err(|_| Error::NoMemory)
        })
    }

    /// Look a device up by name.
    pub fn get_device_by_name(&self, name: &str) -> Option<&'static dyn Device> {
        self.devices
            .with(|devices| devices.iter().find(|d| d.name() == name).copied())
    }

    /// Look a device up by name and concrete type.
    pub fn get<T: Device + 'static>(&self, name: &str) -> Option<&'static T> {
        self.get_device_by_name(name)?.as_any().downcast_ref::<T>()
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.with(|d| d.len())
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> Default for DeviceRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}
