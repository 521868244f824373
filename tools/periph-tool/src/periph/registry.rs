use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use periph_pac::Layout;

use super::chardev::DeviceFile;
use super::device::Peripheral;
use super::error::{Error, Result};
use super::field::Attribute;
use super::memory::{MemoryProvider, WindowDescriptor};

/// The set of published peripherals, looked up by device name.
#[derive(Default)]
pub struct Registry {
    devices: RwLock<HashMap<String, Arc<Peripheral>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn devices(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<Peripheral>>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn devices_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<Peripheral>>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds, activates and publishes a peripheral. Nothing is published if
    /// activation fails.
    ///
    /// The table is only locked to check the name and to insert, lookups
    /// proceed while the peripheral is being mapped and programmed.
    pub fn attach(&self, layout: &'static Layout, descriptor: WindowDescriptor, provider: &dyn MemoryProvider) -> Result<Arc<Peripheral>> {
        let name = layout.device_name;
        let taken = || Error::unavailable(name, "a device with this name is already attached");
        if self.devices().contains_key(name) {
            return Err(taken());
        }

        let peripheral = Arc::new(Peripheral::new(layout)?);
        peripheral.bind(descriptor)?;
        peripheral.activate(provider)?;

        let mut devices = self.devices_mut();
        if devices.contains_key(name) {
            drop(devices);
            peripheral.remove()?;
            return Err(taken());
        }
        devices.insert(name.to_string(), peripheral.clone());
        Ok(peripheral)
    }

    /// Unpublishes and removes the named peripheral. Detaching a name that
    /// is not attached succeeds.
    pub fn detach(&self, name: &str) -> Result<()> {
        let peripheral = self.devices_mut().remove(name);
        match peripheral {
            Some(peripheral) => peripheral.remove(),
            None => Ok(()),
        }
    }

    pub fn detach_all(&self) -> Result<()> {
        let peripherals: Vec<_> = self.devices_mut().drain().collect();
        let mut result = Ok(());
        for (name, peripheral) in peripherals {
            if let Err(e) = peripheral.remove() {
                eprintln!("error: {name}: removal failed: {e}");
                result = Err(e);
            }
        }
        result
    }

    pub fn get(&self, name: &str) -> Result<Arc<Peripheral>> {
        self.devices().get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownDevice(name.to_string()))
    }

    pub fn open(&self, name: &str) -> Result<DeviceFile> {
        Ok(DeviceFile::new(self.get(name)?))
    }

    /// Looks up an attribute by path, `device/attribute`.
    pub fn attribute(&self, path: &str) -> Result<Attribute> {
        let (device, attribute) = path.split_once('/')
            .ok_or_else(|| Error::UnknownAttribute(path.to_string()))?;
        self.get(device)?.attribute(attribute)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.devices().keys().cloned().collect();
        names.sort();
        names
    }
}
