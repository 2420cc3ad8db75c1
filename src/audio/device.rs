use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};

use super::backend::{split_extension_list, AlBackend, DeviceHandle, AL_INVALID_OPERATION};
use super::context::Context;
use crate::error::AudioError;

/// An opened native audio device
pub struct Device {
    backend: Arc<dyn AlBackend>,
    handle: Option<DeviceHandle>,
    name: String,
}

impl Device {
    /// Open a device by name, or the backend's default device
    pub fn open(backend: Arc<dyn AlBackend>, device_name: Option<&str>) -> Result<Self, AudioError> {
        let handle = backend.open_device(device_name).ok_or_else(|| match device_name {
            Some(name) => AudioError::DeviceNotFound {
                device: name.to_string(),
            },
            None => AudioError::NoDevices,
        })?;
        let name = backend.device_name(handle).unwrap_or_default();
        info!("Opened audio device '{}'", name);

        Ok(Self {
            backend,
            handle: Some(handle),
            name,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn AlBackend> {
        &self.backend
    }

    fn handle(&self, operation: &'static str) -> Result<DeviceHandle, AudioError> {
        self.handle.ok_or(AudioError::InvalidResource {
            resource: "device",
            operation,
        })
    }

    /// `(major, minor)` version reported by the device
    pub fn get_version(&self) -> Result<(i32, i32), AudioError> {
        let handle = self.handle("get_version")?;
        Ok(self.backend.device_version(handle))
    }

    pub fn get_extensions(&self) -> Result<Vec<String>, AudioError> {
        let handle = self.handle("get_extensions")?;
        Ok(split_extension_list(&self.backend.device_extensions(handle)))
    }

    pub fn has_extension(&self, extension: &str) -> Result<bool, AudioError> {
        Ok(self.get_extensions()?.iter().any(|e| e == extension))
    }

    /// Create a context on this device and make it current
    pub fn create_context(&self) -> Result<Context, AudioError> {
        let handle = self.handle("create_context")?;
        Context::create(Arc::clone(&self.backend), handle)
    }

    /// Close the native device. Safe to call more than once.
    ///
    /// Fails while contexts created from this device are still alive.
    pub fn delete(&mut self) -> Result<(), AudioError> {
        let Some(handle) = self.handle else {
            return Ok(());
        };
        if !self.backend.close_device(handle) {
            return Err(AudioError::Backend {
                code: AL_INVALID_OPERATION,
                description: self.backend.error_string(AL_INVALID_OPERATION),
                message: format!("Failed to close device '{}'.", self.name),
            });
        }
        self.handle = None;
        debug!("Closed audio device '{}'", self.name);
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(e) = self.delete() {
            warn!("{}", e);
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}
