use super::Device;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct Inner {
    devices: HashMap<String, Arc<dyn Device>>,
    // insertion order, for stable listings
    order: Vec<String>,
    active: Option<String>,
}

/// Connected devices keyed by URI, plus the one operations target by default.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: RwLock<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects `device` (unless already connected) and registers it under
    /// `uri`, replacing any previous entry. The first device added becomes
    /// active.
    pub fn add<S: Into<String>>(&self, uri: S, device: Arc<dyn Device>) -> Result<()> {
        let uri = uri.into();
        if !device.is_connected() {
            device
                .connect()
                .map_err(|e| Error::device(format!("{}: connect failed: {}", uri, e)))?;
        }

        let mut inner = self.inner.write();
        if inner.devices.insert(uri.clone(), device).is_none() {
            inner.order.push(uri.clone());
        }
        if inner.active.is_none() {
            inner.active = Some(uri.clone());
        }
        drop(inner);

        tracing::info!(device = %uri, "device added");
        Ok(())
    }

    pub fn set_active(&self, uri: &str) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.devices.contains_key(uri) {
            return Err(Error::DeviceNotFound(uri.to_string()));
        }
        inner.active = Some(uri.to_string());
        tracing::info!(device = %uri, "active device switched");
        Ok(())
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn Device>> {
        self.inner.read().devices.get(uri).cloned()
    }

    /// URI of the active device.
    pub fn active(&self) -> Option<String> {
        self.inner.read().active.clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Picks `uri` or, when `None`, the active device. The device must be
    /// connected.
    pub fn resolve(&self, uri: Option<&str>) -> Result<Arc<dyn Device>> {
        let inner = self.inner.read();
        let uri = match uri {
            Some(uri) => uri.to_string(),
            None => inner
                .active
                .clone()
                .ok_or_else(|| Error::device("no active device"))?,
        };
        let device = inner
            .devices
            .get(&uri)
            .cloned()
            .ok_or(Error::DeviceNotFound(uri.clone()))?;
        drop(inner);

        if !device.is_connected() {
            return Err(Error::device(format!("{} is not connected", uri)));
        }
        Ok(device)
    }
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("DeviceRegistry")
            .field("devices", &inner.order)
            .field("active", &inner.active)
            .finish()
    }
}
