use shared::types::{AdvertisementRecord, DeviceIdentity};
use crate::error::{EmulatorError, Result};

/// Devices known to the emulator, in registration order.
///
/// Filled once at startup, then shared read-only (behind an `Arc`) with the
/// discovery responder.
#[derive(Debug, Default)]
pub struct Registry {
    identities: Vec<DeviceIdentity>,
    records: Vec<AdvertisementRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Names and ports must be unique within the registry.
    pub fn register(&mut self, identity: DeviceIdentity) -> Result<()> {
        if self.get(identity.name()).is_some() {
            return Err(EmulatorError::Configuration(format!(
                "device '{}' is already registered",
                identity.name()
            )));
        }
        if let Some(other) = self.identities.iter().find(|d| d.port() == identity.port()) {
            return Err(EmulatorError::Configuration(format!(
                "port {} is already used by '{}'",
                identity.port(),
                other.name()
            )));
        }

        tracing::debug!(
            "Registered {} ({}) at {}:{}",
            identity.name(),
            identity.serial(),
            identity.ip(),
            identity.port()
        );
        self.records.push(identity.advertisement());
        self.identities.push(identity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&DeviceIdentity> {
        self.identities.iter().find(|d| d.name() == name)
    }

    pub fn identities(&self) -> &[DeviceIdentity] {
        &self.identities
    }

    /// Advertisement records, one per device, in registration order
    pub fn records(&self) -> &[AdvertisementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}
