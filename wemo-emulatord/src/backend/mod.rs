pub mod command;
pub mod dummy;
pub mod http;

use std::fmt;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::watch;
use crate::config::{BackendConfig, DeviceConfig};
use crate::error::Result;
use self::command::CommandBackend;
use self::dummy::DummyBackend;
use self::http::HttpBackend;

/// Last successful switching action of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    On,
    Off,
}

impl PowerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Control contract implemented by every backend.
///
/// `on`/`off` report whether the action succeeded, not a re-read hardware
/// state. All three calls must be safe to repeat.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn port(&self) -> u16;

    async fn on(&self) -> bool;

    async fn off(&self) -> bool;

    /// Returns "on", "off", "unknown" or any other backend-specific string.
    /// `last_action` lets backends without a state query report the last
    /// successful switch instead.
    async fn get_state(&self, last_action: PowerAction) -> String;
}

/// A capability together with the last action it carried out successfully.
pub struct Plug {
    capability: Box<dyn Capability>,
    last_action: watch::Sender<PowerAction>,
}

impl Plug {
    pub fn new(capability: Box<dyn Capability>) -> Self {
        let (last_action, _) = watch::channel(PowerAction::Off);
        Self { capability, last_action }
    }

    /// Build the backend described by a device's configuration
    pub fn from_config(device: &DeviceConfig, timeout: Duration) -> Result<Self> {
        let capability: Box<dyn Capability> = match &device.backend {
            BackendConfig::Command(config) => {
                Box::new(CommandBackend::new(&device.name, device.port, config, timeout)?)
            }
            BackendConfig::Http(config) => {
                Box::new(HttpBackend::new(&device.name, device.port, config, timeout)?)
            }
            BackendConfig::Dummy => Box::new(DummyBackend::new(&device.name, device.port)),
        };
        Ok(Self::new(capability))
    }

    pub fn name(&self) -> &str {
        self.capability.name()
    }

    pub fn port(&self) -> u16 {
        self.capability.port()
    }

    pub fn last_action(&self) -> PowerAction {
        *self.last_action.borrow()
    }

    pub async fn on(&self) -> bool {
        self.switch(PowerAction::On).await
    }

    pub async fn off(&self) -> bool {
        self.switch(PowerAction::Off).await
    }

    pub async fn get_state(&self) -> String {
        self.capability.get_state(self.last_action()).await
    }

    async fn switch(&self, action: PowerAction) -> bool {
        let success = match action {
            PowerAction::On => self.capability.on().await,
            PowerAction::Off => self.capability.off().await,
        };
        if success {
            self.last_action.send_replace(action);
        }
        success
    }
}
