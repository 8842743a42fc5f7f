use async_trait::async_trait;
use super::{Capability, PowerAction};

/// Backend that switches nothing; useful for testing a control point.
pub struct DummyBackend {
    name: String,
    port: u16,
}

impl DummyBackend {
    pub fn new(name: &str, port: u16) -> Self {
        Self { name: name.to_string(), port }
    }
}

#[async_trait]
impl Capability for DummyBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn on(&self) -> bool {
        tracing::debug!("{}: dummy on", self.name);
        true
    }

    async fn off(&self) -> bool {
        tracing::debug!("{}: dummy off", self.name);
        true
    }

    async fn get_state(&self, last_action: PowerAction) -> String {
        last_action.as_str().to_string()
    }
}
