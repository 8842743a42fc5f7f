use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::protocol::{LEGACY_MULTICAST_ADDR, SSDP_MULTICAST_ADDR, SSDP_PORT};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub emulator: EmulatorConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorConfig {
    /// Literal IPv4 address or "auto"
    #[serde(default = "default_ip_address")]
    pub ip_address: String,
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,
    /// 0 keeps idle connections open until the peer closes them
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub framing: Framing,
}

/// How request bytes are collected before dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Every read is dispatched on its own, as received
    #[default]
    SingleRead,
    /// Reads accumulate until the header terminator and any Content-Length body
    Buffered,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_ssdp_port")]
    pub port: u16,
    #[serde(default = "default_multicast_group")]
    pub multicast_group: Ipv4Addr,
    /// Local interface used for the multicast membership
    #[serde(default = "default_interface")]
    pub interface: Ipv4Addr,
    /// Join the legacy group instead of `multicast_group`
    #[serde(default)]
    pub legacy_multicast_group: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub port: u16,
    #[serde(flatten)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    Command(CommandConfig),
    Http(HttpConfig),
    Dummy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandConfig {
    pub on_cmd: String,
    pub off_cmd: String,
    pub state_cmd: Option<String>,
    #[serde(default)]
    pub use_fake_state: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub on_cmd: String,
    pub off_cmd: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub on_data: Option<CommandData>,
    pub off_data: Option<CommandData>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub state_cmd: Option<String>,
    #[serde(default)]
    pub state_method: HttpMethod,
    pub state_data: Option<CommandData>,
    pub state_response_on: Option<String>,
    pub state_response_off: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub use_fake_state: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Request payload: a raw string, or a table sent url-encoded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandData {
    Text(String),
    Form(BTreeMap<String, String>),
}

fn default_ip_address() -> String {
    "auto".to_string()
}

fn default_action_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    60
}

fn default_ssdp_port() -> u16 {
    SSDP_PORT
}

fn default_multicast_group() -> Ipv4Addr {
    SSDP_MULTICAST_ADDR
}

fn default_interface() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            ip_address: default_ip_address(),
            action_timeout_secs: default_action_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            framing: Framing::default(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: default_ssdp_port(),
            multicast_group: default_multicast_group(),
            interface: default_interface(),
            legacy_multicast_group: false,
        }
    }
}

impl EmulatorConfig {
    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl DiscoveryConfig {
    /// Group actually joined, honouring the compatibility flag
    pub fn group(&self) -> Ipv4Addr {
        if self.legacy_multicast_group {
            LEGACY_MULTICAST_ADDR
        } else {
            self.multicast_group
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate configuration text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            bail!("No devices configured");
        }

        let ip = &self.emulator.ip_address;
        if !ip.is_empty() && !ip.eq_ignore_ascii_case("auto") && ip.parse::<Ipv4Addr>().is_err() {
            bail!("Invalid ip_address '{}': expected an IPv4 address or \"auto\"", ip);
        }

        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for device in &self.devices {
            if device.port == 0 {
                bail!("Device '{}' must have a non-zero port", device.name);
            }
            if !names.insert(device.name.as_str()) {
                bail!("Duplicate device name '{}'", device.name);
            }
            if !ports.insert(device.port) {
                bail!("Port {} is used by more than one device", device.port);
            }
        }

        Ok(())
    }
}
