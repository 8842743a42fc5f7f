use std::net::SocketAddr;
use thiserror::Error;

/// Failures surfaced by the emulator core.
///
/// Only `Bind` ever escapes a component; the other kinds are contained to
/// the connection or datagram that produced them and end up in the log.
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed request: {0}")]
    ProtocolParse(String),

    #[error("Capability call failed for {device}: {action}")]
    CapabilityCall { device: String, action: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl EmulatorError {
    pub fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}

pub type Result<T> = std::result::Result<T, EmulatorError>;
