use std::net::Ipv4Addr;
use serde::Serialize;
use uuid::Uuid;
use crate::protocol::{SETUP_PATH, UDN_PREFIX};

/// Derives the device serial from its name.
///
/// Name-based UUID (v3, X.500 namespace): the same name yields the same
/// serial in every process, so control points keep recognising a device
/// across restarts.
pub fn make_serial(name: &str) -> String {
    Uuid::new_v3(&Uuid::NAMESPACE_X500, name.as_bytes()).to_string()
}

/// Identity of one emulated device. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    name: String,
    serial: String,
    ip: Ipv4Addr,
    port: u16,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>, ip: Ipv4Addr, port: u16) -> Self {
        let name = name.into();
        let serial = make_serial(&name);
        Self { name, serial, ip, port }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Unique device name, e.g. "uuid:Socket-1_0-925d1c26-..."
    pub fn udn(&self) -> String {
        format!("{}{}", UDN_PREFIX, self.serial)
    }

    /// Projection consulted by the discovery responder
    pub fn advertisement(&self) -> AdvertisementRecord {
        AdvertisementRecord {
            name: self.name.clone(),
            ip: self.ip,
            port: self.port,
            serial: self.serial.clone(),
        }
    }
}

/// Read-only view of a registered device, as advertised over SSDP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvertisementRecord {
    pub name: String,
    pub ip: Ipv4Addr,
    pub port: u16,
    pub serial: String,
}

impl AdvertisementRecord {
    /// Descriptor URL handed out in the LOCATION header
    pub fn location(&self) -> String {
        format!("http://{}:{}{}", self.ip, self.port, SETUP_PATH)
    }

    /// USN for a reply to the given search-target value (without "ST: ")
    pub fn usn(&self, search_target: &str) -> String {
        format!("{}{}::{}", UDN_PREFIX, self.serial, search_target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_deterministic() {
        assert_eq!(make_serial("Lamp"), make_serial("Lamp"));
        assert_eq!(make_serial("Lamp"), "925d1c26-5b70-38da-8b28-a8483da298a1");
        assert_eq!(make_serial("Kitchen Light"), "d6ea77b3-36e1-37bf-896d-f4dc37ca8b53");
    }

    #[test]
    fn test_serial_differs_per_name() {
        assert_ne!(make_serial("Lamp"), make_serial("lamp"));
    }

    #[test]
    fn test_identity_projection() {
        let identity = DeviceIdentity::new("Fan", Ipv4Addr::new(192, 168, 1, 20), 8124);
        assert_eq!(identity.serial(), "7000e2d9-ed8d-3204-9f36-e73110291a04");
        assert_eq!(identity.udn(), "uuid:Socket-1_0-7000e2d9-ed8d-3204-9f36-e73110291a04");

        let record = identity.advertisement();
        assert_eq!(record.port, identity.port());
        assert_eq!(record.location(), "http://192.168.1.20:8124/setup.xml");
        assert_eq!(
            record.usn("upnp:rootdevice"),
            "uuid:Socket-1_0-7000e2d9-ed8d-3204-9f36-e73110291a04::upnp:rootdevice"
        );
    }
}
