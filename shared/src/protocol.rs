use std::net::Ipv4Addr;

/// Well-known SSDP discovery port
pub const SSDP_PORT: u16 = 1900;

/// Canonical SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Group joined by older emulators; only used behind the compatibility flag
pub const LEGACY_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 0);

/// Search-target header lines answered by the responder, in match order
pub const SEARCH_TARGETS: [&str; 3] = [
    "ST: urn:Belkin:device:**",
    "ST: upnp:rootdevice",
    "ST: ssdp:all",
];

/// Required discovery header, compared against the lowercased datagram
pub const MAN_DISCOVER: &str = "man: \"ssdp:discover\"";

/// Advertisement lifetime in seconds
pub const MAX_AGE: u32 = 86400;

pub const SSDP_SERVER: &str = "wemo-emulator, UPnP/1.0, Unspecified";
pub const SSDP_OPT: &str = "\"http://schemas.upnp.org/upnp/1/0/\"; ns=01";

pub const HTTP_SERVER: &str = "Unspecified, UPnP/1.0, Unspecified";
pub const HTTP_USER_AGENT: &str = "wemo-emulator";
pub const LAST_MODIFIED: &str = "Sat, 01 Jan 2000 00:01:15 GMT";

/// UDN prefix, followed by the device serial
pub const UDN_PREFIX: &str = "uuid:Socket-1_0-";

pub const BASICEVENT_URN: &str = "urn:Belkin:service:basicevent:1";

/// Request paths served by a device endpoint
pub const SETUP_PATH: &str = "/setup.xml";
pub const EVENTSERVICE_PATH: &str = "/eventservice.xml";
pub const METAINFO_PATH: &str = "/metainfoservice.xml";
pub const BASICEVENT_CONTROL_PATH: &str = "/upnp/control/basicevent1";
