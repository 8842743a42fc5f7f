//! UPnP documents served by a device endpoint.

use quick_xml::escape::escape;
use shared::types::DeviceIdentity;

/// Service description for `urn:Belkin:service:basicevent:1`
pub const EVENTSERVICE_XML: &str = concat!(
    r#"<scpd xmlns="urn:Belkin:service-1-0">"#,
    "<actionList>",
    "<action>",
    "<name>SetBinaryState</name>",
    "<argumentList>",
    "<argument>",
    "<retval/>",
    "<name>BinaryState</name>",
    "<relatedStateVariable>BinaryState</relatedStateVariable>",
    "<direction>in</direction>",
    "</argument>",
    "</argumentList>",
    "</action>",
    "<action>",
    "<name>GetBinaryState</name>",
    "<argumentList>",
    "<argument>",
    "<retval/>",
    "<name>BinaryState</name>",
    "<relatedStateVariable>BinaryState</relatedStateVariable>",
    "<direction>out</direction>",
    "</argument>",
    "</argumentList>",
    "</action>",
    "</actionList>",
    "<serviceStateTable>",
    r#"<stateVariable sendEvents="yes">"#,
    "<name>BinaryState</name>",
    "<dataType>Boolean</dataType>",
    "<defaultValue>0</defaultValue>",
    "</stateVariable>",
    r#"<stateVariable sendEvents="yes">"#,
    "<name>level</name>",
    "<dataType>string</dataType>",
    "<defaultValue>0</defaultValue>",
    "</stateVariable>",
    "</serviceStateTable>",
    "</scpd>",
    "\r\n\r\n",
);

/// Service description for `urn:Belkin:service:metainfo:1`
pub const METAINFO_XML: &str = concat!(
    r#"<scpd xmlns="urn:Belkin:service-1-0">"#,
    "<specVersion>",
    "<major>1</major>",
    "<minor>0</minor>",
    "</specVersion>",
    "<actionList>",
    "<action>",
    "<name>GetMetaInfo</name>",
    "<argumentList>",
    "<retval />",
    "<name>GetMetaInfo</name>",
    "<relatedStateVariable>MetaInfo</relatedStateVariable>",
    "<direction>in</direction>",
    "</argumentList>",
    "</action>",
    "</actionList>",
    "<serviceStateTable>",
    r#"<stateVariable sendEvents="yes">"#,
    "<name>MetaInfo</name>",
    "<dataType>string</dataType>",
    "<defaultValue>0</defaultValue>",
    "</stateVariable>",
    "</serviceStateTable>",
    "</scpd>",
    "\r\n\r\n",
);

/// Root device description (`/setup.xml`) for one device.
///
/// The friendly name is XML-escaped, so a name such as `Tom & Jerry` is sent
/// as `Tom &amp; Jerry`. `GetFriendlyName` answers with the same escaped text.
pub fn setup_xml(identity: &DeviceIdentity) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0"?>"#,
            "<root>",
            "<specVersion><major>1</major><minor>0</minor></specVersion>",
            "<device>",
            "<deviceType>urn:Belkin:device:controllee:1</deviceType>",
            "<friendlyName>{name}</friendlyName>",
            "<manufacturer>Belkin International Inc.</manufacturer>",
            "<modelName>Emulated Socket</modelName>",
            "<modelNumber>3.1415</modelNumber>",
            "<UDN>{udn}</UDN>",
            "<serviceList>",
            "<service>",
            "<serviceType>urn:Belkin:service:basicevent:1</serviceType>",
            "<serviceId>urn:Belkin:serviceId:basicevent1</serviceId>",
            "<controlURL>/upnp/control/basicevent1</controlURL>",
            "<eventSubURL>/upnp/event/basicevent1</eventSubURL>",
            "<SCPDURL>/eventservice.xml</SCPDURL>",
            "</service>",
            "<service>",
            "<serviceType>urn:Belkin:service:metainfo:1</serviceType>",
            "<serviceId>urn:Belkin:serviceId:metainfo1</serviceId>",
            "<controlURL>/upnp/control/metainfo1</controlURL>",
            "<eventSubURL>/upnp/event/metainfo1</eventSubURL>",
            "<SCPDURL>/metainfoservice.xml</SCPDURL>",
            "</service>",
            "</serviceList>",
            "</device>",
            "</root>",
        ),
        name = escape(identity.name()),
        udn = identity.udn(),
    )
}
