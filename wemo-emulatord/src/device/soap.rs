use shared::protocol::BASICEVENT_URN;
use crate::backend::PowerAction;

/// Actions accepted on the basicevent1 control URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapAction {
    GetBinaryState,
    SetBinaryState,
    GetFriendlyName,
}

impl SoapAction {
    const ALL: [SoapAction; 3] = [
        SoapAction::GetBinaryState,
        SoapAction::SetBinaryState,
        SoapAction::GetFriendlyName,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SoapAction::GetBinaryState => "GetBinaryState",
            SoapAction::SetBinaryState => "SetBinaryState",
            SoapAction::GetFriendlyName => "GetFriendlyName",
        }
    }

    /// Verb and argument name, e.g. ("Get", "BinaryState")
    fn parts(self) -> (&'static str, &'static str) {
        match self {
            SoapAction::GetBinaryState => ("Get", "BinaryState"),
            SoapAction::SetBinaryState => ("Set", "BinaryState"),
            SoapAction::GetFriendlyName => ("Get", "FriendlyName"),
        }
    }

    fn header_line(self) -> String {
        format!("SOAPACTION: \"{}#{}\"", BASICEVENT_URN, self.name())
    }

    /// Find the action named by the request's SOAPACTION header line.
    /// The comparison ignores ASCII case.
    pub fn from_request(request: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| {
            let expected = action.header_line();
            request
                .lines()
                .any(|line| line.trim().eq_ignore_ascii_case(&expected))
        })
    }
}

/// Requested switch position in a SetBinaryState body
pub fn requested_binary_state(request: &str) -> Option<PowerAction> {
    if request.contains("<BinaryState>0</BinaryState>") {
        Some(PowerAction::Off)
    } else if request.contains("<BinaryState>1</BinaryState>") {
        Some(PowerAction::On)
    } else {
        None
    }
}

/// Wire value of a binary state
pub fn binary_value(action: PowerAction) -> &'static str {
    match action {
        PowerAction::On => "1",
        PowerAction::Off => "0",
    }
}

/// Response envelope carrying `value` as the action's single return argument.
/// `value` must already be XML-escaped.
pub fn envelope(action: SoapAction, value: &str) -> String {
    let (verb, arg) = action.parts();
    format!(
        concat!(
            "<s:Envelope ",
            r#"xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" "#,
            r#"s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">"#,
            "<s:Body>",
            r#"<u:{verb}{arg}Response xmlns:u="{urn}">"#,
            "<{arg}>{value}</{arg}>",
            "</u:{verb}{arg}Response>",
            "</s:Body>",
            "</s:Envelope>",
        ),
        verb = verb,
        arg = arg,
        urn = BASICEVENT_URN,
        value = value,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action_header: &str, body: &str) -> String {
        format!(
            "POST /upnp/control/basicevent1 HTTP/1.1\r\n\
             Host: 192.168.1.10:8123\r\n\
             Content-Type: text/xml; charset=\"utf-8\"\r\n\
             {}\r\n\
             \r\n\
             {}",
            action_header, body
        )
    }

    #[test]
    fn test_action_from_header() {
        let req = request(r#"SOAPACTION: "urn:Belkin:service:basicevent:1#GetBinaryState""#, "");
        assert_eq!(SoapAction::from_request(&req), Some(SoapAction::GetBinaryState));

        let req = request(r#"SOAPACTION: "urn:Belkin:service:basicevent:1#SetBinaryState""#, "");
        assert_eq!(SoapAction::from_request(&req), Some(SoapAction::SetBinaryState));

        let req = request(r#"SOAPACTION: "urn:Belkin:service:basicevent:1#GetFriendlyName""#, "");
        assert_eq!(SoapAction::from_request(&req), Some(SoapAction::GetFriendlyName));
    }

    #[test]
    fn test_action_header_ignores_case() {
        let req = request(r#"SoapAction: "URN:BELKIN:SERVICE:BASICEVENT:1#getbinarystate""#, "");
        assert_eq!(SoapAction::from_request(&req), Some(SoapAction::GetBinaryState));
    }

    #[test]
    fn test_unknown_action() {
        let req = request(r#"SOAPACTION: "urn:Belkin:service:basicevent:1#GetIcon""#, "");
        assert_eq!(SoapAction::from_request(&req), None);
        assert_eq!(SoapAction::from_request("POST /upnp/control/basicevent1 HTTP/1.1\r\n\r\n"), None);
    }

    #[test]
    fn test_requested_binary_state() {
        assert_eq!(
            requested_binary_state("<u:SetBinaryState><BinaryState>1</BinaryState></u:SetBinaryState>"),
            Some(PowerAction::On)
        );
        assert_eq!(requested_binary_state("<BinaryState>0</BinaryState>"), Some(PowerAction::Off));
        assert_eq!(requested_binary_state("<BinaryState>2</BinaryState>"), None);
        assert_eq!(requested_binary_state("<BinaryState> 1 </BinaryState>"), None);
    }

    #[test]
    fn test_envelope() {
        assert_eq!(
            envelope(SoapAction::SetBinaryState, "1"),
            "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
             <s:Body>\
             <u:SetBinaryStateResponse xmlns:u=\"urn:Belkin:service:basicevent:1\">\
             <BinaryState>1</BinaryState>\
             </u:SetBinaryStateResponse>\
             </s:Body>\
             </s:Envelope>"
        );

        let friendly = envelope(SoapAction::GetFriendlyName, "Lamp");
        assert!(friendly.contains("<u:GetFriendlyNameResponse "));
        assert!(friendly.contains("<FriendlyName>Lamp</FriendlyName>"));
    }
}
