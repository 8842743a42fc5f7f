//! Minimal HTTP/1.1 request routing and response framing.
//!
//! Only the four request shapes a discovery client issues are recognised;
//! there is no keep-alive, chunked encoding or pipelining.

use chrono::{DateTime, Utc};
use shared::protocol::{
    BASICEVENT_CONTROL_PATH, EVENTSERVICE_PATH, HTTP_SERVER, HTTP_USER_AGENT, LAST_MODIFIED,
    METAINFO_PATH, SETUP_PATH,
};
use crate::error::{EmulatorError, Result};

pub const CRLF: &str = "\r\n";

/// Upper bound on a buffered request
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Setup,
    EventService,
    MetaInfo,
    BasicEventControl,
    Unmatched,
}

/// Pick the handler for a raw request, first match wins
pub fn route(request: &str) -> Route {
    if request.starts_with(&format!("GET {}", SETUP_PATH)) {
        Route::Setup
    } else if request.contains(EVENTSERVICE_PATH) {
        Route::EventService
    } else if request.contains(METAINFO_PATH) {
        Route::MetaInfo
    } else if request.starts_with(&format!("POST {}", BASICEVENT_CONTROL_PATH)) {
        Route::BasicEventControl
    } else {
        Route::Unmatched
    }
}

/// RFC 1123 date as used in HTTP headers
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Wrap a body in the fixed `200 OK` response header block
pub fn frame_response(body: &str, now: DateTime<Utc>) -> String {
    [
        "HTTP/1.1 200 OK".to_string(),
        format!("CONTENT-LENGTH: {}", body.len()),
        "CONTENT-TYPE: text/xml".to_string(),
        format!("DATE: {}", http_date(now)),
        format!("LAST-MODIFIED: {}", LAST_MODIFIED),
        format!("SERVER: {}", HTTP_SERVER),
        format!("X-User-Agent: {}", HTTP_USER_AGENT),
        format!("CONNECTION: close{}", CRLF),
        body.to_string(),
    ]
    .join(CRLF)
}

/// Length of the first complete request in `buf`, if one has arrived.
///
/// A request is complete once the blank line after the headers is present
/// and, when a `Content-Length` header is given, the whole body as well.
/// A declared length that would take the request past `MAX_REQUEST_SIZE`
/// is rejected before any more of it is read.
pub fn complete_request_len(buf: &[u8]) -> Result<Option<usize>> {
    let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4) else {
        return Ok(None);
    };
    let headers = String::from_utf8_lossy(&buf[..header_end]);

    let body_len = headers
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let total = header_end
        .checked_add(body_len)
        .filter(|&total| total <= MAX_REQUEST_SIZE)
        .ok_or_else(|| {
            EmulatorError::ProtocolParse(format!(
                "declared body of {} bytes exceeds the {} byte request limit",
                body_len, MAX_REQUEST_SIZE
            ))
        })?;
    Ok((buf.len() >= total).then_some(total))
}
