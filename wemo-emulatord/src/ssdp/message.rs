//! M-SEARCH parsing and search-response construction.

use std::net::SocketAddr;
use std::time::Duration;
use rand::Rng;
use uuid::Uuid;
use shared::protocol::{MAN_DISCOVER, MAX_AGE, SEARCH_TARGETS, SSDP_OPT, SSDP_SERVER};
use shared::types::AdvertisementRecord;
use crate::device::http::CRLF;

/// Upper bound, in seconds, on the reply jitter whatever MX says
pub const MAX_JITTER_SECS: i64 = 5;

/// A discovery query we are willing to answer
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryQuery {
    pub sender: SocketAddr,
    /// Matched header line, e.g. "ST: upnp:rootdevice"
    pub search_target: &'static str,
    pub mx: f64,
}

impl DiscoveryQuery {
    /// Parse a datagram. Returns `None` for anything that is not an
    /// M-SEARCH for one of our search targets.
    pub fn parse(data: &str, sender: SocketAddr) -> Option<Self> {
        let search_target = SEARCH_TARGETS.into_iter().find(|st| data.contains(st))?;
        if !data.to_lowercase().contains(MAN_DISCOVER) {
            return None;
        }

        Some(Self {
            sender,
            search_target,
            mx: parse_mx(data),
        })
    }

    /// Search-target value without the "ST: " prefix
    pub fn search_target_value(&self) -> &'static str {
        self.search_target
            .strip_prefix("ST: ")
            .unwrap_or(self.search_target)
    }
}

/// Value of the first line starting with "MX: ", or 0.0 when absent or not
/// a plain decimal number.
pub fn parse_mx(data: &str) -> f64 {
    data.lines()
        .find(|line| line.starts_with("MX: "))
        .and_then(|line| line.split_whitespace().last())
        .filter(|token| is_decimal(token))
        .and_then(|token| token.parse().ok())
        .unwrap_or(0.0)
}

/// Digits with at most one decimal point
fn is_decimal(token: &str) -> bool {
    let digits = token.replacen('.', "", 1);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Whole seconds the reply may be delayed by: MX is truncated, then clamped
pub fn jitter_bound_secs(mx: f64) -> u64 {
    (mx.trunc() as i64).clamp(0, MAX_JITTER_SECS) as u64
}

/// Draw an independent reply delay in `[0, jitter_bound_secs(mx))` seconds
pub fn draw_delay<R: Rng + ?Sized>(rng: &mut R, mx: f64) -> Duration {
    match jitter_bound_secs(mx) {
        0 => Duration::ZERO,
        bound => Duration::from_secs(rng.random_range(0..bound)),
    }
}

/// Unicast search response advertising one device
pub fn search_response(
    record: &AdvertisementRecord,
    query: &DiscoveryQuery,
    date: &str,
    nls: Uuid,
) -> String {
    let lines = [
        "HTTP/1.1 200 OK".to_string(),
        format!("CACHE-CONTROL: max-age={}", MAX_AGE),
        format!("DATE: {}", date),
        "EXT:".to_string(),
        format!("LOCATION: {}", record.location()),
        format!("OPT: {}", SSDP_OPT),
        format!("01-NLS: {}", nls),
        format!("SERVER: {}", SSDP_SERVER),
        query.search_target.to_string(),
        format!("USN: {}", record.usn(query.search_target_value())),
    ];
    format!("{}{}{}", lines.join(CRLF), CRLF, CRLF)
}
