use std::net::{IpAddr, Ipv4Addr};
use anyhow::{anyhow, Context, Result};
use tokio::net::UdpSocket;

/// Resolve the address the devices listen on and advertise.
///
/// Anything other than "auto" (or an empty string) must be a literal IPv4
/// address. For "auto" the host name is resolved first; a loopback answer
/// falls back to the source address of a route towards a public host.
pub async fn resolve_ip(configured: &str) -> Result<Ipv4Addr> {
    let configured = configured.trim();
    if !configured.is_empty() && !configured.eq_ignore_ascii_case("auto") {
        return configured
            .parse()
            .with_context(|| format!("Invalid IPv4 address: {}", configured));
    }

    tracing::debug!("Detecting local IP address");
    if let Some(ip) = from_hostname().await {
        tracing::info!("Using IP address {} (from host name)", ip);
        return Ok(ip);
    }

    let ip = from_default_route().await?;
    tracing::info!("Using IP address {} (from default route)", ip);
    Ok(ip)
}

async fn from_hostname() -> Option<Ipv4Addr> {
    let hostname = hostname::get().ok()?.to_string_lossy().to_string();
    tracing::debug!("Host name: {}", hostname);

    let ip = tokio::net::lookup_host((hostname.as_str(), 0))
        .await
        .ok()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })?;

    usable(ip).then_some(ip)
}

/// "Connecting" a UDP socket sends nothing but makes the kernel pick a source address
async fn from_default_route() -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .await
        .context("Failed to open probe socket")?;
    socket
        .connect(("8.8.8.8", 80))
        .await
        .context("Unable to determine IP address: no route")?;

    match socket.local_addr()?.ip() {
        IpAddr::V4(ip) if usable(ip) => Ok(ip),
        other => Err(anyhow!("Unable to determine IP address: got {}", other)),
    }
}

fn usable(ip: Ipv4Addr) -> bool {
    !ip.is_loopback() && !ip.is_unspecified()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_literal_address() {
        assert_eq!(resolve_ip("192.168.1.10").await.unwrap(), Ipv4Addr::new(192, 168, 1, 10));
        assert_eq!(resolve_ip(" 10.0.0.5 ").await.unwrap(), Ipv4Addr::new(10, 0, 0, 5));
        assert!(resolve_ip("fe80::1").await.is_err());
        assert!(resolve_ip("lamp.local").await.is_err());
    }

    #[test]
    fn test_loopback_not_usable() {
        assert!(!usable(Ipv4Addr::new(127, 0, 1, 1)));
        assert!(!usable(Ipv4Addr::UNSPECIFIED));
        assert!(usable(Ipv4Addr::new(192, 168, 1, 10)));
    }
}
