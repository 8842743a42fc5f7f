use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use chrono::Utc;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span};
use uuid::Uuid;
use crate::config::DiscoveryConfig;
use crate::device::http::http_date;
use crate::error::{EmulatorError, Result};
use crate::registry::Registry;
use super::message::{draw_delay, search_response, DiscoveryQuery};

const MAX_DATAGRAM: usize = 8192;

#[derive(Debug, Clone, Copy)]
pub struct DiscoverySettings {
    pub port: u16,
    pub group: Ipv4Addr,
    pub interface: Ipv4Addr,
}

impl From<&DiscoveryConfig> for DiscoverySettings {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            port: config.port,
            group: config.group(),
            interface: config.interface,
        }
    }
}

/// Answers M-SEARCH queries on behalf of every registered device.
pub struct DiscoveryResponder {
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
    span: Span,
}

impl DiscoveryResponder {
    /// Bind the shared discovery port and join the multicast group.
    ///
    /// Must be called from within a tokio runtime. A failed bind is fatal;
    /// a failed group join is only logged, since unicast queries still work.
    pub fn bind(settings: DiscoverySettings, registry: Arc<Registry>, span: Span) -> Result<Self> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.port));
        let socket = open_socket(addr).map_err(|e| EmulatorError::bind(addr, e))?;

        span.in_scope(|| {
            match socket.join_multicast_v4(&settings.group, &settings.interface) {
                Ok(()) => tracing::debug!("Joined {} on {}", settings.group, settings.interface),
                Err(e) => tracing::warn!(
                    "Failed to join multicast group {} on {}: {}",
                    settings.group,
                    settings.interface,
                    e
                ),
            }
        });

        let socket = UdpSocket::from_std(socket.into()).map_err(|e| EmulatorError::bind(addr, e))?;

        Ok(Self {
            socket: Arc::new(socket),
            registry,
            span,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive queries until `cancel` fires. Replies are scheduled on
    /// `tracker` and dropped unsent if cancellation comes first.
    pub async fn run(self, cancel: CancellationToken, tracker: TaskTracker) {
        let span = self.span.clone();
        async move {
            match self.local_addr() {
                Ok(addr) => tracing::info!("SSDP responder listening on {}", addr),
                Err(e) => tracing::warn!("SSDP responder on unknown address: {}", e),
            }

            let mut buf = vec![0u8; MAX_DATAGRAM];
            loop {
                tokio::select! {
                    received = self.socket.recv_from(&mut buf) => match received {
                        Ok((n, sender)) => self.handle_datagram(&buf[..n], sender, &cancel, &tracker),
                        Err(e) => tracing::warn!("SSDP receive error: {}", e),
                    },
                    _ = cancel.cancelled() => {
                        tracing::info!("SSDP responder shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    fn handle_datagram(
        &self,
        data: &[u8],
        sender: SocketAddr,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        let Ok(text) = std::str::from_utf8(data) else {
            tracing::debug!("Ignoring non UTF-8 datagram from {}", sender);
            return;
        };
        tracing::trace!("Received data from {}:\n{}", sender, text);

        let Some(query) = DiscoveryQuery::parse(text, sender) else {
            return;
        };
        tracing::info!(
            "M-SEARCH from {} for {} (MX {})",
            sender,
            query.search_target_value(),
            query.mx
        );

        let date = http_date(Utc::now());
        let mut rng = rand::rng();

        for record in self.registry.records() {
            let response = search_response(record, &query, &date, Uuid::new_v4());
            let delay = draw_delay(&mut rng, query.mx);
            let socket = self.socket.clone();
            let cancel = cancel.clone();
            let name = record.name.clone();

            tracker.spawn(
                async move {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return,
                    }
                    match socket.send_to(response.as_bytes(), sender).await {
                        Ok(_) => tracing::debug!(
                            "Sent {} advertisement to {} after {:?}:\n{}",
                            name,
                            sender,
                            delay,
                            response
                        ),
                        Err(e) => tracing::warn!("Failed to send {} advertisement to {}: {}", name, sender, e),
                    }
                }
                .instrument(Span::current()),
            );
        }
    }
}

fn open_socket(addr: SocketAddr) -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket)
}
