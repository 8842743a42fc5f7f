use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use quick_xml::escape::escape;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span};
use shared::types::DeviceIdentity;
use crate::backend::{Plug, PowerAction};
use crate::config::{EmulatorConfig, Framing};
use crate::error::{EmulatorError, Result};
use super::descriptors::{setup_xml, EVENTSERVICE_XML, METAINFO_XML};
use super::http::{self, Route, MAX_REQUEST_SIZE};
use super::soap::{self, SoapAction};

const READ_CHUNK: usize = 8192;

/// Per-endpoint connection handling settings
#[derive(Debug, Clone, Copy)]
pub struct EndpointSettings {
    pub framing: Framing,
    pub idle_timeout: Option<Duration>,
}

impl From<&EmulatorConfig> for EndpointSettings {
    fn from(config: &EmulatorConfig) -> Self {
        Self {
            framing: config.framing,
            idle_timeout: config.idle_timeout(),
        }
    }
}

/// What a single request produced
enum Outcome {
    /// Send this framed response, then close
    Respond(String),
    /// Close without a body
    Close,
    /// Not ours: keep the connection open and wait for more data
    Ignore,
}

struct Device {
    identity: DeviceIdentity,
    plug: Plug,
    settings: EndpointSettings,
}

/// TCP endpoint serving the descriptors and control URL of one device.
pub struct DeviceEndpoint {
    listener: TcpListener,
    device: Arc<Device>,
    span: Span,
}

impl DeviceEndpoint {
    /// Bind the device's listener. A failure here is fatal to this device only.
    pub async fn bind(
        identity: DeviceIdentity,
        plug: Plug,
        settings: EndpointSettings,
        span: Span,
    ) -> Result<Self> {
        let addr = SocketAddr::from((identity.ip(), identity.port()));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| EmulatorError::bind(addr, e))?;

        Ok(Self {
            listener,
            device: Arc::new(Device { identity, plug, settings }),
            span,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `cancel` fires. Each connection runs in its
    /// own task on `tracker`, so a slow backend only holds up its own client.
    pub async fn run(self, cancel: CancellationToken, tracker: TaskTracker) {
        let span = self.span.clone();
        async move {
            match self.local_addr() {
                Ok(addr) => tracing::info!("Listening on {}", addr),
                Err(e) => tracing::warn!("Listening on unknown address: {}", e),
            }

            loop {
                tokio::select! {
                    accepted = self.listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            tracing::debug!("New TCP connection from {}", peer);
                            let conn_span = tracing::debug_span!("conn", %peer);
                            tracker.spawn(
                                serve_connection(self.device.clone(), stream, cancel.clone())
                                    .instrument(conn_span),
                            );
                        }
                        Err(e) => {
                            tracing::warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    },
                    _ = cancel.cancelled() => {
                        tracing::info!("Endpoint shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

async fn serve_connection(device: Arc<Device>, mut stream: TcpStream, cancel: CancellationToken) {
    let mut pending = Vec::new();

    loop {
        let read = read_request(&mut stream, &mut pending, device.settings);
        let raw = tokio::select! {
            result = read => match result {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    tracing::debug!("Connection closed");
                    return;
                }
                Err(e) => {
                    tracing::debug!("Dropping connection: {}", e);
                    return;
                }
            },
            _ = cancel.cancelled() => return,
        };

        let request = match String::from_utf8(raw) {
            Ok(request) => request,
            Err(_) => {
                let err = EmulatorError::ProtocolParse("request is not valid UTF-8".to_string());
                tracing::warn!("{}", err);
                return;
            }
        };
        tracing::debug!("Received message:\n{}", request);

        let outcome = tokio::select! {
            outcome = dispatch(&device, &request) => outcome,
            _ = cancel.cancelled() => return,
        };

        match outcome {
            Outcome::Respond(body) => {
                // Not raced against cancellation: a started response is always finished
                let response = http::frame_response(&body, Utc::now());
                tracing::debug!("Response:\n{}", response);
                if let Err(e) = stream.write_all(response.as_bytes()).await {
                    tracing::warn!("Failed to write response: {}", e);
                }
                let _ = stream.shutdown().await;
                return;
            }
            Outcome::Close => return,
            Outcome::Ignore => continue,
        }
    }
}

/// Read the next request. `Ok(None)` means the peer closed the connection
/// or stayed silent past the idle timeout.
async fn read_request(
    stream: &mut TcpStream,
    pending: &mut Vec<u8>,
    settings: EndpointSettings,
) -> io::Result<Option<Vec<u8>>> {
    let Some(idle) = settings.idle_timeout else {
        return read_framed(stream, pending, settings.framing).await;
    };

    match tokio::time::timeout(idle, read_framed(stream, pending, settings.framing)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!("Idle for {:?}, closing", idle);
            Ok(None)
        }
    }
}

async fn read_framed(
    stream: &mut TcpStream,
    pending: &mut Vec<u8>,
    framing: Framing,
) -> io::Result<Option<Vec<u8>>> {
    let mut chunk = vec![0u8; READ_CHUNK];

    match framing {
        Framing::SingleRead => {
            let n = stream.read(&mut chunk).await?;
            chunk.truncate(n);
            Ok((n > 0).then_some(chunk))
        }
        Framing::Buffered => loop {
            let complete = http::complete_request_len(pending)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if let Some(len) = complete {
                return Ok(Some(pending.drain(..len).collect()));
            }
            if pending.len() > MAX_REQUEST_SIZE {
                let err = EmulatorError::ProtocolParse(format!("request exceeds {} bytes", MAX_REQUEST_SIZE));
                return Err(io::Error::new(io::ErrorKind::InvalidData, err));
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            pending.extend_from_slice(&chunk[..n]);
        },
    }
}

async fn dispatch(device: &Device, request: &str) -> Outcome {
    match http::route(request) {
        Route::Setup => {
            tracing::info!("setup.xml requested");
            Outcome::Respond(setup_xml(&device.identity))
        }
        Route::EventService => {
            tracing::info!("eventservice.xml requested");
            Outcome::Respond(EVENTSERVICE_XML.to_string())
        }
        Route::MetaInfo => {
            tracing::info!("metainfoservice.xml requested");
            Outcome::Respond(METAINFO_XML.to_string())
        }
        Route::BasicEventControl => match control(device, request).await {
            Ok(envelope) => Outcome::Respond(envelope),
            Err(e) => {
                tracing::warn!("Unable to complete command for {}: {}", device.identity.name(), e);
                Outcome::Close
            }
        },
        Route::Unmatched => {
            tracing::debug!("Ignoring unrecognised request");
            Outcome::Ignore
        }
    }
}

/// Run a basicevent1 action and build its SOAP response envelope
async fn control(device: &Device, request: &str) -> Result<String> {
    let name = device.identity.name();
    let action = SoapAction::from_request(request)
        .ok_or_else(|| EmulatorError::ProtocolParse("no supported SOAPACTION header".to_string()))?;

    let value = match action {
        SoapAction::GetBinaryState => {
            tracing::info!("Attempting to get state for {}", name);
            let state = device.plug.get_state().await;
            tracing::info!("{} state: {}", name, state);
            match state.to_lowercase().as_str() {
                "on" => "1".to_string(),
                "off" => "0".to_string(),
                _ => {
                    return Err(EmulatorError::CapabilityCall {
                        device: name.to_string(),
                        action: format!("GetBinaryState returned '{}'", state),
                    })
                }
            }
        }
        SoapAction::SetBinaryState => {
            let requested = soap::requested_binary_state(request).ok_or_else(|| {
                EmulatorError::ProtocolParse("SetBinaryState without a 0/1 BinaryState".to_string())
            })?;
            tracing::info!("Attempting to turn {} {}", requested, name);

            let success = match requested {
                PowerAction::On => device.plug.on().await,
                PowerAction::Off => device.plug.off().await,
            };
            if !success {
                return Err(EmulatorError::CapabilityCall {
                    device: name.to_string(),
                    action: format!("turn {}", requested),
                });
            }
            soap::binary_value(requested).to_string()
        }
        SoapAction::GetFriendlyName => {
            tracing::info!("{} returning friendly name", name);
            escape(name).into_owned()
        }
    };

    Ok(soap::envelope(action, &value))
}
