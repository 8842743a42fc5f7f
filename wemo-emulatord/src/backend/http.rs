use std::collections::BTreeMap;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use crate::config::{CommandData, HttpConfig, HttpMethod};
use crate::error::{EmulatorError, Result};
use super::{Capability, PowerAction};

/// Backend that drives a device through HTTP requests.
pub struct HttpBackend {
    name: String,
    port: u16,
    client: Client,
    config: HttpConfig,
}

impl HttpBackend {
    pub fn new(name: &str, port: u16, config: &HttpConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmulatorError::Configuration(format!("device '{}': {}", name, e)))?;

        Ok(Self {
            name: name.to_string(),
            port,
            client,
            config: config.clone(),
        })
    }

    fn request(&self, method: HttpMethod, url: &str, data: Option<&CommandData>) -> RequestBuilder {
        let mut request = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => match data {
                Some(CommandData::Text(text)) => self.client.post(url).body(text.clone()),
                Some(CommandData::Form(form)) => self.client.post(url).form(form),
                None => self.client.post(url),
            },
        };

        request = apply_headers(request, &self.config.headers);
        if let Some(user) = &self.config.user {
            request = request.basic_auth(user, self.config.password.as_ref());
        }
        request
    }

    async fn set_state(&self, url: &str, data: Option<&CommandData>) -> bool {
        tracing::debug!("{}: {:?} {}", self.name, self.config.method, url);

        match self.request(self.config.method, url, data).send().await {
            Ok(response) => {
                let status = response.status();
                tracing::debug!("{}: status {} for {}", self.name, status, url);
                status == StatusCode::OK || status == StatusCode::CREATED
            }
            Err(e) => {
                tracing::error!("{}: request to {} failed: {}", self.name, url, e);
                false
            }
        }
    }
}

fn apply_headers(mut request: RequestBuilder, headers: &BTreeMap<String, String>) -> RequestBuilder {
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }
    request
}

/// Interpret a state response body: exactly one of the two markers must occur
fn state_from_body(body: &str, on_marker: Option<&str>, off_marker: Option<&str>) -> &'static str {
    let has_on = on_marker.is_some_and(|m| body.contains(m));
    let has_off = off_marker.is_some_and(|m| body.contains(m));
    match (has_on, has_off) {
        (true, false) => "on",
        (false, true) => "off",
        _ => "unknown",
    }
}

#[async_trait]
impl Capability for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn on(&self) -> bool {
        self.set_state(&self.config.on_cmd, self.config.on_data.as_ref()).await
    }

    async fn off(&self) -> bool {
        self.set_state(&self.config.off_cmd, self.config.off_data.as_ref()).await
    }

    async fn get_state(&self, last_action: PowerAction) -> String {
        if self.config.use_fake_state {
            return last_action.as_str().to_string();
        }

        let Some(url) = &self.config.state_cmd else {
            return "unknown".to_string();
        };

        let request = self.request(self.config.state_method, url, self.config.state_data.as_ref());
        let body = match request.send().await {
            Ok(response) => match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!("{}: failed to read state from {}: {}", self.name, url, e);
                    return "unknown".to_string();
                }
            },
            Err(e) => {
                tracing::error!("{}: state request to {} failed: {}", self.name, url, e);
                return "unknown".to_string();
            }
        };

        tracing::debug!("{}: state response: {}", self.name, body);
        state_from_body(
            &body,
            self.config.state_response_on.as_deref(),
            self.config.state_response_off.as_deref(),
        )
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    fn config(base: &str) -> HttpConfig {
        HttpConfig {
            on_cmd: format!("{}/on", base),
            off_cmd: format!("{}/off", base),
            method: HttpMethod::Post,
            on_data: Some(CommandData::Form(BTreeMap::from([("state".to_string(), "1".to_string())]))),
            off_data: Some(CommandData::Text("state=0".to_string())),
            headers: BTreeMap::from([("X-Token".to_string(), "secret".to_string())]),
            state_cmd: Some(format!("{}/status", base)),
            state_method: HttpMethod::Get,
            state_data: None,
            state_response_on: Some("\"power\":\"on\"".to_string()),
            state_response_off: Some("\"power\":\"off\"".to_string()),
            user: None,
            password: None,
            use_fake_state: false,
        }
    }

    /// Serve one canned response per connection and report each raw request
    async fn serve(responses: Vec<&'static str>) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for response in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = stream.read(&mut buf).await.unwrap();
                    request.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&request);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| l.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
                            .and_then(|v| v.parse::<usize>().ok())
                            .unwrap_or(0);
                        if request.len() >= end + 4 + length {
                            break;
                        }
                    }
                    if n == 0 {
                        break;
                    }
                }
                tx.send(String::from_utf8_lossy(&request).into_owned()).unwrap();
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.ok();
            }
        });

        (addr, rx)
    }

    #[test]
    fn test_state_from_body() {
        assert_eq!(state_from_body("{\"on\":1}", Some("\"on\":1"), Some("\"on\":0")), "on");
        assert_eq!(state_from_body("{\"on\":0}", Some("\"on\":1"), Some("\"on\":0")), "off");
        assert_eq!(state_from_body("both on off", Some("on"), Some("off")), "unknown");
        assert_eq!(state_from_body("nothing", Some("on"), None), "unknown");
    }

    #[tokio::test]
    async fn test_on_posts_form_and_checks_status() {
        let (addr, mut requests) = serve(vec![
            "HTTP/1.1 201 Created\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ])
        .await;
        let backend = HttpBackend::new("Heater", 8124, &config(&format!("http://{}", addr)), Duration::from_secs(5)).unwrap();

        assert!(backend.on().await);
        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /on "));
        assert!(request.to_ascii_lowercase().contains("x-token: secret"));
        assert!(request.ends_with("state=1"));

        assert!(!backend.off().await);
        let request = requests.recv().await.unwrap();
        assert!(request.starts_with("POST /off "));
        assert!(request.ends_with("state=0"));
    }

    #[tokio::test]
    async fn test_state_query() {
        let (addr, _requests) = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 15\r\nConnection: close\r\n\r\n{\"power\":\"off\"}",
        ])
        .await;
        let backend = HttpBackend::new("Heater", 8124, &config(&format!("http://{}", addr)), Duration::from_secs(5)).unwrap();

        assert_eq!(backend.get_state(PowerAction::On).await, "off");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = HttpBackend::new("Heater", 8124, &config(&format!("http://{}", addr)), Duration::from_secs(2)).unwrap();
        assert!(!backend.on().await);
        assert_eq!(backend.get_state(PowerAction::On).await, "unknown");
    }

    #[tokio::test]
    async fn test_fake_state_skips_request() {
        let mut config = config("http://127.0.0.1:9");
        config.use_fake_state = true;
        let backend = HttpBackend::new("Heater", 8124, &config, Duration::from_secs(1)).unwrap();
        assert_eq!(backend.get_state(PowerAction::On).await, "on");
    }
}
