// SPDX-FileCopyrightText: © 2025 Aurocast Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wire framing for the three source protocols a stream can speak.
//!
//! `HttpTransport` pushes an Icecast2-style `PUT` source connection over
//! `reqwest`, sharing one client the way a pull-based fetch node would.
//! `RawTransport` covers the two legacy protocols, which both open a plain
//! TCP socket and write a header block before the first audio byte.

use aurocast_core::error::{AurocastError, Result};
use aurocast_core::output_stream::{OutputStreamConfig, Protocol, StreamInfo};
use base64::Engine;
use bytes::Bytes;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// The operations every wire protocol must provide to the connection state
/// machine. Pacing to the advertised bitrate is the caller's job (see
/// `connection::PacedWriter`); implementations just move bytes.
#[async_trait::async_trait]
pub trait SourceTransport: Send {
    async fn open(&mut self) -> Result<()>;
    async fn close(&mut self);
    async fn send(&mut self, buf: &[u8]) -> Result<()>;
    async fn set_metadata(&mut self, song: &str) -> Result<()>;
    fn is_connected(&self) -> bool;
}

fn shared_http_client() -> Result<&'static reqwest::Client> {
    static CLIENT: OnceLock<std::result::Result<reqwest::Client, reqwest::Error>> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .connect_timeout(Duration::from_secs(10))
                .build()
        })
        .as_ref()
        .map_err(|e| AurocastError::Network(format!("failed to initialize HTTP client: {e}")))
}

fn basic_auth_header(password: &str) -> String {
    let raw = format!("source:{password}");
    format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
}

fn content_type_header() -> (&'static str, &'static str) {
    ("Content-Type", "audio/mpeg")
}

fn metadata_header(info: &StreamInfo) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some(name) = &info.name {
        headers.push(("ice-name", name.clone()));
    }
    if let Some(genre) = &info.genre {
        headers.push(("ice-genre", genre.clone()));
    }
    if let Some(description) = &info.description {
        headers.push(("ice-description", description.clone()));
    }
    if let Some(url) = &info.url {
        headers.push(("ice-url", url.clone()));
    }
    headers.push(("ice-public", if info.public { "1".into() } else { "0".into() }));
    headers
}

/// Header telling the server to dump this connection's raw audio to a
/// file under that name server-side, the way `shout_set_dumpfile` asks
/// libshout to advertise one at connect time.
fn dump_file_header(dump_file: &Option<String>) -> Option<(&'static str, String)> {
    dump_file.as_ref().map(|name| ("ice-dumpfile", name.clone()))
}

/// Icecast2 source connection: one long-lived `PUT` whose body is fed by an
/// mpsc channel, the push-side mirror of a streaming-GET pull node.
pub struct HttpTransport {
    url: String,
    password: String,
    info: StreamInfo,
    dump_file: Option<String>,
    body_tx: Option<mpsc::Sender<std::result::Result<Bytes, std::io::Error>>>,
    task: Option<tokio::task::JoinHandle<Result<()>>>,
    connected: bool,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &OutputStreamConfig) -> Self {
        Self {
            url: format!("http://{}:{}{}", config.host, config.port, config.mount),
            password: config.password.clone(),
            info: config.info.clone(),
            dump_file: config.dump_file.clone(),
            body_tx: None,
            task: None,
            connected: false,
        }
    }
}

#[async_trait::async_trait]
impl SourceTransport for HttpTransport {
    async fn open(&mut self) -> Result<()> {
        let client = shared_http_client()?;
        let (tx, rx) = mpsc::channel::<std::result::Result<Bytes, std::io::Error>>(4);
        let body = reqwest::Body::wrap_stream(tokio_stream_from_receiver(rx));

        let (content_type_name, content_type_value) = content_type_header();
        let mut request = client
            .put(&self.url)
            .header("Authorization", basic_auth_header(&self.password))
            .header(content_type_name, content_type_value);
        for (name, value) in metadata_header(&self.info) {
            request = request.header(name, value);
        }
        if let Some((name, value)) = dump_file_header(&self.dump_file) {
            request = request.header(name, value);
        }

        let request = request.body(body);
        let task = tokio::spawn(async move {
            let response = request
                .send()
                .await
                .map_err(|e| AurocastError::Network(format!("source PUT failed: {e}")))?;
            if !response.status().is_success() {
                return Err(AurocastError::Network(format!(
                    "source server rejected connection: {}",
                    response.status()
                )));
            }
            Ok(())
        });

        self.body_tx = Some(tx);
        self.task = Some(task);
        self.connected = true;
        Ok(())
    }

    async fn close(&mut self) {
        self.body_tx.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.connected = false;
    }

    async fn send(&mut self, buf: &[u8]) -> Result<()> {
        let Some(tx) = self.body_tx.as_ref() else {
            return Err(AurocastError::Network("send on unopened HTTP transport".into()));
        };
        tx.send(Ok(Bytes::copy_from_slice(buf)))
            .await
            .map_err(|_| AurocastError::Network("HTTP source body channel closed".into()))?;
        Ok(())
    }

    async fn set_metadata(&mut self, song: &str) -> Result<()> {
        let client = shared_http_client()?;
        let (host_port, mount) = self
            .url
            .strip_prefix("http://")
            .and_then(|rest| rest.split_once('/'))
            .map(|(hp, m)| (hp.to_string(), format!("/{m}")))
            .unwrap_or_default();
        let metadata_url = format!("http://{host_port}/admin/metadata");
        let response = client
            .get(&metadata_url)
            .header("Authorization", basic_auth_header(&self.password))
            .query(&[("mode", "updinfo"), ("mount", mount.as_str()), ("song", song)])
            .send()
            .await
            .map_err(|e| AurocastError::Network(format!("metadata update failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AurocastError::Network(format!(
                "metadata update rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

fn tokio_stream_from_receiver(
    rx: mpsc::Receiver<std::result::Result<Bytes, std::io::Error>>,
) -> impl futures_util::Stream<Item = std::result::Result<Bytes, std::io::Error>> {
    tokio_stream::wrappers::ReceiverStream::new(rx)
}

/// Legacy XAUDIOCAST/SHOUTcast ICY framing: a bare TCP socket with a
/// line-oriented header block instead of HTTP verbs.
pub struct RawTransport {
    host: String,
    port: u16,
    password: String,
    info: StreamInfo,
    dump_file: Option<String>,
    protocol: Protocol,
    stream: Option<TcpStream>,
}

impl RawTransport {
    #[must_use]
    pub fn new(config: &OutputStreamConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            password: config.password.clone(),
            info: config.info.clone(),
            dump_file: config.dump_file.clone(),
            protocol: config.protocol,
            stream: None,
        }
    }

    fn handshake_header(&self) -> String {
        let mut header = String::new();
        match self.protocol {
            Protocol::Xaudiocast => header.push_str(&format!("SOURCE {}\r\n", self.password)),
            Protocol::Icy => header.push_str(&format!("SOURCE {} /\r\n", self.password)),
            Protocol::Http => unreachable!("HttpTransport handles Protocol::Http"),
        }
        header.push_str("Content-Type: audio/mpeg\r\n");
        if let Some(name) = &self.info.name {
            header.push_str(&format!("icy-name:{name}\r\n"));
        }
        if let Some(genre) = &self.info.genre {
            header.push_str(&format!("icy-genre:{genre}\r\n"));
        }
        if let Some(url) = &self.info.url {
            header.push_str(&format!("icy-url:{url}\r\n"));
        }
        if let Some(dump_file) = &self.dump_file {
            header.push_str(&format!("icy-dumpfile:{dump_file}\r\n"));
        }
        header.push_str(&format!("icy-pub:{}\r\n", i32::from(self.info.public)));
        header.push_str("\r\n");
        header
    }
}

#[async_trait::async_trait]
impl SourceTransport for RawTransport {
    async fn open(&mut self) -> Result<()> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| AurocastError::Network(format!("connect to {}:{} failed: {e}", self.host, self.port)))?;
        let header = self.handshake_header();
        stream
            .write_all(header.as_bytes())
            .await
            .map_err(|e| AurocastError::Network(format!("handshake write failed: {e}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }

    async fn send(&mut self, buf: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AurocastError::Network("send on unopened raw transport".into()))?;
        stream
            .write_all(buf)
            .await
            .map_err(|e| AurocastError::Network(format!("send failed: {e}")))
    }

    /// Legacy protocols here carry no in-band metadata-update command; a
    /// reconnect picks up new display metadata via the handshake header.
    async fn set_metadata(&mut self, _song: &str) -> Result<()> {
        tracing::debug!("metadata update is a no-op on legacy raw transports");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

/// Builds the transport appropriate for `config.protocol`.
#[must_use]
pub fn build_transport(config: &OutputStreamConfig) -> Box<dyn SourceTransport> {
    match config.protocol {
        Protocol::Http => Box::new(HttpTransport::new(config)),
        Protocol::Xaudiocast | Protocol::Icy => Box::new(RawTransport::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurocast_core::output_stream::EncoderSettings;

    fn config(protocol: Protocol) -> OutputStreamConfig {
        OutputStreamConfig {
            host: "localhost".into(),
            port: 8000,
            password: "hackme".into(),
            protocol,
            mount: "/live".into(),
            dump_file: None,
            info: StreamInfo {
                name: Some("Test Stream".into()),
                genre: Some("Rock".into()),
                description: None,
                url: None,
                public: true,
            },
            encoder: EncoderSettings { bitrate_kbps: 128, out_sample_rate: None, out_channels: None },
            reencode: false,
        }
    }

    #[test]
    fn raw_handshake_uses_source_password_for_xaudiocast() {
        let transport = RawTransport::new(&config(Protocol::Xaudiocast));
        let header = transport.handshake_header();
        assert!(header.starts_with("SOURCE hackme\r\n"));
        assert!(header.contains("icy-name:Test Stream\r\n"));
        assert!(header.ends_with("\r\n\r\n"));
    }

    #[test]
    fn raw_handshake_for_icy_includes_mount_slash() {
        let transport = RawTransport::new(&config(Protocol::Icy));
        let header = transport.handshake_header();
        assert!(header.starts_with("SOURCE hackme /\r\n"));
    }

    #[test]
    fn raw_handshake_includes_dump_file_when_configured() {
        let mut cfg = config(Protocol::Icy);
        cfg.dump_file = Some("live.mp3".into());
        let transport = RawTransport::new(&cfg);
        assert!(transport.handshake_header().contains("icy-dumpfile:live.mp3\r\n"));
    }

    #[test]
    fn raw_handshake_omits_dump_file_when_unset() {
        let transport = RawTransport::new(&config(Protocol::Icy));
        assert!(!transport.handshake_header().contains("dumpfile"));
    }

    #[test]
    fn basic_auth_header_encodes_source_user() {
        let header = basic_auth_header("hackme");
        assert_eq!(header, "Basic c291cmNlOmhhY2ttZQ==");
    }

    #[tokio::test]
    async fn http_transport_starts_disconnected() {
        let transport = HttpTransport::new(&config(Protocol::Http));
        assert!(!transport.is_connected());
    }
}
