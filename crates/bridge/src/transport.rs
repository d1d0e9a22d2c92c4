//! Duplex transport seam.
//!
//! The bridge only needs "send a text frame" and "receive the next text frame".
//! [`Connector`] opens one such duplex; [`WebSocketConnector`] does it over
//! `tokio-tungstenite`, the in-memory [`crate::mock::MockConnector`] does it
//! over channels for tests.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Once;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vibecraft_core::config::BridgeConfig;
use vibecraft_core::{Error, Result};

// =============================================================================
// Transport Traits
// =============================================================================

/// Write half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the connection. Errors are informational only.
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next inbound text frame; `None` once the peer has closed.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

/// Both halves of a freshly opened connection.
pub struct Duplex {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

/// Opens connections to the client mod.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Duplex>;

    /// Human-readable endpoint, used in error messages.
    fn endpoint(&self) -> String;
}

// =============================================================================
// WebSocket Implementation
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// `wss://` handshakes need a process-wide rustls crypto provider.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        // Err means some other component installed one first.
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("rustls crypto provider already installed");
        }
    });
}

/// Connector over a real WebSocket.
pub struct WebSocketConnector {
    url: String,
    timeout: Duration,
}

impl WebSocketConnector {
    /// Create a connector for `url` with the given connect timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }

    /// Create a connector from bridge settings.
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.endpoint(),
            Duration::from_secs_f64(config.timeout_secs.max(0.0)),
        )
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Duplex> {
        if self.url.starts_with("wss://") {
            install_crypto_provider();
        }
        let (ws, _response) = tokio::time::timeout(self.timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| Error::connection(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::connection(e.to_string()))?;

        tracing::debug!(url = %self.url, "WebSocket connected");

        let (sink, stream) = ws.split();
        Ok(Duplex {
            sink: Box::new(WebSocketSink { inner: sink }),
            stream: Box::new(WebSocketFrames { inner: stream }),
        })
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::connection(format!("Client bridge send failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| Error::connection(format!("Client bridge close failed: {}", e)))
    }
}

struct WebSocketFrames {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Ok(Message::Close(_)) => return None,
                // ping/pong are answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => {
                    return Some(Err(Error::connection(format!(
                        "Client bridge recv failed: {}",
                        e
                    ))))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Port 9 (discard) on loopback is essentially never listening.
        let connector = WebSocketConnector::new("ws://127.0.0.1:9/vibecraft", Duration::from_secs(2));
        let err = match connector.connect().await {
            Ok(_) => panic!("connect unexpectedly succeeded"),
            Err(e) => e,
        };
        assert!(matches!(err, Error::Connection(_)));
        assert_eq!(connector.endpoint(), "ws://127.0.0.1:9/vibecraft");
    }

    #[tokio::test]
    async fn test_secure_endpoint_attempts_tls_handshake() {
        // A plain TCP peer that hangs up: the TLS client must get as far as
        // trying a handshake against it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let config = BridgeConfig {
            port,
            use_ssl: true,
            timeout_secs: 5.0,
            ..BridgeConfig::default()
        };
        let connector = WebSocketConnector::from_config(&config);
        assert_eq!(connector.endpoint(), format!("wss://127.0.0.1:{}/vibecraft", port));

        let message = match connector.connect().await {
            Ok(_) => panic!("handshake with a plain TCP peer succeeded"),
            Err(Error::Connection(message)) => message,
            Err(other) => panic!("expected a connection error, got {:?}", other),
        };
        assert!(!message.contains("not compiled in"), "{}", message);
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let connector = WebSocketConnector::from_config(&BridgeConfig::default());
        assert_eq!(connector.endpoint(), "ws://127.0.0.1:8766/vibecraft");
        assert_eq!(connector.timeout, Duration::from_secs(10));
    }
}
