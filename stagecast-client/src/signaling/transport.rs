use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

/// One established signaling connection: text frames in, text frames out.
#[async_trait]
pub trait SignalConnection: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame. `None` means the peer closed the connection.
    async fn recv(&mut self) -> Option<Result<String>>;
}

/// Dials signaling connections. The channel re-dials through the same
/// transport when the connection drops.
#[async_trait]
pub trait SignalTransport: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn SignalConnection>>;
}

/// WebSocket transport against the hosted hub.
pub struct WsTransport {
    url: Url,
    access_token: Option<String>,
}

impl WsTransport {
    pub fn new(url: Url, access_token: Option<String>) -> Self {
        Self { url, access_token }
    }
}

#[async_trait]
impl SignalTransport for WsTransport {
    async fn dial(&self) -> Result<Box<dyn SignalConnection>> {
        let mut url = self.url.clone();
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }

        let (stream, _response) = connect_async(url.as_str())
            .await
            .context("WebSocket handshake failed")?;

        debug!("signaling socket connected to {}", self.url);
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SignalConnection for WsConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .context("failed to send WebSocket frame")
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Pings are answered by tungstenite itself.
                Ok(_) => continue,
                Err(e) => return Some(Err(anyhow::Error::new(e))),
            }
        }
    }
}
