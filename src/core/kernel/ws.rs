use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, instrument};

/// Streaming session configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Time allowed for the login acknowledgement in milliseconds
    pub auth_timeout_ms: u64,
    /// Bounded wait for one inbound frame in milliseconds
    pub read_timeout_ms: u64,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Max reconnection attempts per sequence
    pub max_reconnect_attempts: u32,
    /// Base reconnection delay in milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,    // 10 seconds
            auth_timeout_ms: 5_000,        // 5 seconds
            read_timeout_ms: 10_000,       // 10 seconds
            heartbeat_interval_ms: 15_000, // 15 seconds
            max_reconnect_attempts: 3,
            reconnect_delay_ms: 500,
        }
    }
}

impl WsConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Write half of one connection
#[async_trait]
pub trait WsSink: Send {
    /// Send a raw message
    async fn send(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;
}

/// Read half of one connection
#[async_trait]
pub trait WsStream: Send {
    /// Receive the next text frame; `None` once the peer has closed
    async fn next_text(&mut self) -> Option<Result<String, ExchangeError>>;
}

/// One open connection, split so reads and writes can proceed independently
pub struct WsConnection {
    pub sink: Box<dyn WsSink>,
    pub stream: Box<dyn WsStream>,
}

/// Opens connections; the session asks for a fresh one on every (re)connect
#[async_trait]
pub trait WsTransport: Send + Sync + 'static {
    async fn open(&self, url: &str, config: &WsConfig) -> Result<WsConnection, ExchangeError>;
}

type TungsteniteStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Tungstenite-backed transport
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

pub struct TungsteniteSink {
    write: SplitSink<TungsteniteStream, Message>,
}

pub struct TungsteniteReader {
    read: SplitStream<TungsteniteStream>,
}

#[async_trait]
impl WsTransport for TungsteniteTransport {
    #[instrument(skip(self, config), fields(url = %url))]
    async fn open(&self, url: &str, config: &WsConfig) -> Result<WsConnection, ExchangeError> {
        let (ws_stream, _) = tokio::time::timeout(config.connect_timeout(), connect_async(url))
            .await
            .map_err(|_| {
                ExchangeError::ConnectionError("WebSocket connection timeout".to_string())
            })?
            .map_err(|e| {
                ExchangeError::ConnectionError(format!("WebSocket connection failed: {}", e))
            })?;

        let (write, read) = ws_stream.split();
        Ok(WsConnection {
            sink: Box::new(TungsteniteSink { write }),
            stream: Box::new(TungsteniteReader { read }),
        })
    }
}

#[async_trait]
impl WsSink for TungsteniteSink {
    async fn send(&mut self, msg: Message) -> Result<(), ExchangeError> {
        self.write.send(msg).await.map_err(|e| {
            ExchangeError::ConnectionError(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        self.write.close().await.map_err(|e| {
            ExchangeError::ConnectionError(format!("Failed to close WebSocket: {}", e))
        })
    }
}

#[async_trait]
impl WsStream for TungsteniteReader {
    async fn next_text(&mut self) -> Option<Result<String, ExchangeError>> {
        loop {
            match self.read.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(data)) => {
                    return Some(String::from_utf8(data).map_err(|e| {
                        ExchangeError::ConnectionError(format!(
                            "Invalid UTF-8 in binary message: {}",
                            e
                        ))
                    }));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                // tungstenite queues the pong reply to a ping itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(e) => {
                    return Some(Err(ExchangeError::ConnectionError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
            }
        }
    }
}
