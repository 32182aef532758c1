#![allow(dead_code)]

use async_trait::async_trait;
use blofin_ws::core::kernel::{WsConfig, WsConnection, WsSink, WsStream, WsTransport};
use blofin_ws::exchanges::blofin::{BlofinWsBuilder, BlofinWsSession};
use blofin_ws::ExchangeError;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(2);

pub const API_KEY: &str = "test_key";
pub const SECRET_KEY: &str = "test_secret";
pub const PASSPHRASE: &str = "test_passphrase";

/// In-memory transport; every successful `open` hands the server end to the test
pub struct MockTransport {
    opens: AtomicU32,
    failures: AtomicU32,
    open_times: Mutex<Vec<Instant>>,
    open_delay: Mutex<Duration>,
    accepted_tx: mpsc::UnboundedSender<ServerConn>,
    accepted_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerConn>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            opens: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            open_times: Mutex::new(Vec::new()),
            open_delay: Mutex::new(Duration::ZERO),
            accepted_tx,
            accepted_rx: tokio::sync::Mutex::new(accepted_rx),
        })
    }

    /// Refuse the next `n` connection attempts
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn set_open_delay(&self, delay: Duration) {
        *self.open_delay.lock().unwrap() = delay;
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.open_times.lock().unwrap().clone()
    }

    /// Server end of the next successfully opened connection
    pub async fn accept(&self) -> ServerConn {
        let mut rx = self.accepted_rx.lock().await;
        timeout(WAIT, rx.recv())
            .await
            .expect("no connection was opened")
            .expect("transport dropped")
    }
}

#[async_trait]
impl WsTransport for MockTransport {
    async fn open(&self, _url: &str, _config: &WsConfig) -> Result<WsConnection, ExchangeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_times.lock().unwrap().push(Instant::now());

        let delay = *self.open_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ExchangeError::ConnectionError(
                "connection refused".to_string(),
            ));
        }

        let (client_tx, received) = mpsc::unbounded_channel();
        let (push, client_rx) = mpsc::unbounded_channel();
        let sink_broken = Arc::new(AtomicBool::new(false));
        let _ = self.accepted_tx.send(ServerConn {
            received,
            push,
            sink_broken: sink_broken.clone(),
        });

        Ok(WsConnection {
            sink: Box::new(MockSink {
                tx: client_tx,
                broken: sink_broken,
            }),
            stream: Box::new(MockStream { rx: client_rx }),
        })
    }
}

struct MockSink {
    tx: mpsc::UnboundedSender<String>,
    broken: Arc<AtomicBool>,
}

#[async_trait]
impl WsSink for MockSink {
    async fn send(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(ExchangeError::ConnectionError("broken pipe".to_string()));
        }
        let Message::Text(text) = msg else {
            return Ok(());
        };
        self.tx
            .send(text)
            .map_err(|_| ExchangeError::ConnectionError("peer went away".to_string()))
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        Ok(())
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl WsStream for MockStream {
    async fn next_text(&mut self) -> Option<Result<String, ExchangeError>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Server end of one mock connection; dropping it hangs up
pub struct ServerConn {
    received: mpsc::UnboundedReceiver<String>,
    push: mpsc::UnboundedSender<String>,
    sink_broken: Arc<AtomicBool>,
}

impl ServerConn {
    /// Next raw text written by the client, heartbeats included
    pub async fn next_text(&mut self) -> String {
        timeout(WAIT, self.received.recv())
            .await
            .expect("client sent nothing")
            .expect("client hung up")
    }

    /// Next JSON frame written by the client, heartbeats skipped
    pub async fn next_frame(&mut self) -> Value {
        self.try_next_frame(WAIT)
            .await
            .expect("client sent no frame")
    }

    pub async fn try_next_frame(&mut self, wait: Duration) -> Option<Value> {
        let deadline = Instant::now() + wait;
        loop {
            let text = tokio::time::timeout_at(deadline, self.received.recv())
                .await
                .ok()??;
            if text != "ping" {
                return Some(serde_json::from_str(&text).expect("client frame is JSON"));
            }
        }
    }

    pub fn send(&self, frame: Value) {
        self.send_text(&frame.to_string());
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.push.send(text.to_string());
    }

    /// Fail every client write while the server keeps the stream open
    pub fn break_client_sink(&self) {
        self.sink_broken.store(true, Ordering::SeqCst);
    }

    pub fn hang_up(self) {}
}

pub fn subscribe_frame(channel: &str, inst_id: Option<&str>) -> Value {
    json!({ "op": "subscribe", "args": [channel_arg(channel, inst_id)] })
}

pub fn subscribe_ack(channel: &str, inst_id: Option<&str>) -> Value {
    json!({ "event": "subscribe", "arg": channel_arg(channel, inst_id) })
}

pub fn data_frame(channel: &str, inst_id: &str, data: Value) -> Value {
    json!({
        "arg": { "channel": channel, "instId": inst_id },
        "action": "snapshot",
        "data": data
    })
}

fn channel_arg(channel: &str, inst_id: Option<&str>) -> Value {
    match inst_id {
        Some(inst_id) => json!({ "channel": channel, "instId": inst_id }),
        None => json!({ "channel": channel }),
    }
}

pub fn public_session(transport: &Arc<MockTransport>) -> BlofinWsSession {
    BlofinWsBuilder::new()
        .with_ws_url("wss://mock.blofin.test/ws/public".to_string())
        .with_transport(transport.clone())
        .build_public()
        .unwrap()
}

/// Public session with a short heartbeat interval
pub fn public_session_with_ping(
    transport: &Arc<MockTransport>,
    interval: Duration,
) -> BlofinWsSession {
    BlofinWsBuilder::new()
        .with_ws_url("wss://mock.blofin.test/ws/public".to_string())
        .with_ping_interval(interval)
        .with_transport(transport.clone())
        .build_public()
        .unwrap()
}

pub fn private_session(transport: &Arc<MockTransport>) -> BlofinWsSession {
    BlofinWsBuilder::new()
        .with_ws_url("wss://mock.blofin.test/ws/private".to_string())
        .with_credentials(
            API_KEY.to_string(),
            SECRET_KEY.to_string(),
            PASSPHRASE.to_string(),
        )
        .with_transport(transport.clone())
        .build_private()
        .unwrap()
}

/// Route session logs to the test output; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Poll until `cond` holds
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
