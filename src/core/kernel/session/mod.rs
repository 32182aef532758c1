//! Persistent streaming session
//!
//! A [`WsSession`] owns at most one live connection at a time. Each connection
//! is an *epoch*: the writer half sits behind an async mutex shared by every
//! writer (subscribe, unsubscribe, heartbeat, login, replay) while the reader
//! half is owned by that epoch's receive loop. A heartbeat monitor runs next to
//! the receive loop. Either of them can notice a dead connection and hand over
//! to the reconnect sequence, which replaces the whole epoch.
//!
//! `live_epoch` is the id of the connected epoch, or 0 when disconnected.
//! Stale epochs compare their id before touching it, so a late failure report
//! from a replaced connection never disconnects its successor.

pub mod delivery;
mod heartbeat;
mod receiver;
pub mod registry;

pub use delivery::{DeliveryQueue, EventStream, Shutdown};
pub use registry::SubscriptionRegistry;

use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::reconnect::{ReconnectManager, ReconnectOutcome};
use crate::core::kernel::signer::Signer;
use crate::core::kernel::ws::{WsConfig, WsConnection, WsSink, WsStream, WsTransport};
use crate::core::types::{
    is_success_code, ControlEvent, DataEvent, InboundEnvelope, LoginArgs, SubscriptionKey,
    SubscriptionState,
};
use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

/// Credentials for the login handshake
pub struct SessionCredentials {
    api_key: Secret<String>,
    passphrase: Secret<String>,
    signer: Arc<dyn Signer>,
}

impl SessionCredentials {
    pub fn new(api_key: String, passphrase: String, signer: Arc<dyn Signer>) -> Self {
        Self {
            api_key: Secret::new(api_key),
            passphrase: Secret::new(passphrase),
            signer,
        }
    }
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("api_key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Cancellation signal handed to the two activities of one epoch
#[derive(Clone)]
struct EpochSignal {
    id: u64,
    rx: watch::Receiver<bool>,
}

impl EpochSignal {
    async fn cancelled(&mut self) {
        // A dropped sender means the epoch is gone as well
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

struct EpochTasks {
    cancel: watch::Sender<bool>,
    receiver: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
}

impl EpochTasks {
    fn signal(&self) {
        let _ = self.cancel.send(true);
    }

    fn abort(self) {
        self.signal();
        self.receiver.abort();
        self.heartbeat.abort();
    }
}

struct SessionInner<C: WsCodec> {
    me: Weak<Self>,
    url: String,
    config: WsConfig,
    codec: C,
    transport: Arc<dyn WsTransport>,
    credentials: Option<SessionCredentials>,
    writer: tokio::sync::Mutex<Option<Box<dyn WsSink>>>,
    connect_lock: tokio::sync::Mutex<()>,
    live_epoch: AtomicU64,
    current_epoch: AtomicU64,
    next_epoch: AtomicU64,
    authenticated: AtomicBool,
    closed: AtomicBool,
    registry: SubscriptionRegistry,
    reconnect: ReconnectManager,
    delivery: DeliveryQueue,
    shutdown: watch::Sender<Option<Shutdown>>,
    epoch: Mutex<Option<EpochTasks>>,
}

impl<C: WsCodec> SessionInner<C> {
    fn is_connected(&self) -> bool {
        self.live_epoch.load(Ordering::Acquire) != 0
    }

    fn is_live(&self, epoch_id: u64) -> bool {
        self.live_epoch.load(Ordering::Acquire) == epoch_id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn epoch_slot(&self) -> MutexGuard<'_, Option<EpochTasks>> {
        self.epoch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Report the connection of `epoch_id` as lost; no-op for stale epochs
    fn mark_disconnected(&self, epoch_id: u64) {
        let _ = self.live_epoch.compare_exchange(
            epoch_id,
            0,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn mark_connection_lost(&self) {
        let live = self.live_epoch.load(Ordering::Acquire);
        if live != 0 {
            self.mark_disconnected(live);
        }
    }

    /// Serialized write on the current connection
    async fn write(&self, msg: Message) -> Result<(), ExchangeError> {
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or_else(|| {
            ExchangeError::ConnectionError("WebSocket not connected".to_string())
        })?;
        sink.send(msg).await
    }

    /// Open a transport and run the login handshake when credentials are present
    async fn establish(&self) -> Result<WsConnection, ExchangeError> {
        let mut conn = self.transport.open(&self.url, &self.config).await?;

        if let Some(credentials) = &self.credentials {
            if let Err(e) = self.authenticate(&mut conn, credentials).await {
                error!(error = %e, "Authentication failed");
                let _ = conn.sink.close().await;
                return Err(e);
            }
            self.authenticated.store(true, Ordering::Release);
            info!("Authentication successful");
        }

        Ok(conn)
    }

    async fn authenticate(
        &self,
        conn: &mut WsConnection,
        credentials: &SessionCredentials,
    ) -> Result<(), ExchangeError> {
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let nonce = timestamp.clone();
        let sign = credentials.signer.sign_login(&timestamp, &nonce)?;

        let login = self.codec.encode_login(LoginArgs {
            api_key: credentials.api_key.expose_secret().clone(),
            passphrase: credentials.passphrase.expose_secret().clone(),
            timestamp,
            sign,
            nonce,
        })?;
        conn.sink.send(login).await?;

        let stream = &mut conn.stream;
        let codec = &self.codec;
        let ack = async {
            loop {
                let text = match stream.next_text().await {
                    Some(Ok(text)) => text,
                    Some(Err(e)) => {
                        return Err(ExchangeError::AuthError(format!(
                            "Connection failed during login: {}",
                            e
                        )));
                    }
                    None => {
                        return Err(ExchangeError::AuthError(
                            "Connection closed during login".to_string(),
                        ));
                    }
                };

                match codec.decode_message(&text) {
                    Ok(InboundEnvelope::ControlAck {
                        event: ControlEvent::Login,
                        code,
                        message,
                        ..
                    }) => {
                        if is_success_code(code.as_deref()) {
                            return Ok(());
                        }
                        return Err(login_rejected(code, message));
                    }
                    Ok(InboundEnvelope::ControlError { code, message, .. }) => {
                        return Err(login_rejected(code, message));
                    }
                    Ok(_) => debug!("Ignoring frame while awaiting login acknowledgement"),
                    Err(e) => {
                        return Err(ExchangeError::AuthError(format!(
                            "Invalid login response: {}",
                            e
                        )));
                    }
                }
            }
        };

        tokio::time::timeout(self.config.auth_timeout(), ack)
            .await
            .map_err(|_| {
                ExchangeError::AuthError("Timed out waiting for login acknowledgement".to_string())
            })?
    }

    /// Spawn the receive loop and heartbeat monitor for a freshly installed connection
    fn start_activities(&self, stream: Box<dyn WsStream>) {
        let Some(me) = self.me.upgrade() else {
            return;
        };

        let mut slot = self.epoch_slot();
        if self.is_closed() {
            return;
        }
        if let Some(previous) = slot.take() {
            previous.signal();
        }

        let id = self.next_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let (cancel, rx) = watch::channel(false);
        let signal = EpochSignal { id, rx };

        self.current_epoch.store(id, Ordering::Release);
        self.live_epoch.store(id, Ordering::Release);

        let receiver = tokio::spawn(receiver::receive_loop(
            Arc::clone(&me),
            stream,
            signal.clone(),
        ));
        let heartbeat = tokio::spawn(heartbeat::heartbeat_loop(me, signal));

        *slot = Some(EpochTasks {
            cancel,
            receiver,
            heartbeat,
        });
    }

    /// Stop the current epoch's activities and close its writer
    async fn teardown_connection(&self) {
        let previous = self.epoch_slot().take();
        if let Some(tasks) = previous {
            tasks.signal();
        }

        self.current_epoch.store(0, Ordering::Release);
        self.live_epoch.store(0, Ordering::Release);
        self.authenticated.store(false, Ordering::Release);

        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Error closing previous connection");
            }
        }
    }

    /// Entry point for both background activities when their connection fails
    async fn handle_disconnect(&self, epoch_id: u64) {
        if self.is_closed() || self.current_epoch.load(Ordering::Acquire) != epoch_id {
            return;
        }
        self.mark_disconnected(epoch_id);

        if self.registry.is_empty() {
            info!("Connection lost with no subscriptions, staying disconnected");
            return;
        }

        match self.reconnect().await {
            Ok(ReconnectOutcome::Reconnected | ReconnectOutcome::NotAttempting)
            | Err(ExchangeError::SessionClosed) => {}
            Err(ExchangeError::FatalReconnectError { attempts }) => {
                error!(attempts, "WebSocket session terminated");
                self.terminate(Shutdown::Fatal { attempts }).await;
            }
            Err(e) => error!(error = %e, "Reconnection aborted"),
        }
    }

    /// Run one bounded reconnect sequence, cut short by `close()`
    async fn reconnect(&self) -> Result<ReconnectOutcome, ExchangeError> {
        let mut shutdown = self.shutdown.subscribe();
        let sequence = self
            .reconnect
            .run(|attempt| self.reconnect_attempt(attempt));

        tokio::select! {
            biased;
            _ = shutdown.wait_for(Option::is_some) => Err(ExchangeError::SessionClosed),
            result = sequence => result,
        }
    }

    async fn reconnect_attempt(&self, attempt: u32) -> Result<(), ExchangeError> {
        if attempt == 1 {
            let dropped = self.registry.discard_pending();
            if !dropped.is_empty() {
                warn!(
                    count = dropped.len(),
                    "Dropping unacknowledged subscriptions"
                );
            }
        }

        self.teardown_connection().await;

        let WsConnection { sink, stream } = self.establish().await?;
        *self.writer.lock().await = Some(sink);

        for key in self.registry.confirmed() {
            let msg = self.codec.encode_subscription(&key)?;
            self.write(msg).await?;
            info!(subscription = %key, "Subscription replayed");
        }

        self.start_activities(stream);
        Ok(())
    }

    /// Stop for good after retries ran out with confirmed subscriptions outstanding
    async fn terminate(&self, reason: Shutdown) {
        self.closed.store(true, Ordering::Release);
        self.publish_shutdown(reason);
        self.teardown_connection().await;
    }

    fn publish_shutdown(&self, reason: Shutdown) {
        self.shutdown.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }
}

fn login_rejected(code: Option<String>, message: Option<String>) -> ExchangeError {
    ExchangeError::AuthError(format!(
        "Login rejected: {} - {}",
        code.unwrap_or_default(),
        message.unwrap_or_else(|| "Authentication failed".to_string())
    ))
}

/// Streaming session over one logical push connection
///
/// # Example
/// ```rust,no_run
/// use blofin_ws::exchanges::blofin::BlofinWsBuilder;
/// use futures_util::StreamExt;
///
/// # async fn example() -> Result<(), blofin_ws::ExchangeError> {
/// let session = BlofinWsBuilder::new().build_public()?;
/// session.connect().await?;
/// session.subscribe("tickers", Some("BTC-USDT")).await?;
///
/// let mut events = session.listen()?;
/// while let Some(event) = events.next().await {
///     println!("{:?}", event?.data());
/// }
/// # Ok(())
/// # }
/// ```
pub struct WsSession<C: WsCodec> {
    inner: Arc<SessionInner<C>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<DataEvent>>>,
}

impl<C: WsCodec> WsSession<C> {
    /// Create a session; nothing is opened until `connect()` or `subscribe()`
    ///
    /// # Arguments
    /// * `url` - Endpoint to connect to
    /// * `codec` - Envelope codec of the target service
    /// * `transport` - Connection factory
    /// * `credentials` - Login credentials; `None` for public sessions
    /// * `config` - Timeouts, heartbeat interval and reconnect policy
    pub fn new(
        url: impl Into<String>,
        codec: C,
        transport: Arc<dyn WsTransport>,
        credentials: Option<SessionCredentials>,
        config: WsConfig,
    ) -> Self {
        let (delivery, rx) = DeliveryQueue::new();
        let (shutdown, _) = watch::channel(None);
        let reconnect = ReconnectManager::new(config.max_reconnect_attempts, config.reconnect_delay());

        let inner = Arc::new_cyclic(|me| SessionInner {
            me: me.clone(),
            url: url.into(),
            config,
            codec,
            transport,
            credentials,
            writer: tokio::sync::Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            live_epoch: AtomicU64::new(0),
            current_epoch: AtomicU64::new(0),
            next_epoch: AtomicU64::new(0),
            authenticated: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            registry: SubscriptionRegistry::new(),
            reconnect,
            delivery,
            shutdown,
            epoch: Mutex::new(None),
        });

        Self {
            inner,
            events: Mutex::new(Some(rx)),
        }
    }

    /// Open the connection and authenticate when credentials are configured
    #[instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(ExchangeError::SessionClosed);
        }

        let _guard = inner.connect_lock.lock().await;
        if inner.is_connected() {
            return Ok(());
        }
        if inner.reconnect.is_attempting() {
            return Err(ExchangeError::ConnectionError(
                "Reconnection already in progress".to_string(),
            ));
        }

        inner.teardown_connection().await;
        let WsConnection { sink, stream } = match inner.establish().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Connection failed");
                return Err(e);
            }
        };

        *inner.writer.lock().await = Some(sink);
        inner.start_activities(stream);
        info!("WebSocket connected successfully");
        Ok(())
    }

    /// Request a subscription
    ///
    /// Returns once the request frame is written. The acknowledgement is
    /// handled by the receive loop, which confirms or drops the registry entry;
    /// watch `subscription_state()` or the event stream to observe it.
    ///
    /// While disconnected this runs the reconnect sequence itself. If that
    /// gives up with confirmed subscriptions still registered, the session
    /// terminates exactly as a background failure would.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, channel: &str, inst_id: Option<&str>) -> Result<(), ExchangeError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(ExchangeError::SessionClosed);
        }

        if !inner.is_connected() {
            match inner.reconnect().await {
                Ok(ReconnectOutcome::Reconnected) => {}
                Ok(ReconnectOutcome::NotAttempting) => {
                    return Err(ExchangeError::ConnectionError(
                        "Reconnection already in progress".to_string(),
                    ));
                }
                Err(ExchangeError::FatalReconnectError { attempts }) => {
                    // The loops that would have restored these are gone
                    if !inner.registry.confirmed().is_empty() {
                        error!(attempts, "WebSocket session terminated");
                        inner.terminate(Shutdown::Fatal { attempts }).await;
                        return Err(ExchangeError::FatalReconnectError { attempts });
                    }
                    return Err(ExchangeError::ConnectionError(format!(
                        "Could not restore connection after {} attempts",
                        attempts
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        let key = SubscriptionKey::new(channel, inst_id);
        let msg = inner.codec.encode_subscription(&key)?;
        let created = inner.registry.mark_pending(key.clone());

        if let Err(e) = inner.write(msg).await {
            error!(subscription = %key, error = %e, "Subscription error");
            if created {
                inner.registry.remove(&key);
            }
            inner.mark_connection_lost();
            return Err(e);
        }

        info!(subscription = %key, "Subscription requested");
        Ok(())
    }

    /// Drop a subscription; the registry entry goes away without waiting for the server
    #[instrument(skip(self))]
    pub async fn unsubscribe(
        &self,
        channel: &str,
        inst_id: Option<&str>,
    ) -> Result<(), ExchangeError> {
        let inner = &self.inner;
        if inner.is_closed() {
            return Err(ExchangeError::SessionClosed);
        }

        let key = SubscriptionKey::new(channel, inst_id);
        let msg = inner.codec.encode_unsubscription(&key)?;
        inner.registry.remove(&key);

        if inner.is_connected() {
            if let Err(e) = inner.write(msg).await {
                error!(subscription = %key, error = %e, "Unsubscription error");
                inner.mark_connection_lost();
                return Err(e);
            }
        }

        info!(subscription = %key, "Unsubscribed");
        Ok(())
    }

    /// Take the event stream
    ///
    /// The stream waits while nothing is queued, ends after `close()`, and
    /// yields a final `FatalReconnectError` when reconnection gives up. It can
    /// be taken once per session.
    pub fn listen(&self) -> Result<EventStream, ExchangeError> {
        let rx = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                ExchangeError::InvalidParameters(
                    "listen() can only be called once per session".to_string(),
                )
            })?;

        Ok(delivery::event_stream(rx, self.inner.shutdown.subscribe()))
    }

    /// Close the connection and stop all background activity; idempotent
    #[instrument(skip(self), fields(url = %self.inner.url))]
    pub async fn close(&self) -> Result<(), ExchangeError> {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        inner.publish_shutdown(Shutdown::Closed);
        let previous = inner.epoch_slot().take();
        if let Some(tasks) = previous {
            tasks.abort();
        }
        inner.teardown_connection().await;

        info!("WebSocket connection closed");
        Ok(())
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn requires_auth(&self) -> bool {
        self.inner.credentials.is_some()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.reconnect.is_attempting()
    }

    /// Every tracked subscription with its state
    pub fn subscriptions(&self) -> Vec<(SubscriptionKey, SubscriptionState)> {
        self.inner.registry.snapshot()
    }

    pub fn confirmed_subscriptions(&self) -> Vec<SubscriptionKey> {
        self.inner.registry.confirmed()
    }

    pub fn subscription_state(
        &self,
        channel: &str,
        inst_id: Option<&str>,
    ) -> Option<SubscriptionState> {
        self.inner
            .registry
            .state(&SubscriptionKey::new(channel, inst_id))
    }
}

impl<C: WsCodec> Drop for WsSession<C> {
    fn drop(&mut self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.publish_shutdown(Shutdown::Closed);
        let previous = self.inner.epoch_slot().take();
        if let Some(tasks) = previous {
            tasks.abort();
        }
    }
}
