use crate::core::config::{ConfigError, ExchangeConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{SessionCredentials, TungsteniteTransport, WsConfig, WsSession, WsTransport};
use crate::exchanges::blofin::{codec::BlofinCodec, signer::BlofinSigner};
use std::sync::Arc;
use std::time::Duration;

pub const PUBLIC_WS_URL: &str = "wss://openapi.blofin.com/ws/public";
pub const PRIVATE_WS_URL: &str = "wss://openapi.blofin.com/ws/private";
pub const COPYTRADING_WS_URL: &str = "wss://openapi.blofin.com/ws/copytrading/private";

/// BloFin streaming session
pub type BlofinWsSession = WsSession<BlofinCodec>;

/// Endpoint flavor of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Public,
    Private,
    CopyTrading,
}

impl SessionKind {
    pub fn default_url(self) -> &'static str {
        match self {
            Self::Public => PUBLIC_WS_URL,
            Self::Private => PRIVATE_WS_URL,
            Self::CopyTrading => COPYTRADING_WS_URL,
        }
    }

    pub fn requires_auth(self) -> bool {
        !matches!(self, Self::Public)
    }
}

/// Builder for BloFin streaming sessions
///
/// Provides a fluent interface over endpoint, credentials, timeouts and the
/// reconnect policy.
pub struct BlofinWsBuilder {
    config: ExchangeConfig,
    ws_config: WsConfig,
    transport: Arc<dyn WsTransport>,
}

impl Default for BlofinWsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlofinWsBuilder {
    /// Create a new `BlofinWsBuilder` with default settings and no credentials
    pub fn new() -> Self {
        Self {
            config: ExchangeConfig::read_only(),
            ws_config: WsConfig::default(),
            transport: Arc::new(TungsteniteTransport),
        }
    }

    /// Set the exchange configuration
    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set API credentials
    pub fn with_credentials(
        mut self,
        api_key: String,
        secret_key: String,
        passphrase: String,
    ) -> Self {
        let ws_url = self.config.ws_url.take();
        self.config = ExchangeConfig::new(api_key, secret_key, passphrase);
        self.config.ws_url = ws_url;
        self
    }

    /// Override the endpoint of whatever flavor gets built
    pub fn with_ws_url(mut self, ws_url: String) -> Self {
        self.config = self.config.ws_url(ws_url);
        self
    }

    pub fn with_ws_config(mut self, ws_config: WsConfig) -> Self {
        self.ws_config = ws_config;
        self
    }

    /// Set heartbeat interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ws_config = self.ws_config.with_heartbeat_interval(interval);
        self
    }

    /// Set maximum number of reconnection attempts
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.ws_config = self.ws_config.with_max_reconnect_attempts(attempts);
        self
    }

    /// Set base delay of the reconnect backoff
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.ws_config = self.ws_config.with_reconnect_delay(delay);
        self
    }

    /// Replace the connection factory
    pub fn with_transport(mut self, transport: Arc<dyn WsTransport>) -> Self {
        self.transport = transport;
        self
    }

    /// Build an unauthenticated session for public market data
    pub fn build_public(self) -> Result<BlofinWsSession, ExchangeError> {
        self.build(SessionKind::Public)
    }

    /// Build an authenticated session for account data
    pub fn build_private(self) -> Result<BlofinWsSession, ExchangeError> {
        self.build(SessionKind::Private)
    }

    /// Build an authenticated session for copy trading data
    pub fn build_copytrading(self) -> Result<BlofinWsSession, ExchangeError> {
        self.build(SessionKind::CopyTrading)
    }

    pub fn build(self, kind: SessionKind) -> Result<BlofinWsSession, ExchangeError> {
        let credentials = if kind.requires_auth() {
            if !self.config.has_credentials() {
                return Err(ConfigError::InvalidConfiguration(
                    "API key, secret key and passphrase are required for private sessions"
                        .to_string(),
                )
                .into());
            }

            let signer = Arc::new(BlofinSigner::new(self.config.secret_key().to_string()));
            Some(SessionCredentials::new(
                self.config.api_key().to_string(),
                self.config.passphrase().to_string(),
                signer,
            ))
        } else {
            None
        };

        let url = self
            .config
            .ws_url
            .clone()
            .unwrap_or_else(|| kind.default_url().to_string());

        Ok(WsSession::new(
            url,
            BlofinCodec,
            self.transport,
            credentials,
            self.ws_config,
        ))
    }
}

/// Create a public session from configuration
pub fn build_public_session(config: ExchangeConfig) -> Result<BlofinWsSession, ExchangeError> {
    BlofinWsBuilder::new().with_config(config).build_public()
}

/// Create a private session from configuration
pub fn build_private_session(config: ExchangeConfig) -> Result<BlofinWsSession, ExchangeError> {
    BlofinWsBuilder::new().with_config(config).build_private()
}

/// Create a copy trading session from configuration
pub fn build_copytrading_session(config: ExchangeConfig) -> Result<BlofinWsSession, ExchangeError> {
    BlofinWsBuilder::new().with_config(config).build_copytrading()
}
