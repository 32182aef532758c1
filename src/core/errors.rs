use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Subscription rejected for {channel}:{inst_id}: {code} - {message}")]
    SubscriptionError {
        channel: String,
        inst_id: String,
        code: String,
        message: String,
    },

    #[error("WebSocket reconnection failed after {attempts} attempts")]
    FatalReconnectError { attempts: u32 },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Session closed")]
    SessionClosed,
}

impl ExchangeError {
    /// Whether a reconnect sequence can clear this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ConnectionError(_) | Self::AuthError(_))
    }
}
