use crate::core::errors::ExchangeError;
use crate::core::types::{InboundEnvelope, LoginArgs, SubscriptionKey};
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for handling exchange-specific WebSocket envelope encoding/decoding
///
/// The session layer only deals in subscription keys and classified envelopes;
/// every byte that goes on the wire is produced or interpreted here.
pub trait WsCodec: Send + Sync + 'static {
    /// Encode a subscribe request for one key
    fn encode_subscription(&self, key: &SubscriptionKey) -> Result<Message, ExchangeError>;

    /// Encode an unsubscribe request for one key
    fn encode_unsubscription(&self, key: &SubscriptionKey) -> Result<Message, ExchangeError>;

    /// Encode the login request of the authentication handshake
    fn encode_login(&self, args: LoginArgs) -> Result<Message, ExchangeError>;

    /// Literal liveness probe written by the heartbeat monitor
    fn heartbeat_probe(&self) -> Message;

    /// Classify one inbound text frame
    ///
    /// # Returns
    /// - `Ok(envelope)` - The classified frame
    /// - `Err(error)` - The frame could not be decoded
    fn decode_message(&self, text: &str) -> Result<InboundEnvelope, ExchangeError>;
}
