/// Kernel - service-agnostic streaming layer
///
/// This module owns everything about keeping a push connection alive and
/// nothing about what a particular service puts on the wire. Service modules
/// under `exchanges` plug in a codec and a signer.
///
/// # Architecture
///
/// ## Transport Layer
/// - `WsTransport`: Connection factory, `TungsteniteTransport` in production
/// - `WsSession`: Connection lifecycle, subscriptions and event delivery
/// - `ReconnectManager`: Single-flight bounded reconnect with exponential backoff
///
/// ## Authentication
/// - `Signer`: Pluggable login signature interface
///
/// ## Message Handling
/// - `WsCodec`: Service-specific frame encoding and envelope classification
///
/// # Example
///
/// ```rust,no_run
/// use blofin_ws::core::kernel::*;
/// use blofin_ws::exchanges::blofin::{codec::BlofinCodec, PUBLIC_WS_URL};
/// use futures_util::StreamExt;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), blofin_ws::ExchangeError> {
/// let session = WsSession::new(
///     PUBLIC_WS_URL,
///     BlofinCodec,
///     Arc::new(TungsteniteTransport),
///     None,
///     WsConfig::default(),
/// );
///
/// session.subscribe("trades", Some("BTC-USDT")).await?;
/// let mut events = session.listen()?;
/// if let Some(event) = events.next().await {
///     println!("{}", event?.raw);
/// }
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod reconnect;
pub mod session;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use reconnect::{ReconnectManager, ReconnectOutcome};
pub use session::{EventStream, SessionCredentials, Shutdown, SubscriptionRegistry, WsSession};
pub use signer::{hmac_sha256_hex, Signer};
pub use ws::{
    TungsteniteTransport, WsConfig, WsConnection, WsSink, WsStream, WsTransport,
};
