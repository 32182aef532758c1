//! Streaming session client for the BloFin WebSocket API
//!
//! The `core::kernel` layer keeps one push connection alive: login, heartbeat,
//! subscription tracking, bounded reconnect with replay, and ordered event
//! delivery. `exchanges::blofin` supplies BloFin's wire envelope, login
//! signature, endpoints and typed channel helpers.

pub mod core;
pub mod exchanges;

pub use core::{
    config::ExchangeConfig,
    errors::ExchangeError,
    kernel::{EventStream, WsConfig, WsSession},
    types::*,
};
pub use exchanges::blofin::{BlofinWsBuilder, BlofinWsSession};
