//! Typed channel subscriptions
//!
//! Thin wrappers over [`WsSession::subscribe`] naming BloFin's channels.
//! Public market data works on any session; the private and copy trading
//! helpers need a session built with credentials against the matching endpoint.

use crate::core::errors::ExchangeError;
use crate::core::kernel::WsSession;
use crate::exchanges::blofin::codec::BlofinCodec;
use crate::exchanges::blofin::types::{CandleInterval, OrderBookDepth};

pub const TRADES: &str = "trades";
pub const TICKERS: &str = "tickers";
pub const FUNDING_RATE: &str = "funding-rate";
pub const ORDERS: &str = "orders";
pub const POSITIONS: &str = "positions";
pub const ACCOUNT: &str = "account";
pub const ALGO_ORDERS: &str = "orders-algo";
pub const COPYTRADING_POSITIONS: &str = "copytrading-positions";
pub const COPYTRADING_ORDERS: &str = "copytrading-orders";
pub const COPYTRADING_SUB_POSITIONS: &str = "copytrading-sub-positions";
pub const COPYTRADING_ACCOUNT: &str = "copytrading-account";

impl WsSession<BlofinCodec> {
    // Public market data

    /// Pushed on every trade
    pub async fn subscribe_trades(&self, inst_id: &str) -> Result<(), ExchangeError> {
        self.subscribe(TRADES, Some(inst_id)).await
    }

    /// `books` pushes a snapshot then incremental updates; `books5` pushes
    /// full five level snapshots
    pub async fn subscribe_order_book(
        &self,
        inst_id: &str,
        depth: OrderBookDepth,
    ) -> Result<(), ExchangeError> {
        self.subscribe(depth.channel(), Some(inst_id)).await
    }

    pub async fn subscribe_tickers(&self, inst_id: &str) -> Result<(), ExchangeError> {
        self.subscribe(TICKERS, Some(inst_id)).await
    }

    pub async fn subscribe_candles(
        &self,
        inst_id: &str,
        interval: CandleInterval,
    ) -> Result<(), ExchangeError> {
        self.subscribe(&interval.channel(), Some(inst_id)).await
    }

    pub async fn subscribe_funding_rate(&self, inst_id: &str) -> Result<(), ExchangeError> {
        self.subscribe(FUNDING_RATE, Some(inst_id)).await
    }

    // Private account data

    /// Order updates; `None` covers every instrument
    pub async fn subscribe_orders(&self, inst_id: Option<&str>) -> Result<(), ExchangeError> {
        self.ensure_private(ORDERS)?;
        self.subscribe(ORDERS, inst_id).await
    }

    pub async fn subscribe_positions(&self, inst_id: Option<&str>) -> Result<(), ExchangeError> {
        self.ensure_private(POSITIONS)?;
        self.subscribe(POSITIONS, inst_id).await
    }

    pub async fn subscribe_account(&self) -> Result<(), ExchangeError> {
        self.ensure_private(ACCOUNT)?;
        self.subscribe(ACCOUNT, None).await
    }

    /// Trigger and TP/SL orders
    pub async fn subscribe_algo_orders(&self, inst_id: Option<&str>) -> Result<(), ExchangeError> {
        self.ensure_private(ALGO_ORDERS)?;
        self.subscribe(ALGO_ORDERS, inst_id).await
    }

    // Copy trading

    pub async fn subscribe_copytrading_positions(&self) -> Result<(), ExchangeError> {
        self.ensure_private(COPYTRADING_POSITIONS)?;
        self.subscribe(COPYTRADING_POSITIONS, None).await
    }

    pub async fn subscribe_copytrading_orders(&self) -> Result<(), ExchangeError> {
        self.ensure_private(COPYTRADING_ORDERS)?;
        self.subscribe(COPYTRADING_ORDERS, None).await
    }

    pub async fn subscribe_copytrading_sub_positions(&self) -> Result<(), ExchangeError> {
        self.ensure_private(COPYTRADING_SUB_POSITIONS)?;
        self.subscribe(COPYTRADING_SUB_POSITIONS, None).await
    }

    pub async fn subscribe_copytrading_account(&self) -> Result<(), ExchangeError> {
        self.ensure_private(COPYTRADING_ACCOUNT)?;
        self.subscribe(COPYTRADING_ACCOUNT, None).await
    }

    fn ensure_private(&self, channel: &str) -> Result<(), ExchangeError> {
        if self.requires_auth() {
            Ok(())
        } else {
            Err(ExchangeError::AuthError(format!(
                "Channel {} requires an authenticated session",
                channel
            )))
        }
    }
}
