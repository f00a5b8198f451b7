// Exchange gateway module
pub mod binance;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Candle, MarketInfo, Order, ProtectiveKind, Side};

pub use binance::BinanceFuturesGateway;

/// Failure kinds for exchange calls, so callers can decide retry vs.
/// abandon without matching on message strings.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("exchange error {code}: {message}")]
    Exchange { code: i64, message: String },

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unknown market: {0}")]
    UnknownMarket(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Transient failures are worth retrying; the rest are permanent for
    /// this tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

/// Narrow capability contract for the exchange layer. One authenticated
/// session shared by all symbols; the polling loop is single-threaded so
/// implementations need no re-entrancy discipline.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Instrument rules for a symbol; cached by the implementation for the
    /// process lifetime.
    async fn market_info(&self, symbol: &str) -> Result<MarketInfo, GatewayError>;

    /// Quote-currency total balance; fails soft to 0 on error.
    async fn fetch_balance(&self) -> f64;

    /// Chronological candles for a symbol/interval; fails soft to an empty
    /// sequence on error.
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize) -> Vec<Candle>;

    /// Magnitude of the live position; 0 = flat.
    async fn position_size(&self, symbol: &str) -> Result<f64, GatewayError>;

    /// Submit a market order. `Ok(None)` means the order was rejected by
    /// instrument validation (below minimum quantity, invalid order) and
    /// has already been logged.
    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<Option<Order>, GatewayError>;

    /// Submit an exchange-resident protective order. Take-profit placement
    /// cancels any pre-existing protective order for the symbol first, so
    /// re-issuing is idempotent.
    async fn submit_protective_order(
        &self,
        symbol: &str,
        kind: ProtectiveKind,
        side: Side,
        quantity: f64,
        trigger_price: f64,
    ) -> Result<(), GatewayError>;

    /// Release held connections. Must be called exactly once at shutdown,
    /// including on the failure path.
    async fn close(&self);
}
