use async_trait::async_trait;
use chrono::DateTime;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use super::{Gateway, GatewayError};
use crate::models::{
    round_to_precision, round_to_tick, Candle, MarketInfo, Order, OrderStatus, ProtectiveKind,
    Side,
};
use crate::retry::{with_retry, DEFAULT_DELAY, DEFAULT_RETRIES};

const FUTURES_BASE: &str = "https://fapi.binance.com";
const TESTNET_BASE: &str = "https://testnet.binancefuture.com";

type HmacSha256 = Hmac<Sha256>;

/// Binance USD-M futures gateway over signed REST.
///
/// One authenticated session shared by every symbol; market metadata is
/// fetched once and cached for the process lifetime.
#[derive(Clone)]
pub struct BinanceFuturesGateway {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    markets: Arc<RwLock<HashMap<String, MarketInfo>>>,
    retries: u32,
    retry_delay: Duration,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    price_precision: u32,
    quantity_precision: u32,
    #[serde(default)]
    filters: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct BalanceEntry {
    asset: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionEntry {
    symbol: String,
    position_amt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenOrder {
    order_id: u64,
    #[serde(rename = "type")]
    order_type: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

// Binance error codes that mean the order itself was invalid rather than
// the connection: filter failures, insufficient margin, bad parameters.
const REJECTION_CODES: &[i64] = &[-1013, -1111, -2010, -2019, -4003, -4164];

impl BinanceFuturesGateway {
    pub fn new(api_key: String, secret_key: String, sandbox: bool) -> Self {
        let base_url = if sandbox { TESTNET_BASE } else { FUTURES_BASE };
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key,
            secret_key,
            markets: Arc::new(RwLock::new(HashMap::new())),
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_DELAY,
        }
    }

    /// Build a gateway with credentials from the environment; `sandbox`
    /// selects the testnet endpoint.
    pub fn from_env(sandbox: bool) -> anyhow::Result<Self> {
        let api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| anyhow::anyhow!("BINANCE_API_KEY not set"))?;
        let secret_key = std::env::var("BINANCE_API_SECRET")
            .map_err(|_| anyhow::anyhow!("BINANCE_API_SECRET not set"))?;
        Ok(Self::new(api_key, secret_key, sandbox))
    }

    /// Override the endpoint, for tests against a local mock server.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Override the retry policy, for tests that should not sleep.
    pub fn with_retry_policy(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    /// "BTC/USDT" -> "BTCUSDT"
    fn format_symbol(symbol: &str) -> String {
        symbol.replace('/', "")
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis() as u64
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &str,
        signed: bool,
    ) -> Result<String, GatewayError> {
        let query = if signed {
            let with_ts = if params.is_empty() {
                format!("timestamp={}", Self::timestamp_ms())
            } else {
                format!("{}&timestamp={}", params, Self::timestamp_ms())
            };
            let signature = self.sign(&with_ts);
            format!("{}&signature={}", with_ts, signature)
        } else {
            params.to_string()
        };

        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let resp = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
                if REJECTION_CODES.contains(&api_error.code) {
                    return Err(GatewayError::Rejected(api_error.msg));
                }
                return Err(GatewayError::Exchange {
                    code: api_error.code,
                    message: api_error.msg,
                });
            }
            return Err(GatewayError::Malformed(format!("HTTP {status}: {body}")));
        }

        Ok(body)
    }

    async fn request_with_retry(
        &self,
        label: &str,
        method: Method,
        path: &str,
        params: &str,
        signed: bool,
    ) -> Result<String, GatewayError> {
        with_retry(label, self.retries, self.retry_delay, || {
            self.request(method.clone(), path, params, signed)
        })
        .await
    }

    async fn load_markets(&self) -> Result<(), GatewayError> {
        if !self.markets.read().await.is_empty() {
            return Ok(());
        }

        let body = self
            .request_with_retry(
                "exchange_info",
                Method::GET,
                "/fapi/v1/exchangeInfo",
                "",
                false,
            )
            .await?;
        let info: ExchangeInfo = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("exchangeInfo: {e}")))?;

        let mut markets = self.markets.write().await;
        for entry in info.symbols {
            let tick_size = filter_value(&entry.filters, "PRICE_FILTER", "tickSize");
            let min_quantity = filter_value(&entry.filters, "LOT_SIZE", "minQty");
            markets.insert(
                entry.symbol.clone(),
                MarketInfo {
                    price_precision: entry.price_precision,
                    quantity_precision: entry.quantity_precision,
                    tick_size: tick_size.unwrap_or(0.0),
                    min_quantity: min_quantity.unwrap_or(0.0),
                },
            );
        }
        tracing::info!("Loaded metadata for {} markets", markets.len());
        Ok(())
    }

    async fn cancel_protective_orders(&self, symbol: &str) -> Result<(), GatewayError> {
        let formatted = Self::format_symbol(symbol);
        let body = self
            .request_with_retry(
                "open_orders",
                Method::GET,
                "/fapi/v1/openOrders",
                &format!("symbol={formatted}"),
                true,
            )
            .await?;
        let orders: Vec<OpenOrder> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("openOrders: {e}")))?;

        for order in orders
            .iter()
            .filter(|o| o.order_type == "STOP_MARKET" || o.order_type == "TAKE_PROFIT_MARKET")
        {
            self.request_with_retry(
                "cancel_order",
                Method::DELETE,
                "/fapi/v1/order",
                &format!("symbol={formatted}&orderId={}", order.order_id),
                true,
            )
            .await?;
            tracing::info!("Cancelled existing order {} for {}", order.order_id, symbol);
        }
        Ok(())
    }
}

fn filter_value(filters: &[serde_json::Value], filter_type: &str, key: &str) -> Option<f64> {
    filters
        .iter()
        .find(|f| f.get("filterType").and_then(|t| t.as_str()) == Some(filter_type))?
        .get(key)?
        .as_str()?
        .parse()
        .ok()
}

fn order_status(status: &str) -> OrderStatus {
    match status {
        "FILLED" => OrderStatus::Filled,
        "NEW" | "PARTIALLY_FILLED" => OrderStatus::Open,
        "CANCELED" | "EXPIRED" => OrderStatus::Canceled,
        other => OrderStatus::Other(other.to_string()),
    }
}

#[async_trait]
impl Gateway for BinanceFuturesGateway {
    async fn market_info(&self, symbol: &str) -> Result<MarketInfo, GatewayError> {
        self.load_markets().await?;
        let formatted = Self::format_symbol(symbol);
        self.markets
            .read()
            .await
            .get(&formatted)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownMarket(symbol.to_string()))
    }

    async fn fetch_balance(&self) -> f64 {
        let result = self
            .request_with_retry("balance", Method::GET, "/fapi/v2/balance", "", true)
            .await;

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to fetch balance: {}", e);
                return 0.0;
            }
        };

        match serde_json::from_str::<Vec<BalanceEntry>>(&body) {
            Ok(entries) => entries
                .iter()
                .find(|b| b.asset == "USDT")
                .and_then(|b| b.balance.parse().ok())
                .unwrap_or(0.0),
            Err(e) => {
                tracing::error!("Malformed balance response: {}", e);
                0.0
            }
        }
    }

    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize) -> Vec<Candle> {
        let formatted = Self::format_symbol(symbol);
        let params = format!("symbol={formatted}&interval={interval}&limit={limit}");
        let result = self
            .request_with_retry("klines", Method::GET, "/fapi/v1/klines", &params, false)
            .await;

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to fetch candles for {} on {}: {}", symbol, interval, e);
                return Vec::new();
            }
        };

        let rows: Vec<Vec<serde_json::Value>> = match serde_json::from_str(&body) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!("Malformed klines response for {}: {}", symbol, e);
                return Vec::new();
            }
        };

        rows.iter()
            .filter_map(|row| {
                let ts = row.first()?.as_i64()?;
                Some(Candle {
                    timestamp: DateTime::from_timestamp_millis(ts)?,
                    open: row.get(1)?.as_str()?.parse().ok()?,
                    high: row.get(2)?.as_str()?.parse().ok()?,
                    low: row.get(3)?.as_str()?.parse().ok()?,
                    close: row.get(4)?.as_str()?.parse().ok()?,
                    volume: row.get(5)?.as_str()?.parse().ok()?,
                })
            })
            .collect()
    }

    async fn position_size(&self, symbol: &str) -> Result<f64, GatewayError> {
        let formatted = Self::format_symbol(symbol);
        let body = self
            .request_with_retry(
                "position_risk",
                Method::GET,
                "/fapi/v2/positionRisk",
                &format!("symbol={formatted}"),
                true,
            )
            .await?;
        let positions: Vec<PositionEntry> = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("positionRisk: {e}")))?;

        Ok(positions
            .iter()
            .find(|p| p.symbol == formatted)
            .and_then(|p| p.position_amt.parse::<f64>().ok())
            .map(f64::abs)
            .unwrap_or(0.0))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> Result<Option<Order>, GatewayError> {
        let info = self.market_info(symbol).await?;
        let quantity = round_to_precision(quantity, info.quantity_precision);
        if quantity < info.min_quantity {
            tracing::error!(
                "Quantity {} below minimum {} for {}",
                quantity,
                info.min_quantity,
                symbol
            );
            return Ok(None);
        }

        let formatted = Self::format_symbol(symbol);
        tracing::info!(
            "Sending {} market order: {} {}",
            side.entry_order(),
            quantity,
            symbol
        );
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}",
            formatted,
            side.entry_order(),
            quantity
        );

        let result = self
            .request_with_retry("market_order", Method::POST, "/fapi/v1/order", &params, true)
            .await;

        match result {
            Ok(body) => {
                let resp: OrderResponse = serde_json::from_str(&body)
                    .map_err(|e| GatewayError::Malformed(format!("order: {e}")))?;
                Ok(Some(Order {
                    id: resp.order_id.to_string(),
                    symbol: resp.symbol,
                    status: order_status(&resp.status),
                }))
            }
            Err(GatewayError::Rejected(msg)) => {
                tracing::error!("Invalid market order for {}: {}", symbol, msg);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn submit_protective_order(
        &self,
        symbol: &str,
        kind: ProtectiveKind,
        side: Side,
        quantity: f64,
        trigger_price: f64,
    ) -> Result<(), GatewayError> {
        let info = self.market_info(symbol).await?;
        let trigger = round_to_tick(trigger_price, info.tick_size);
        let quantity = round_to_precision(quantity, info.quantity_precision);

        // Re-issuing a take-profit must not leave a stale protective order
        // behind on the exchange
        if kind == ProtectiveKind::TakeProfit {
            self.cancel_protective_orders(symbol).await?;
        }

        let order_type = match kind {
            ProtectiveKind::StopLoss => "STOP_MARKET",
            ProtectiveKind::TakeProfit => "TAKE_PROFIT_MARKET",
        };
        tracing::info!(
            "Creating {} @ {:.2} for {}, qty={}",
            order_type,
            trigger,
            symbol,
            quantity
        );

        let params = format!(
            "symbol={}&side={}&type={}&quantity={}&stopPrice={}&reduceOnly=true",
            Self::format_symbol(symbol),
            side.exit_order(),
            order_type,
            quantity,
            trigger
        );
        self.request_with_retry("protective_order", Method::POST, "/fapi/v1/order", &params, true)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        // reqwest pools are released on drop; the contract point is that
        // shutdown paths call this exactly once
        tracing::info!("Gateway session closed");
    }
}
