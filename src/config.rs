use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Runtime settings, loaded from a JSON file with environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Symbols to trade, e.g. "BTC/USDT"
    pub symbols: Vec<String>,
    /// Timeframes scanned per symbol, in priority order
    pub timeframes: Vec<String>,
    pub strategy: StrategySettings,
    /// Candles requested per fetch
    #[serde(default = "default_candle_limit")]
    pub candle_limit: usize,
    /// Seconds between polling ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minutes a symbol stays cooling after a position closes
    #[serde(default = "default_cooldown")]
    pub cooldown_minutes: i64,
    /// Seconds to wait before confirming a fill on the exchange
    #[serde(default = "default_confirm_delay")]
    pub confirm_delay_secs: u64,
    /// Use the exchange testnet
    #[serde(default)]
    pub sandbox: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    pub leverage: f64,
    /// Margin committed per entry, in USDT
    pub fixed_size_usd: f64,
    /// Take-profit distance as a fraction of margin
    pub tp_pct: f64,
    /// Stop-loss distance as a fraction of margin
    pub sl_pct: f64,
    pub ob_level: f64,
    pub os_level: f64,
    /// Deep oversold level for the gold-signal filter
    pub os_level3: f64,
    pub wt_div_ob: f64,
    pub wt_div_os: f64,
    /// Taker commission per fill, as a fraction of notional
    pub commission_pct: f64,
    /// Entries below this price are refused
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,
}

fn default_candle_limit() -> usize {
    100
}

fn default_poll_interval() -> u64 {
    60
}

fn default_cooldown() -> i64 {
    30
}

fn default_confirm_delay() -> u64 {
    2
}

fn default_price_floor() -> f64 {
    50_000.0
}

impl Settings {
    /// Load settings from `path`, with `WAVEBOT_*` environment variables
    /// taking precedence over file values.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("WAVEBOT").separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration from {path}"))?
            .try_deserialize::<Settings>()
            .context("invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("at least one symbol is required");
        }
        if self.timeframes.is_empty() {
            bail!("at least one timeframe is required");
        }
        if self.strategy.leverage <= 0.0 {
            bail!("leverage must be positive");
        }
        if self.strategy.fixed_size_usd <= 0.0 {
            bail!("fixed_size_usd must be positive");
        }
        if self.strategy.tp_pct <= 0.0 || self.strategy.sl_pct <= 0.0 {
            bail!("tp_pct and sl_pct must be positive");
        }
        if self.strategy.commission_pct < 0.0 {
            bail!("commission_pct cannot be negative");
        }
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be positive");
        }
        Ok(())
    }
}
