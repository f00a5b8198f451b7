// Trading strategy module
pub mod signals;
pub mod wavetrend;

use crate::models::{Candle, Signal};

pub use signals::{evaluate_signals, SignalConfig, SignalSeries};
pub use wavetrend::WaveTrendStrategy;

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Generate a trading signal based on market data
    fn generate_signal(&self, candles: &[Candle]) -> anyhow::Result<Signal>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Minimum candles required for this strategy
    fn min_candles_required(&self) -> usize;
}
