use super::{evaluate_signals, SignalConfig, Strategy};
use crate::models::{Candle, Signal};
use anyhow::bail;

/// WaveTrend momentum/divergence strategy
///
/// Entries come from oscillator-line crossovers inside the oversold or
/// overbought bands; the gold setup (bullish divergence climbing out of
/// deep oversold) suppresses the plain buy at the same candle. RSI and the
/// scaled MFI are carried along for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct WaveTrendStrategy {
    config: SignalConfig,
}

impl WaveTrendStrategy {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl Strategy for WaveTrendStrategy {
    fn generate_signal(&self, candles: &[Candle]) -> anyhow::Result<Signal> {
        if candles.len() < self.min_candles_required() {
            bail!(
                "insufficient data: {} candles, need {}",
                candles.len(),
                self.min_candles_required()
            );
        }

        let series = evaluate_signals(candles, &self.config);
        let n = series.len();

        tracing::debug!(
            "wt1={} wt2={} rsi={} mfi={} cross_up={} cross_down={} gold={}",
            fmt_opt(series.wt.wt1[n - 1]),
            fmt_opt(series.wt.wt2[n - 1]),
            fmt_opt(series.rsi[n - 1]),
            fmt_opt(series.mfi[n - 1]),
            series.cross_up[n - 1],
            series.cross_down[n - 1],
            series.gold[n - 1],
        );

        Ok(series.actionable())
    }

    fn name(&self) -> &str {
        "WaveTrendStrategy"
    }

    fn min_candles_required(&self) -> usize {
        self.config.min_candles()
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}
