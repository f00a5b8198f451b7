use crate::indicators::{find_divergences, mfi_series, rsi_series, wavetrend, WaveTrend};
use crate::models::{Candle, Signal};

/// Configuration for signal generation
#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub channel_len: usize,
    pub avg_len: usize,
    pub ma_len: usize,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub mfi_period: usize,
    pub mfi_scale: f64,
    pub mfi_offset: f64,
    /// wt2 must be at or above this for a cross-down to count
    pub ob_level: f64,
    /// wt2 must be at or below this for a cross-up to count
    pub os_level: f64,
    /// deep oversold band the gold setup must climb out of
    pub deep_os_level: f64,
    /// divergence gates on the oscillator's own scale
    pub div_ob_level: f64,
    pub div_os_level: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            channel_len: 9,
            avg_len: 12,
            ma_len: 3,
            rsi_period: 14,
            rsi_oversold: 30.0,
            mfi_period: 60,
            mfi_scale: 150.0,
            mfi_offset: 2.5,
            ob_level: 20.0,
            os_level: -20.0,
            deep_os_level: -75.0,
            div_ob_level: 45.0,
            div_os_level: -65.0,
        }
    }
}

impl SignalConfig {
    /// Candles needed before the oscillator tail and both lookback indices
    /// are defined
    pub fn min_candles(&self) -> usize {
        self.channel_len + self.avg_len + self.ma_len + 8
    }
}

/// Per-candle signal booleans plus the indicator lines they came from, all
/// aligned with the input candles. Recomputed from scratch on every
/// evaluation; nothing is retained between calls.
#[derive(Debug, Clone)]
pub struct SignalSeries {
    pub wt: WaveTrend,
    pub rsi: Vec<Option<f64>>,
    pub mfi: Vec<Option<f64>>,
    pub bearish_div: Vec<bool>,
    pub bullish_div: Vec<bool>,
    pub cross_up: Vec<bool>,
    pub cross_down: Vec<bool>,
    pub gold: Vec<bool>,
    pub buy: Vec<bool>,
    pub sell: Vec<bool>,
}

impl SignalSeries {
    pub fn len(&self) -> usize {
        self.buy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buy.is_empty()
    }

    /// A signal is actionable when it fired at either of the two latest
    /// closed candles, tolerating one candle of polling lag. Buy takes
    /// priority over sell when both fired.
    pub fn actionable(&self) -> Signal {
        let n = self.len();
        if n < 2 {
            return Signal::Hold;
        }
        if self.buy[n - 1] || self.buy[n - 2] {
            Signal::Buy
        } else if self.sell[n - 1] || self.sell[n - 2] {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

/// Oscillator-line crossovers gated by the overbought/oversold levels.
/// The boundary counts: wt2 exactly at the level still qualifies.
pub fn crossovers(
    wt1: &[Option<f64>],
    wt2: &[Option<f64>],
    ob_level: f64,
    os_level: f64,
) -> (Vec<bool>, Vec<bool>) {
    let n = wt1.len();
    let mut cross_up = vec![false; n];
    let mut cross_down = vec![false; n];

    for i in 1..n {
        let (Some(a_prev), Some(b_prev), Some(a), Some(b)) =
            (wt1[i - 1], wt2[i - 1], wt1[i], wt2[i])
        else {
            continue;
        };
        cross_up[i] = a_prev < b_prev && a > b && b <= os_level;
        cross_down[i] = a_prev > b_prev && a < b && b >= ob_level;
    }

    (cross_up, cross_down)
}

/// The "gold" setup: a bullish divergence whose anchor sat in the deep
/// oversold band, with the oscillator now back above it and RSI confirming
/// oversold two candles back. Suppresses the plain buy signal at the same
/// index so a single setup is not counted twice.
pub fn gold_setups(
    bullish_div: &[bool],
    wt2: &[Option<f64>],
    rsi: &[Option<f64>],
    deep_os_level: f64,
    rsi_oversold: f64,
) -> Vec<bool> {
    let n = bullish_div.len();
    let mut gold = vec![false; n];

    for i in 2..n {
        if !bullish_div[i] {
            continue;
        }
        let (Some(anchor), Some(current), Some(rsi_back)) = (wt2[i - 2], wt2[i], rsi[i - 2])
        else {
            continue;
        };
        gold[i] = anchor <= deep_os_level && current > deep_os_level && rsi_back < rsi_oversold;
    }

    gold
}

/// Run the full signal pipeline over a candle window.
pub fn evaluate_signals(candles: &[Candle], config: &SignalConfig) -> SignalSeries {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let wt = wavetrend(candles, config.channel_len, config.avg_len, config.ma_len);
    let rsi = rsi_series(&closes, config.rsi_period);
    let mfi: Vec<Option<f64>> = mfi_series(candles, config.mfi_period)
        .into_iter()
        .map(|v| v.map(|m| m * config.mfi_scale - config.mfi_offset))
        .collect();

    let div = find_divergences(&wt.wt2, &closes, config.div_ob_level, config.div_os_level);
    let (cross_up, cross_down) = crossovers(&wt.wt1, &wt.wt2, config.ob_level, config.os_level);
    let gold = gold_setups(
        &div.bullish,
        &wt.wt2,
        &rsi,
        config.deep_os_level,
        config.rsi_oversold,
    );

    let buy: Vec<bool> = cross_up
        .iter()
        .zip(gold.iter())
        .map(|(&up, &g)| up && !g)
        .collect();
    let sell = cross_down.clone();

    SignalSeries {
        wt,
        rsi,
        mfi,
        bearish_div: div.bearish,
        bullish_div: div.bullish,
        cross_up,
        cross_down,
        gold,
        buy,
        sell,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn defined(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_cross_up_requires_oversold() {
        // wt1 crosses above wt2 at index 1 in every case; only the wt2
        // level decides whether the cross counts
        let wt1 = defined(&[-30.0, -10.0]);

        // wt2 below the level: counts
        let wt2 = defined(&[-25.0, -25.0]);
        let (up, _) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(up[1]);

        // wt2 exactly at the level: boundary counts as crossed
        let wt2 = defined(&[-20.0, -20.0]);
        let (up, _) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(up[1]);

        // wt2 above the level: gated out
        let wt2 = defined(&[-15.0, -15.0]);
        let (up, _) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(!up[1]);
    }

    #[test]
    fn test_cross_down_requires_overbought() {
        let wt1 = defined(&[30.0, 10.0]);

        let wt2 = defined(&[25.0, 25.0]);
        let (_, down) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(down[1]);

        let wt2 = defined(&[20.0, 20.0]);
        let (_, down) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(down[1]);

        let wt2 = defined(&[15.0, 15.0]);
        let (_, down) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(!down[1]);
    }

    #[test]
    fn test_no_cross_without_sign_change() {
        let wt1 = defined(&[-30.0, -28.0]);
        let wt2 = defined(&[-25.0, -25.0]);
        let (up, down) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(!up[1]);
        assert!(!down[1]);
    }

    #[test]
    fn test_undefined_lines_never_cross() {
        let wt1 = vec![None, Some(-10.0)];
        let wt2 = defined(&[-25.0, -25.0]);
        let (up, down) = crossovers(&wt1, &wt2, 20.0, -20.0);
        assert!(!up[1]);
        assert!(!down[1]);
    }

    #[test]
    fn test_gold_requires_deep_oversold_recovery_and_rsi() {
        let bullish = vec![false, false, false, false, true];
        let wt2 = defined(&[-60.0, -70.0, -80.0, -76.0, -70.0]);

        // RSI confirms two candles back
        let rsi = defined(&[50.0, 40.0, 25.0, 35.0, 45.0]);
        let gold = gold_setups(&bullish, &wt2, &rsi, -75.0, 30.0);
        assert!(gold[4]); // anchor -80 <= -75, current -70 > -75, rsi 25 < 30

        // RSI not oversold at the anchor: no gold
        let rsi = defined(&[50.0, 40.0, 35.0, 35.0, 45.0]);
        let gold = gold_setups(&bullish, &wt2, &rsi, -75.0, 30.0);
        assert!(!gold[4]);

        // Oscillator still inside the deep band: no gold
        let wt2_deep = defined(&[-60.0, -70.0, -80.0, -78.0, -77.0]);
        let rsi = defined(&[50.0, 40.0, 25.0, 35.0, 45.0]);
        let gold = gold_setups(&bullish, &wt2_deep, &rsi, -75.0, 30.0);
        assert!(!gold[4]);
    }

    #[test]
    fn test_gold_suppresses_buy() {
        let cross_up = [true];
        let gold = [true];
        let buy: Vec<bool> = cross_up
            .iter()
            .zip(gold.iter())
            .map(|(&up, &g)| up && !g)
            .collect();
        assert!(!buy[0]);
    }

    #[test]
    fn test_actionable_tolerates_one_candle_lag() {
        let mut series = empty_series(5);
        series.buy[3] = true; // fired one candle before the latest
        assert_eq!(series.actionable(), Signal::Buy);

        let mut series = empty_series(5);
        series.sell[4] = true;
        assert_eq!(series.actionable(), Signal::Sell);

        let mut series = empty_series(5);
        series.buy[2] = true; // too old
        assert_eq!(series.actionable(), Signal::Hold);
    }

    #[test]
    fn test_buy_wins_over_sell() {
        let mut series = empty_series(4);
        series.buy[3] = true;
        series.sell[3] = true;
        assert_eq!(series.actionable(), Signal::Buy);
    }

    #[test]
    fn test_evaluate_signals_shapes() {
        let candles: Vec<Candle> = (0..120)
            .map(|i| {
                let close = 60000.0 + 300.0 * ((i as f64) * 0.7).sin();
                Candle {
                    timestamp: Utc::now() + Duration::minutes(i as i64),
                    open: close,
                    high: close + 50.0,
                    low: close - 50.0,
                    close,
                    volume: 1000.0 + i as f64,
                }
            })
            .collect();

        let series = evaluate_signals(&candles, &SignalConfig::default());
        assert_eq!(series.len(), candles.len());
        assert_eq!(series.wt.wt2.len(), candles.len());
        assert_eq!(series.rsi.len(), candles.len());
        assert_eq!(series.mfi.len(), candles.len());
        assert!(series.wt.wt2.last().unwrap().is_some());
        assert!(matches!(
            series.actionable(),
            Signal::Buy | Signal::Sell | Signal::Hold
        ));
    }

    fn empty_series(n: usize) -> SignalSeries {
        SignalSeries {
            wt: WaveTrend {
                wt1: vec![None; n],
                wt2: vec![None; n],
                spread: vec![None; n],
            },
            rsi: vec![None; n],
            mfi: vec![None; n],
            bearish_div: vec![false; n],
            bullish_div: vec![false; n],
            cross_up: vec![false; n],
            cross_down: vec![false; n],
            gold: vec![false; n],
            buy: vec![false; n],
            sell: vec![false; n],
        }
    }
}
