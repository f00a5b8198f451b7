use crate::indicators::{ema_series, sma_series};
use crate::models::Candle;

/// WaveTrend oscillator output, aligned index-for-index with the input
/// candles. Leading entries are undefined until each moving-average window
/// has filled.
#[derive(Debug, Clone)]
pub struct WaveTrend {
    pub wt1: Vec<Option<f64>>,
    pub wt2: Vec<Option<f64>>,
    pub spread: Vec<Option<f64>>,
}

/// Compute the WaveTrend oscillator pair and their spread.
///
/// hlc3 -> esa = EMA(hlc3, channel_len)
///      -> de  = EMA(|hlc3 - esa|, channel_len)
///      -> ci  = (hlc3 - esa) / (0.015 * de), undefined where de == 0
///      -> wt1 = EMA(ci, avg_len)
///      -> wt2 = SMA(wt1, ma_len)
///
/// Pure function: no state survives between calls, the full candle window
/// is recomputed every time.
pub fn wavetrend(candles: &[Candle], channel_len: usize, avg_len: usize, ma_len: usize) -> WaveTrend {
    let hlc3: Vec<Option<f64>> = candles
        .iter()
        .map(|c| Some((c.high + c.low + c.close) / 3.0))
        .collect();

    let esa = ema_series(&hlc3, channel_len);

    let deviation: Vec<Option<f64>> = hlc3
        .iter()
        .zip(esa.iter())
        .map(|(price, esa)| match (price, esa) {
            (Some(p), Some(e)) => Some((p - e).abs()),
            _ => None,
        })
        .collect();
    let de = ema_series(&deviation, channel_len);

    let ci: Vec<Option<f64>> = hlc3
        .iter()
        .zip(esa.iter())
        .zip(de.iter())
        .map(|((price, esa), de)| match (price, esa, de) {
            (Some(p), Some(e), Some(d)) if *d != 0.0 => Some((p - e) / (0.015 * d)),
            _ => None,
        })
        .collect();

    let wt1 = ema_series(&ci, avg_len);
    let wt2 = sma_series(&wt1, ma_len);

    let spread = wt1
        .iter()
        .zip(wt2.iter())
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        })
        .collect();

    WaveTrend { wt1, wt2, spread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc::now() + Duration::minutes(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_output_length_matches_input() {
        let candles = candles_from_closes(&vec![100.0; 50]);
        let wt = wavetrend(&candles, 9, 12, 3);
        assert_eq!(wt.wt1.len(), 50);
        assert_eq!(wt.wt2.len(), 50);
        assert_eq!(wt.spread.len(), 50);
    }

    #[test]
    fn test_leading_entries_undefined() {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64).sin()).collect();
        let candles = candles_from_closes(&closes);
        let wt = wavetrend(&candles, 9, 12, 3);
        // First channel_len + avg_len + ma_len - 1 entries must be undefined
        let prefix = 9 + 12 + 3 - 1;
        assert!(wt.wt2[..prefix].iter().all(|v| v.is_none()));
        // And with enough data the tail is fully defined
        assert!(wt.wt2.last().unwrap().is_some());
        assert!(wt.spread.last().unwrap().is_some());
    }

    #[test]
    fn test_flat_series_has_no_oscillator() {
        // Exactly constant prices: de == 0 everywhere, ci never defined
        let candles = candles_from_closes(&vec![100.0; 60]);
        let wt = wavetrend(&candles, 9, 12, 3);
        assert!(wt.wt1.iter().all(|v| v.is_none()));
        assert!(wt.spread.iter().all(|v| v.is_none()));
    }

    #[test]
    fn test_spread_converges_to_zero_when_price_flattens() {
        // A little initial movement, then a long flat tail: both lines
        // decay toward the same value, so the spread goes to zero
        let mut closes = vec![100.0, 104.0, 98.0, 103.0, 99.0, 102.0];
        closes.extend(vec![100.0; 400]);
        let candles = candles_from_closes(&closes);
        let wt = wavetrend(&candles, 9, 12, 3);
        let mid_spread = wt.spread[160].unwrap();
        let last_spread = wt.spread.last().unwrap().unwrap();
        assert!(last_spread.abs() < 0.05, "spread was {last_spread}");
        assert!(last_spread.abs() < mid_spread.abs());
    }
}
