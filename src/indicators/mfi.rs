use crate::models::Candle;

/// Money Flow Index series over typical price and volume.
///
/// Classic volume-weighted RSI: raw money flow = hlc3 * volume, classified
/// positive or negative by the direction of the typical price, summed over
/// `period` and folded into 100 - 100/(1 + ratio). Entries before index
/// `period` are undefined.
pub fn mfi_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }

    let typical: Vec<f64> = candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();

    // Signed raw money flow per candle; index 0 has no direction
    let mut positive = vec![0.0; candles.len()];
    let mut negative = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let flow = typical[i] * candles[i].volume;
        if typical[i] > typical[i - 1] {
            positive[i] = flow;
        } else if typical[i] < typical[i - 1] {
            negative[i] = flow;
        }
    }

    for i in period..candles.len() {
        let pos: f64 = positive[i + 1 - period..=i].iter().sum();
        let neg: f64 = negative[i + 1 - period..=i].iter().sum();
        let value = if neg == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + pos / neg)
        };
        out[i] = Some(value);
    }

    out
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
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_mfi_shape() {
        let candles = candles_from_closes(&[100.0, 101.0, 99.0, 102.0, 103.0, 101.0, 104.0]);
        let mfi = mfi_series(&candles, 3);
        assert_eq!(mfi.len(), candles.len());
        assert!(mfi[..3].iter().all(|v| v.is_none()));
        assert!(mfi[3..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_mfi_all_inflow() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let candles = candles_from_closes(&closes);
        let mfi = mfi_series(&candles, 4);
        assert_eq!(mfi[7], Some(100.0));
    }

    #[test]
    fn test_mfi_bounded() {
        let candles = candles_from_closes(&[100.0, 103.0, 99.0, 104.0, 98.0, 105.0, 97.0]);
        let mfi = mfi_series(&candles, 4);
        for value in mfi.iter().flatten() {
            assert!(*value >= 0.0 && *value <= 100.0);
        }
    }
}
