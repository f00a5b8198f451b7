/// Relative Strength Index series (Wilder smoothing).
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions.
///
/// Values:
/// - RSI > 70: Overbought
/// - RSI < 30: Oversold
///
/// Entries before index `period` are undefined.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss += -change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 {
            (change, 0.0)
        } else {
            (0.0, -change)
        };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_series_shape() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let rsi = rsi_series(&closes, 14);
        assert_eq!(rsi.len(), closes.len());
        assert!(rsi[..14].iter().all(|v| v.is_none()));
        assert!(rsi[14..].iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_rsi_bounded() {
        let closes = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5,
        ];
        let rsi = rsi_series(&closes, 14);
        let value = rsi[14].unwrap();
        assert!(value > 0.0 && value < 100.0);
    }

    #[test]
    fn test_rsi_all_gains() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_series(&closes, 5);
        assert_eq!(rsi[9], Some(100.0));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let closes = vec![100.0, 102.0, 101.0];
        let rsi = rsi_series(&closes, 14);
        assert!(rsi.iter().all(|v| v.is_none()));
    }
}
