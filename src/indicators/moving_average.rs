/// Simple moving average over an aligned series.
///
/// Output has the same length as the input; an entry is defined only when
/// the full window ending at that index is defined.
pub fn sma_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(|v| v.is_some()) {
            let sum: f64 = window.iter().map(|v| v.unwrap()).sum();
            out[i] = Some(sum / period as f64);
        }
    }

    out
}

/// Exponential moving average over an aligned series.
///
/// Seeded with the SMA of the first fully-defined window, then smoothed
/// recursively with multiplier 2/(period+1). A gap after the seed keeps the
/// previous smoothed value and emits no output at the gap index.
pub fn ema_series(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut run = 0usize;
    let mut ema: Option<f64> = None;

    for (i, value) in values.iter().enumerate() {
        match (ema, value) {
            (Some(prev), Some(x)) => {
                let next = (x - prev) * multiplier + prev;
                ema = Some(next);
                out[i] = Some(next);
            }
            (Some(_), None) => {
                // gap: hold the smoothed value, emit nothing
            }
            (None, Some(_)) => {
                run += 1;
                if run == period {
                    let window = &values[i + 1 - period..=i];
                    let seed: f64 = window.iter().map(|v| v.unwrap()).sum::<f64>() / period as f64;
                    ema = Some(seed);
                    out[i] = Some(seed);
                }
            }
            (None, None) => {
                run = 0;
            }
        }
    }

    out
}
