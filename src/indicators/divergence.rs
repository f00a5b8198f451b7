/// Divergence flags aligned with the input series. An index is flagged when
/// the candle two back anchors a 5-candle fractal extremum that disagrees
/// with price.
#[derive(Debug, Clone)]
pub struct Divergences {
    pub bearish: Vec<bool>,
    pub bullish: Vec<bool>,
}

/// Compare fractal extrema of an oscillator line against price.
///
/// A fractal top at i-2 means the oscillator there is the local maximum of
/// the window {i-4 .. i}; bearish divergence additionally requires price to
/// have made a higher high while the oscillator made a lower high, at or
/// above `ob_level`. Bullish is symmetric against `os_level`. Indices below
/// 4, or windows with undefined oscillator values, are never flagged.
pub fn find_divergences(
    series: &[Option<f64>],
    price: &[f64],
    ob_level: f64,
    os_level: f64,
) -> Divergences {
    let n = series.len();
    let mut bearish = vec![false; n];
    let mut bullish = vec![false; n];

    for i in 4..n {
        let window = [
            series[i - 4],
            series[i - 3],
            series[i - 2],
            series[i - 1],
            series[i],
        ];
        let [s4, s3, s2, s1, s0] = match window {
            [Some(a), Some(b), Some(c), Some(d), Some(e)] => [a, b, c, d, e],
            _ => continue,
        };

        let fractal_top = s4 < s2 && s3 < s2 && s2 > s1 && s2 > s0;
        let fractal_bot = s4 > s2 && s3 > s2 && s2 < s1 && s2 < s0;

        bearish[i] = fractal_top && price[i - 2] > price[i - 4] && s2 < s4 && s2 >= ob_level;
        bullish[i] = fractal_bot && price[i - 2] < price[i - 4] && s2 > s4 && s2 <= os_level;
    }

    Divergences { bearish, bullish }
}
