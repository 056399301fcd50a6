//! ADX (Average Directional Index, Wilder smoothing).
//!
//! +DM/-DM and TR are Wilder-smoothed into +DI/-DI; DX = 100 * |+DI - -DI| / (+DI + -DI);
//! ADX is the Wilder average of DX. First valid value at index `2 * period - 1`.

use crate::components::indicator::Indicator;
use crate::domain::Bar;
use crate::indicators::atr::true_range;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: adx_key(period),
        }
    }
}

pub fn adx_key(period: usize) -> String {
    format!("adx_{period}")
}

/// Wilder running sum: seed with the sum of values[1..=period], then
/// S[t] = S[t-1] - S[t-1] / period + values[t].
fn wilder_sum(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if n <= period {
        return out;
    }
    let p = period as f64;
    let mut sum: f64 = values[1..=period].iter().sum();
    out[period] = sum;
    for i in (period + 1)..n {
        sum = sum - sum / p + values[i];
        out[i] = sum;
    }
    out
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2 * self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let p = self.period;
        let mut adx = vec![f64::NAN; n];
        if n < 2 * p {
            return adx;
        }

        let mut plus_dm = vec![0.0; n];
        let mut minus_dm = vec![0.0; n];
        for i in 1..n {
            let up = bars[i].high - bars[i - 1].high;
            let down = bars[i - 1].low - bars[i].low;
            if up > down && up > 0.0 {
                plus_dm[i] = up;
            }
            if down > up && down > 0.0 {
                minus_dm[i] = down;
            }
        }

        let tr = wilder_sum(&true_range(bars), p);
        let plus = wilder_sum(&plus_dm, p);
        let minus = wilder_sum(&minus_dm, p);

        let dx: Vec<f64> = (0..n)
            .map(|i| {
                if tr[i].is_nan() || tr[i] <= 0.0 {
                    return f64::NAN;
                }
                let plus_di = 100.0 * plus[i] / tr[i];
                let minus_di = 100.0 * minus[i] / tr[i];
                let total = plus_di + minus_di;
                if total <= 0.0 {
                    0.0
                } else {
                    100.0 * (plus_di - minus_di).abs() / total
                }
            })
            .collect();

        let seed_end = 2 * p - 1;
        let mut value = dx[p..=seed_end].iter().sum::<f64>() / p as f64;
        adx[seed_end] = value;
        for i in (seed_end + 1)..n {
            value = (value * (p as f64 - 1.0) + dx[i]) / p as f64;
            adx[i] = value;
        }
        adx
    }
}
