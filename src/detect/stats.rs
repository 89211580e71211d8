//! Column statistics shared by the scaler, the scorer and the classifier.

/// Summary statistics over a column of values.
pub struct Column<'a> {
    values: &'a [f64],
}

impl<'a> Column<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let scale = self.scale();
        let sum: f64 = self.values.iter().map(|&x| x / scale).sum();
        sum / self.values.len() as f64 * scale
    }

    /// Population variance (divides by N, not N-1). Can overflow to infinity
    /// for columns near `f64::MAX`; use [`Column::std_dev`] for scaling.
    pub fn variance(&self) -> f64 {
        let (variance, scale) = self.scaled_variance();
        variance * scale * scale
    }

    /// Population standard deviation. Finite for any column whose range is.
    pub fn std_dev(&self) -> f64 {
        let (variance, scale) = self.scaled_variance();
        variance.sqrt() * scale
    }

    /// Power of two at or above the largest magnitude (1 for small columns).
    /// Dividing by it is exact, so sums stay in range without changing the
    /// result for ordinary data.
    fn scale(&self) -> f64 {
        let max_abs = self.values.iter().fold(0.0_f64, |m, &x| m.max(x.abs()));
        if !(max_abs > 1.0 && max_abs.is_finite()) {
            return 1.0;
        }
        let exponent = (max_abs.log2().ceil() as i32).min(f64::MAX_EXP - 1);
        2.0_f64.powi(exponent)
    }

    fn scaled_variance(&self) -> (f64, f64) {
        if self.values.is_empty() {
            return (0.0, 1.0);
        }
        let scale = self.scale();
        let n = self.values.len() as f64;
        let mean = self.values.iter().map(|&x| x / scale).sum::<f64>() / n;
        let sum_sq_diff: f64 = self.values.iter().map(|&x| (x / scale - mean).powi(2)).sum();
        (sum_sq_diff / n, scale)
    }

    pub fn min(&self) -> f64 {
        self.values.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Percentile `q` (in `[0, 1]`) with linear interpolation between closest ranks.
/// Non-finite values are ignored. Returns `None` when no finite value remains.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 1.0);
    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
