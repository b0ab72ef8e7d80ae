//! Numeric standardization.

use serde::{Deserialize, Serialize};

/// Handling of numeric values outside the training range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtrapolationPolicy {
    /// Scale the raw value as-is.
    #[default]
    Extrapolate,
    /// Clamp the raw value to the training `[min, max]` before scaling.
    Clamp,
}

/// Scaling parameters of one numeric field.
///
/// `std` is the population standard deviation, replaced by 1 for constant
/// columns so that scaling never divides by zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub median: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericScaler {
    /// Fit from observed values. Returns `None` for an empty column.
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            median,
            mean,
            std,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }

    /// True if `x` lies outside the training range.
    #[inline]
    pub fn is_outside(&self, x: f64) -> bool {
        x < self.min || x > self.max
    }

    /// Standardize one value.
    #[inline]
    pub fn transform(&self, x: f64, policy: ExtrapolationPolicy) -> f32 {
        let x = match policy {
            ExtrapolationPolicy::Extrapolate => x,
            ExtrapolationPolicy::Clamp => x.clamp(self.min, self.max),
        };
        ((x - self.mean) / self.std) as f32
    }

    /// Check the parameters are usable.
    pub fn is_valid(&self) -> bool {
        [self.median, self.mean, self.std, self.min, self.max]
            .iter()
            .all(|v| v.is_finite())
            && self.std > 0.0
            && self.min <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fit_statistics() {
        let s = NumericScaler::fit(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_abs_diff_eq!(s.mean, 2.5);
        assert_abs_diff_eq!(s.median, 2.5);
        assert_abs_diff_eq!(s.std, 1.25f64.sqrt());
        assert_eq!((s.min, s.max), (1.0, 4.0));
    }

    #[test]
    fn constant_column_has_unit_std() {
        let s = NumericScaler::fit(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(s.std, 1.0);
        assert_eq!(s.transform(5.0, ExtrapolationPolicy::Extrapolate), 0.0);
    }

    #[test]
    fn empty_column() {
        assert!(NumericScaler::fit(&[]).is_none());
    }

    #[test]
    fn clamp_policy() {
        let s = NumericScaler::fit(&[0.0, 10.0]).unwrap();
        assert!(s.is_outside(20.0));
        assert!(!s.is_outside(10.0));
        let clamped = s.transform(20.0, ExtrapolationPolicy::Clamp);
        let at_max = s.transform(10.0, ExtrapolationPolicy::Extrapolate);
        assert_eq!(clamped, at_max);
        assert!(s.transform(20.0, ExtrapolationPolicy::Extrapolate) > at_max);
    }
}
