//! Per-column contribution container.

use crate::encode::FeatureLayout;

/// Contributions of each encoded column for one sample, plus the base value
/// they are measured from.
///
/// The sum property reads `base_value + Σ values ≈ prediction`.
#[derive(Clone, Debug, PartialEq)]
pub struct Contributions {
    values: Vec<f64>,
    base_value: f64,
}

impl Contributions {
    pub fn zeros(n_features: usize, base_value: f64) -> Self {
        Self {
            values: vec![0.0; n_features],
            base_value,
        }
    }

    pub fn from_values(values: Vec<f64>, base_value: f64) -> Self {
        Self { values, base_value }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, feature: usize) -> f64 {
        self.values[feature]
    }

    #[inline]
    pub fn add(&mut self, feature: usize, delta: f64) {
        self.values[feature] += delta;
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Sum of all contributions.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Multiply every contribution by `factor` and move the base value.
    pub fn rescaled(&self, factor: f64, base_value: f64) -> Self {
        Self {
            values: self.values.iter().map(|v| v * factor).collect(),
            base_value,
        }
    }

    /// Check `base_value + Σ values` against a prediction.
    pub fn verify(&self, prediction: f64, tolerance: f64) -> bool {
        (self.base_value + self.total() - prediction).abs() <= tolerance
    }

    /// Sum contributions over the columns of each input field.
    ///
    /// Returns one `(field, contribution)` pair per field group, in layout
    /// order.
    pub fn aggregate(&self, layout: &FeatureLayout) -> Vec<(&'static str, f64)> {
        debug_assert_eq!(layout.n_features(), self.values.len());
        layout
            .groups()
            .iter()
            .map(|g| (g.field, self.values[g.columns.clone()].iter().sum()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_sum_property() {
        let c = Contributions::from_values(vec![0.1, -0.05, 0.2], 0.3);
        assert!(c.verify(0.55, 1e-12));
        assert!(!c.verify(0.6, 1e-3));
    }

    #[test]
    fn rescale() {
        let c = Contributions::from_values(vec![1.0, -2.0], 0.0).rescaled(0.5, 0.25);
        assert_eq!(c.values(), &[0.5, -1.0]);
        assert_eq!(c.base_value(), 0.25);
    }
}
