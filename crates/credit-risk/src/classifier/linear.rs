//! Linear model data structure.

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Binary linear model in logit space.
///
/// Coefficients are stored as one array of length `n_features + 1`, the last
/// element being the bias:
///
/// ```text
/// weights[feature] → coefficient
/// weights[n_features] → bias
/// ```
///
/// # Example
///
/// ```
/// use credit_risk::classifier::LinearModel;
///
/// let model = LinearModel::from_parts(vec![0.5, -1.0], 0.25);
/// assert_eq!(model.n_features(), 2);
/// assert_eq!(model.margin(&[2.0, 1.0]), 0.25);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct LinearModel {
    weights: Array1<f64>,
}

impl LinearModel {
    /// Zero-initialized model.
    pub fn zeros(n_features: usize) -> Self {
        Self {
            weights: Array1::zeros(n_features + 1),
        }
    }

    /// Build from coefficients and bias.
    pub fn from_parts(coefficients: Vec<f64>, bias: f64) -> Self {
        let mut weights = coefficients;
        weights.push(bias);
        Self {
            weights: Array1::from_vec(weights),
        }
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.weights.len() - 1
    }

    #[inline]
    pub fn weight(&self, feature: usize) -> f64 {
        self.weights[feature]
    }

    #[inline]
    pub fn bias(&self) -> f64 {
        self.weights[self.n_features()]
    }

    /// Coefficients without the bias.
    pub fn coefficients(&self) -> ArrayView1<'_, f64> {
        self.weights.slice(ndarray::s![..-1])
    }

    #[inline]
    pub fn set_bias(&mut self, value: f64) {
        let n = self.n_features();
        self.weights[n] = value;
    }

    #[inline]
    pub fn add_bias(&mut self, delta: f64) {
        let n = self.n_features();
        self.weights[n] += delta;
    }

    #[inline]
    pub fn set_weight(&mut self, feature: usize, value: f64) {
        self.weights[feature] = value;
    }

    #[inline]
    pub fn add_weight(&mut self, feature: usize, delta: f64) {
        self.weights[feature] += delta;
    }

    /// True if every coefficient and the bias are finite.
    pub fn is_finite(&self) -> bool {
        self.weights.iter().all(|w| w.is_finite())
    }

    /// Margin (log-odds) of a single row.
    ///
    /// # Panics
    ///
    /// Panics if `features.len() != n_features()`.
    #[inline]
    pub fn margin(&self, features: &[f32]) -> f64 {
        assert_eq!(
            features.len(),
            self.n_features(),
            "feature vector length does not match the model"
        );
        let mut m = self.bias();
        for (w, &x) in self.weights.iter().zip(features) {
            m += w * x as f64;
        }
        m
    }

    /// Margins for a feature-major matrix `[n_features, n_samples]`.
    pub fn margins(&self, features: ArrayView2<'_, f32>) -> Vec<f64> {
        assert_eq!(features.nrows(), self.n_features());
        let mut out = vec![self.bias(); features.ncols()];
        for (feature, row) in features.outer_iter().enumerate() {
            let w = self.weights[feature];
            if w == 0.0 {
                continue;
            }
            for (m, &x) in out.iter_mut().zip(row.iter()) {
                *m += w * x as f64;
            }
        }
        out
    }
}
