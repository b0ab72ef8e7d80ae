//! Exact attributions for models with a linear margin.
//!
//! In margin space SHAP values have a closed form:
//! `shap[i] = weight[i] * (x[i] - mean[i])`, with base value
//! `bias + Σ weight[i] * mean[i]`.
//!
//! They are moved to probability space by scaling every value with
//! `(p - p_base) / (m - m_base)`, which keeps signs and ranking and makes the
//! values sum to `p - p_base`. When the margin barely moves the local slope
//! `dp/dm` is used instead.

use crate::classifier::LinearLink;

use super::ExplainError;
use super::values::Contributions;

const MIN_MARGIN_DELTA: f64 = 1e-9;

/// Closed-form explainer over a linear link.
pub struct LinearExplainer<'a> {
    link: &'a dyn LinearLink,
    feature_means: &'a [f64],
}

impl<'a> LinearExplainer<'a> {
    pub fn new(link: &'a dyn LinearLink, feature_means: &'a [f64]) -> Result<Self, ExplainError> {
        let n = link.linear_model().n_features();
        if feature_means.len() != n {
            return Err(ExplainError::BackgroundMismatch {
                expected: n,
                found: feature_means.len(),
            });
        }
        Ok(Self {
            link,
            feature_means,
        })
    }

    /// Margin at the background: `bias + Σ w·μ`.
    pub fn base_margin(&self) -> f64 {
        let model = self.link.linear_model();
        let mut base = model.bias();
        for (feature, &mean) in self.feature_means.iter().enumerate() {
            base += model.weight(feature) * mean;
        }
        base
    }

    /// Probability at the background.
    pub fn base_probability(&self) -> f64 {
        self.link.probability(self.base_margin())
    }

    /// Margin-space SHAP values.
    pub fn margin_contributions(&self, features: &[f32]) -> Contributions {
        let model = self.link.linear_model();
        let values = features
            .iter()
            .zip(self.feature_means)
            .enumerate()
            .map(|(feature, (&x, &mean))| model.weight(feature) * (x as f64 - mean))
            .collect();
        Contributions::from_values(values, self.base_margin())
    }

    /// Probability-space contributions. Sum to `p - p_base` up to rounding.
    pub fn contributions(&self, features: &[f32]) -> Contributions {
        let margin = self.margin_contributions(features);
        let base_margin = margin.base_value();
        let delta_m = margin.total();
        let p_base = self.link.probability(base_margin);
        let p = self.link.probability(base_margin + delta_m);

        let factor = if delta_m.abs() < MIN_MARGIN_DELTA {
            self.link.slope(base_margin + delta_m)
        } else {
            (p - p_base) / delta_m
        };
        margin.rescaled(factor, p_base)
    }
}
