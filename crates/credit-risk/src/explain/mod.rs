//! Feature attributions.
//!
//! Every explanation is measured in probability space against a baseline, the
//! prediction at the training feature means. Contributions sum to
//! `prediction - baseline`:
//!
//! - the exact path (linear margin) reaches this to floating error;
//! - the sampling path is additive by construction, but how the total is split
//!   between fields carries Monte-Carlo error.
//!
//! One-hot columns are summed back to their input field. Column-level values
//! are kept alongside when the exact path is used.

mod engine;
mod linear;
mod sampling;
mod values;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use engine::{AttributionEngine, AttributionMethod};
pub use linear::LinearExplainer;
pub use sampling::SamplingExplainer;
pub use values::Contributions;

/// Documented bound on `|Σ contributions - (prediction - baseline)|`.
pub const ATTRIBUTION_TOLERANCE: f64 = 0.05;

/// Errors while computing attributions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExplainError {
    #[error("background has {found} values, model expects {expected}")]
    BackgroundMismatch { expected: usize, found: usize },

    #[error("feature vector has {found} values, model expects {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("feature vector layout {found:08x} does not match {expected:08x}")]
    LayoutMismatch { expected: u32, found: u32 },

    #[error("exact attributions need a model with a linear margin")]
    NotLinear,
}

/// Direction of a contribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    /// Raises the default probability.
    Positive,
    /// Lowers the default probability.
    Negative,
    Neutral,
}

impl Sign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Neutral
        }
    }
}

/// Contribution of one field (or column) to a prediction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub contribution: f64,
    pub sign: Sign,
    /// The raw value lay outside the training range.
    pub extrapolated: bool,
}

impl Attribution {
    pub fn new(feature: impl Into<String>, contribution: f64) -> Self {
        Self {
            feature: feature.into(),
            contribution,
            sign: Sign::of(contribution),
            extrapolated: false,
        }
    }
}

/// Descending by magnitude, then by name.
fn by_magnitude(a: &Attribution, b: &Attribution) -> Ordering {
    b.contribution
        .abs()
        .total_cmp(&a.contribution.abs())
        .then_with(|| a.feature.cmp(&b.feature))
}

/// Attributions for one prediction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Prediction at the background.
    pub baseline: f64,
    pub prediction: f64,
    /// One entry per input field, sorted by descending magnitude.
    pub attributions: Vec<Attribution>,
    /// One entry per encoded column, sorted the same way. Absent for sampled
    /// explanations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Attribution>>,
}

impl Explanation {
    pub fn new(
        baseline: f64,
        prediction: f64,
        mut attributions: Vec<Attribution>,
        mut columns: Option<Vec<Attribution>>,
    ) -> Self {
        attributions.sort_by(by_magnitude);
        if let Some(columns) = columns.as_mut() {
            columns.sort_by(by_magnitude);
        }
        Self {
            baseline,
            prediction,
            attributions,
            columns,
        }
    }

    /// Sum of the per-field contributions.
    pub fn total(&self) -> f64 {
        self.attributions.iter().map(|a| a.contribution).sum()
    }

    /// `|Σ contributions - (prediction - baseline)|`.
    pub fn additivity_error(&self) -> f64 {
        (self.total() - (self.prediction - self.baseline)).abs()
    }

    /// The `n` largest field attributions.
    pub fn top(&self, n: usize) -> &[Attribution] {
        &self.attributions[..n.min(self.attributions.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_of_value() {
        assert_eq!(Sign::of(0.1), Sign::Positive);
        assert_eq!(Sign::of(-0.1), Sign::Negative);
        assert_eq!(Sign::of(0.0), Sign::Neutral);
    }

    #[test]
    fn sorted_by_magnitude_then_name() {
        let e = Explanation::new(
            0.3,
            0.3,
            vec![
                Attribution::new("b", 0.05),
                Attribution::new("a", -0.05),
                Attribution::new("c", 0.1),
                Attribution::new("d", -0.1),
            ],
            None,
        );
        let order: Vec<&str> = e.attributions.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(order, ["c", "d", "a", "b"]);
        assert!(e.additivity_error() < 1e-12);
        assert_eq!(e.top(2).len(), 2);
        assert_eq!(e.top(10).len(), 4);
    }
}
