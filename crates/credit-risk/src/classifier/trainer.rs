//! Coordinate descent trainer for L2-regularized logistic regression.
//!
//! Each round first takes a Newton step on the (unregularized) bias, then one
//! Newton step per coordinate in feature order:
//!
//! ```text
//! grad_l2 = Σ w_i g_i x_ij + λ w_j
//! hess_l2 = Σ w_i h_i x_ij² + λ
//! delta   = -grad_l2 / hess_l2 × learning_rate
//! ```
//!
//! Margins and gradient pairs are refreshed after every step, only for rows
//! where the feature is non-zero, so updates are exact and cheap on one-hot
//! columns.
//!
//! Training data is feature-major `[n_features, n_samples]`.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::training::TrainingError;

use super::linear::LinearModel;
use super::objective::{GradHess, LogisticLoss};

/// Sample weighting by class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Weight class `c` by `n / (2 n_c)`.
    #[default]
    Balanced,
    /// Every sample weighs 1.
    None,
}

impl ClassWeight {
    /// Per-sample weights for 0/1 targets.
    pub fn sample_weights(self, targets: &[f32]) -> Vec<f64> {
        match self {
            ClassWeight::None => vec![1.0; targets.len()],
            ClassWeight::Balanced => {
                let n = targets.len() as f64;
                let n_pos = targets.iter().filter(|&&y| y > 0.5).count() as f64;
                let n_neg = n - n_pos;
                let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 1.0 };
                let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 1.0 };
                targets
                    .iter()
                    .map(|&y| if y > 0.5 { w_pos } else { w_neg })
                    .collect()
            }
        }
    }
}

/// Parameters for coordinate descent.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierParams {
    /// L2 regularization strength (λ = 1 / C).
    pub lambda: f64,
    /// Step multiplier applied to every Newton step.
    pub learning_rate: f64,
    /// Upper bound on rounds.
    pub max_rounds: u32,
    /// Stop when the largest absolute step of a round falls below this.
    pub tolerance: f64,
    pub class_weight: ClassWeight,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            learning_rate: 1.0,
            max_rounds: 200,
            tolerance: 1e-5,
            class_weight: ClassWeight::Balanced,
        }
    }
}

/// Summary of a finished fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FitSummary {
    pub rounds: u32,
    pub converged: bool,
    /// Weighted mean log loss on the training data, without the penalty.
    pub loss: f64,
}

/// Sequential coordinate descent trainer.
#[derive(Clone, Debug)]
pub struct CoordinateDescent {
    params: ClassifierParams,
}

impl CoordinateDescent {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// Fit a model.
    ///
    /// `targets` holds 0/1 labels, one per column of `features`.
    pub fn train(
        &self,
        features: ArrayView2<'_, f32>,
        targets: &[f32],
    ) -> Result<(LinearModel, FitSummary), TrainingError> {
        let (n_features, n_samples) = features.dim();
        assert_eq!(targets.len(), n_samples, "one target per sample");

        let p = &self.params;
        let weights = p.class_weight.sample_weights(targets);

        let mut model = LinearModel::zeros(n_features);
        model.set_bias(LogisticLoss::base_score(targets, &weights));

        let mut margins = vec![model.bias(); n_samples];
        let mut grads = vec![GradHess::default(); n_samples];
        LogisticLoss::compute_gradients(&margins, targets, &weights, &mut grads);

        let mut converged = false;
        let mut rounds = 0;
        let mut loss = LogisticLoss::loss(&margins, targets, &weights);

        for round in 0..p.max_rounds {
            rounds = round + 1;
            let mut max_delta = 0.0f64;

            let bias_delta = bias_step(&grads) * p.learning_rate;
            if bias_delta != 0.0 {
                model.add_bias(bias_delta);
                for m in margins.iter_mut() {
                    *m += bias_delta;
                }
                LogisticLoss::compute_gradients(&margins, targets, &weights, &mut grads);
                max_delta = max_delta.max(bias_delta.abs());
            }

            for (feature, column) in features.outer_iter().enumerate() {
                let delta =
                    weight_step(model.weight(feature), column, &grads, p.lambda) * p.learning_rate;
                if delta == 0.0 {
                    continue;
                }
                if !delta.is_finite() {
                    return Err(TrainingError::FitDiverged { round: rounds });
                }
                model.add_weight(feature, delta);
                for (row, &x) in column.iter().enumerate() {
                    if x != 0.0 {
                        margins[row] += delta * x as f64;
                        grads[row] = LogisticLoss::grad_hess(margins[row], targets[row], weights[row]);
                    }
                }
                max_delta = max_delta.max(delta.abs());
            }

            loss = LogisticLoss::loss(&margins, targets, &weights);
            if !loss.is_finite() || !model.is_finite() {
                return Err(TrainingError::FitDiverged { round: rounds });
            }
            debug!(round = rounds, loss, max_delta, "coordinate descent round");

            if max_delta < p.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!(rounds, "coordinate descent stopped at max_rounds");
        }

        Ok((
            model,
            FitSummary {
                rounds,
                converged,
                loss,
            },
        ))
    }
}

/// Newton step on the bias (no regularization).
fn bias_step(grads: &[GradHess]) -> f64 {
    let (sum_grad, sum_hess) = grads
        .iter()
        .fold((0.0, 0.0), |(g, h), gh| (g + gh.grad, h + gh.hess));
    if sum_hess.abs() > 1e-10 {
        -sum_grad / sum_hess
    } else {
        0.0
    }
}

/// Newton step on one coordinate with L2 penalty.
fn weight_step(
    current_weight: f64,
    column: ndarray::ArrayView1<'_, f32>,
    grads: &[GradHess],
    lambda: f64,
) -> f64 {
    let mut sum_grad = 0.0f64;
    let mut sum_hess = 0.0f64;
    for (row, &x) in column.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        let x = x as f64;
        sum_grad += grads[row].grad * x;
        sum_hess += grads[row].hess * x * x;
    }

    let grad_l2 = sum_grad + lambda * current_weight;
    let hess_l2 = sum_hess + lambda;
    if hess_l2.abs() < 1e-10 {
        return 0.0;
    }
    -grad_l2 / hess_l2
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    /// Two informative features, 200 samples, deterministic.
    fn separable_data() -> (Array2<f32>, Vec<f32>) {
        let n = 200;
        let mut x = Array2::<f32>::zeros((2, n));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = ((i * 37) % 100) as f32 / 50.0 - 1.0;
            let b = ((i * 11) % 100) as f32 / 50.0 - 1.0;
            x[[0, i]] = a;
            x[[1, i]] = b;
            y.push(if 2.0 * a - b + 0.1 * ((i % 7) as f32 - 3.0) > 0.0 { 1.0 } else { 0.0 });
        }
        (x, y)
    }

    #[test]
    fn learns_signs_of_coefficients() {
        let (x, y) = separable_data();
        let trainer = CoordinateDescent::new(ClassifierParams::default());
        let (model, summary) = trainer.train(x.view(), &y).unwrap();
        assert!(model.weight(0) > 0.0);
        assert!(model.weight(1) < 0.0);
        assert!(model.weight(0) > model.weight(1).abs());
        assert!(summary.loss < std::f64::consts::LN_2);
    }

    #[test]
    fn converges_before_max_rounds() {
        let (x, y) = separable_data();
        let (_, summary) = CoordinateDescent::new(ClassifierParams::default())
            .train(x.view(), &y)
            .unwrap();
        assert!(summary.converged);
        assert!(summary.rounds < 200);
    }

    #[test]
    fn stronger_l2_shrinks_weights() {
        let (x, y) = separable_data();
        let weak = CoordinateDescent::new(ClassifierParams {
            lambda: 0.1,
            ..Default::default()
        });
        let strong = CoordinateDescent::new(ClassifierParams {
            lambda: 100.0,
            ..Default::default()
        });
        let (m_weak, _) = weak.train(x.view(), &y).unwrap();
        let (m_strong, _) = strong.train(x.view(), &y).unwrap();
        assert!(m_strong.weight(0).abs() < m_weak.weight(0).abs());
    }

    #[test]
    fn infinite_feature_diverges() {
        let x = array![[1.0f32, f32::INFINITY, 0.0, 1.0]];
        let y = [1.0, 0.0, 0.0, 1.0];
        let err = CoordinateDescent::new(ClassifierParams::default())
            .train(x.view(), &y)
            .unwrap_err();
        assert!(matches!(err, TrainingError::FitDiverged { .. }));
    }

    #[test]
    fn balanced_weights() {
        let w = ClassWeight::Balanced.sample_weights(&[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(w, vec![2.0, 4.0 / 6.0, 4.0 / 6.0, 4.0 / 6.0]);
        assert_eq!(ClassWeight::None.sample_weights(&[1.0, 0.0]), vec![1.0, 1.0]);
    }
}
