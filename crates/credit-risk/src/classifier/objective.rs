//! Weighted logistic loss.

/// Gradient and hessian of one sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GradHess {
    pub grad: f64,
    pub hess: f64,
}

/// Logistic loss on margins (log-odds) with 0/1 targets.
///
/// - Gradient: `w * (p - y)` where `p = sigmoid(margin)`
/// - Hessian: `max(w * p * (1 - p), HESS_MIN)`
#[derive(Clone, Copy, Debug, Default)]
pub struct LogisticLoss;

impl LogisticLoss {
    const HESS_MIN: f64 = 1e-6;

    /// Numerically stable sigmoid.
    #[inline]
    pub fn sigmoid(x: f64) -> f64 {
        if x >= 0.0 {
            1.0 / (1.0 + (-x).exp())
        } else {
            let e = x.exp();
            e / (1.0 + e)
        }
    }

    /// Gradient pair for a single sample.
    #[inline]
    pub fn grad_hess(margin: f64, target: f32, weight: f64) -> GradHess {
        let p = Self::sigmoid(margin);
        GradHess {
            grad: weight * (p - target as f64),
            hess: (weight * p * (1.0 - p)).max(Self::HESS_MIN),
        }
    }

    /// Fill `out` with gradient pairs for every sample.
    pub fn compute_gradients(margins: &[f64], targets: &[f32], weights: &[f64], out: &mut [GradHess]) {
        debug_assert_eq!(margins.len(), targets.len());
        debug_assert_eq!(margins.len(), weights.len());
        debug_assert_eq!(margins.len(), out.len());
        for (i, gh) in out.iter_mut().enumerate() {
            *gh = Self::grad_hess(margins[i], targets[i], weights[i]);
        }
    }

    /// Initial bias: log-odds of the weighted positive rate, clamped away
    /// from 0 and 1.
    pub fn base_score(targets: &[f32], weights: &[f64]) -> f64 {
        let (sum_pos, sum_w) = targets
            .iter()
            .zip(weights)
            .fold((0.0f64, 0.0f64), |(sp, sw), (&y, &w)| (sp + w * y as f64, sw + w));
        if sum_w <= 0.0 {
            return 0.0;
        }
        let p = (sum_pos / sum_w).clamp(1e-7, 1.0 - 1e-7);
        (p / (1.0 - p)).ln()
    }

    /// Weighted mean negative log-likelihood.
    pub fn loss(margins: &[f64], targets: &[f32], weights: &[f64]) -> f64 {
        let mut total = 0.0f64;
        let mut sum_w = 0.0f64;
        for ((&m, &y), &w) in margins.iter().zip(targets).zip(weights) {
            // log(1 + e^m) - y*m, computed stably
            let softplus = if m > 0.0 {
                m + (-m).exp().ln_1p()
            } else {
                m.exp().ln_1p()
            };
            total += w * (softplus - y as f64 * m);
            sum_w += w;
        }
        if sum_w > 0.0 { total / sum_w } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn sigmoid_is_symmetric_and_stable() {
        assert_abs_diff_eq!(LogisticLoss::sigmoid(0.0), 0.5);
        assert_abs_diff_eq!(
            LogisticLoss::sigmoid(3.0) + LogisticLoss::sigmoid(-3.0),
            1.0,
            epsilon = 1e-12
        );
        assert!(LogisticLoss::sigmoid(-1000.0).is_finite());
        assert_eq!(LogisticLoss::sigmoid(1000.0), 1.0);
    }

    #[test]
    fn gradients_point_towards_target() {
        let gh = LogisticLoss::grad_hess(0.0, 1.0, 1.0);
        assert_abs_diff_eq!(gh.grad, -0.5);
        assert_abs_diff_eq!(gh.hess, 0.25);
        let gh = LogisticLoss::grad_hess(0.0, 0.0, 2.0);
        assert_abs_diff_eq!(gh.grad, 1.0);
        assert_abs_diff_eq!(gh.hess, 0.5);
    }

    #[test]
    fn hessian_has_floor() {
        let gh = LogisticLoss::grad_hess(50.0, 1.0, 1.0);
        assert!(gh.hess >= 1e-6);
    }

    #[test]
    fn base_score_is_log_odds() {
        let targets = [1.0, 0.0, 0.0, 0.0];
        let weights = [1.0; 4];
        assert_abs_diff_eq!(
            LogisticLoss::base_score(&targets, &weights),
            (0.25f64 / 0.75).ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn loss_matches_closed_form() {
        let loss = LogisticLoss::loss(&[0.0, 0.0], &[1.0, 0.0], &[1.0, 1.0]);
        assert_abs_diff_eq!(loss, std::f64::consts::LN_2, epsilon = 1e-12);
    }
}
