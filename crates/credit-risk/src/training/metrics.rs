//! Evaluation metrics for binary default prediction.
//!
//! All functions take predicted probabilities of the positive (`bad`) class
//! and 0/1 targets.

use serde::{Deserialize, Serialize};

/// Number of equal-width bins used by [`expected_calibration_error`].
pub const CALIBRATION_BINS: usize = 10;

const LOG_EPS: f64 = 1e-15;

/// Area under the ROC curve.
///
/// Uses the Mann-Whitney U statistic with average ranks for ties. Returns 0.5
/// when only one class is present.
pub fn roc_auc(predictions: &[f64], targets: &[f32]) -> f64 {
    let n = predictions.len();
    debug_assert_eq!(n, targets.len());

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| predictions[b].total_cmp(&predictions[a]));

    let n_pos = targets.iter().filter(|&&l| l > 0.5).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && (predictions[indices[i]] - predictions[indices[j]]).abs() < 1e-12 {
            j += 1;
        }
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &indices[i..j] {
            if targets[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j;
    }

    // Ranks above are descending; convert to ascending.
    let n_pos_f = n_pos as f64;
    let n_neg_f = n_neg as f64;
    let sum_ascending_ranks = n_pos_f * (n as f64 + 1.0) - rank_sum_pos;
    (sum_ascending_ranks - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg_f)
}

/// Binary confusion matrix at a decision threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Predict positive when `p >= threshold`.
    pub fn compute(predictions: &[f64], targets: &[f32], threshold: f64) -> Self {
        let mut m = Self::default();
        for (&p, &y) in predictions.iter().zip(targets) {
            match (y > 0.5, p >= threshold) {
                (false, false) => m.tn += 1,
                (false, true) => m.fp += 1,
                (true, false) => m.fn_ += 1,
                (true, true) => m.tp += 1,
            }
        }
        m
    }

    /// `[[tn, fp], [fn, tp]]`, rows are actual classes.
    pub fn as_matrix(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tn + self.tp, self.total())
    }

    /// Precision, recall, F1 of the positive class.
    pub fn positive_scores(&self) -> ClassScores {
        ClassScores::from_counts(self.tp, self.fp, self.fn_)
    }

    /// Precision, recall, F1 of the negative class.
    pub fn negative_scores(&self) -> ClassScores {
        ClassScores::from_counts(self.tn, self.fn_, self.fp)
    }
}

/// Per-class precision, recall and F1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassScores {
    fn from_counts(true_hits: usize, false_hits: usize, misses: usize) -> Self {
        let precision = ratio(true_hits, true_hits + false_hits);
        let recall = ratio(true_hits, true_hits + misses);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: true_hits + misses,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Accuracy at a decision threshold.
pub fn accuracy(predictions: &[f64], targets: &[f32], threshold: f64) -> f64 {
    ConfusionMatrix::compute(predictions, targets, threshold).accuracy()
}

/// F1 of the positive class at a decision threshold.
pub fn f1_score(predictions: &[f64], targets: &[f32], threshold: f64) -> f64 {
    ConfusionMatrix::compute(predictions, targets, threshold)
        .positive_scores()
        .f1
}

/// Mean binary cross-entropy, probabilities clipped to `[1e-15, 1 - 1e-15]`.
pub fn log_loss(predictions: &[f64], targets: &[f32]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let total: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &y)| {
            let p = p.clamp(LOG_EPS, 1.0 - LOG_EPS);
            if y > 0.5 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    total / predictions.len() as f64
}

/// Mean squared error of the probabilities.
pub fn brier_score(predictions: &[f64], targets: &[f32]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let total: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &y)| (p - y as f64).powi(2))
        .sum();
    total / predictions.len() as f64
}

/// Expected calibration error over [`CALIBRATION_BINS`] equal-width bins:
/// `Σ_b (n_b / n) |mean(p)_b - mean(y)_b|`.
pub fn expected_calibration_error(predictions: &[f64], targets: &[f32]) -> f64 {
    let n = predictions.len();
    if n == 0 {
        return 0.0;
    }
    let mut sum_p = [0.0f64; CALIBRATION_BINS];
    let mut sum_y = [0.0f64; CALIBRATION_BINS];
    let mut count = [0usize; CALIBRATION_BINS];
    for (&p, &y) in predictions.iter().zip(targets) {
        let bin = ((p * CALIBRATION_BINS as f64) as usize).min(CALIBRATION_BINS - 1);
        sum_p[bin] += p;
        sum_y[bin] += y as f64;
        count[bin] += 1;
    }
    (0..CALIBRATION_BINS)
        .filter(|&b| count[b] > 0)
        .map(|b| {
            let c = count[b] as f64;
            (c / n as f64) * (sum_p[b] / c - sum_y[b] / c).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn auc_perfect_and_inverted() {
        let targets = [0.0, 0.0, 1.0, 1.0];
        assert_abs_diff_eq!(roc_auc(&[0.1, 0.2, 0.8, 0.9], &targets), 1.0);
        assert_abs_diff_eq!(roc_auc(&[0.9, 0.8, 0.2, 0.1], &targets), 0.0);
    }

    #[test]
    fn auc_with_ties() {
        // all tied → 0.5
        assert_abs_diff_eq!(roc_auc(&[0.5; 4], &[0.0, 1.0, 0.0, 1.0]), 0.5);
        // one positive ties with one negative
        let auc = roc_auc(&[0.1, 0.5, 0.5, 0.9], &[0.0, 0.0, 1.0, 1.0]);
        assert_abs_diff_eq!(auc, 0.875);
    }

    #[test]
    fn auc_single_class() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[1.0, 1.0]), 0.5);
    }

    #[test]
    fn confusion_matrix_layout() {
        let m = ConfusionMatrix::compute(&[0.1, 0.6, 0.4, 0.9, 0.5], &[0.0, 0.0, 1.0, 1.0, 1.0], 0.5);
        assert_eq!(m.as_matrix(), [[1, 1], [1, 2]]);
        assert_abs_diff_eq!(m.accuracy(), 0.6);
        let pos = m.positive_scores();
        assert_abs_diff_eq!(pos.precision, 2.0 / 3.0);
        assert_abs_diff_eq!(pos.recall, 2.0 / 3.0);
        assert_eq!(pos.support, 3);
        assert_eq!(m.negative_scores().support, 2);
        let json = serde_json::to_value(m).unwrap();
        assert_eq!(json["fn"], 1);
    }

    #[test]
    fn f1_without_positive_predictions_is_zero() {
        assert_eq!(f1_score(&[0.1, 0.2], &[1.0, 0.0], 0.5), 0.0);
    }

    #[test]
    fn log_loss_and_brier() {
        assert_abs_diff_eq!(
            log_loss(&[0.5, 0.5], &[1.0, 0.0]),
            std::f64::consts::LN_2,
            epsilon = 1e-12
        );
        assert!(log_loss(&[0.0], &[1.0]).is_finite());
        assert_abs_diff_eq!(brier_score(&[1.0, 0.0, 0.5], &[1.0, 0.0, 1.0]), 0.25 / 3.0);
    }

    #[test]
    fn ece_of_calibrated_bins_is_zero() {
        // bin [0.2, 0.3): mean p 0.25, one of four positive
        let p = [0.25; 4];
        let y = [1.0, 0.0, 0.0, 0.0];
        assert_abs_diff_eq!(expected_calibration_error(&p, &y), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(expected_calibration_error(&[0.9, 0.9], &[0.0, 0.0]), 0.9);
        // p = 1.0 lands in the last bin
        assert_abs_diff_eq!(expected_calibration_error(&[1.0], &[1.0]), 0.0);
    }
}
