//! Training report.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::categorize::RiskThresholds;
use crate::classifier::CalibrationMethod;

use super::metrics::{self, ClassScores, ConfusionMatrix};

/// Held-out metrics of one model on one split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub roc_auc: f64,
    pub accuracy: f64,
    pub f1: f64,
    /// `[[tn, fp], [fn, tp]]` with `bad` as the positive class.
    pub confusion_matrix: [[usize; 2]; 2],
    pub log_loss: f64,
    pub brier_score: f64,
    pub expected_calibration_error: f64,
    pub classification_report: ClassReport,
}

impl Evaluation {
    pub fn compute(predictions: &[f64], targets: &[f32], threshold: f64) -> Self {
        let cm = ConfusionMatrix::compute(predictions, targets, threshold);
        let bad = cm.positive_scores();
        Self {
            roc_auc: metrics::roc_auc(predictions, targets),
            accuracy: cm.accuracy(),
            f1: bad.f1,
            confusion_matrix: cm.as_matrix(),
            log_loss: metrics::log_loss(predictions, targets),
            brier_score: metrics::brier_score(predictions, targets),
            expected_calibration_error: metrics::expected_calibration_error(predictions, targets),
            classification_report: ClassReport {
                good: cm.negative_scores(),
                bad,
            },
        }
    }
}

/// Precision, recall, F1 and support per class.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub good: ClassScores,
    pub bad: ClassScores,
}

/// Rows per split.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub total: usize,
    pub train: usize,
    pub calibration: usize,
    pub test: usize,
}

/// Outcome counts of the full dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassBalance {
    pub good: usize,
    pub bad: usize,
}

/// One encoded feature and its logit-space coefficient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub weight: f64,
}

/// Mean validation AUC of one grid candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub c: f64,
    pub lambda: f64,
    pub mean_auc: f64,
    pub std_auc: f64,
    pub fold_aucs: Vec<f64>,
}

/// Held-out calibration check that did not pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationWarning {
    pub expected_calibration_error: f64,
    pub limit: f64,
}

impl CalibrationWarning {
    /// Warning if `ece` exceeds `limit`.
    pub fn check(ece: f64, limit: f64) -> Option<Self> {
        (ece > limit).then_some(Self {
            expected_calibration_error: ece,
            limit,
        })
    }
}

impl fmt::Display for CalibrationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected calibration error {:.4} on the test split exceeds {:.4}",
            self.expected_calibration_error, self.limit
        )
    }
}

/// Everything measured during a training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_id: String,
    pub splits: SplitCounts,
    pub class_balance: ClassBalance,

    /// Metrics on the test split.
    pub test: Evaluation,

    pub decision_threshold: f64,
    pub thresholds: RiskThresholds,

    pub lambda: f64,
    pub best_lambda: Option<f64>,
    pub cv_results: Vec<CvResult>,

    pub rounds: u32,
    pub converged: bool,
    pub calibration: CalibrationMethod,
    pub calibration_warnings: Vec<CalibrationWarning>,

    /// Sorted by descending absolute weight.
    pub feature_weights: Vec<FeatureWeight>,
}

impl TrainingReport {
    #[inline]
    pub fn roc_auc(&self) -> f64 {
        self.test.roc_auc
    }

    #[inline]
    pub fn accuracy(&self) -> f64 {
        self.test.accuracy
    }

    #[inline]
    pub fn f1(&self) -> f64 {
        self.test.f1
    }

    #[inline]
    pub fn confusion_matrix(&self) -> [[usize; 2]; 2] {
        self.test.confusion_matrix
    }

    /// Log the headline numbers and any warnings.
    pub fn log_summary(&self) {
        tracing::info!(
            model_id = %self.model_id,
            roc_auc = self.test.roc_auc,
            accuracy = self.test.accuracy,
            f1 = self.test.f1,
            log_loss = self.test.log_loss,
            ece = self.test.expected_calibration_error,
            "evaluated on test split"
        );
        for w in &self.calibration_warnings {
            warn!("{w}");
        }
    }
}

/// Sort `(name, weight)` pairs by descending magnitude, ties by name.
pub fn sorted_feature_weights<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Vec<FeatureWeight> {
    let mut weights: Vec<FeatureWeight> = pairs
        .into_iter()
        .map(|(feature, weight)| FeatureWeight {
            feature: feature.to_string(),
            weight,
        })
        .collect();
    weights.sort_by(|a, b| {
        b.weight
            .abs()
            .total_cmp(&a.weight.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
    weights
}
