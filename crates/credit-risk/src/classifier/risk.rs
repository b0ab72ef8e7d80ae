//! Calibrated default-probability classifier.

use ndarray::ArrayView2;
use tracing::debug;

use crate::encode::{FeatureLayout, FeatureVector};
use crate::training::TrainingError;

use super::calibration::{CalibrationMethod, Calibrator};
use super::linear::LinearModel;
use super::objective::LogisticLoss;
use super::trainer::{ClassifierParams, CoordinateDescent, FitSummary};

/// Model with a linear margin followed by a monotone link, exposing enough
/// structure for exact attributions.
pub trait LinearLink {
    fn linear_model(&self) -> &LinearModel;

    /// Probability for a margin.
    fn probability(&self, margin: f64) -> f64;

    /// Derivative of [`LinearLink::probability`] at a margin.
    fn slope(&self, margin: f64) -> f64;
}

/// Anything that maps a feature vector to `P(default)`.
pub trait ProbabilisticClassifier: Send + Sync {
    /// Number of features the model expects.
    fn n_features(&self) -> usize;

    /// Default probability for raw features, in `[0, 1]`.
    fn predict_features(&self, features: &[f32]) -> f64;

    /// Linear structure, if the model has one.
    fn as_linear(&self) -> Option<&dyn LinearLink> {
        None
    }
}

/// Logistic regression plus calibrator.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskClassifier {
    model: LinearModel,
    calibrator: Calibrator,
    layout_hash: u32,
}

impl RiskClassifier {
    /// Fit the linear model on a feature-major matrix `[n_features, n_samples]`.
    ///
    /// The result is uncalibrated; see [`RiskClassifier::calibrated`].
    pub fn fit(
        features: ArrayView2<'_, f32>,
        targets: &[f32],
        layout_hash: u32,
        params: &ClassifierParams,
        min_samples: usize,
    ) -> Result<(Self, FitSummary), TrainingError> {
        let n_samples = features.ncols();
        if n_samples < min_samples {
            return Err(TrainingError::InsufficientSamples {
                required: min_samples,
                found: n_samples,
            });
        }
        let n_bad = targets.iter().filter(|&&y| y > 0.5).count();
        if n_bad == 0 || n_bad == n_samples {
            return Err(TrainingError::DegenerateLabels {
                n_good: n_samples - n_bad,
                n_bad,
            });
        }

        let (model, summary) = CoordinateDescent::new(params.clone()).train(features, targets)?;
        debug!(
            rounds = summary.rounds,
            converged = summary.converged,
            loss = summary.loss,
            "fitted logistic model"
        );
        Ok((
            Self {
                model,
                calibrator: Calibrator::Identity,
                layout_hash,
            },
            summary,
        ))
    }

    /// Assemble from parts, e.g. after loading an artifact.
    pub fn from_parts(model: LinearModel, calibrator: Calibrator, layout_hash: u32) -> Self {
        Self {
            model,
            calibrator,
            layout_hash,
        }
    }

    /// Fit a calibrator on a held-out feature-major matrix.
    pub fn calibrated(
        self,
        method: CalibrationMethod,
        features: ArrayView2<'_, f32>,
        targets: &[f32],
    ) -> Result<Self, TrainingError> {
        let margins = self.model.margins(features);
        let calibrator = Calibrator::fit(method, &margins, targets)?;
        debug!(?calibrator, "fitted calibrator");
        Ok(Self { calibrator, ..self })
    }

    /// Raise the weight of every unseen column to at least the largest weight
    /// of a known category of the same field.
    ///
    /// With this, an unknown category never scores as safer than the riskiest
    /// known one.
    pub fn apply_conservative_unseen(&mut self, layout: &FeatureLayout) {
        use crate::encode::ColumnKind;

        for group in layout.groups() {
            let columns = &layout.columns()[group.columns.clone()];
            let Some(unseen) = columns.iter().position(|c| c.kind == ColumnKind::Unseen) else {
                continue;
            };
            let unseen = group.columns.start + unseen;
            let riskiest = group
                .columns
                .clone()
                .filter(|&c| c != unseen)
                .map(|c| self.model.weight(c))
                .fold(f64::NEG_INFINITY, f64::max);
            if riskiest > self.model.weight(unseen) {
                self.model.set_weight(unseen, riskiest);
            }
        }
    }

    #[inline]
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    #[inline]
    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    #[inline]
    pub fn layout_hash(&self) -> u32 {
        self.layout_hash
    }

    /// Raw margin (log-odds) for a vector.
    pub fn margin(&self, vector: &FeatureVector) -> f64 {
        debug_assert_eq!(
            vector.layout_hash(),
            self.layout_hash,
            "vector was encoded with a different layout"
        );
        self.model.margin(vector.as_slice())
    }

    /// Calibrated default probability in `[0, 1]`.
    ///
    /// # Panics
    ///
    /// Panics if the vector length does not match the model.
    pub fn predict_proba(&self, vector: &FeatureVector) -> f64 {
        self.calibrator.apply(self.margin(vector)).clamp(0.0, 1.0)
    }

    /// Calibrated probabilities for a feature-major matrix.
    pub fn predict_proba_matrix(&self, features: ArrayView2<'_, f32>) -> Vec<f64> {
        self.model
            .margins(features)
            .into_iter()
            .map(|m| self.calibrator.apply(m).clamp(0.0, 1.0))
            .collect()
    }
}

impl LinearLink for RiskClassifier {
    fn linear_model(&self) -> &LinearModel {
        &self.model
    }

    fn probability(&self, margin: f64) -> f64 {
        self.calibrator.apply(margin).clamp(0.0, 1.0)
    }

    fn slope(&self, margin: f64) -> f64 {
        self.calibrator.slope(margin)
    }
}

/// Uncalibrated model: the link is the plain sigmoid.
impl LinearLink for LinearModel {
    fn linear_model(&self) -> &LinearModel {
        self
    }

    fn probability(&self, margin: f64) -> f64 {
        LogisticLoss::sigmoid(margin)
    }

    fn slope(&self, margin: f64) -> f64 {
        let p = LogisticLoss::sigmoid(margin);
        p * (1.0 - p)
    }
}

/// An uncalibrated linear model can be scored directly.
impl ProbabilisticClassifier for LinearModel {
    fn n_features(&self) -> usize {
        LinearModel::n_features(self)
    }

    fn predict_features(&self, features: &[f32]) -> f64 {
        LogisticLoss::sigmoid(self.margin(features))
    }

    fn as_linear(&self) -> Option<&dyn LinearLink> {
        Some(self)
    }
}

impl ProbabilisticClassifier for RiskClassifier {
    fn n_features(&self) -> usize {
        self.model.n_features()
    }

    fn predict_features(&self, features: &[f32]) -> f64 {
        self.probability(self.model.margin(features))
    }

    fn as_linear(&self) -> Option<&dyn LinearLink> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::FeatureEncoder;
    use crate::testing::synthetic_credit_dataset;

    fn fitted() -> (FeatureEncoder, RiskClassifier) {
        let data = synthetic_credit_dataset(400, 5);
        let encoder = FeatureEncoder::fit(data.records(), 1).unwrap();
        let x = encoder.encode_matrix(data.records()).unwrap();
        let (clf, _) = RiskClassifier::fit(
            x.view(),
            &data.targets(),
            encoder.layout_hash(),
            &ClassifierParams::default(),
            20,
        )
        .unwrap();
        (encoder, clf)
    }

    #[test]
    fn rejects_single_class() {
        let x = ndarray::Array2::<f32>::zeros((3, 30));
        let err = RiskClassifier::fit(x.view(), &[0.0; 30], 0, &ClassifierParams::default(), 20)
            .unwrap_err();
        assert!(matches!(err, TrainingError::DegenerateLabels { n_good: 30, n_bad: 0 }));
    }

    #[test]
    fn rejects_too_few_samples() {
        let x = ndarray::Array2::<f32>::zeros((3, 10));
        let y: Vec<f32> = (0..10).map(|i| (i % 2) as f32).collect();
        let err = RiskClassifier::fit(x.view(), &y, 0, &ClassifierParams::default(), 20).unwrap_err();
        assert!(matches!(
            err,
            TrainingError::InsufficientSamples { required: 20, found: 10 }
        ));
    }

    #[test]
    fn probabilities_are_bounded() {
        let (encoder, clf) = fitted();
        let data = synthetic_credit_dataset(50, 77);
        let x = encoder.encode_matrix(data.records()).unwrap();
        for p in clf.predict_proba_matrix(x.view()) {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn conservative_unseen_dominates_known_categories() {
        let (encoder, mut clf) = fitted();
        clf.apply_conservative_unseen(encoder.layout());
        let layout = encoder.layout();
        for group in layout.groups().iter().filter(|g| g.kind.is_categorical()) {
            let unseen = group.columns.end - 1;
            for c in group.columns.start..unseen {
                assert!(clf.model().weight(unseen) >= clf.model().weight(c));
            }
        }
    }

    #[test]
    fn matrix_and_single_predictions_agree() {
        let (encoder, clf) = fitted();
        let data = synthetic_credit_dataset(10, 8);
        let x = encoder.encode_matrix(data.records()).unwrap();
        let batch = clf.predict_proba_matrix(x.view());
        for (i, record) in data.records().iter().enumerate() {
            let v = encoder.encode_imputed(record).unwrap();
            approx::assert_abs_diff_eq!(clf.predict_proba(&v), batch[i], epsilon = 1e-12);
        }
    }
}
