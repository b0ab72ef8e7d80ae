use serde::{Deserialize, Serialize};

use crate::classifier::ProbabilisticClassifier;
use crate::encode::{Encoded, FeatureLayout, FeatureVector};

use super::linear::LinearExplainer;
use super::sampling::SamplingExplainer;
use super::values::Contributions;
use super::{Attribution, ExplainError, Explanation};

/// How attributions are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Exact when the classifier exposes a linear link, sampling otherwise.
    #[default]
    Auto,
    /// Closed-form; fails on classifiers without a linear link.
    Exact,
    /// Permutation sampling over field groups.
    Sampling { n_permutations: usize, seed: u64 },
}

impl AttributionMethod {
    pub const DEFAULT_PERMUTATIONS: usize = 64;
    pub const DEFAULT_SEED: u64 = 42;
}

/// Produces per-field explanations against a fixed background.
#[derive(Clone, Debug)]
pub struct AttributionEngine {
    layout: FeatureLayout,
    background: Vec<f64>,
    background_f32: Vec<f32>,
    method: AttributionMethod,
}

impl AttributionEngine {
    /// `background` holds one value per encoded column, normally the training
    /// feature means.
    pub fn new(
        layout: FeatureLayout,
        background: Vec<f64>,
        method: AttributionMethod,
    ) -> Result<Self, ExplainError> {
        if background.len() != layout.n_features() {
            return Err(ExplainError::BackgroundMismatch {
                expected: layout.n_features(),
                found: background.len(),
            });
        }
        let background_f32 = background.iter().map(|&v| v as f32).collect();
        Ok(Self {
            layout,
            background,
            background_f32,
            method,
        })
    }

    #[inline]
    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    #[inline]
    pub fn background(&self) -> &[f64] {
        &self.background
    }

    #[inline]
    pub fn method(&self) -> AttributionMethod {
        self.method
    }

    /// Prediction at the background.
    pub fn baseline(&self, classifier: &dyn ProbabilisticClassifier) -> Result<f64, ExplainError> {
        match (self.method, classifier.as_linear()) {
            (AttributionMethod::Sampling { .. }, _) | (AttributionMethod::Auto, None) => {
                Ok(classifier.predict_features(&self.background_f32))
            }
            (_, Some(link)) => Ok(LinearExplainer::new(link, &self.background)?.base_probability()),
            (AttributionMethod::Exact, None) => Err(ExplainError::NotLinear),
        }
    }

    /// Explain an encoded record, flagging extrapolated fields.
    pub fn explain_encoded(
        &self,
        encoded: &Encoded,
        classifier: &dyn ProbabilisticClassifier,
    ) -> Result<Explanation, ExplainError> {
        let mut explanation = self.explain(&encoded.vector, classifier)?;
        for attribution in explanation
            .attributions
            .iter_mut()
            .chain(explanation.columns.iter_mut().flatten())
        {
            let field = attribution.feature.split('=').next().unwrap_or_default();
            attribution.extrapolated = encoded.extrapolated.iter().any(|f| *f == field);
        }
        Ok(explanation)
    }

    /// Explain a feature vector.
    pub fn explain(
        &self,
        vector: &FeatureVector,
        classifier: &dyn ProbabilisticClassifier,
    ) -> Result<Explanation, ExplainError> {
        if vector.layout_hash() != self.layout.hash() {
            return Err(ExplainError::LayoutMismatch {
                expected: self.layout.hash(),
                found: vector.layout_hash(),
            });
        }
        let features = vector.as_slice();
        if features.len() != classifier.n_features() {
            return Err(ExplainError::LengthMismatch {
                expected: classifier.n_features(),
                found: features.len(),
            });
        }

        match (self.method, classifier.as_linear()) {
            (AttributionMethod::Auto | AttributionMethod::Exact, Some(link)) => {
                let explainer = LinearExplainer::new(link, &self.background)?;
                let columns = explainer.contributions(features);
                let prediction = classifier.predict_features(features);
                Ok(self.assemble(&columns, prediction))
            }
            (AttributionMethod::Exact, None) => Err(ExplainError::NotLinear),
            (AttributionMethod::Auto, None) => self.sampled(
                classifier,
                features,
                AttributionMethod::DEFAULT_PERMUTATIONS,
                AttributionMethod::DEFAULT_SEED,
            ),
            (AttributionMethod::Sampling { n_permutations, seed }, _) => {
                self.sampled(classifier, features, n_permutations, seed)
            }
        }
    }

    fn sampled(
        &self,
        classifier: &dyn ProbabilisticClassifier,
        features: &[f32],
        n_permutations: usize,
        seed: u64,
    ) -> Result<Explanation, ExplainError> {
        let explainer = SamplingExplainer::new(&self.layout, &self.background_f32, n_permutations, seed);
        let groups = explainer.group_contributions(classifier, features);
        let attributions = self
            .layout
            .groups()
            .iter()
            .zip(groups.values())
            .map(|(g, &c)| Attribution::new(g.field, c))
            .collect();
        Ok(Explanation::new(
            groups.base_value(),
            classifier.predict_features(features),
            attributions,
            None,
        ))
    }

    fn assemble(&self, columns: &Contributions, prediction: f64) -> Explanation {
        let per_field = columns
            .aggregate(&self.layout)
            .into_iter()
            .map(|(field, c)| Attribution::new(field, c))
            .collect();
        let per_column = self
            .layout
            .names()
            .zip(columns.values())
            .map(|(name, &c)| Attribution::new(name, c))
            .collect();
        Explanation::new(columns.base_value(), prediction, per_field, Some(per_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{LinearModel, ProbabilisticClassifier};
    use crate::encode::FeatureEncoder;
    use crate::explain::ATTRIBUTION_TOLERANCE;
    use crate::testing::{sample_record, synthetic_credit_dataset};

    /// Linear scores without exposing the linear structure.
    struct Opaque(LinearModel);

    impl ProbabilisticClassifier for Opaque {
        fn n_features(&self) -> usize {
            self.0.n_features()
        }
        fn predict_features(&self, features: &[f32]) -> f64 {
            self.0.predict_features(features)
        }
    }

    fn setup() -> (FeatureEncoder, LinearModel, Vec<f64>) {
        let data = synthetic_credit_dataset(300, 4);
        let encoder = FeatureEncoder::fit(data.records(), 1).unwrap();
        let x = encoder.encode_matrix(data.records()).unwrap();
        let means: Vec<f64> = x
            .outer_iter()
            .map(|row| row.iter().map(|&v| v as f64).sum::<f64>() / row.len() as f64)
            .collect();
        let weights: Vec<f64> = (0..encoder.n_features())
            .map(|i| ((i * 7 % 11) as f64 - 5.0) * 0.1)
            .collect();
        (encoder, LinearModel::from_parts(weights, -0.8), means)
    }

    #[test]
    fn exact_sum_property() {
        let (encoder, model, means) = setup();
        let engine = AttributionEngine::new(encoder.layout().clone(), means, AttributionMethod::Auto).unwrap();
        let v = encoder.encode(&sample_record()).unwrap().vector;
        let e = engine.explain(&v, &model).unwrap();
        assert!(e.additivity_error() < 1e-6);
        assert_eq!(e.attributions.len(), 20);
        assert_eq!(e.columns.as_ref().map(Vec::len), Some(encoder.n_features()));
    }

    #[test]
    fn attributions_are_sorted() {
        let (encoder, model, means) = setup();
        let engine = AttributionEngine::new(encoder.layout().clone(), means, AttributionMethod::Exact).unwrap();
        let v = encoder.encode(&sample_record()).unwrap().vector;
        let e = engine.explain(&v, &model).unwrap();
        for w in e.attributions.windows(2) {
            let (a, b) = (w[0].contribution.abs(), w[1].contribution.abs());
            assert!(a > b || (a == b && w[0].feature < w[1].feature));
        }
    }

    #[test]
    fn sampling_matches_exact_for_additive_model_within_tolerance() {
        let (encoder, model, means) = setup();
        let v = encoder.encode(&sample_record()).unwrap().vector;
        let exact = AttributionEngine::new(encoder.layout().clone(), means.clone(), AttributionMethod::Auto)
            .unwrap()
            .explain(&v, &model)
            .unwrap();
        let sampled = AttributionEngine::new(encoder.layout().clone(), means, AttributionMethod::Auto)
            .unwrap()
            .explain(&v, &Opaque(model))
            .unwrap();
        assert!(sampled.columns.is_none());
        assert!(sampled.additivity_error() < ATTRIBUTION_TOLERANCE);
        approx::assert_abs_diff_eq!(sampled.baseline, exact.baseline, epsilon = 1e-4);
    }

    #[test]
    fn exact_requires_linear_link() {
        let (encoder, model, means) = setup();
        let engine = AttributionEngine::new(encoder.layout().clone(), means, AttributionMethod::Exact).unwrap();
        let v = encoder.encode(&sample_record()).unwrap().vector;
        assert!(matches!(
            engine.explain(&v, &Opaque(model)),
            Err(ExplainError::NotLinear)
        ));
    }

    #[test]
    fn extrapolated_fields_are_flagged() {
        let (encoder, model, means) = setup();
        let engine = AttributionEngine::new(encoder.layout().clone(), means, AttributionMethod::Auto).unwrap();
        let encoded = encoder.encode(&sample_record().with("credit_amount", 1e9)).unwrap();
        let e = engine.explain_encoded(&encoded, &model).unwrap();
        for a in &e.attributions {
            assert_eq!(a.extrapolated, a.feature == "credit_amount", "{}", a.feature);
        }
    }

    #[test]
    fn background_length_is_checked() {
        let (encoder, _, _) = setup();
        assert!(matches!(
            AttributionEngine::new(encoder.layout().clone(), vec![0.0; 3], AttributionMethod::Auto),
            Err(ExplainError::BackgroundMismatch { found: 3, .. })
        ));
    }
}
