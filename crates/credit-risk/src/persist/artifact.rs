//! The fitted, versioned scoring unit.

use std::path::Path;

use crc32fast::Hasher;

use crate::categorize::RiskThresholds;
use crate::classifier::RiskClassifier;
use crate::encode::FeatureEncoder;
use crate::training::TrainingConfig;

use super::codec::{self, StagedWrite};
use super::error::ArtifactError;

/// Encoder, classifier and scoring policy bundled together.
///
/// An artifact is written once and then only read. Every constructor checks
/// that the classifier was trained on the encoder's layout, so a loaded
/// artifact can score without further checks.
#[derive(Clone, Debug)]
pub struct Artifact {
    model_id: String,
    created_at_unix: u64,
    encoder: FeatureEncoder,
    classifier: RiskClassifier,
    background: Vec<f64>,
    thresholds: RiskThresholds,
    config: TrainingConfig,
}

impl Artifact {
    /// Bundle freshly trained parts under a new model id.
    pub fn new(
        encoder: FeatureEncoder,
        classifier: RiskClassifier,
        background: Vec<f64>,
        thresholds: RiskThresholds,
        config: TrainingConfig,
        created_at_unix: u64,
    ) -> Result<Self, ArtifactError> {
        let model_id = model_id(&classifier, created_at_unix);
        Self::from_parts(
            model_id,
            created_at_unix,
            encoder,
            classifier,
            background,
            thresholds,
            config,
        )
    }

    pub(crate) fn from_parts(
        model_id: String,
        created_at_unix: u64,
        encoder: FeatureEncoder,
        classifier: RiskClassifier,
        background: Vec<f64>,
        thresholds: RiskThresholds,
        config: TrainingConfig,
    ) -> Result<Self, ArtifactError> {
        let artifact = Self {
            model_id,
            created_at_unix,
            encoder,
            classifier,
            background,
            thresholds,
            config,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        let expected = self.encoder.layout_hash();
        if self.classifier.layout_hash() != expected {
            return Err(ArtifactError::LayoutMismatch {
                expected,
                found: self.classifier.layout_hash(),
            });
        }
        let n_features = self.encoder.n_features();
        if self.classifier.model().n_features() != n_features {
            return Err(ArtifactError::Invalid(format!(
                "classifier has {} weights, encoder produces {n_features} features",
                self.classifier.model().n_features()
            )));
        }
        if self.background.len() != n_features {
            return Err(ArtifactError::Invalid(format!(
                "background has {} values, encoder produces {n_features} features",
                self.background.len()
            )));
        }
        if self.background.iter().any(|v| !v.is_finite()) {
            return Err(ArtifactError::Invalid("background contains non-finite values".into()));
        }
        if !self.classifier.model().is_finite() {
            return Err(ArtifactError::Invalid("classifier weights are not finite".into()));
        }
        self.classifier
            .calibrator()
            .validate()
            .map_err(ArtifactError::Invalid)?;
        self.thresholds
            .validate()
            .map_err(|e| ArtifactError::Invalid(e.to_string()))?;
        Ok(())
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[inline]
    pub fn created_at_unix(&self) -> u64 {
        self.created_at_unix
    }

    #[inline]
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    #[inline]
    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Training feature means, the reference point of attributions.
    #[inline]
    pub fn background(&self) -> &[f64] {
        &self.background
    }

    #[inline]
    pub fn thresholds(&self) -> RiskThresholds {
        self.thresholds
    }

    #[inline]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.encoder.n_features()
    }

    /// Write atomically; `.json` paths get JSON, anything else the binary
    /// format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        codec::save(self, path.as_ref())
    }

    /// Encode for `path` into a [`StagedWrite`] without touching `path`.
    pub fn stage(&self, path: impl AsRef<Path>) -> Result<StagedWrite, ArtifactError> {
        codec::stage_artifact(self, path.as_ref())
    }

    /// Read an artifact written by [`Artifact::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        codec::load(path.as_ref())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        codec::to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        codec::from_bytes(bytes)
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        codec::to_json(self)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        codec::from_json(json)
    }
}

/// `<created_at>-<crc32 of the fitted parameters>`.
fn model_id(classifier: &RiskClassifier, created_at_unix: u64) -> String {
    let mut hasher = Hasher::new();
    hasher.update(&classifier.layout_hash().to_le_bytes());
    for w in classifier.model().coefficients() {
        hasher.update(&w.to_le_bytes());
    }
    hasher.update(&classifier.model().bias().to_le_bytes());
    for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
        hasher.update(&classifier.calibrator().apply(p).to_le_bytes());
    }
    format!("{created_at_unix}-{:08x}", hasher.finalize())
}
