//! Scoring façade over a loaded artifact.
//!
//! A [`ScoringService`] owns an immutable artifact handle and is `Send +
//! Sync`; share it across threads with `Arc` and call it concurrently without
//! locks.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use credit_risk::service::{ScoringOptions, ScoringService};
//! use credit_risk::testing::{sample_record, synthetic_credit_dataset};
//! use credit_risk::training::{TrainingConfig, train};
//!
//! let dataset = synthetic_credit_dataset(200, 1);
//! let (artifact, _) = train(&dataset, &TrainingConfig::default()).unwrap();
//!
//! let service = ScoringService::from_artifact(Arc::new(artifact), ScoringOptions::default()).unwrap();
//! let result = service.score(&sample_record()).unwrap();
//! assert!((0.0..=1.0).contains(&result.probability));
//! println!("{}", serde_json::to_string(&result.response()).unwrap());
//! ```

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::categorize::{RiskThresholds, RiskTier};
use crate::data::{ApplicantRecord, CREDIT_FIELDS, FieldKind, ValidationError};
use crate::encode::{ExtrapolationPolicy, UnseenCategoryWarning};
use crate::explain::{Attribution, AttributionEngine, AttributionMethod, ExplainError};
use crate::persist::{Artifact, ArtifactError};

// =============================================================================
// Options and results
// =============================================================================

/// Per-service scoring behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringOptions {
    pub extrapolation: ExtrapolationPolicy,
    pub attribution: AttributionMethod,
}

/// Failure to score one record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to explain prediction: {0}")]
    Explain(#[from] ExplainError),
}

/// Full scoring output for one applicant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    /// Calibrated probability of default.
    pub probability: f64,
    pub tier: RiskTier,
    /// Probability at the training feature means.
    pub baseline: f64,
    /// Per-field contributions, sorted by descending magnitude. They sum to
    /// `probability - baseline`.
    pub attributions: Vec<Attribution>,
    /// Categorical values that were not seen during training.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unseen: Vec<UnseenCategoryWarning>,
    pub model_id: String,
}

impl ScoredResult {
    /// The wire response for this result.
    pub fn response(&self) -> PredictionResponse {
        PredictionResponse {
            prob_default: self.probability,
            risk: self.tier,
        }
    }
}

/// HTTP response body: `{"prob_default": float, "risk": "low"|"medium"|"high"}`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prob_default: f64,
    pub risk: RiskTier,
}

/// One raw input field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputField {
    pub name: String,
    pub kind: FieldKind,
}

/// Inputs and encoded features of an artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSchema {
    pub model_id: String,
    /// Hex CRC32 of the encoded feature names.
    pub layout_hash: String,
    pub input_fields: Vec<InputField>,
    pub features: Vec<String>,
    pub thresholds: RiskThresholds,
}

impl ArtifactSchema {
    pub fn from_artifact(artifact: &Artifact) -> Self {
        let encoder = artifact.encoder();
        Self {
            model_id: artifact.model_id().to_string(),
            layout_hash: format!("{:08x}", encoder.layout_hash()),
            input_fields: CREDIT_FIELDS
                .iter()
                .map(|f| InputField {
                    name: f.name.to_string(),
                    kind: f.kind,
                })
                .collect(),
            features: encoder.layout().names().map(str::to_string).collect(),
            thresholds: artifact.thresholds(),
        }
    }

    /// Comma-separated input field names, a header template for tabular
    /// input.
    pub fn header(&self) -> String {
        self.input_fields
            .iter()
            .map(|f| f.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

// =============================================================================
// ScoringService
// =============================================================================

/// Encode → predict → categorize → explain.
#[derive(Clone, Debug)]
pub struct ScoringService {
    artifact: Arc<Artifact>,
    engine: AttributionEngine,
    options: ScoringOptions,
}

impl ScoringService {
    /// Load an artifact with default options.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        Self::load_with(path, ScoringOptions::default())
    }

    pub fn load_with(path: impl AsRef<Path>, options: ScoringOptions) -> Result<Self, ArtifactError> {
        Self::from_artifact(Arc::new(Artifact::load(path)?), options)
    }

    pub fn from_artifact(artifact: Arc<Artifact>, options: ScoringOptions) -> Result<Self, ArtifactError> {
        let engine = attribution_engine(&artifact, options.attribution)?;
        Ok(Self {
            artifact,
            engine,
            options,
        })
    }

    #[inline]
    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    #[inline]
    pub fn options(&self) -> ScoringOptions {
        self.options
    }

    /// Score and explain one record.
    pub fn score(&self, record: &ApplicantRecord) -> Result<ScoredResult, ScoringError> {
        score_with(&self.artifact, &self.engine, self.options.extrapolation, record)
    }

    /// Probability and tier only, without attributions.
    pub fn predict(&self, record: &ApplicantRecord) -> Result<PredictionResponse, ValidationError> {
        let encoded = self
            .artifact
            .encoder()
            .encode_with(record, self.options.extrapolation)?;
        let prob_default = self.artifact.classifier().predict_proba(&encoded.vector);
        Ok(PredictionResponse {
            prob_default,
            risk: self.artifact.thresholds().categorize(prob_default),
        })
    }

    /// Score many records in parallel; results keep the input order.
    pub fn score_batch(&self, records: &[ApplicantRecord]) -> Vec<Result<ScoredResult, ScoringError>> {
        records.par_iter().map(|r| self.score(r)).collect()
    }

    /// [`ScoringService::predict`] for many records, in input order.
    pub fn predict_batch(&self, records: &[ApplicantRecord]) -> Vec<Result<PredictionResponse, ValidationError>> {
        records.par_iter().map(|r| self.predict(r)).collect()
    }

    pub fn schema(&self) -> ArtifactSchema {
        ArtifactSchema::from_artifact(&self.artifact)
    }
}

/// Score one record against an artifact with default options.
///
/// Builds the attribution engine per call; use [`ScoringService`] for
/// repeated scoring.
pub fn score(artifact: &Artifact, record: &ApplicantRecord) -> Result<ScoredResult, ScoringError> {
    let engine = AttributionEngine::new(
        artifact.encoder().layout().clone(),
        artifact.background().to_vec(),
        AttributionMethod::Auto,
    )?;
    score_with(artifact, &engine, ExtrapolationPolicy::default(), record)
}

fn attribution_engine(artifact: &Artifact, method: AttributionMethod) -> Result<AttributionEngine, ArtifactError> {
    AttributionEngine::new(
        artifact.encoder().layout().clone(),
        artifact.background().to_vec(),
        method,
    )
    .map_err(|e| ArtifactError::Invalid(e.to_string()))
}

fn score_with(
    artifact: &Artifact,
    engine: &AttributionEngine,
    extrapolation: ExtrapolationPolicy,
    record: &ApplicantRecord,
) -> Result<ScoredResult, ScoringError> {
    let encoded = artifact.encoder().encode_with(record, extrapolation)?;
    let classifier = artifact.classifier();
    let probability = classifier.predict_proba(&encoded.vector);
    let explanation = engine.explain_encoded(&encoded, classifier)?;
    Ok(ScoredResult {
        probability,
        tier: artifact.thresholds().categorize(probability),
        baseline: explanation.baseline,
        attributions: explanation.attributions,
        unseen: encoded.unseen,
        model_id: artifact.model_id().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_record, synthetic_credit_dataset};
    use crate::training::{TrainingConfig, train};

    fn service() -> ScoringService {
        let dataset = synthetic_credit_dataset(240, 21);
        let (artifact, _) = train(&dataset, &TrainingConfig::default()).unwrap();
        ScoringService::from_artifact(Arc::new(artifact), ScoringOptions::default()).unwrap()
    }

    #[test]
    fn response_matches_wire_contract() {
        let response = PredictionResponse {
            prob_default: 0.25,
            risk: RiskTier::Medium,
        };
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"prob_default":0.25,"risk":"medium"}"#
        );
    }

    #[test]
    fn score_and_predict_agree() {
        let service = service();
        let record = sample_record();
        let scored = service.score(&record).unwrap();
        assert_eq!(scored.response(), service.predict(&record).unwrap());
        assert!(
            (scored.attributions.iter().map(|a| a.contribution).sum::<f64>()
                - (scored.probability - scored.baseline))
                .abs()
                < 1e-6
        );
    }

    #[test]
    fn free_function_matches_service() {
        let service = service();
        let record = sample_record();
        assert_eq!(score(service.artifact(), &record).unwrap(), service.score(&record).unwrap());
    }

    #[test]
    fn unseen_values_are_reported_not_rejected() {
        let service = service();
        let scored = service
            .score(&sample_record().with("job", "astronaut"))
            .unwrap();
        assert_eq!(scored.unseen.len(), 1);
        assert_eq!(scored.unseen[0].value, "astronaut");
    }

    #[test]
    fn batch_preserves_order_and_errors() {
        let service = service();
        let records = vec![
            sample_record(),
            sample_record().without("age"),
            sample_record().with("duration", 60),
        ];
        let results = service.score_batch(&records);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &service.score(&records[0]).unwrap());
        assert!(matches!(
            results[1],
            Err(ScoringError::Validation(ValidationError::MissingField { .. }))
        ));
        assert_eq!(results[2].as_ref().unwrap(), &service.score(&records[2]).unwrap());
    }

    #[test]
    fn schema_lists_inputs_and_features() {
        let service = service();
        let schema = service.schema();
        assert_eq!(schema.input_fields.len(), 20);
        assert_eq!(schema.features.len(), service.artifact().n_features());
        assert!(schema.header().starts_with("checking_status,duration,"));
    }
}
