//! Conversion between runtime types and schema types.
//!
//! Runtime → schema is infallible. Schema → runtime validates everything a
//! file could get wrong and fails with [`ArtifactError`].

use crate::categorize::RiskThresholds;
use crate::classifier::{Calibrator, LinearModel, RiskClassifier};
use crate::data::LAYOUT_VERSION;
use crate::encode::{
    CategoricalState, EncoderState, FeatureEncoder, NumericScaler, NumericState, Vocabulary,
};

use super::artifact::Artifact;
use super::error::ArtifactError;
use super::schema::{
    ArtifactMetaSchema, ArtifactModelSchema, CalibratorSchema, CategoricalFieldSchema,
    ClassifierSchema, EncoderSchema, NumericFieldSchema, ThresholdsSchema,
};

// =============================================================================
// Calibrator
// =============================================================================

impl From<&Calibrator> for CalibratorSchema {
    fn from(calibrator: &Calibrator) -> Self {
        match calibrator {
            Calibrator::Identity => Self::Identity,
            Calibrator::Platt { a, b } => Self::Platt { a: *a, b: *b },
            Calibrator::Isotonic { thresholds, values } => Self::Isotonic {
                thresholds: thresholds.clone(),
                values: values.clone(),
            },
        }
    }
}

impl From<CalibratorSchema> for Calibrator {
    fn from(schema: CalibratorSchema) -> Self {
        match schema {
            CalibratorSchema::Identity => Self::Identity,
            CalibratorSchema::Platt { a, b } => Self::Platt { a, b },
            CalibratorSchema::Isotonic { thresholds, values } => Self::Isotonic { thresholds, values },
        }
    }
}

// =============================================================================
// Encoder
// =============================================================================

impl From<&EncoderState> for EncoderSchema {
    fn from(state: &EncoderState) -> Self {
        Self {
            numeric: state
                .numeric
                .iter()
                .map(|n| NumericFieldSchema {
                    field: n.field.clone(),
                    median: n.scaler.median,
                    mean: n.scaler.mean,
                    std: n.scaler.std,
                    min: n.scaler.min,
                    max: n.scaler.max,
                })
                .collect(),
            categorical: state
                .categorical
                .iter()
                .map(|c| CategoricalFieldSchema {
                    field: c.field.clone(),
                    categories: c.vocabulary.categories().to_vec(),
                    mode: c.mode.clone(),
                })
                .collect(),
            min_category_count: state.min_category_count as u64,
        }
    }
}

impl TryFrom<EncoderSchema> for FeatureEncoder {
    type Error = ArtifactError;

    fn try_from(schema: EncoderSchema) -> Result<Self, Self::Error> {
        let numeric = schema
            .numeric
            .into_iter()
            .map(|n| NumericState {
                field: n.field,
                scaler: NumericScaler {
                    median: n.median,
                    mean: n.mean,
                    std: n.std,
                    min: n.min,
                    max: n.max,
                },
            })
            .collect();
        let categorical = schema
            .categorical
            .into_iter()
            .map(|c| CategoricalState {
                field: c.field,
                vocabulary: Vocabulary::from_categories(c.categories),
                mode: c.mode,
            })
            .collect();
        let min_category_count = usize::try_from(schema.min_category_count)
            .map_err(|_| ArtifactError::Invalid("min_category_count out of range".into()))?;

        FeatureEncoder::from_state(EncoderState {
            numeric,
            categorical,
            min_category_count,
        })
        .map_err(|e| ArtifactError::Invalid(e.to_string()))
    }
}

// =============================================================================
// Artifact
// =============================================================================

impl From<&Artifact> for ArtifactModelSchema {
    fn from(artifact: &Artifact) -> Self {
        let encoder = artifact.encoder();
        let classifier = artifact.classifier();
        let thresholds = artifact.thresholds();
        Self {
            meta: ArtifactMetaSchema {
                model_id: artifact.model_id().to_string(),
                created_at_unix: artifact.created_at_unix(),
                layout_version: LAYOUT_VERSION,
                layout_hash: encoder.layout_hash(),
                feature_names: encoder.layout().names().map(str::to_string).collect(),
            },
            encoder: EncoderSchema::from(encoder.state()),
            classifier: ClassifierSchema {
                coefficients: classifier.model().coefficients().to_vec(),
                bias: classifier.model().bias(),
                calibrator: CalibratorSchema::from(classifier.calibrator()),
            },
            background: artifact.background().to_vec(),
            thresholds: ThresholdsSchema {
                low: thresholds.low,
                medium: thresholds.medium,
            },
            config: artifact.config().clone(),
        }
    }
}

impl TryFrom<ArtifactModelSchema> for Artifact {
    type Error = ArtifactError;

    fn try_from(schema: ArtifactModelSchema) -> Result<Self, Self::Error> {
        let meta = schema.meta;
        if meta.layout_version != LAYOUT_VERSION {
            return Err(ArtifactError::Invalid(format!(
                "artifact was fitted against field layout v{}, this build uses v{LAYOUT_VERSION}",
                meta.layout_version
            )));
        }

        let encoder = FeatureEncoder::try_from(schema.encoder)?;
        if encoder.layout_hash() != meta.layout_hash {
            return Err(ArtifactError::LayoutMismatch {
                expected: encoder.layout_hash(),
                found: meta.layout_hash,
            });
        }
        if !encoder.layout().names().eq(meta.feature_names.iter().map(String::as_str)) {
            return Err(ArtifactError::Invalid(
                "stored feature names do not match the encoder".into(),
            ));
        }

        let model = LinearModel::from_parts(schema.classifier.coefficients, schema.classifier.bias);
        let classifier = RiskClassifier::from_parts(
            model,
            schema.classifier.calibrator.into(),
            meta.layout_hash,
        );

        schema
            .config
            .validate()
            .map_err(|e| ArtifactError::Invalid(e.to_string()))?;

        Artifact::from_parts(
            meta.model_id,
            meta.created_at_unix,
            encoder,
            classifier,
            schema.background,
            RiskThresholds {
                low: schema.thresholds.low,
                medium: schema.thresholds.medium,
            },
            schema.config,
        )
    }
}
