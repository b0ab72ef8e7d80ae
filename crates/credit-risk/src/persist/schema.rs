//! Schema types for artifact serialization.
//!
//! These mirror the runtime types but are owned by the file format: they
//! change only together with [`FORMAT_VERSION`](super::FORMAT_VERSION).
//! All enums are externally tagged so the same types round-trip through both
//! JSON and postcard.

use serde::{Deserialize, Serialize};

use crate::training::TrainingConfig;

/// Identity and layout of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetaSchema {
    pub model_id: String,
    /// Seconds since the Unix epoch.
    pub created_at_unix: u64,
    /// Version of the input field table the encoder was fitted against.
    pub layout_version: u8,
    /// CRC32 of the encoded feature names.
    pub layout_hash: u32,
    pub feature_names: Vec<String>,
}

/// Scaling parameters of one numeric field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericFieldSchema {
    pub field: String,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Vocabulary of one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFieldSchema {
    pub field: String,
    /// Known categories in column order.
    pub categories: Vec<String>,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSchema {
    pub numeric: Vec<NumericFieldSchema>,
    pub categorical: Vec<CategoricalFieldSchema>,
    pub min_category_count: u64,
}

/// Fitted calibrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibratorSchema {
    Identity,
    Platt { a: f64, b: f64 },
    Isotonic { thresholds: Vec<f64>, values: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSchema {
    /// One logit-space weight per encoded feature.
    pub coefficients: Vec<f64>,
    pub bias: f64,
    pub calibrator: CalibratorSchema,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsSchema {
    pub low: f64,
    pub medium: f64,
}

/// Full artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactModelSchema {
    pub meta: ArtifactMetaSchema,
    pub encoder: EncoderSchema,
    pub classifier: ClassifierSchema,
    /// Training feature means, one per encoded feature.
    pub background: Vec<f64>,
    pub thresholds: ThresholdsSchema,
    /// Configuration the artifact was trained with, for reproducibility.
    pub config: TrainingConfig,
}

/// JSON wrapper carrying the format version next to the model.
///
/// Binary files carry the version in their header instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEnvelope {
    pub format_version: u16,
    pub artifact: ArtifactModelSchema,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrator_is_externally_tagged() {
        let json = serde_json::to_string(&CalibratorSchema::Platt { a: 1.0, b: -0.5 }).unwrap();
        assert_eq!(json, r#"{"platt":{"a":1.0,"b":-0.5}}"#);
        let json = serde_json::to_string(&CalibratorSchema::Identity).unwrap();
        assert_eq!(json, r#""identity""#);
    }

    #[test]
    fn calibrator_roundtrips_through_postcard() {
        let schema = CalibratorSchema::Isotonic {
            thresholds: vec![0.1, 0.5],
            values: vec![0.05, 0.6],
        };
        let bytes = postcard::to_allocvec(&schema).unwrap();
        let back: CalibratorSchema = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, schema);
    }
}
