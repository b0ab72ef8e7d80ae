//! credit-risk: credit default scoring for German-credit style applicants.
//!
//! A raw applicant record is encoded into a fixed feature vector, scored by a
//! calibrated logistic classifier, mapped to a risk tier and explained with
//! per-field attributions.
//!
//! # Key Types
//!
//! - [`ApplicantRecord`] / [`LabeledDataset`] - Raw inputs and training data
//! - [`FeatureEncoder`] - Record → feature vector
//! - [`RiskClassifier`] - Feature vector → P(default)
//! - [`RiskTier`] / [`RiskThresholds`] - Probability → low, medium or high
//! - [`AttributionEngine`] - Per-field contributions to a prediction
//! - [`Artifact`] - Encoder and classifier bundled as one versioned file
//! - [`ScoringService`] - Loads an artifact and scores records
//!
//! # Training
//!
//! Build a [`TrainingConfig`] with `TrainingConfig::builder()`, then call
//! [`train`] or drive a [`TrainingOrchestrator`] to also persist the artifact
//! and its report. See the [`training`] module for details.
//!
//! # Scoring
//!
//! [`ScoringService::load`] reads an artifact once; [`ScoringService::score`]
//! is then safe to call from any number of threads.

pub mod categorize;
pub mod classifier;
pub mod data;
pub mod encode;
pub mod explain;
pub mod persist;
pub mod service;
pub mod testing;
pub mod training;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Inputs
pub use data::{ApplicantRecord, DatasetError, Label, LabeledDataset, RawValue, ValidationError};

// Pipeline components
pub use categorize::{RiskThresholds, RiskTier, categorize};
pub use classifier::{CalibrationMethod, RiskClassifier};
pub use encode::{ExtrapolationPolicy, FeatureEncoder, FeatureVector, UnseenCategoryWarning};
pub use explain::{Attribution, AttributionEngine, AttributionMethod, Explanation, Sign};

// Training and persistence
pub use persist::{Artifact, ArtifactError};
pub use training::{TrainingConfig, TrainingError, TrainingOrchestrator, TrainingReport, train};

// Scoring
pub use service::{PredictionResponse, ScoredResult, ScoringError, ScoringOptions, ScoringService, score};

// Shared utilities
pub use utils::run_with_threads;
