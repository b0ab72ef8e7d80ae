//! Training configuration with builder pattern.
//!
//! [`TrainingConfig`] is built with `bon` and validated when the builder
//! finishes, or deserialized from JSON (missing keys take their defaults) and
//! validated by [`TrainingConfig::from_json_str`].
//!
//! # Example
//!
//! ```
//! use credit_risk::training::{CrossValidation, TrainingConfig};
//! use credit_risk::classifier::CalibrationMethod;
//!
//! // All defaults
//! let config = TrainingConfig::builder().build().unwrap();
//! assert_eq!(config.seed, 42);
//!
//! let config = TrainingConfig::builder()
//!     .lambda(0.5)
//!     .calibration(CalibrationMethod::Isotonic)
//!     .cross_validation(CrossValidation::default())
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::categorize::{InvalidThresholds, RiskThresholds};
use crate::classifier::{CalibrationMethod, ClassWeight, ClassifierParams};

// =============================================================================
// ConfigError
// =============================================================================

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be in [0, 1), got {value}")]
    InvalidFraction { field: &'static str, value: f64 },

    #[error("test_fraction + calibration_fraction must be below 1, got {0}")]
    NoTrainingRows(f64),

    #[error("{field} must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("max_rounds must be at least 1")]
    InvalidMaxRounds,

    #[error("min_samples must be at least 2")]
    InvalidMinSamples,

    #[error("decision_threshold must be in (0, 1), got {0}")]
    InvalidDecisionThreshold(f64),

    #[error(transparent)]
    InvalidThresholds(#[from] InvalidThresholds),

    #[error("cross validation: {0}")]
    InvalidCrossValidation(String),

    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),
}

// =============================================================================
// Policies
// =============================================================================

/// Weight given to the unseen-category column of each field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenPolicy {
    /// Keep the fitted weight (near zero unless rare categories were folded).
    Learned,
    /// Raise it to the largest weight of a known category of the field.
    #[default]
    Conservative,
}

/// Grid search over the inverse L2 strength `C` (λ = 1/C).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidation {
    pub n_folds: usize,
    pub c_grid: Vec<f64>,
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self {
            n_folds: 5,
            c_grid: vec![0.1, 0.3, 1.0, 3.0, 10.0],
        }
    }
}

impl CrossValidation {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.n_folds < 2 {
            return Err(ConfigError::InvalidCrossValidation(format!(
                "n_folds must be at least 2, got {}",
                self.n_folds
            )));
        }
        if self.c_grid.is_empty() {
            return Err(ConfigError::InvalidCrossValidation("c_grid is empty".into()));
        }
        if let Some(c) = self.c_grid.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
            return Err(ConfigError::InvalidCrossValidation(format!(
                "every C must be positive, got {c}"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// TrainingConfig
// =============================================================================

/// Configuration of a training run.
///
/// # Structure
///
/// - **Splits**: `test_fraction`, `calibration_fraction`, `seed`
/// - **Classifier**: `lambda`, `learning_rate`, `max_rounds`, `tolerance`,
///   `class_weight`, `min_samples`
/// - **Encoding**: `min_category_count`, `unseen_policy`
/// - **Calibration**: `calibration`, `max_calibration_error`
/// - **Evaluation and policy**: `decision_threshold`, `thresholds`
/// - **Search**: `cross_validation`
/// - **Resources**: `n_threads`
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default)]
pub struct TrainingConfig {
    // === Splits ===
    /// Share of each class held out for evaluation. Default: 0.2.
    #[builder(default = 0.2)]
    pub test_fraction: f64,

    /// Share of each class held out for calibration. Default: 0.2.
    #[builder(default = 0.2)]
    pub calibration_fraction: f64,

    /// Seed for splits and fold assignment. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    // === Classifier ===
    /// L2 strength. Default: 1.0.
    #[builder(default = 1.0)]
    pub lambda: f64,

    /// Newton step multiplier. Default: 1.0.
    #[builder(default = 1.0)]
    pub learning_rate: f64,

    /// Coordinate descent round limit. Default: 200.
    #[builder(default = 200)]
    pub max_rounds: u32,

    /// Convergence tolerance on the largest weight change. Default: 1e-5.
    #[builder(default = 1e-5)]
    pub tolerance: f64,

    #[builder(default)]
    pub class_weight: ClassWeight,

    /// Fewest training rows accepted. Default: 20.
    #[builder(default = 20)]
    pub min_samples: usize,

    // === Encoding ===
    /// Categories seen fewer times are folded into the unseen column.
    /// Default: 1 (nothing folded).
    #[builder(default = 1)]
    pub min_category_count: usize,

    #[builder(default)]
    pub unseen_policy: UnseenPolicy,

    // === Calibration ===
    #[builder(default)]
    pub calibration: CalibrationMethod,

    /// Expected calibration error on the test split above which a warning is
    /// raised. Default: 0.10.
    #[builder(default = 0.10)]
    pub max_calibration_error: f64,

    // === Evaluation and policy ===
    /// Cut-off used for accuracy, F1 and the confusion matrix. Default: 0.5.
    #[builder(default = 0.5)]
    pub decision_threshold: f64,

    #[builder(default)]
    pub thresholds: RiskThresholds,

    // === Search ===
    /// If set, λ is chosen by stratified k-fold grid search.
    pub cross_validation: Option<CrossValidation>,

    // === Resources ===
    /// Worker threads; 0 uses all cores. Default: 0.
    #[builder(default)]
    pub n_threads: usize,
}

/// Custom finishing function that validates the config.
impl<S: training_config_builder::IsComplete> TrainingConfigBuilder<S> {
    /// Build and validate the configuration.
    pub fn build(self) -> Result<TrainingConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}

impl TrainingConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("test_fraction", self.test_fraction),
            ("calibration_fraction", self.calibration_fraction),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::InvalidFraction { field, value });
            }
        }
        let held_out = self.test_fraction + self.calibration_fraction;
        if held_out >= 1.0 {
            return Err(ConfigError::NoTrainingRows(held_out));
        }

        for (field, value) in [
            ("lambda", self.lambda),
            ("learning_rate", self.learning_rate),
            ("tolerance", self.tolerance),
            ("max_calibration_error", self.max_calibration_error),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        if self.max_rounds == 0 {
            return Err(ConfigError::InvalidMaxRounds);
        }
        if self.min_samples < 2 {
            return Err(ConfigError::InvalidMinSamples);
        }
        if !(self.decision_threshold > 0.0 && self.decision_threshold < 1.0) {
            return Err(ConfigError::InvalidDecisionThreshold(self.decision_threshold));
        }
        self.thresholds.validate()?;
        if let Some(cv) = &self.cross_validation {
            cv.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Classifier parameters with the configured λ.
    pub fn classifier_params(&self) -> ClassifierParams {
        self.classifier_params_with(self.lambda)
    }

    /// Classifier parameters with an explicit λ.
    pub fn classifier_params_with(&self, lambda: f64) -> ClassifierParams {
        ClassifierParams {
            lambda,
            learning_rate: self.learning_rate,
            max_rounds: self.max_rounds,
            tolerance: self.tolerance,
            class_weight: self.class_weight,
        }
    }
}
