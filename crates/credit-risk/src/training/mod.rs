//! Training: configuration, cross-validated search, evaluation and the
//! orchestrated run that produces an [`Artifact`](crate::persist::Artifact).
//!
//! # Example
//!
//! ```
//! use credit_risk::testing::synthetic_credit_dataset;
//! use credit_risk::training::{TrainingConfig, train};
//!
//! let dataset = synthetic_credit_dataset(200, 42);
//! let (artifact, report) = train(&dataset, &TrainingConfig::default()).unwrap();
//! assert_eq!(report.model_id, artifact.model_id());
//! assert!((0.0..=1.0).contains(&report.roc_auc()));
//! ```

mod config;
mod error;
pub mod metrics;
mod orchestrator;
pub mod report;
mod search;

pub use config::{ConfigError, CrossValidation, TrainingConfig, UnseenPolicy};
pub use error::TrainingError;
pub use orchestrator::{TrainingOrchestrator, TrainingStage, default_report_path, train};
pub use report::{CalibrationWarning, TrainingReport};
pub use search::{SearchOutcome, grid_search};
