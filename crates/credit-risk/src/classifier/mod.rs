//! Default-probability classifier.
//!
//! An L2-regularized logistic regression trained by coordinate descent,
//! followed by a calibrator fitted on a separate split.
//!
//! The encoder vocabularies, scaling and the model weights are all fitted on
//! the same training split; only the calibrator sees different rows.

mod calibration;
mod linear;
mod objective;
mod risk;
mod trainer;

pub use calibration::{CalibrationMethod, Calibrator};
pub use linear::LinearModel;
pub use objective::{GradHess, LogisticLoss};
pub use risk::{LinearLink, ProbabilisticClassifier, RiskClassifier};
pub use trainer::{ClassWeight, ClassifierParams, CoordinateDescent, FitSummary};
