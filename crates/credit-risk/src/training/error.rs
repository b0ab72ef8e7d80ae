use crate::data::DatasetError;
use crate::encode::EncoderError;
use crate::persist::ArtifactError;

use super::config::ConfigError;

/// Any failure that aborts a training run.
///
/// No artifact is written once one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("invalid training data: {0}")]
    Dataset(#[from] DatasetError),

    #[error("invalid training config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to fit encoder: {0}")]
    Encoder(#[from] EncoderError),

    #[error("labels are degenerate: {n_good} good, {n_bad} bad; both classes are required")]
    DegenerateLabels { n_good: usize, n_bad: usize },

    #[error("insufficient samples: need at least {required}, got {found}")]
    InsufficientSamples { required: usize, found: usize },

    #[error("coordinate descent diverged at round {round}")]
    FitDiverged { round: u32 },

    #[error("calibration failed: {reason}")]
    CalibrationFailed { reason: String },

    #[error("failed to write training output: {0}")]
    Persist(#[from] ArtifactError),
}
