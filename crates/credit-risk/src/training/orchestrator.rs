//! End-to-end training run.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ndarray::{Array2, Axis};
use tracing::{error, info, warn};

use crate::classifier::{CalibrationMethod, RiskClassifier};
use crate::data::{DatasetError, LabeledDataset, stratified_split};
use crate::encode::{EncoderError, FeatureEncoder};
use crate::persist::{Artifact, ArtifactError, stage_json};
use crate::utils::run_with_threads;

use super::config::{TrainingConfig, UnseenPolicy};
use super::error::TrainingError;
use super::report::{
    CalibrationWarning, ClassBalance, Evaluation, SplitCounts, TrainingReport, sorted_feature_weights,
};
use super::search::grid_search;

/// Progress of a training run.
///
/// Stages only move forward. Any failure sends the run back to
/// [`TrainingStage::Idle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrainingStage {
    Idle,
    DataLoaded,
    EncoderFit,
    ClassifierFit,
    Evaluated,
    Persisted,
}

/// Drives one training run from labeled data to a persisted artifact.
///
/// # Example
///
/// ```no_run
/// use credit_risk::data::LabeledDataset;
/// use credit_risk::training::{TrainingConfig, TrainingOrchestrator};
///
/// let dataset = LabeledDataset::load("german_credit.jsonl")?;
/// let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default())?;
/// let (artifact, report) = orchestrator.run(&dataset, "model.bin", None)?;
/// println!("{} auc={:.3}", artifact.model_id(), report.roc_auc());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct TrainingOrchestrator {
    config: TrainingConfig,
    stage: TrainingStage,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig) -> Result<Self, TrainingError> {
        config.validate()?;
        Ok(Self {
            config,
            stage: TrainingStage::Idle,
        })
    }

    #[inline]
    pub fn stage(&self) -> TrainingStage {
        self.stage
    }

    #[inline]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit and evaluate without touching the filesystem.
    pub fn fit(&mut self, dataset: &LabeledDataset) -> Result<(Artifact, TrainingReport), TrainingError> {
        self.stage = TrainingStage::Idle;
        let n_threads = self.config.n_threads;
        let result = run_with_threads(n_threads, || self.fit_stages(dataset));
        if result.is_err() {
            self.stage = TrainingStage::Idle;
        }
        result
    }

    /// Fit, evaluate and publish the artifact and its report.
    ///
    /// The report goes to `report_path`, or `<artifact_path>.report.json`.
    /// Both files are staged next to their destinations before either is
    /// published. Files from an earlier run stay untouched if fitting or
    /// staging fails.
    pub fn run(
        &mut self,
        dataset: &LabeledDataset,
        artifact_path: impl AsRef<Path>,
        report_path: Option<&Path>,
    ) -> Result<(Artifact, TrainingReport), TrainingError> {
        let artifact_path = artifact_path.as_ref();
        let report_path = report_path.map_or_else(|| default_report_path(artifact_path), Path::to_path_buf);

        let (artifact, report) = self.fit(dataset)?;

        if let Err(e) = publish(&artifact, artifact_path, &report, &report_path) {
            self.stage = TrainingStage::Idle;
            return Err(e.into());
        }
        self.advance(TrainingStage::Persisted);
        info!(
            artifact = %artifact_path.display(),
            report = %report_path.display(),
            model_id = artifact.model_id(),
            "training run persisted"
        );
        Ok((artifact, report))
    }

    fn advance(&mut self, next: TrainingStage) {
        debug_assert!(next > self.stage, "{next:?} does not follow {:?}", self.stage);
        self.stage = next;
    }

    fn fit_stages(&mut self, dataset: &LabeledDataset) -> Result<(Artifact, TrainingReport), TrainingError> {
        let config = self.config.clone();

        // === Data ===
        if dataset.is_empty() {
            return Err(DatasetError::Empty.into());
        }
        let (n_good, n_bad) = (dataset.n_good(), dataset.n_bad());
        if n_good == 0 || n_bad == 0 {
            return Err(TrainingError::DegenerateLabels { n_good, n_bad });
        }
        if dataset.len() < config.min_samples {
            return Err(TrainingError::InsufficientSamples {
                required: config.min_samples,
                found: dataset.len(),
            });
        }
        let split = stratified_split(
            dataset.labels(),
            config.test_fraction,
            config.calibration_fraction,
            config.seed,
        );
        let train = dataset.select(&split.train);
        let calibration = dataset.select(&split.calibration);
        let test = dataset.select(&split.test);
        let splits = SplitCounts {
            total: dataset.len(),
            train: train.len(),
            calibration: calibration.len(),
            test: test.len(),
        };
        info!(
            total = splits.total,
            train = splits.train,
            calibration = splits.calibration,
            test = splits.test,
            n_good,
            n_bad,
            "loaded training data"
        );
        self.advance(TrainingStage::DataLoaded);

        // === Search ===
        let (lambda, best_lambda, cv_results) = match &config.cross_validation {
            Some(cv) => {
                let outcome = grid_search(&train, &config, cv)?;
                (outcome.best_lambda, Some(outcome.best_lambda), outcome.results)
            }
            None => (config.lambda, None, Vec::new()),
        };

        // === Encoder ===
        let encoder = FeatureEncoder::fit(train.records(), config.min_category_count)?;
        let x_train = encoder.encode_matrix(train.records()).map_err(EncoderError::from)?;
        let x_calib = encoder
            .encode_matrix(calibration.records())
            .map_err(EncoderError::from)?;
        let x_test = encoder.encode_matrix(test.records()).map_err(EncoderError::from)?;
        info!(
            n_features = encoder.n_features(),
            layout_hash = %format!("{:08x}", encoder.layout_hash()),
            "fitted encoder"
        );
        self.advance(TrainingStage::EncoderFit);

        // === Classifier ===
        let y_train = train.targets();
        let (mut classifier, summary) = RiskClassifier::fit(
            x_train.view(),
            &y_train,
            encoder.layout_hash(),
            &config.classifier_params_with(lambda),
            config.min_samples,
        )?;
        if !summary.converged {
            warn!(
                rounds = summary.rounds,
                "coordinate descent stopped at max_rounds before converging"
            );
        }
        if config.unseen_policy == UnseenPolicy::Conservative {
            classifier.apply_conservative_unseen(encoder.layout());
        }
        let classifier = if calibration.is_empty() && config.calibration != CalibrationMethod::None {
            warn!("calibration split is empty, calibrating on the training split");
            classifier.calibrated(config.calibration, x_train.view(), &y_train)?
        } else {
            classifier.calibrated(config.calibration, x_calib.view(), &calibration.targets())?
        };
        info!(
            lambda,
            rounds = summary.rounds,
            converged = summary.converged,
            loss = summary.loss,
            calibration = ?config.calibration,
            "fitted classifier"
        );
        self.advance(TrainingStage::ClassifierFit);

        // === Evaluation ===
        if test.is_empty() {
            warn!("test split is empty, reported metrics are not meaningful");
        }
        let predictions = classifier.predict_proba_matrix(x_test.view());
        let evaluation = Evaluation::compute(&predictions, &test.targets(), config.decision_threshold);
        let calibration_warnings: Vec<CalibrationWarning> =
            CalibrationWarning::check(evaluation.expected_calibration_error, config.max_calibration_error)
                .into_iter()
                .collect();
        self.advance(TrainingStage::Evaluated);

        // === Bundle ===
        let feature_weights = sorted_feature_weights(
            encoder
                .layout()
                .names()
                .zip(classifier.model().coefficients().iter().copied()),
        );
        let background = feature_means(&x_train);
        let artifact = Artifact::new(
            encoder,
            classifier,
            background,
            config.thresholds,
            config.clone(),
            unix_now(),
        )?;

        let report = TrainingReport {
            model_id: artifact.model_id().to_string(),
            splits,
            class_balance: ClassBalance {
                good: n_good,
                bad: n_bad,
            },
            test: evaluation,
            decision_threshold: config.decision_threshold,
            thresholds: config.thresholds,
            lambda,
            best_lambda,
            cv_results,
            rounds: summary.rounds,
            converged: summary.converged,
            calibration: config.calibration,
            calibration_warnings,
            feature_weights,
        };
        report.log_summary();
        Ok((artifact, report))
    }
}

/// Fit and evaluate a model on `dataset` without writing anything.
pub fn train(dataset: &LabeledDataset, config: &TrainingConfig) -> Result<(Artifact, TrainingReport), TrainingError> {
    TrainingOrchestrator::new(config.clone())?.fit(dataset)
}

/// Stage both files, then publish the artifact followed by its report.
fn publish(
    artifact: &Artifact,
    artifact_path: &Path,
    report: &TrainingReport,
    report_path: &Path,
) -> Result<(), ArtifactError> {
    let staged_artifact = artifact.stage(artifact_path)?;
    let staged_report = match stage_json(report_path, report) {
        Ok(staged) => staged,
        Err(e) => {
            staged_artifact.discard();
            return Err(e);
        }
    };
    if let Err(e) = staged_artifact.publish() {
        staged_report.discard();
        return Err(e);
    }
    staged_report.publish().inspect_err(|e| {
        error!(
            artifact = %artifact_path.display(),
            error = %e,
            "artifact published without its report"
        );
    })
}

/// `<artifact>.report.json`.
pub fn default_report_path(artifact_path: &Path) -> PathBuf {
    let mut name = artifact_path.as_os_str().to_owned();
    name.push(".report.json");
    PathBuf::from(name)
}

/// Mean of every feature row of a feature-major matrix.
fn feature_means(features: &Array2<f32>) -> Vec<f64> {
    let n = features.ncols().max(1) as f64;
    features
        .axis_iter(Axis(0))
        .map(|row| row.iter().map(|&v| f64::from(v)).sum::<f64>() / n)
        .collect()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ApplicantRecord, Label};
    use crate::testing::{sample_record, synthetic_credit_dataset};

    #[test]
    fn stages_advance_to_evaluated() {
        let dataset = synthetic_credit_dataset(300, 11);
        let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
        assert_eq!(orchestrator.stage(), TrainingStage::Idle);
        let (artifact, report) = orchestrator.fit(&dataset).unwrap();
        assert_eq!(orchestrator.stage(), TrainingStage::Evaluated);
        assert_eq!(report.model_id, artifact.model_id());
        assert_eq!(report.splits.total, 300);
        assert_eq!(
            report.splits.train + report.splits.calibration + report.splits.test,
            300
        );
        assert!(report.roc_auc() > 0.6, "auc {}", report.roc_auc());
    }

    #[test]
    fn failure_returns_to_idle() {
        let records: Vec<ApplicantRecord> = (0..30).map(|_| sample_record()).collect();
        let dataset = LabeledDataset::new(records, vec![Label::Good; 30]);
        let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
        let err = orchestrator.fit(&dataset).unwrap_err();
        assert!(matches!(err, TrainingError::DegenerateLabels { n_good: 30, n_bad: 0 }));
        assert_eq!(orchestrator.stage(), TrainingStage::Idle);
    }

    #[test]
    fn too_few_rows() {
        let dataset = synthetic_credit_dataset(10, 1);
        let err = train(&dataset, &TrainingConfig::default()).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientSamples { required: 20, .. }));
    }

    #[test]
    fn report_path_appends_suffix() {
        assert_eq!(
            default_report_path(Path::new("out/model.bin")),
            PathBuf::from("out/model.bin.report.json")
        );
    }

    #[test]
    fn feature_means_are_row_means() {
        let x = ndarray::array![[1.0f32, 3.0], [0.0, 1.0]];
        assert_eq!(feature_means(&x), vec![2.0, 0.5]);
    }
}
