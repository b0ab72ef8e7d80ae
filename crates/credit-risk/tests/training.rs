//! Training runs from data on disk to published artifacts.

use std::fs;

use credit_risk::data::{Label, LabeledDataset};
use credit_risk::testing::{sample_record, synthetic_credit_dataset, to_jsonl};
use credit_risk::training::{
    CrossValidation, TrainingConfig, TrainingError, TrainingOrchestrator, TrainingReport, TrainingStage,
    default_report_path,
};
use credit_risk::{Artifact, CalibrationMethod};
use rstest::rstest;

#[test]
fn run_publishes_artifact_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("model.bin");
    let dataset = synthetic_credit_dataset(300, 3);

    let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
    let (artifact, report) = orchestrator.run(&dataset, &artifact_path, None).unwrap();
    assert_eq!(orchestrator.stage(), TrainingStage::Persisted);

    let loaded = Artifact::load(&artifact_path).unwrap();
    assert_eq!(loaded.model_id(), artifact.model_id());

    let text = fs::read_to_string(default_report_path(&artifact_path)).unwrap();
    let on_disk: TrainingReport = serde_json::from_str(&text).unwrap();
    assert_eq!(on_disk.model_id, artifact.model_id());
    assert_eq!(on_disk.splits, report.splits);
    assert!((0.0..=1.0).contains(&on_disk.roc_auc()));
    assert!(report.cv_results.is_empty());
    assert_eq!(report.best_lambda, None);
}

#[test]
fn single_class_data_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("model.bin");
    let records = (0..50).map(|_| sample_record()).collect();
    let dataset = LabeledDataset::new(records, vec![Label::Bad; 50]);

    let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
    let err = orchestrator.run(&dataset, &artifact_path, None).unwrap_err();
    assert!(matches!(err, TrainingError::DegenerateLabels { n_good: 0, n_bad: 50 }));
    assert_eq!(orchestrator.stage(), TrainingStage::Idle);
    assert!(!artifact_path.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn unwritable_destination_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("missing").join("model.bin");
    let report_path = dir.path().join("report.json");
    let dataset = synthetic_credit_dataset(120, 8);

    let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
    let err = orchestrator
        .run(&dataset, &artifact_path, Some(&report_path))
        .unwrap_err();
    assert!(matches!(err, TrainingError::Persist(_)), "{err}");
    assert_eq!(orchestrator.stage(), TrainingStage::Idle);
    assert!(!report_path.exists());
}

#[test]
fn failed_retrain_keeps_previous_run() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_path = dir.path().join("model.bin");
    let report_path = dir.path().join("report.json");

    let mut orchestrator = TrainingOrchestrator::new(TrainingConfig::default()).unwrap();
    let (first, _) = orchestrator
        .run(&synthetic_credit_dataset(200, 1), &artifact_path, Some(&report_path))
        .unwrap();
    let artifact_bytes = fs::read(&artifact_path).unwrap();
    let report_text = fs::read_to_string(&report_path).unwrap();

    // Artifact destination is unwritable.
    let err = orchestrator
        .run(
            &synthetic_credit_dataset(200, 2),
            dir.path().join("missing").join("model.bin"),
            Some(&report_path),
        )
        .unwrap_err();
    assert!(matches!(err, TrainingError::Persist(_)), "{err}");

    // Report destination is unwritable.
    let err = orchestrator
        .run(
            &synthetic_credit_dataset(200, 3),
            &artifact_path,
            Some(&dir.path().join("missing").join("report.json")),
        )
        .unwrap_err();
    assert!(matches!(err, TrainingError::Persist(_)), "{err}");
    assert_eq!(orchestrator.stage(), TrainingStage::Idle);

    assert_eq!(fs::read(&artifact_path).unwrap(), artifact_bytes);
    assert_eq!(fs::read_to_string(&report_path).unwrap(), report_text);
    assert_eq!(Artifact::load(&artifact_path).unwrap().model_id(), first.model_id());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn cross_validation_picks_lambda_from_grid() {
    let cv = CrossValidation {
        n_folds: 3,
        c_grid: vec![0.1, 1.0, 10.0],
    };
    let config = TrainingConfig::builder()
        .cross_validation(cv.clone())
        .build()
        .unwrap();
    let dataset = synthetic_credit_dataset(240, 4);
    let (_, report) = credit_risk::train(&dataset, &config).unwrap();

    assert_eq!(report.cv_results.len(), cv.c_grid.len());
    for (result, c) in report.cv_results.iter().zip(&cv.c_grid) {
        assert_eq!(result.c, *c);
        assert_eq!(result.fold_aucs.len(), cv.n_folds);
    }
    let best = report.best_lambda.unwrap();
    assert_eq!(report.lambda, best);
    let max_auc = report
        .cv_results
        .iter()
        .map(|r| r.mean_auc)
        .fold(f64::NEG_INFINITY, f64::max);
    let first_best = report.cv_results.iter().find(|r| r.mean_auc == max_auc).unwrap();
    assert_eq!(first_best.lambda, best);
}

#[test]
fn training_is_reproducible_for_a_seed() {
    let dataset = synthetic_credit_dataset(200, 12);
    let config = TrainingConfig::default();
    let (a, ra) = credit_risk::train(&dataset, &config).unwrap();
    let (b, rb) = credit_risk::train(&dataset, &config).unwrap();
    assert_eq!(a.classifier().model().coefficients(), b.classifier().model().coefficients());
    assert_eq!(a.background(), b.background());
    assert_eq!(ra.test, rb.test);
}

#[rstest]
#[case::none(CalibrationMethod::None)]
#[case::platt(CalibrationMethod::Platt)]
#[case::isotonic(CalibrationMethod::Isotonic)]
fn every_calibration_method_trains(#[case] calibration: CalibrationMethod) {
    let config = TrainingConfig::builder()
        .calibration(calibration)
        .build()
        .unwrap();
    let (artifact, report) = credit_risk::train(&synthetic_credit_dataset(250, 6), &config).unwrap();
    assert_eq!(report.calibration, calibration);
    let p = credit_risk::score(&artifact, &sample_record()).unwrap().probability;
    assert!((0.0..=1.0).contains(&p));
}

#[test]
fn jsonl_dataset_trains_like_in_memory_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credit.jsonl");
    let dataset = synthetic_credit_dataset(150, 21);
    fs::write(&path, to_jsonl(&dataset)).unwrap();

    let loaded = LabeledDataset::load(&path).unwrap();
    assert_eq!(loaded, dataset);

    let config = TrainingConfig::default();
    let (from_disk, _) = credit_risk::train(&loaded, &config).unwrap();
    let (in_memory, _) = credit_risk::train(&dataset, &config).unwrap();
    assert_eq!(
        from_disk.classifier().model().coefficients(),
        in_memory.classifier().model().coefficients()
    );
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = TrainingConfig {
        test_fraction: 0.6,
        calibration_fraction: 0.5,
        ..TrainingConfig::default()
    };
    assert!(matches!(
        TrainingOrchestrator::new(config),
        Err(TrainingError::Config(_))
    ));
}
