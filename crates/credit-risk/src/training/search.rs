//! Cross-validated search over the L2 strength.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::classifier::RiskClassifier;
use crate::data::{LabeledDataset, stratified_k_fold};
use crate::encode::{EncoderError, FeatureEncoder};

use super::config::{ConfigError, CrossValidation, TrainingConfig};
use super::error::TrainingError;
use super::metrics::roc_auc;
use super::report::CvResult;

/// Result of a grid search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    pub best_lambda: f64,
    /// One entry per grid candidate, in grid order.
    pub results: Vec<CvResult>,
}

/// Score every `C` of the grid by mean validation ROC AUC over stratified
/// folds of `dataset`.
///
/// Each fold refits the encoder on its own training rows, so no statistic of
/// a validation fold leaks into its model. Folds are evaluated in parallel.
/// The first candidate with the highest mean wins.
pub fn grid_search(
    dataset: &LabeledDataset,
    config: &TrainingConfig,
    cv: &CrossValidation,
) -> Result<SearchOutcome, TrainingError> {
    let folds = stratified_k_fold(dataset.labels(), cv.n_folds, config.seed);

    let jobs: Vec<(usize, usize)> = (0..cv.c_grid.len())
        .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
        .collect();

    let aucs = jobs
        .par_iter()
        .map(|&(c, f)| {
            let (train, valid) = &folds[f];
            let lambda = 1.0 / cv.c_grid[c];
            let auc = fold_auc(dataset, train, valid, lambda, config)?;
            debug!(c = cv.c_grid[c], fold = f, auc, "cross-validation fold");
            Ok(auc)
        })
        .collect::<Result<Vec<f64>, TrainingError>>()?;

    let results: Vec<CvResult> = cv
        .c_grid
        .iter()
        .zip(aucs.chunks(folds.len()))
        .map(|(&c, fold_aucs)| {
            let n = fold_aucs.len() as f64;
            let mean = fold_aucs.iter().sum::<f64>() / n;
            let var = fold_aucs.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / n;
            CvResult {
                c,
                lambda: 1.0 / c,
                mean_auc: mean,
                std_auc: var.sqrt(),
                fold_aucs: fold_aucs.to_vec(),
            }
        })
        .collect();

    let best = results
        .iter()
        .fold(None::<&CvResult>, |best, r| match best {
            Some(b) if b.mean_auc >= r.mean_auc => Some(b),
            _ => Some(r),
        })
        .ok_or_else(|| ConfigError::InvalidCrossValidation("c_grid is empty".into()))?;

    info!(
        best_c = best.c,
        best_lambda = best.lambda,
        mean_auc = best.mean_auc,
        n_folds = folds.len(),
        "cross-validation finished"
    );
    Ok(SearchOutcome {
        best_lambda: best.lambda,
        results,
    })
}

fn fold_auc(
    dataset: &LabeledDataset,
    train: &[usize],
    valid: &[usize],
    lambda: f64,
    config: &TrainingConfig,
) -> Result<f64, TrainingError> {
    let train = dataset.select(train);
    let valid = dataset.select(valid);

    let encoder = FeatureEncoder::fit(train.records(), config.min_category_count)?;
    let x_train = encoder
        .encode_matrix(train.records())
        .map_err(EncoderError::from)?;
    let x_valid = encoder
        .encode_matrix(valid.records())
        .map_err(EncoderError::from)?;

    let (classifier, _) = RiskClassifier::fit(
        x_train.view(),
        &train.targets(),
        encoder.layout_hash(),
        &config.classifier_params_with(lambda),
        config.min_samples,
    )?;
    let predictions = classifier.predict_proba_matrix(x_valid.view());
    Ok(roc_auc(&predictions, &valid.targets()))
}
