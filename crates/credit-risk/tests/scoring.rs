//! End-to-end scoring through a trained artifact.

use std::sync::{Arc, OnceLock};
use std::thread;

use approx::assert_abs_diff_eq;
use credit_risk::explain::ATTRIBUTION_TOLERANCE;
use credit_risk::testing::{sample_record, synthetic_credit_dataset};
use credit_risk::training::{TrainingConfig, train};
use credit_risk::{
    ApplicantRecord, Artifact, AttributionMethod, ExtrapolationPolicy, ScoringOptions, ScoringService,
    categorize,
};

fn artifact() -> Arc<Artifact> {
    static ARTIFACT: OnceLock<Arc<Artifact>> = OnceLock::new();
    ARTIFACT
        .get_or_init(|| {
            let dataset = synthetic_credit_dataset(400, 2024);
            let (artifact, _) = train(&dataset, &TrainingConfig::default()).unwrap();
            Arc::new(artifact)
        })
        .clone()
}

fn service() -> ScoringService {
    ScoringService::from_artifact(artifact(), ScoringOptions::default()).unwrap()
}

/// The reference applicant from the service contract.
fn reference_applicant() -> ApplicantRecord {
    ApplicantRecord::from_json_str(
        r#"{
            "checking_status": "<0", "duration": 6, "credit_history": "critical/other existing credit",
            "purpose": "radio/tv", "credit_amount": 1169, "savings_status": "no known savings",
            "employment": ">=7", "installment_commitment": 4, "personal_status": "male single",
            "other_parties": "none", "residence_since": 4, "property_magnitude": "real estate",
            "age": 67, "other_payment_plans": "none", "housing": "own", "existing_credits": 2,
            "job": "skilled", "num_dependents": 1, "own_telephone": "yes", "foreign_worker": "yes"
        }"#,
    )
    .unwrap()
}

#[test]
fn reference_applicant_scores_consistently() {
    let result = service().score(&reference_applicant()).unwrap();
    assert!((0.0..=1.0).contains(&result.probability));
    assert_eq!(result.tier, categorize(result.probability));
    assert_eq!(result.attributions.len(), 20);
    assert!(result.unseen.is_empty());
}

#[test]
fn attributions_sum_to_prediction_minus_baseline() {
    let service = service();
    for record in synthetic_credit_dataset(25, 99).records() {
        let r = service.score(record).unwrap();
        let total: f64 = r.attributions.iter().map(|a| a.contribution).sum();
        assert_abs_diff_eq!(total, r.probability - r.baseline, epsilon = 1e-6);
    }
}

#[test]
fn sampled_attributions_stay_within_tolerance() {
    let options = ScoringOptions {
        attribution: AttributionMethod::Sampling {
            n_permutations: 32,
            seed: 7,
        },
        ..ScoringOptions::default()
    };
    let service = ScoringService::from_artifact(artifact(), options).unwrap();
    let r = service.score(&sample_record()).unwrap();
    let total: f64 = r.attributions.iter().map(|a| a.contribution).sum();
    assert!((total - (r.probability - r.baseline)).abs() < ATTRIBUTION_TOLERANCE);
    assert_eq!(service.score(&sample_record()).unwrap(), r);
}

#[test]
fn unseen_category_scores_without_error() {
    let r = service()
        .score(&sample_record().with("housing", "houseboat"))
        .unwrap();
    assert_eq!(r.unseen.len(), 1);
    assert_eq!(r.unseen[0].field, "housing");
}

#[test]
fn missing_field_is_a_validation_error() {
    let err = service().score(&sample_record().without("duration")).unwrap_err();
    assert!(err.to_string().contains("duration"));
}

#[test]
fn clamping_caps_out_of_range_numerics() {
    let clamped = ScoringService::from_artifact(
        artifact(),
        ScoringOptions {
            extrapolation: ExtrapolationPolicy::Clamp,
            ..ScoringOptions::default()
        },
    )
    .unwrap();
    let max_amount = artifact().encoder().state().numeric[1].scaler.max;
    let far = clamped.predict(&sample_record().with("credit_amount", 1e9)).unwrap();
    let edge = clamped
        .predict(&sample_record().with("credit_amount", max_amount))
        .unwrap();
    assert_eq!(far, edge);

    let r = service().score(&sample_record().with("credit_amount", 1e9)).unwrap();
    let flagged: Vec<&str> = r
        .attributions
        .iter()
        .filter(|a| a.extrapolated)
        .map(|a| a.feature.as_str())
        .collect();
    assert_eq!(flagged, ["credit_amount"]);
}

#[test]
fn concurrent_scoring_matches_sequential() {
    let service = Arc::new(service());
    let records: Vec<ApplicantRecord> = synthetic_credit_dataset(64, 5).records().to_vec();
    let expected: Vec<_> = records.iter().map(|r| service.score(r).unwrap()).collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let records = records.clone();
            thread::spawn(move || {
                records
                    .iter()
                    .map(|r| service.score(r).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }

    let batch: Vec<_> = service
        .score_batch(&records)
        .into_iter()
        .map(Result::unwrap)
        .collect();
    assert_eq!(batch, expected);
}

#[test]
fn unseen_category_scores_at_least_as_risky_as_any_known_one() {
    let service = service();
    for state in &artifact().encoder().state().categorical {
        let unseen = service
            .predict(&sample_record().with(state.field.as_str(), "never seen in training"))
            .unwrap()
            .prob_default;
        for category in state.vocabulary.categories() {
            let known = service
                .predict(&sample_record().with(state.field.as_str(), category.as_str()))
                .unwrap()
                .prob_default;
            assert!(
                unseen >= known - 1e-12,
                "{}: unseen {unseen} < {category:?} {known}",
                state.field
            );
        }
    }
}
