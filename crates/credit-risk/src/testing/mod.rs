//! Synthetic applicant data for tests, examples and benchmarks.
//!
//! The generator draws every field from the German credit vocabulary and
//! marks the riskiest 30% of applicants (by a noisy linear score over a few
//! fields) as `bad`, so a linear model has real signal to learn.

use rand::prelude::*;

use crate::data::{ApplicantRecord, Label, LabeledDataset, RawValue};

/// Share of `bad` rows in [`synthetic_credit_dataset`].
pub const BAD_RATE: f64 = 0.3;

const CHECKING_STATUS: &[&str] = &["<0", "0<=X<200", ">=200", "no checking"];
const CREDIT_HISTORY: &[&str] = &[
    "no credits/all paid",
    "all paid",
    "existing paid",
    "delayed previously",
    "critical/other existing credit",
];
const PURPOSE: &[&str] = &[
    "new car",
    "used car",
    "furniture/equipment",
    "radio/tv",
    "domestic appliance",
    "repairs",
    "education",
    "business",
    "other",
];
const SAVINGS_STATUS: &[&str] = &["<100", "100<=X<500", "500<=X<1000", ">=1000", "no known savings"];
const EMPLOYMENT: &[&str] = &["unemployed", "<1", "1<=X<4", "4<=X<7", ">=7"];
const PERSONAL_STATUS: &[&str] = &["male div/sep", "female div/dep/mar", "male single", "male mar/wid"];
const OTHER_PARTIES: &[&str] = &["none", "co applicant", "guarantor"];
const PROPERTY_MAGNITUDE: &[&str] = &["real estate", "life insurance", "car", "no known property"];
const OTHER_PAYMENT_PLANS: &[&str] = &["bank", "stores", "none"];
const HOUSING: &[&str] = &["rent", "own", "for free"];
const JOB: &[&str] = &[
    "unemp/unskilled non res",
    "unskilled resident",
    "skilled",
    "high qualif/self emp/mgmt",
];
const OWN_TELEPHONE: &[&str] = &["none", "yes"];
const FOREIGN_WORKER: &[&str] = &["yes", "no"];

/// A complete, valid applicant with values inside the range of any
/// reasonably sized synthetic training set.
pub fn sample_record() -> ApplicantRecord {
    ApplicantRecord::from_pairs([
        ("checking_status", RawValue::from("<0")),
        ("duration", RawValue::from(24)),
        ("credit_history", RawValue::from("existing paid")),
        ("purpose", RawValue::from("radio/tv")),
        ("credit_amount", RawValue::from(3000)),
        ("savings_status", RawValue::from("<100")),
        ("employment", RawValue::from("1<=X<4")),
        ("installment_commitment", RawValue::from(2)),
        ("personal_status", RawValue::from("male single")),
        ("other_parties", RawValue::from("none")),
        ("residence_since", RawValue::from(2)),
        ("property_magnitude", RawValue::from("car")),
        ("age", RawValue::from(35)),
        ("other_payment_plans", RawValue::from("none")),
        ("housing", RawValue::from("own")),
        ("existing_credits", RawValue::from(1)),
        ("job", RawValue::from("skilled")),
        ("num_dependents", RawValue::from(1)),
        ("own_telephone", RawValue::from("yes")),
        ("foreign_worker", RawValue::from("yes")),
    ])
}

/// `n` applicants with both outcomes present whenever `n >= 2`.
///
/// Deterministic for a given seed.
pub fn synthetic_credit_dataset(n: usize, seed: u64) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records = Vec::with_capacity(n);
    let mut scores = Vec::with_capacity(n);

    for _ in 0..n {
        let (record, score) = synthetic_applicant(&mut rng);
        records.push(record);
        scores.push(score);
    }

    // The riskiest BAD_RATE share is labelled bad.
    let n_bad = match n {
        0 => 0,
        1 => 1,
        _ => ((n as f64 * BAD_RATE).round() as usize).clamp(1, n - 1),
    };
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    let mut labels = vec![Label::Good; n];
    for &i in &order[..n_bad] {
        labels[i] = Label::Bad;
    }

    LabeledDataset::new(records, labels)
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> (usize, &'a str) {
    let i = rng.gen_range(0..values.len());
    (i, values[i])
}

fn synthetic_applicant(rng: &mut StdRng) -> (ApplicantRecord, f64) {
    let mut score = 0.0;

    let (checking, checking_status) = pick(rng, CHECKING_STATUS);
    score += [1.2, 0.5, -0.3, -1.0][checking];

    let (history, credit_history) = pick(rng, CREDIT_HISTORY);
    score += [0.9, 0.7, 0.0, 0.2, -0.6][history];

    let (savings, savings_status) = pick(rng, SAVINGS_STATUS);
    score += [0.5, 0.3, -0.1, -0.5, -0.3][savings];

    let duration: i64 = rng.gen_range(4..=72);
    score += (duration as f64 - 21.0) / 12.0 * 0.5;

    let credit_amount: i64 = rng.gen_range(250..=18_000);
    score += (credit_amount as f64 - 3_300.0) / 3_000.0 * 0.2;

    let age: i64 = rng.gen_range(19..=75);
    if age < 26 {
        score += 0.4;
    }

    let installment_commitment: i64 = rng.gen_range(1..=4);
    score += (installment_commitment as f64 - 2.5) * 0.15;

    // Logistic-like noise
    let u: f64 = rng.r#gen::<f64>().clamp(1e-9, 1.0 - 1e-9);
    score += 0.8 * (u / (1.0 - u)).ln();

    let record = ApplicantRecord::from_pairs([
        ("checking_status", RawValue::from(checking_status)),
        ("duration", RawValue::from(duration)),
        ("credit_history", RawValue::from(credit_history)),
        ("purpose", RawValue::from(pick(rng, PURPOSE).1)),
        ("credit_amount", RawValue::from(credit_amount)),
        ("savings_status", RawValue::from(savings_status)),
        ("employment", RawValue::from(pick(rng, EMPLOYMENT).1)),
        ("installment_commitment", RawValue::from(installment_commitment)),
        ("personal_status", RawValue::from(pick(rng, PERSONAL_STATUS).1)),
        ("other_parties", RawValue::from(pick(rng, OTHER_PARTIES).1)),
        ("residence_since", RawValue::from(rng.gen_range(1..=4i64))),
        ("property_magnitude", RawValue::from(pick(rng, PROPERTY_MAGNITUDE).1)),
        ("age", RawValue::from(age)),
        ("other_payment_plans", RawValue::from(pick(rng, OTHER_PAYMENT_PLANS).1)),
        ("housing", RawValue::from(pick(rng, HOUSING).1)),
        ("existing_credits", RawValue::from(rng.gen_range(1..=4i64))),
        ("job", RawValue::from(pick(rng, JOB).1)),
        ("num_dependents", RawValue::from(rng.gen_range(1..=2i64))),
        ("own_telephone", RawValue::from(pick(rng, OWN_TELEPHONE).1)),
        ("foreign_worker", RawValue::from(pick(rng, FOREIGN_WORKER).1)),
    ]);
    (record, score)
}

/// Serialize a dataset as JSON Lines with the label in the `class` column.
pub fn to_jsonl(dataset: &LabeledDataset) -> String {
    let mut out = String::new();
    for (record, label) in dataset.iter() {
        let mut map = record.to_json_map();
        map.insert(
            crate::data::LABEL_FIELD.to_string(),
            serde_json::Value::from(label.as_str()),
        );
        out.push_str(&serde_json::Value::Object(map).to_string());
        out.push('\n');
    }
    out
}
