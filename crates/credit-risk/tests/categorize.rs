//! Risk tier boundaries.

use credit_risk::{RiskThresholds, RiskTier, categorize};
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case(0.0, RiskTier::Low)]
#[case(0.20, RiskTier::Low)]
#[case(0.20000001, RiskTier::Medium)]
#[case(0.50, RiskTier::Medium)]
#[case(0.50000001, RiskTier::High)]
#[case(1.0, RiskTier::High)]
fn tier_boundaries(#[case] p: f64, #[case] expected: RiskTier) {
    assert_eq!(categorize(p), expected);
}

#[test]
fn nan_is_high() {
    assert_eq!(categorize(f64::NAN), RiskTier::High);
}

#[rstest]
#[case(0.5, 0.2)]
#[case(0.3, 0.3)]
#[case(-0.1, 0.5)]
#[case(0.2, 1.5)]
fn invalid_thresholds(#[case] low: f64, #[case] medium: f64) {
    assert!(RiskThresholds::new(low, medium).is_err());
}

#[test]
fn tiers_serialize_lowercase() {
    assert_eq!(serde_json::to_string(&RiskTier::Medium).unwrap(), r#""medium""#);
}

proptest! {
    #[test]
    fn tier_is_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(categorize(lo) <= categorize(hi));
    }

    #[test]
    fn custom_thresholds_partition_unit_interval(low in 0.0f64..0.5, gap in 0.01f64..0.5, p in 0.0f64..=1.0) {
        let t = RiskThresholds::new(low, low + gap).unwrap();
        let tier = t.categorize(p);
        let expected = if p <= t.low {
            RiskTier::Low
        } else if p <= t.medium {
            RiskTier::Medium
        } else {
            RiskTier::High
        };
        prop_assert_eq!(tier, expected);
    }
}
