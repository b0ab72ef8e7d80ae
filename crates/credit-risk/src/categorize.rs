//! Probability → risk tier.

use serde::{Deserialize, Serialize};

/// Discrete risk tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (inclusive) of the low and medium tiers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 0.20,
            medium: 0.50,
        }
    }
}

/// Thresholds that are out of range or out of order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid risk thresholds: low={low}, medium={medium} (need 0 <= low < medium <= 1)")]
pub struct InvalidThresholds {
    pub low: f64,
    pub medium: f64,
}

impl RiskThresholds {
    pub fn new(low: f64, medium: f64) -> Result<Self, InvalidThresholds> {
        let t = Self { low, medium };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> Result<(), InvalidThresholds> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if in_unit(self.low) && in_unit(self.medium) && self.low < self.medium {
            Ok(())
        } else {
            Err(InvalidThresholds {
                low: self.low,
                medium: self.medium,
            })
        }
    }

    /// Map a probability to a tier. NaN maps to [`RiskTier::High`].
    #[inline]
    pub fn categorize(&self, p: f64) -> RiskTier {
        if p <= self.low {
            RiskTier::Low
        } else if p <= self.medium {
            RiskTier::Medium
        } else {
            // Also reached for NaN, since every comparison above is false.
            RiskTier::High
        }
    }
}

/// Map a probability to a tier with the default thresholds.
#[inline]
pub fn categorize(p: f64) -> RiskTier {
    RiskThresholds::default().categorize(p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_fails_closed() {
        assert_eq!(categorize(f64::NAN), RiskTier::High);
    }

    #[test]
    fn thresholds_validation() {
        assert!(RiskThresholds::new(0.2, 0.5).is_ok());
        assert!(RiskThresholds::new(0.5, 0.2).is_err());
        assert!(RiskThresholds::new(0.5, 0.5).is_err());
        assert!(RiskThresholds::new(-0.1, 0.5).is_err());
        assert!(RiskThresholds::new(0.2, f64::NAN).is_err());
    }

    #[test]
    fn tier_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskTier::Medium).unwrap(), "\"medium\"");
    }
}
