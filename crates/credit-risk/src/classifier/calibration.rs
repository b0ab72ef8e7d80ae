//! Probability calibration.
//!
//! Calibrators map a raw margin to a probability. They are fitted on a split
//! the linear model never saw, so they correct for the optimism of the
//! training fit and for the shift introduced by class weighting.

use serde::{Deserialize, Serialize};

use crate::training::TrainingError;

use super::objective::LogisticLoss;

/// Calibration method selected at training time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMethod {
    /// Sigmoid on the margin, `σ(a·m + b)`.
    #[default]
    Platt,
    /// Monotone step function on `σ(m)`, fitted by pool-adjacent-violators.
    Isotonic,
    /// Plain `σ(m)`.
    None,
}

/// Fitted margin → probability mapping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Calibrator {
    Identity,
    Platt { a: f64, b: f64 },
    Isotonic { thresholds: Vec<f64>, values: Vec<f64> },
}

impl Calibrator {
    /// Fit the requested method on margins and 0/1 targets.
    pub fn fit(method: CalibrationMethod, margins: &[f64], targets: &[f32]) -> Result<Self, TrainingError> {
        match method {
            CalibrationMethod::None => Ok(Calibrator::Identity),
            CalibrationMethod::Platt => fit_platt(margins, targets),
            CalibrationMethod::Isotonic => fit_isotonic(margins, targets),
        }
    }

    /// Probability for a margin. Always in `[0, 1]`.
    #[inline]
    pub fn apply(&self, margin: f64) -> f64 {
        match self {
            Calibrator::Identity => LogisticLoss::sigmoid(margin),
            Calibrator::Platt { a, b } => LogisticLoss::sigmoid(a * margin + b),
            Calibrator::Isotonic { thresholds, values } => {
                interpolate(thresholds, values, LogisticLoss::sigmoid(margin))
            }
        }
    }

    /// Derivative `dp/dm` at a margin.
    pub fn slope(&self, margin: f64) -> f64 {
        match self {
            Calibrator::Identity => {
                let p = LogisticLoss::sigmoid(margin);
                p * (1.0 - p)
            }
            Calibrator::Platt { a, b } => {
                let p = LogisticLoss::sigmoid(a * margin + b);
                a * p * (1.0 - p)
            }
            Calibrator::Isotonic { .. } => {
                const H: f64 = 1e-4;
                (self.apply(margin + H) - self.apply(margin - H)) / (2.0 * H)
            }
        }
    }

    /// Check persisted parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Calibrator::Identity => Ok(()),
            Calibrator::Platt { a, b } => {
                if !(a.is_finite() && b.is_finite()) {
                    Err(format!("non-finite Platt parameters a={a}, b={b}"))
                } else if *a <= 0.0 {
                    Err(format!("Platt slope must be positive, got a={a}"))
                } else {
                    Ok(())
                }
            }
            Calibrator::Isotonic { thresholds, values } => {
                if thresholds.is_empty() || thresholds.len() != values.len() {
                    return Err("isotonic thresholds and values must be non-empty and equal length".into());
                }
                if thresholds.windows(2).any(|w| !(w[0] <= w[1])) {
                    return Err("isotonic thresholds must be non-decreasing".into());
                }
                if values.windows(2).any(|w| !(w[0] <= w[1])) {
                    return Err("isotonic values must be non-decreasing".into());
                }
                if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
                    return Err("isotonic values must lie in [0, 1]".into());
                }
                Ok(())
            }
        }
    }
}

fn class_counts(targets: &[f32]) -> (usize, usize) {
    let n_pos = targets.iter().filter(|&&y| y > 0.5).count();
    (n_pos, targets.len() - n_pos)
}

/// Platt scaling with smoothed targets, fitted by damped Newton.
fn fit_platt(margins: &[f64], targets: &[f32]) -> Result<Calibrator, TrainingError> {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const RIDGE: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let (n_pos, n_neg) = class_counts(targets);
    if n_pos == 0 || n_neg == 0 {
        return Err(TrainingError::CalibrationFailed {
            reason: "calibration split contains a single class".into(),
        });
    }

    let hi = (n_pos as f64 + 1.0) / (n_pos as f64 + 2.0);
    let lo = 1.0 / (n_neg as f64 + 2.0);
    let t: Vec<f64> = targets.iter().map(|&y| if y > 0.5 { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        margins
            .iter()
            .zip(&t)
            .map(|(&m, &t)| {
                let z = a * m + b;
                let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
                softplus - t * z
            })
            .sum()
    };

    let mut a = 1.0f64;
    let mut b = ((n_pos as f64 + 1.0) / (n_neg as f64 + 1.0)).ln();
    let mut f = objective(a, b);

    for _ in 0..MAX_ITER {
        let (mut ga, mut gb) = (0.0, 0.0);
        let (mut haa, mut hab, mut hbb) = (RIDGE, 0.0, RIDGE);
        for (&m, &t) in margins.iter().zip(&t) {
            let p = LogisticLoss::sigmoid(a * m + b);
            let d = p - t;
            let w = p * (1.0 - p);
            ga += d * m;
            gb += d;
            haa += w * m * m;
            hab += w * m;
            hbb += w;
        }
        if ga.abs() < EPS && gb.abs() < EPS {
            break;
        }

        let det = haa * hbb - hab * hab;
        if det.abs() < 1e-300 {
            break;
        }
        let da = -(hbb * ga - hab * gb) / det;
        let db = -(-hab * ga + haa * gb) / det;
        let descent = ga * da + gb * db;

        let mut step = 1.0;
        let mut accepted = false;
        while step >= MIN_STEP {
            let (na, nb) = (a + step * da, b + step * db);
            let nf = objective(na, nb);
            if nf < f + 1e-4 * step * descent {
                a = na;
                b = nb;
                f = nf;
                accepted = true;
                break;
            }
            step /= 2.0;
        }
        if !accepted {
            break;
        }
    }

    if !a.is_finite() || !b.is_finite() {
        return Err(TrainingError::CalibrationFailed {
            reason: format!("Platt scaling diverged (a={a}, b={b})"),
        });
    }
    // A non-positive slope would reverse the margin order.
    if a <= 0.0 {
        return Err(TrainingError::CalibrationFailed {
            reason: format!("Platt slope is not positive (a={a}): margins do not rank the calibration split"),
        });
    }
    Ok(Calibrator::Platt { a, b })
}

/// Isotonic regression of targets on `σ(margin)`.
fn fit_isotonic(margins: &[f64], targets: &[f32]) -> Result<Calibrator, TrainingError> {
    let (n_pos, n_neg) = class_counts(targets);
    if n_pos == 0 || n_neg == 0 {
        return Err(TrainingError::CalibrationFailed {
            reason: "calibration split contains a single class".into(),
        });
    }

    let mut points: Vec<(f64, f64)> = margins
        .iter()
        .zip(targets)
        .map(|(&m, &y)| (LogisticLoss::sigmoid(m), y as f64))
        .collect();
    if points.iter().any(|(x, _)| !x.is_finite()) {
        return Err(TrainingError::CalibrationFailed {
            reason: "non-finite margin in calibration split".into(),
        });
    }
    points.sort_by(|l, r| l.0.total_cmp(&r.0));

    struct Block {
        sum: f64,
        count: f64,
        x_min: f64,
        x_max: f64,
    }

    let mut blocks: Vec<Block> = Vec::with_capacity(points.len());
    for (x, y) in points {
        // Equal inputs must share one output.
        if let Some(last) = blocks.last_mut().filter(|b| b.x_max == x) {
            last.sum += y;
            last.count += 1.0;
        } else {
            blocks.push(Block {
                sum: y,
                count: 1.0,
                x_min: x,
                x_max: x,
            });
        }
        while blocks.len() >= 2 {
            let n = blocks.len();
            let prev = blocks[n - 2].sum / blocks[n - 2].count;
            let cur = blocks[n - 1].sum / blocks[n - 1].count;
            if prev <= cur {
                break;
            }
            let Some(last) = blocks.pop() else { break };
            let Some(merged) = blocks.last_mut() else { break };
            merged.sum += last.sum;
            merged.count += last.count;
            merged.x_max = last.x_max;
        }
    }

    let mut thresholds = Vec::with_capacity(blocks.len() * 2);
    let mut values = Vec::with_capacity(blocks.len() * 2);
    for block in &blocks {
        let v = block.sum / block.count;
        thresholds.push(block.x_min);
        values.push(v);
        if block.x_max > block.x_min {
            thresholds.push(block.x_max);
            values.push(v);
        }
    }

    Ok(Calibrator::Isotonic { thresholds, values })
}

/// Piecewise-linear interpolation, clamped at both ends.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if n == 0 {
        return x;
    }
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let hi = xs.partition_point(|&t| t <= x);
    let lo = hi - 1;
    let (x0, x1) = (xs[lo], xs[hi]);
    let (y0, y1) = (ys[lo], ys[hi]);
    if x1 <= x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}
