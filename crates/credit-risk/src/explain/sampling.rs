//! Model-agnostic attributions by permutation sampling.
//!
//! For each sampled ordering of the field groups, the explainer starts from
//! the background vector, switches groups to the explained sample one at a
//! time and credits every group with the change in prediction it causes. Each
//! ordering telescopes to `f(x) - f(background)`, so the averaged values are
//! additive exactly; only their split between groups carries sampling error.

use rand::prelude::*;

use crate::classifier::ProbabilisticClassifier;
use crate::encode::FeatureLayout;

use super::values::Contributions;

/// Seeded permutation Shapley over field groups.
#[derive(Clone, Debug)]
pub struct SamplingExplainer<'a> {
    layout: &'a FeatureLayout,
    background: &'a [f32],
    n_permutations: usize,
    seed: u64,
}

impl<'a> SamplingExplainer<'a> {
    pub fn new(layout: &'a FeatureLayout, background: &'a [f32], n_permutations: usize, seed: u64) -> Self {
        debug_assert_eq!(layout.n_features(), background.len());
        Self {
            layout,
            background,
            n_permutations: n_permutations.max(1),
            seed,
        }
    }

    /// Per-group contributions, in layout group order. The base value is the
    /// prediction at the background.
    pub fn group_contributions(
        &self,
        classifier: &dyn ProbabilisticClassifier,
        features: &[f32],
    ) -> Contributions {
        let groups = self.layout.groups();
        let base = classifier.predict_features(self.background);
        let mut totals = Contributions::zeros(groups.len(), base);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order: Vec<usize> = (0..groups.len()).collect();
        let mut z = self.background.to_vec();

        for _ in 0..self.n_permutations {
            order.shuffle(&mut rng);
            z.copy_from_slice(self.background);
            let mut prev = base;
            for &g in &order {
                let cols = groups[g].columns.clone();
                z[cols.clone()].copy_from_slice(&features[cols]);
                let cur = classifier.predict_features(&z);
                totals.add(g, cur - prev);
                prev = cur;
            }
        }

        let scale = 1.0 / self.n_permutations as f64;
        totals.rescaled(scale, base)
    }
}
