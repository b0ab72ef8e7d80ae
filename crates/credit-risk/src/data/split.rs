//! Deterministic stratified splits.
//!
//! Both helpers shuffle each class independently with a seeded [`StdRng`], so
//! the class balance of every partition matches the full dataset up to
//! rounding and results are reproducible for a given seed.

use rand::prelude::*;

use super::dataset::Label;

/// Index sets of a three-way split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub calibration: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified train / calibration / test split.
///
/// Fractions are per class: for each class `round(n_c * test_fraction)` rows go
/// to test and `round(n_c * calibration_fraction)` to calibration; the rest
/// train. Every index appears in exactly one partition; each partition is
/// sorted.
pub fn stratified_split(
    labels: &[Label],
    test_fraction: f64,
    calibration_fraction: f64,
    seed: u64,
) -> SplitIndices {
    assert!((0.0..1.0).contains(&test_fraction));
    assert!((0.0..1.0).contains(&calibration_fraction));
    assert!(test_fraction + calibration_fraction < 1.0);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = SplitIndices::default();

    for class in [Label::Good, Label::Bad] {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);

        let n = idx.len() as f64;
        let n_test = ((n * test_fraction).round() as usize).min(idx.len());
        let n_calib = ((n * calibration_fraction).round() as usize).min(idx.len() - n_test);

        let (test, rest) = idx.split_at(n_test);
        let (calib, train) = rest.split_at(n_calib);
        out.test.extend_from_slice(test);
        out.calibration.extend_from_slice(calib);
        out.train.extend_from_slice(train);
    }

    out.train.sort_unstable();
    out.calibration.sort_unstable();
    out.test.sort_unstable();
    out
}

/// Stratified k-fold partition.
///
/// Returns `k` `(train, valid)` pairs; each index lands in exactly one
/// validation fold. Rows of each class are dealt round-robin after shuffling.
pub fn stratified_k_fold(labels: &[Label], k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    assert!(k >= 2, "k-fold needs at least two folds");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; labels.len()];

    for class in [Label::Good, Label::Bad] {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        idx.shuffle(&mut rng);
        for (pos, i) in idx.into_iter().enumerate() {
            fold_of[i] = pos % k;
        }
    }

    (0..k)
        .map(|fold| {
            let (valid, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            (train, valid)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n_good: usize, n_bad: usize) -> Vec<Label> {
        let mut v = vec![Label::Good; n_good];
        v.extend(std::iter::repeat_n(Label::Bad, n_bad));
        v
    }

    #[test]
    fn split_is_a_partition() {
        let labels = labels(70, 30);
        let s = stratified_split(&labels, 0.2, 0.2, 42);
        let mut all: Vec<usize> = s
            .train
            .iter()
            .chain(&s.calibration)
            .chain(&s.test)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert_eq!(s.test.len(), 20);
        assert_eq!(s.calibration.len(), 20);
        assert_eq!(s.train.len(), 60);
    }

    #[test]
    fn split_is_stratified() {
        let labels = labels(70, 30);
        let s = stratified_split(&labels, 0.2, 0.2, 7);
        let bad_in_test = s.test.iter().filter(|&&i| labels[i].is_bad()).count();
        assert_eq!(bad_in_test, 6);
        let bad_in_calib = s.calibration.iter().filter(|&&i| labels[i].is_bad()).count();
        assert_eq!(bad_in_calib, 6);
    }

    #[test]
    fn split_is_deterministic() {
        let labels = labels(50, 50);
        assert_eq!(
            stratified_split(&labels, 0.2, 0.2, 42),
            stratified_split(&labels, 0.2, 0.2, 42)
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 0.2, 42),
            stratified_split(&labels, 0.2, 0.2, 43)
        );
    }

    #[test]
    fn k_fold_covers_every_row_once() {
        let labels = labels(23, 11);
        let folds = stratified_k_fold(&labels, 5, 1);
        assert_eq!(folds.len(), 5);
        let mut seen = vec![0usize; labels.len()];
        for (train, valid) in &folds {
            assert_eq!(train.len() + valid.len(), labels.len());
            for &i in valid {
                seen[i] += 1;
            }
            assert!(valid.iter().any(|&i| labels[i].is_bad()));
        }
        assert!(seen.iter().all(|&c| c == 1));
    }
}
