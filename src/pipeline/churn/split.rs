//! Seeded train/test splits and cross-validation folds

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::pipeline::error::AnalysisError;

/// Seed streams, mixed into the base seed so each use gets its own sequence
pub mod streams {
    pub const SPLIT: u64 = 1;
    pub const FOLDS: u64 = 2;
    pub const TRIALS: u64 = 3;
    pub const FINAL_FIT: u64 = 4;
}

/// Mix a base seed with a stream id (splitmix64 finaliser)
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base
        .wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Train/test partition of row indices, both sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Whether fold assignment preserves class proportions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stratification {
    Stratified,
    Unstratified,
}

/// One cross-validation fold: fit on `analysis`, score on `assessment`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub analysis: Vec<usize>,
    pub assessment: Vec<usize>,
}

/// Split rows so each class contributes `train_fraction` of its rows (rounded) to training
pub fn stratified_split(labels: &[bool], train_fraction: f64, seed: u64) -> Result<Split, AnalysisError> {
    if labels.is_empty() {
        return Err(AnalysisError::EmptyInput("customer data".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let n_train = (members.len() as f64 * train_fraction).round() as usize;
        let n_train = n_train.min(members.len());
        train.extend_from_slice(&members[..n_train]);
        test.extend_from_slice(&members[n_train..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

/// Assign rows to `v` folds.
///
/// Stratified assignment shuffles each class separately and deals its rows
/// round-robin, continuing the rotation across classes; unstratified
/// assignment shuffles all rows together.
pub fn vfold(
    labels: &[bool],
    v: usize,
    stratification: Stratification,
    seed: u64,
) -> Result<Vec<Fold>, AnalysisError> {
    if v < 2 || labels.len() < v {
        return Err(AnalysisError::TooFewRows {
            rows: labels.len(),
            folds: v,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let order: Vec<usize> = match stratification {
        Stratification::Stratified => {
            let mut order = Vec::with_capacity(labels.len());
            for class in [false, true] {
                let mut members: Vec<usize> =
                    (0..labels.len()).filter(|&i| labels[i] == class).collect();
                members.shuffle(&mut rng);
                order.extend(members);
            }
            order
        }
        Stratification::Unstratified => {
            let mut order: Vec<usize> = (0..labels.len()).collect();
            order.shuffle(&mut rng);
            order
        }
    };

    let mut assignment = vec![0usize; labels.len()];
    for (position, &row) in order.iter().enumerate() {
        assignment[row] = position % v;
    }

    Ok((0..v)
        .map(|k| {
            let (assessment, analysis): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| assignment[i] == k);
            Fold {
                analysis,
                assessment,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n_left: usize, n_current: usize) -> Vec<bool> {
        let mut l = vec![true; n_left];
        l.extend(vec![false; n_current]);
        l
    }

    #[test]
    fn test_split_is_reproducible() {
        let y = labels(30, 70);
        let a = stratified_split(&y, 0.7, 123).unwrap();
        let b = stratified_split(&y, 0.7, 123).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_preserves_proportions() {
        let y = labels(30, 70);
        let split = stratified_split(&y, 0.7, 7).unwrap();
        assert_eq!(split.train.len(), 70);
        assert_eq!(split.test.len(), 30);
        assert_eq!(split.train.iter().filter(|&&i| y[i]).count(), 21);
        assert_eq!(split.test.iter().filter(|&&i| y[i]).count(), 9);
    }

    #[test]
    fn test_split_partitions_rows() {
        let y = labels(13, 29);
        let split = stratified_split(&y, 0.7, 99).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..y.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_different_seeds_differ() {
        let y = labels(50, 50);
        let a = stratified_split(&y, 0.7, 1).unwrap();
        let b = stratified_split(&y, 0.7, 2).unwrap();
        assert_ne!(a.train, b.train);
    }

    #[test]
    fn test_stratified_folds_balance_classes() {
        let y = labels(20, 80);
        let folds = vfold(&y, 5, Stratification::Stratified, 11).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.assessment.len(), 20);
            assert_eq!(fold.assessment.iter().filter(|&&i| y[i]).count(), 4);
            assert_eq!(fold.analysis.len() + fold.assessment.len(), 100);
        }
    }

    #[test]
    fn test_unstratified_folds_cover_rows_once() {
        let y = labels(7, 16);
        let folds = vfold(&y, 5, Stratification::Unstratified, 3).unwrap();
        let mut seen: Vec<usize> = folds.iter().flat_map(|f| f.assessment.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let y = labels(1, 2);
        assert!(matches!(
            vfold(&y, 5, Stratification::Stratified, 1),
            Err(AnalysisError::TooFewRows { rows: 3, folds: 5 })
        ));
    }

    #[test]
    fn test_derive_seed_streams_differ() {
        assert_ne!(derive_seed(123, streams::SPLIT), derive_seed(123, streams::FOLDS));
        assert_eq!(derive_seed(123, 9), derive_seed(123, 9));
    }
}
