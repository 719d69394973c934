//! Bootstrap tree ensembles: bagged trees and random forests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::customers::FeatureMatrix;
use super::split::derive_seed;
use super::tree::{BinnedMatrix, DecisionTree, TreeParams, DEFAULT_MAX_BINS};

/// Ensemble settings. `mtry = None` tries every predictor at each split (bagging).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnsembleParams {
    pub trees: usize,
    pub mtry: Option<usize>,
    pub min_node_size: usize,
}

impl EnsembleParams {
    /// Bagged full-depth trees
    pub fn bagging(trees: usize) -> Self {
        Self {
            trees,
            mtry: None,
            min_node_size: 1,
        }
    }

    pub fn random_forest(trees: usize, mtry: usize, min_node_size: usize) -> Self {
        Self {
            trees,
            mtry: Some(mtry),
            min_node_size,
        }
    }
}

/// A fitted tree ensemble
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<DecisionTree>,
    /// Mean Gini decrease per predictor
    importance: Vec<f64>,
}

impl TreeEnsemble {
    /// Fit on a raw predictor matrix
    pub fn fit(x: &FeatureMatrix, labels: &[bool], params: EnsembleParams, seed: u64) -> Self {
        let binned = BinnedMatrix::from_matrix(x, DEFAULT_MAX_BINS);
        Self::fit_binned(&binned, labels, params, seed)
    }

    /// Fit on an already binned matrix.
    ///
    /// Tree `t` draws its bootstrap sample and split candidates from its own
    /// RNG seeded with `derive_seed(seed, t)`, so results do not depend on
    /// thread scheduling.
    pub fn fit_binned(binned: &BinnedMatrix, labels: &[bool], params: EnsembleParams, seed: u64) -> Self {
        let n = binned.n_rows();
        let p = binned.n_cols();
        let tree_params = TreeParams {
            mtry: params.mtry.unwrap_or(p).clamp(1, p.max(1)),
            min_node_size: params.min_node_size.max(1),
        };

        let fitted: Vec<(DecisionTree, Vec<f64>)> = (0..params.trees.max(1))
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(derive_seed(seed, t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut importance = vec![0.0; p];
                let tree = DecisionTree::fit(binned, labels, sample, tree_params, &mut rng, &mut importance);
                (tree, importance)
            })
            .collect();

        let count = fitted.len() as f64;
        let mut importance = vec![0.0; p];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, tree_importance) in fitted {
            for (total, v) in importance.iter_mut().zip(tree_importance) {
                *total += v / count;
            }
            trees.push(tree);
        }

        Self { trees, importance }
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Mean leaf probability across trees, per row
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        let count = self.trees.len() as f64;
        (0..x.n_rows())
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>() / count
            })
            .collect()
    }

    pub fn importance(&self) -> &[f64] {
        &self.importance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable(n: usize) -> (FeatureMatrix, Vec<bool>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![i as f64, ((i * 7) % 5) as f64])
            .collect();
        let labels = (0..n).map(|i| i < n / 3).collect();
        (FeatureMatrix::from_rows(&rows), labels)
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = separable(60);
        let params = EnsembleParams::random_forest(20, 1, 2);
        let a = TreeEnsemble::fit(&x, &y, params, 42);
        let b = TreeEnsemble::fit(&x, &y, params, 42);
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
        assert_eq!(a.importance(), b.importance());
    }

    #[test]
    fn test_bagging_learns_threshold() {
        let (x, y) = separable(60);
        let model = TreeEnsemble::fit(&x, &y, EnsembleParams::bagging(25), 7);
        assert_eq!(model.tree_count(), 25);
        let probs = model.predict_proba(&x);
        assert!(probs[0] > 0.5);
        assert!(probs[59] < 0.5);
    }

    #[test]
    fn test_informative_feature_ranks_first() {
        let (x, y) = separable(90);
        let model = TreeEnsemble::fit(&x, &y, EnsembleParams::random_forest(30, 2, 1), 3);
        let importance = model.importance();
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_probabilities_in_unit_interval() {
        let (x, y) = separable(30);
        let model = TreeEnsemble::fit(&x, &y, EnsembleParams::random_forest(10, 1, 5), 9);
        assert!(model
            .predict_proba(&x)
            .iter()
            .all(|p| (0.0..=1.0).contains(p)));
    }
}
