//! Hyperparameter grids and cross-validated grid search

use std::fmt;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

use super::split::Stratification;
use crate::pipeline::stats::mean_defined;

/// Model families compared by the trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Mars,
    Bagging,
    RandomForest,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 3] = [ModelFamily::Mars, ModelFamily::Bagging, ModelFamily::RandomForest];

    /// Fold assignment used when tuning this family
    pub fn stratification(self) -> Stratification {
        match self {
            ModelFamily::Mars => Stratification::Stratified,
            ModelFamily::Bagging | ModelFamily::RandomForest => Stratification::Unstratified,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Mars => write!(f, "MARS"),
            ModelFamily::Bagging => write!(f, "Bagged trees"),
            ModelFamily::RandomForest => write!(f, "Random forest"),
        }
    }
}

/// One point of a hyperparameter grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelConfig {
    Mars {
        nprune: usize,
        degree: usize,
    },
    Bagging {
        trees: usize,
    },
    RandomForest {
        trees: usize,
        mtry: usize,
        min_node_size: usize,
    },
}

impl ModelConfig {
    pub fn family(&self) -> ModelFamily {
        match self {
            ModelConfig::Mars { .. } => ModelFamily::Mars,
            ModelConfig::Bagging { .. } => ModelFamily::Bagging,
            ModelConfig::RandomForest { .. } => ModelFamily::RandomForest,
        }
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelConfig::Mars { nprune, degree } => write!(f, "nprune={}, degree={}", nprune, degree),
            ModelConfig::Bagging { trees } => write!(f, "trees={}", trees),
            ModelConfig::RandomForest {
                trees,
                mtry,
                min_node_size,
            } => write!(f, "trees={}, mtry={}, min_n={}", trees, mtry, min_node_size),
        }
    }
}

/// `levels` evenly spaced integers over `[lo, hi]`, rounded and de-duplicated
pub fn regular_levels(lo: usize, hi: usize, levels: usize) -> Vec<usize> {
    if levels <= 1 || hi <= lo {
        return vec![lo.min(hi)];
    }
    let step = (hi - lo) as f64 / (levels - 1) as f64;
    let mut values: Vec<usize> = (0..levels)
        .map(|k| ((lo as f64 + step * k as f64).round() as usize).clamp(lo, hi))
        .collect();
    values.dedup();
    values
}

/// Largest `nprune` in the spline grid
pub const MARS_MAX_NPRUNE: usize = 30;

/// Spline grid: nprune 1..=30 by degree 1..=2
pub fn mars_grid(levels: usize) -> Vec<ModelConfig> {
    let mut grid = Vec::new();
    for degree in regular_levels(1, 2, levels) {
        for nprune in regular_levels(1, MARS_MAX_NPRUNE, levels) {
            grid.push(ModelConfig::Mars { nprune, degree });
        }
    }
    grid
}

/// Tree counts tried for bagging
pub const BAGGING_TREES: [usize; 6] = [5, 25, 50, 100, 200, 300];

pub fn bagging_grid() -> Vec<ModelConfig> {
    BAGGING_TREES
        .iter()
        .map(|&trees| ModelConfig::Bagging { trees })
        .collect()
}

/// Forest grid: trees 5..=250, mtry 2..=19 (capped at the predictor count), min node size 1..=20
pub fn forest_grid(levels: usize, n_predictors: usize) -> Vec<ModelConfig> {
    let mtry_hi = 19.min(n_predictors).max(1);
    let mtry_lo = 2.min(mtry_hi);

    let mut grid = Vec::new();
    for min_node_size in regular_levels(1, 20, levels) {
        for mtry in regular_levels(mtry_lo, mtry_hi, levels) {
            for trees in regular_levels(5, 250, levels) {
                grid.push(ModelConfig::RandomForest {
                    trees,
                    mtry,
                    min_node_size,
                });
            }
        }
    }
    grid
}

/// Cross-validated score of one configuration
#[derive(Debug, Clone, Serialize)]
pub struct GridScore {
    pub config: ModelConfig,
    /// AUC per fold; `None` when the assessment fold held a single class
    pub fold_aucs: Vec<Option<f64>>,
    /// Mean of the defined fold AUCs; NaN when none is defined
    pub mean_auc: f64,
}

/// Score every configuration on every fold.
///
/// `evaluate(config_index, config, fold)` must be pure; trials run in
/// parallel and the progress bar, if given, is ticked once per trial.
pub fn grid_search<F>(
    grid: &[ModelConfig],
    folds: usize,
    evaluate: F,
    progress: Option<&ProgressBar>,
) -> Vec<GridScore>
where
    F: Fn(usize, &ModelConfig, usize) -> Option<f64> + Sync,
{
    let trials: Vec<Option<f64>> = (0..grid.len() * folds)
        .into_par_iter()
        .map(|trial| {
            let index = trial / folds;
            let auc = evaluate(index, &grid[index], trial % folds);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            auc
        })
        .collect();

    grid.iter()
        .zip(trials.chunks(folds.max(1)))
        .map(|(config, fold_aucs)| GridScore {
            config: *config,
            fold_aucs: fold_aucs.to_vec(),
            mean_auc: mean_defined(fold_aucs.iter().flatten().copied()).unwrap_or(f64::NAN),
        })
        .collect()
}

/// Highest mean AUC; ties keep the earlier configuration
pub fn best_score(scores: &[GridScore]) -> Option<&GridScore> {
    scores
        .iter()
        .filter(|s| s.mean_auc.is_finite())
        .fold(None, |best: Option<&GridScore>, s| match best {
            Some(b) if b.mean_auc >= s.mean_auc => Some(b),
            _ => Some(s),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::churn::split::vfold;

    fn left_count(fold_rows: &[usize], labels: &[bool]) -> usize {
        fold_rows.iter().filter(|&&i| labels[i]).count()
    }

    #[test]
    fn test_fold_stratification_per_family() {
        // 30 leavers among 100 rows: every stratified fold of 20 holds exactly 6
        let labels: Vec<bool> = (0..100).map(|i| i % 10 < 3).collect();

        let mut unstratified_differs = false;
        for seed in 0..10u64 {
            let mars = vfold(&labels, 5, ModelFamily::Mars.stratification(), seed).unwrap();
            for fold in &mars {
                assert_eq!(fold.assessment.len(), 20);
                assert_eq!(left_count(&fold.assessment, &labels), 6);
            }

            for family in [ModelFamily::Bagging, ModelFamily::RandomForest] {
                let folds = vfold(&labels, 5, family.stratification(), seed).unwrap();
                assert_eq!(folds, vfold(&labels, 5, Stratification::Unstratified, seed).unwrap());
                for fold in &folds {
                    assert_eq!(fold.assessment.len(), 20);
                    assert_eq!(fold.analysis.len(), 80);
                }
                if folds.iter().any(|f| left_count(&f.assessment, &labels) != 6) {
                    unstratified_differs = true;
                }
            }
        }
        assert!(unstratified_differs, "tree-family folds should not preserve the class ratio");
    }

    #[test]
    fn test_regular_levels() {
        assert_eq!(regular_levels(1, 2, 25), vec![1, 2]);
        assert_eq!(regular_levels(5, 250, 5), vec![5, 66, 128, 189, 250]);
        assert_eq!(regular_levels(3, 3, 5), vec![3]);
    }

    #[test]
    fn test_mars_grid_within_bounds() {
        let grid = mars_grid(25);
        assert_eq!(grid.len(), 50);
        for config in &grid {
            match *config {
                ModelConfig::Mars { nprune, degree } => {
                    assert!((1..=30).contains(&nprune));
                    assert!((1..=2).contains(&degree));
                }
                _ => panic!("unexpected config {:?}", config),
            }
        }
    }

    #[test]
    fn test_forest_grid_caps_mtry() {
        let grid = forest_grid(5, 4);
        assert!(grid.iter().all(|c| matches!(
            c,
            ModelConfig::RandomForest { mtry, .. } if (2..=4).contains(mtry)
        )));
        assert_eq!(forest_grid(5, 30).len(), 125);
    }

    #[test]
    fn test_grid_search_picks_maximum_mean() {
        let grid = bagging_grid();
        let scores = grid_search(
            &grid,
            3,
            |index, _, fold| Some(0.5 + index as f64 * 0.01 + fold as f64 * 0.001),
            None,
        );
        assert_eq!(scores.len(), grid.len());
        let best = best_score(&scores).unwrap();
        assert_eq!(best.config, ModelConfig::Bagging { trees: 300 });
        let max = scores.iter().map(|s| s.mean_auc).fold(f64::MIN, f64::max);
        assert_eq!(best.mean_auc, max);
    }

    #[test]
    fn test_ties_keep_grid_order() {
        let grid = bagging_grid();
        let scores = grid_search(&grid, 2, |_, _, _| Some(0.8), None);
        assert_eq!(best_score(&scores).unwrap().config, grid[0]);
    }

    #[test]
    fn test_undefined_folds_are_skipped() {
        let grid = vec![ModelConfig::Bagging { trees: 5 }, ModelConfig::Bagging { trees: 25 }];
        let scores = grid_search(
            &grid,
            2,
            |index, _, fold| if index == 0 { None } else { Some(0.6 + fold as f64 * 0.2) },
            None,
        );
        assert!(scores[0].mean_auc.is_nan());
        assert!((scores[1].mean_auc - 0.7).abs() < 1e-12);
        assert_eq!(best_score(&scores).unwrap().config, grid[1]);
    }
}
