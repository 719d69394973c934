//! Churn model training
//!
//! Each stage returns the value the next stage consumes, so the order
//! split, resample, search, select, fit cannot be skipped or reversed:
//!
//! ```text
//! split_data -> SplitData
//!   -> prepare_family -> PreparedFamily -> search -> FamilySearch
//!   -> select_model -> SelectedModel -> fit -> FinalModel
//! ```

use std::fmt;

use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

use super::customers::{CustomerTable, FeatureMatrix, Predictor};
use super::ensemble::{EnsembleParams, TreeEnsemble};
use super::grid::{
    bagging_grid, best_score, forest_grid, grid_search, mars_grid, GridScore, ModelConfig, ModelFamily,
    MARS_MAX_NPRUNE,
};
use super::mars::{MarsModel, MarsParams, MarsPath, MIN_FORWARD_TERMS};
use super::metrics::roc_auc;
use super::model::FittedModel;
use super::recipe::Recipe;
use super::split::{derive_seed, stratified_split, streams, vfold, Split};
use super::tree::{BinnedMatrix, DEFAULT_MAX_BINS};
use crate::pipeline::error::AnalysisError;

/// Training settings
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOptions {
    pub seed: u64,
    pub train_fraction: f64,
    pub folds: usize,
    /// Levels per parameter of the spline grid
    pub mars_levels: usize,
    /// Levels per parameter of the random forest grid
    pub forest_levels: usize,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            seed: 123,
            train_fraction: 0.7,
            folds: 5,
            mars_levels: 25,
            forest_levels: 5,
        }
    }
}

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Split,
    RecipeBuilt,
    GridSearched,
    ModelSelected,
    FinalFit,
    Evaluated,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Split => "Train/test split",
            Stage::RecipeBuilt => "Resampling and preprocessing",
            Stage::GridSearched => "Grid search",
            Stage::ModelSelected => "Model selection",
            Stage::FinalFit => "Final fit",
            Stage::Evaluated => "Evaluation",
        };
        write!(f, "{}", name)
    }
}

/// Forward-pass budget shared by tuning and the final spline fit
pub fn mars_max_terms() -> usize {
    (MARS_MAX_NPRUNE + 1).max(MIN_FORWARD_TERMS)
}

/// Training and test partitions of the customer table
#[derive(Debug, Clone)]
pub struct SplitData {
    pub predictors: Vec<Predictor>,
    pub split: Split,
    pub train_x: FeatureMatrix,
    pub train_y: Vec<bool>,
    pub test_x: FeatureMatrix,
    pub test_y: Vec<bool>,
    pub test_monthly_charges: Vec<f64>,
}

/// Stratified train/test split of the whole table
pub fn split_data(table: &CustomerTable, options: &TrainingOptions) -> Result<SplitData, AnalysisError> {
    if table.is_empty() {
        return Err(AnalysisError::EmptyInput("customer table".to_string()));
    }
    let labels = table.left_flags();
    if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
        return Err(AnalysisError::SingleClass("Status".to_string()));
    }

    let split = stratified_split(&labels, options.train_fraction, derive_seed(options.seed, streams::SPLIT))?;
    if split.train.len() < options.folds {
        return Err(AnalysisError::TooFewRows {
            rows: split.train.len(),
            folds: options.folds,
        });
    }

    Ok(SplitData {
        predictors: table.predictors.clone(),
        train_x: table.features.select_rows(&split.train),
        train_y: split.train.iter().map(|&i| labels[i]).collect(),
        test_x: table.features.select_rows(&split.test),
        test_y: split.test.iter().map(|&i| labels[i]).collect(),
        test_monthly_charges: split
            .test
            .iter()
            .map(|&i| table.records[i].monthly_charges)
            .collect(),
        split,
    })
}

/// Per-fold data prepared once and shared by every configuration
#[derive(Debug)]
enum FoldCache {
    Mars {
        assessment: FeatureMatrix,
        /// One elimination path per interaction degree, indexed by `degree - 1`
        paths: Vec<MarsPath>,
    },
    Trees {
        analysis: BinnedMatrix,
        assessment: FeatureMatrix,
    },
}

#[derive(Debug)]
struct FoldData {
    analysis_y: Vec<bool>,
    assessment_y: Vec<bool>,
    cache: FoldCache,
}

/// A family with its grid and resampled training data
#[derive(Debug)]
pub struct PreparedFamily {
    family: ModelFamily,
    grid: Vec<ModelConfig>,
    folds: Vec<FoldData>,
    trial_seed: u64,
}

/// Resample the training set for one family and precompute fold data
pub fn prepare_family(
    data: &SplitData,
    family: ModelFamily,
    options: &TrainingOptions,
) -> Result<PreparedFamily, AnalysisError> {
    let grid = match family {
        ModelFamily::Mars => mars_grid(options.mars_levels),
        ModelFamily::Bagging => bagging_grid(),
        ModelFamily::RandomForest => forest_grid(options.forest_levels, data.predictors.len()),
    };
    if grid.is_empty() {
        return Err(AnalysisError::EmptyGrid(family.to_string()));
    }

    let folds = vfold(
        &data.train_y,
        options.folds,
        family.stratification(),
        derive_seed(options.seed, streams::FOLDS),
    )?;

    let max_degree = grid
        .iter()
        .filter_map(|c| match c {
            ModelConfig::Mars { degree, .. } => Some(*degree),
            _ => None,
        })
        .max()
        .unwrap_or(1);

    let folds = folds
        .into_par_iter()
        .map(|fold| -> Result<FoldData, AnalysisError> {
            let analysis_x = data.train_x.select_rows(&fold.analysis);
            let analysis_y: Vec<bool> = fold.analysis.iter().map(|&i| data.train_y[i]).collect();
            let assessment_x = data.train_x.select_rows(&fold.assessment);
            let assessment_y: Vec<bool> = fold.assessment.iter().map(|&i| data.train_y[i]).collect();

            let cache = match family {
                ModelFamily::Mars => {
                    let recipe = Recipe::estimate(&data.predictors, &analysis_x);
                    let transformed = recipe.apply(&analysis_x);
                    let response: Vec<f64> = analysis_y.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
                    let dummy = recipe.dummy_mask();
                    let paths = (1..=max_degree)
                        .map(|degree| MarsPath::build(&transformed, &response, &dummy, degree, mars_max_terms()))
                        .collect::<Result<Vec<_>, _>>()?;
                    FoldCache::Mars {
                        assessment: recipe.apply(&assessment_x),
                        paths,
                    }
                }
                ModelFamily::Bagging | ModelFamily::RandomForest => FoldCache::Trees {
                    analysis: BinnedMatrix::from_matrix(&analysis_x, DEFAULT_MAX_BINS),
                    assessment: assessment_x,
                },
            };

            Ok(FoldData {
                analysis_y,
                assessment_y,
                cache,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PreparedFamily {
        family,
        grid,
        folds,
        trial_seed: derive_seed(options.seed, streams::TRIALS),
    })
}

impl PreparedFamily {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Number of (configuration, fold) trials
    pub fn trial_count(&self) -> usize {
        self.grid.len() * self.folds.len()
    }

    /// Score one configuration on one fold
    fn evaluate(&self, index: usize, config: &ModelConfig, fold: usize) -> Option<f64> {
        let data = &self.folds[fold];
        let seed = derive_seed(self.trial_seed, (index * self.folds.len() + fold) as u64);

        let probabilities = match (config, &data.cache) {
            (ModelConfig::Mars { nprune, degree }, FoldCache::Mars { assessment, paths }) => {
                let path = paths.get(degree.checked_sub(1)?)?;
                path.select(*nprune).ok()?.predict(assessment)
            }
            (ModelConfig::Bagging { trees }, FoldCache::Trees { analysis, assessment }) => {
                TreeEnsemble::fit_binned(analysis, &data.analysis_y, EnsembleParams::bagging(*trees), seed)
                    .predict_proba(assessment)
            }
            (
                ModelConfig::RandomForest {
                    trees,
                    mtry,
                    min_node_size,
                },
                FoldCache::Trees { analysis, assessment },
            ) => TreeEnsemble::fit_binned(
                analysis,
                &data.analysis_y,
                EnsembleParams::random_forest(*trees, *mtry, *min_node_size),
                seed,
            )
            .predict_proba(assessment),
            _ => return None,
        };

        roc_auc(&probabilities, &data.assessment_y)
    }

    /// Cross-validate every configuration of the grid
    pub fn search(self, progress: Option<&ProgressBar>) -> FamilySearch {
        let scores = grid_search(
            &self.grid,
            self.folds.len(),
            |index, config, fold| self.evaluate(index, config, fold),
            progress,
        );
        FamilySearch {
            family: self.family,
            scores,
        }
    }
}

/// Grid search results for one family
#[derive(Debug, Clone, Serialize)]
pub struct FamilySearch {
    pub family: ModelFamily,
    pub scores: Vec<GridScore>,
}

impl FamilySearch {
    pub fn best(&self) -> Option<&GridScore> {
        best_score(&self.scores)
    }

    /// Up to `n` configurations by descending mean AUC
    pub fn top(&self, n: usize) -> Vec<&GridScore> {
        let mut ranked: Vec<&GridScore> = self.scores.iter().filter(|s| s.mean_auc.is_finite()).collect();
        ranked.sort_by(|a, b| b.mean_auc.total_cmp(&a.mean_auc));
        ranked.truncate(n);
        ranked
    }
}

/// The winning family and configuration; fixed once chosen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedModel {
    family: ModelFamily,
    config: ModelConfig,
    cv_auc: f64,
}

/// Best configuration across families; ties keep the earlier family
pub fn select_model(searches: &[FamilySearch]) -> Result<SelectedModel, AnalysisError> {
    let mut selected: Option<SelectedModel> = None;
    for search in searches {
        if let Some(best) = search.best() {
            if selected.as_ref().map_or(true, |s| best.mean_auc > s.cv_auc) {
                selected = Some(SelectedModel {
                    family: search.family,
                    config: best.config,
                    cv_auc: best.mean_auc,
                });
            }
        }
    }
    selected.ok_or_else(|| AnalysisError::EmptyGrid("no configuration produced a cross-validated AUC".to_string()))
}

impl SelectedModel {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn config(&self) -> ModelConfig {
        self.config
    }

    /// Mean cross-validated AUC of the chosen configuration
    pub fn cv_auc(&self) -> f64 {
        self.cv_auc
    }

    /// Refit the chosen configuration on the whole training set
    pub fn fit(self, data: &SplitData, options: &TrainingOptions) -> Result<FinalModel, AnalysisError> {
        let seed = derive_seed(options.seed, streams::FINAL_FIT);
        let model = match self.config {
            ModelConfig::Mars { nprune, degree } => FittedModel::Mars(MarsModel::fit(
                &data.predictors,
                &data.train_x,
                &data.train_y,
                MarsParams { nprune, degree },
                mars_max_terms(),
            )?),
            ModelConfig::Bagging { trees } => FittedModel::Ensemble(TreeEnsemble::fit(
                &data.train_x,
                &data.train_y,
                EnsembleParams::bagging(trees),
                seed,
            )),
            ModelConfig::RandomForest {
                trees,
                mtry,
                min_node_size,
            } => FittedModel::Ensemble(TreeEnsemble::fit(
                &data.train_x,
                &data.train_y,
                EnsembleParams::random_forest(trees, mtry, min_node_size),
                seed,
            )),
        };

        Ok(FinalModel { selected: self, model })
    }
}

/// Selected configuration refit on the training set
#[derive(Debug, Clone)]
pub struct FinalModel {
    pub selected: SelectedModel,
    pub model: FittedModel,
}

/// Every training stage without console output
pub fn train(table: &CustomerTable, options: &TrainingOptions) -> Result<(SplitData, Vec<FamilySearch>, FinalModel), AnalysisError> {
    let data = split_data(table, options)?;
    let searches = ModelFamily::ALL
        .iter()
        .map(|&family| -> Result<FamilySearch, AnalysisError> {
            Ok(prepare_family(&data, family, options)?.search(None))
        })
        .collect::<Result<Vec<_>, AnalysisError>>()?;
    let model = select_model(&searches)?.fit(&data, options)?;
    Ok((data, searches, model))
}
