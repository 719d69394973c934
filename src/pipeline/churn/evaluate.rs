//! Held-out evaluation of the final churn model

use serde::Serialize;

use super::grid::{ModelConfig, ModelFamily};
use super::metrics::{revenue_loss_ratio, roc_auc, ConfusionMatrix};
use super::model::Classifier;
use super::trainer::{FinalModel, SplitData};

/// One predictor's share in the final model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceEntry {
    pub feature: String,
    pub importance: f64,
    /// Importance relative to the top predictor, 0..=100
    pub scaled: f64,
}

/// Test-set results of the selected model
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub family: ModelFamily,
    pub config: ModelConfig,
    /// Basis terms kept by the spline model, or trees in the ensemble
    pub model_size: usize,
    pub cv_auc: f64,
    pub test_auc: Option<f64>,
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    /// All predictors, most important first
    pub importance: Vec<ImportanceEntry>,
    /// Share of test-set monthly charges from customers predicted to leave
    pub revenue_at_risk: f64,
    pub test_rows: usize,
}

/// Score the test set and rank predictors
pub fn evaluate(model: &FinalModel, data: &SplitData, threshold: f64) -> Evaluation {
    let probabilities = model.model.predict_proba(&data.test_x);
    let confusion = ConfusionMatrix::from_probabilities(&probabilities, &data.test_y, threshold);
    let predicted_left: Vec<bool> = probabilities.iter().map(|&p| p >= threshold).collect();

    Evaluation {
        family: model.selected.family(),
        config: model.selected.config(),
        model_size: model.model.size(),
        cv_auc: model.selected.cv_auc(),
        test_auc: roc_auc(&probabilities, &data.test_y),
        threshold,
        accuracy: confusion.accuracy(),
        sensitivity: confusion.sensitivity(),
        specificity: confusion.specificity(),
        confusion,
        importance: rank_importance(
            &data.predictors.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
            &model.model.feature_importance(),
        ),
        revenue_at_risk: revenue_loss_ratio(&data.test_monthly_charges, &predicted_left),
        test_rows: data.test_y.len(),
    }
}

/// Pair names with importances, sorted descending (stable for ties)
pub fn rank_importance(names: &[String], importance: &[f64]) -> Vec<ImportanceEntry> {
    let max = importance.iter().copied().fold(0.0, f64::max);
    let mut entries: Vec<ImportanceEntry> = names
        .iter()
        .zip(importance)
        .map(|(name, &value)| ImportanceEntry {
            feature: name.clone(),
            importance: value,
            scaled: if max > 0.0 { value / max * 100.0 } else { 0.0 },
        })
        .collect();
    entries.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    entries
}
