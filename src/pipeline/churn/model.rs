//! Common interface over the fitted churn classifiers

use super::customers::FeatureMatrix;
use super::ensemble::TreeEnsemble;
use super::mars::MarsModel;

/// A fitted binary classifier scoring the probability of `Left`
pub trait Classifier {
    /// Probability of `Left` for each row of a raw predictor matrix
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64>;

    /// Importance per original predictor
    fn feature_importance(&self) -> Vec<f64>;
}

impl Classifier for MarsModel {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        MarsModel::predict_proba(self, x)
    }

    fn feature_importance(&self) -> Vec<f64> {
        self.importance().to_vec()
    }
}

impl Classifier for TreeEnsemble {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        TreeEnsemble::predict_proba(self, x)
    }

    fn feature_importance(&self) -> Vec<f64> {
        self.importance().to_vec()
    }
}

/// The model refit on the full training set
#[derive(Debug, Clone)]
pub enum FittedModel {
    Mars(MarsModel),
    Ensemble(TreeEnsemble),
}

impl FittedModel {
    /// Retained basis terms of a spline model, or trees of an ensemble
    pub fn size(&self) -> usize {
        match self {
            FittedModel::Mars(m) => m.term_count(),
            FittedModel::Ensemble(e) => e.tree_count(),
        }
    }
}

impl Classifier for FittedModel {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        match self {
            FittedModel::Mars(m) => Classifier::predict_proba(m, x),
            FittedModel::Ensemble(e) => Classifier::predict_proba(e, x),
        }
    }

    fn feature_importance(&self) -> Vec<f64> {
        match self {
            FittedModel::Mars(m) => m.feature_importance(),
            FittedModel::Ensemble(e) => e.feature_importance(),
        }
    }
}
