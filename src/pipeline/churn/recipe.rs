//! Preprocessing for the spline model
//!
//! Categorical predictors are expanded to dummy columns (first level
//! dropped). Numeric predictors get a Yeo-Johnson power transform followed
//! by standardisation. All parameters are estimated on the data passed to
//! [`Recipe::estimate`] and reused by [`Recipe::apply`].

use serde::Serialize;

use super::customers::{FeatureMatrix, Predictor, PredictorKind};

/// Search interval for the Yeo-Johnson lambda
const LAMBDA_RANGE: (f64, f64) = (-5.0, 5.0);

const GOLDEN_TOLERANCE: f64 = 1e-6;

/// Yeo-Johnson transform of a single value
pub fn yeo_johnson(x: f64, lambda: f64) -> f64 {
    const EPS: f64 = 1e-10;
    if x >= 0.0 {
        if lambda.abs() < EPS {
            x.ln_1p()
        } else {
            ((x + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < EPS {
        -(-x).ln_1p()
    } else {
        -((1.0 - x).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

/// Profile log-likelihood of the Yeo-Johnson transform under normality
fn yeo_johnson_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| yeo_johnson(x, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let var = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if var <= 0.0 || !var.is_finite() {
        return f64::NEG_INFINITY;
    }
    let jacobian: f64 = values.iter().map(|&x| x.signum() * x.abs().ln_1p()).sum();
    -0.5 * n * var.ln() + (lambda - 1.0) * jacobian
}

/// Maximum-likelihood lambda by golden-section search.
///
/// Returns 1.0 (identity) for constant or near-empty columns.
pub fn estimate_lambda(values: &[f64]) -> f64 {
    let distinct = values
        .iter()
        .any(|&v| (v - values[0]).abs() > f64::EPSILON);
    if values.len() < 3 || !distinct {
        return 1.0;
    }

    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = LAMBDA_RANGE;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let mut fc = yeo_johnson_log_likelihood(values, c);
    let mut fd = yeo_johnson_log_likelihood(values, d);

    while (b - a) > GOLDEN_TOLERANCE {
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = yeo_johnson_log_likelihood(values, c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = yeo_johnson_log_likelihood(values, d);
        }
    }
    (a + b) / 2.0
}

/// How one output column is derived from a source predictor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ColumnStep {
    Normalized {
        source: usize,
        lambda: f64,
        mean: f64,
        sd: f64,
    },
    Dummy {
        source: usize,
        level: usize,
    },
}

impl ColumnStep {
    pub fn source(&self) -> usize {
        match self {
            ColumnStep::Normalized { source, .. } | ColumnStep::Dummy { source, .. } => *source,
        }
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, ColumnStep::Dummy { .. })
    }

    fn apply(&self, x: &FeatureMatrix) -> Vec<f64> {
        match *self {
            ColumnStep::Normalized {
                source,
                lambda,
                mean,
                sd,
            } => x.columns[source]
                .iter()
                .map(|&v| (yeo_johnson(v, lambda) - mean) / sd)
                .collect(),
            ColumnStep::Dummy { source, level } => x.columns[source]
                .iter()
                .map(|&v| if v.round() as usize == level { 1.0 } else { 0.0 })
                .collect(),
        }
    }
}

/// Estimated preprocessing steps
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    pub steps: Vec<ColumnStep>,
    pub names: Vec<String>,
}

impl Recipe {
    /// Estimate transform parameters from `x`
    pub fn estimate(predictors: &[Predictor], x: &FeatureMatrix) -> Self {
        let mut steps = Vec::new();
        let mut names = Vec::new();

        for (source, predictor) in predictors.iter().enumerate() {
            match &predictor.kind {
                PredictorKind::Numeric => {
                    let values = &x.columns[source];
                    let lambda = estimate_lambda(values);
                    let transformed: Vec<f64> =
                        values.iter().map(|&v| yeo_johnson(v, lambda)).collect();
                    let (mean, sd) = mean_sd(&transformed);
                    steps.push(ColumnStep::Normalized {
                        source,
                        lambda,
                        mean,
                        sd,
                    });
                    names.push(predictor.name.clone());
                }
                PredictorKind::Categorical { levels } => {
                    for (level, value) in levels.iter().enumerate().skip(1) {
                        steps.push(ColumnStep::Dummy { source, level });
                        names.push(format!("{}_{}", predictor.name, value));
                    }
                }
            }
        }

        Self { steps, names }
    }

    /// Transform a raw predictor matrix
    pub fn apply(&self, x: &FeatureMatrix) -> FeatureMatrix {
        FeatureMatrix::from_columns(self.steps.iter().map(|s| s.apply(x)).collect())
    }

    /// Which output columns are 0/1 indicators
    pub fn dummy_mask(&self) -> Vec<bool> {
        self.steps.iter().map(ColumnStep::is_dummy).collect()
    }
}

/// Sample mean and standard deviation; a zero deviation is reported as 1
fn mean_sd(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let mean = values.iter().sum::<f64>() / n;
    let var = if values.len() > 1 {
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let sd = var.sqrt();
    (mean, if sd > 0.0 && sd.is_finite() { sd } else { 1.0 })
}
