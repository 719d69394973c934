//! Multivariate adaptive regression splines for a 0/1 response
//!
//! The forward pass greedily adds mirrored hinge pairs `max(0, x - t)` and
//! `max(0, t - x)` (or the indicator itself for dummy columns), each
//! multiplied by an existing term, scoring candidates by how much residual
//! sum of squares they remove. The backward pass drops terms one at a time
//! and the nested subset with the best generalised cross-validation score,
//! within the term budget, is kept.
//!
//! Fitted values are clamped to [0, 1] and read as the probability of `Left`.

use faer::Mat;
use serde::Serialize;

use super::customers::{FeatureMatrix, Predictor};
use super::recipe::Recipe;
use crate::pipeline::error::AnalysisError;

/// Candidate knots per predictor (interior quantiles)
const KNOTS_PER_PREDICTOR: usize = 10;

/// Forward pass stops when the best candidate removes less than this share of the total sum of squares
const FORWARD_THRESHOLD: f64 = 0.001;

/// Ridge added to the normal equations, relative to their largest diagonal entry
const RIDGE: f64 = 1e-9;

/// Smallest forward-pass budget, whatever the pruning budget
pub const MIN_FORWARD_TERMS: usize = 21;

/// Spline model hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarsParams {
    /// Maximum number of terms kept after pruning (intercept included)
    pub nprune: usize,
    /// Maximum interaction degree
    pub degree: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HingeDirection {
    /// `max(0, x - knot)`
    Above,
    /// `max(0, knot - x)`
    Below,
    /// `x` itself, for 0/1 columns
    Indicator,
}

/// One factor of a basis term
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hinge {
    pub var: usize,
    pub knot: f64,
    pub direction: HingeDirection,
}

impl Hinge {
    fn eval(&self, x: f64) -> f64 {
        match self.direction {
            HingeDirection::Above => (x - self.knot).max(0.0),
            HingeDirection::Below => (self.knot - x).max(0.0),
            HingeDirection::Indicator => x,
        }
    }
}

/// Product of hinges; the empty product is the intercept
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BasisTerm {
    pub factors: Vec<Hinge>,
}

impl BasisTerm {
    pub fn degree(&self) -> usize {
        self.factors.len()
    }

    fn uses(&self, var: usize) -> bool {
        self.factors.iter().any(|h| h.var == var)
    }

    fn with(&self, hinge: Hinge) -> Self {
        let mut factors = self.factors.clone();
        factors.push(hinge);
        Self { factors }
    }

    pub fn eval(&self, x: &FeatureMatrix) -> Vec<f64> {
        (0..x.n_rows())
            .map(|i| {
                self.factors
                    .iter()
                    .map(|h| h.eval(x.get(i, h.var)))
                    .product()
            })
            .collect()
    }
}

/// Normal equations of a basis against the response
#[derive(Debug, Clone)]
struct NormalEquations {
    gram: Vec<Vec<f64>>,
    xty: Vec<f64>,
    yty: f64,
}

impl NormalEquations {
    fn new(basis: &[Vec<f64>], y: &[f64]) -> Self {
        let n = y.len();
        let k = basis.len();

        let mut b = Mat::<f64>::zeros(n, k);
        for (j, column) in basis.iter().enumerate() {
            for (i, &v) in column.iter().enumerate() {
                b[(i, j)] = v;
            }
        }
        let mut yv = Mat::<f64>::zeros(n, 1);
        for (i, &v) in y.iter().enumerate() {
            yv[(i, 0)] = v;
        }

        let gram_mat = b.transpose() * &b;
        let xty_mat = b.transpose() * &yv;

        Self {
            gram: (0..k)
                .map(|i| (0..k).map(|j| gram_mat[(i, j)]).collect())
                .collect(),
            xty: (0..k).map(|i| xty_mat[(i, 0)]).collect(),
            yty: y.iter().map(|v| v * v).sum(),
        }
    }

    /// Coefficients and RSS for the terms in `subset`
    fn solve(&self, subset: &[usize]) -> Option<(Vec<f64>, f64)> {
        let a: Vec<Vec<f64>> = subset
            .iter()
            .map(|&i| subset.iter().map(|&j| self.gram[i][j]).collect())
            .collect();
        let rhs: Vec<f64> = subset.iter().map(|&i| self.xty[i]).collect();
        let beta = solve_linear_system(a, rhs)?;
        let explained: f64 = beta.iter().zip(subset).map(|(b, &i)| b * self.xty[i]).sum();
        Some((beta, (self.yty - explained).max(0.0)))
    }
}

/// Gaussian elimination with partial pivoting and a small ridge on the diagonal
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let k = b.len();
    let scale = (0..k).map(|i| a[i][i].abs()).fold(0.0, f64::max).max(1.0);
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += RIDGE * scale;
    }

    for col in 0..k {
        let pivot = (col..k).max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))?;
        if a[pivot][col].abs() < 1e-14 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..k {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..k {
                a[row][c] -= factor * a[col][c];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; k];
    for row in (0..k).rev() {
        let tail: f64 = (row + 1..k).map(|c| a[row][c] * x[c]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

/// Interior quantile knots of a column, excluding its maximum
fn candidate_knots(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let Some(&max) = sorted.last() else {
        return Vec::new();
    };
    let n = sorted.len();
    let mut knots: Vec<f64> = (1..=KNOTS_PER_PREDICTOR)
        .map(|k| sorted[(k * (n - 1)) / (KNOTS_PER_PREDICTOR + 1)])
        .filter(|&t| t < max)
        .collect();
    knots.dedup();
    knots
}

#[derive(Debug, Clone, Copy)]
enum CandidateShape {
    Pair,
    AboveOnly,
    BelowOnly,
    Indicator,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    parent: usize,
    var: usize,
    knot: f64,
    shape: CandidateShape,
    reduction: f64,
}

/// Centred cross-products of up to two candidate columns against the residual
#[derive(Default)]
struct CandidateSums {
    s1: f64,
    s2: f64,
    s11: f64,
    s22: f64,
    s12: f64,
    g1: f64,
    g2: f64,
}

impl CandidateSums {
    fn centred(self, n: f64, residual_sum: f64) -> [f64; 5] {
        [
            self.s11 - self.s1 * self.s1 / n,
            self.s22 - self.s2 * self.s2 / n,
            self.s12 - self.s1 * self.s2 / n,
            self.g1 - self.s1 * residual_sum / n,
            self.g2 - self.s2 * residual_sum / n,
        ]
    }
}

/// Best reduction from a hinge pair, falling back to the better single hinge
fn pair_reduction(c: [f64; 5]) -> (f64, CandidateShape) {
    let [c11, c22, c12, g1, g2] = c;
    let single1 = if c11 > 1e-12 { g1 * g1 / c11 } else { 0.0 };
    let single2 = if c22 > 1e-12 { g2 * g2 / c22 } else { 0.0 };
    let det = c11 * c22 - c12 * c12;

    if c11 > 1e-12 && c22 > 1e-12 && det > 1e-10 * c11 * c22 {
        let pair = (c22 * g1 * g1 - 2.0 * c12 * g1 * g2 + c11 * g2 * g2) / det;
        (pair, CandidateShape::Pair)
    } else if single1 >= single2 {
        (single1, CandidateShape::AboveOnly)
    } else {
        (single2, CandidateShape::BelowOnly)
    }
}

/// Terms added by the forward pass with the RSS reduction credited to each
#[derive(Debug, Clone)]
pub struct ForwardPass {
    pub terms: Vec<BasisTerm>,
    pub gains: Vec<f64>,
}

/// Greedy forward pass on a transformed matrix
pub fn forward_pass(
    x: &FeatureMatrix,
    y: &[f64],
    dummy: &[bool],
    degree: usize,
    max_terms: usize,
) -> Result<ForwardPass, AnalysisError> {
    let n = x.n_rows();
    let nf = n as f64;
    let mut terms = vec![BasisTerm::default()];
    let mut gains = vec![0.0];
    let mut basis = vec![vec![1.0; n]];

    if n == 0 {
        return Ok(ForwardPass { terms, gains });
    }

    let mean = y.iter().sum::<f64>() / nf;
    let tss: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let mut residual: Vec<f64> = y.iter().map(|v| v - mean).collect();
    if tss <= 0.0 {
        return Ok(ForwardPass { terms, gains });
    }

    let knots: Vec<Vec<f64>> = x.columns.iter().map(|c| candidate_knots(c)).collect();

    while terms.len() < max_terms {
        let residual_sum: f64 = residual.iter().sum();
        let mut best: Option<Candidate> = None;

        for (parent, term) in terms.iter().enumerate() {
            if term.degree() >= degree {
                continue;
            }
            let parent_values = &basis[parent];

            for var in 0..x.n_cols() {
                if term.uses(var) {
                    continue;
                }
                let column = &x.columns[var];

                if dummy[var] {
                    let mut sums = CandidateSums::default();
                    for i in 0..n {
                        let b = parent_values[i] * column[i];
                        sums.s1 += b;
                        sums.s11 += b * b;
                        sums.g1 += b * residual[i];
                    }
                    let [c11, _, _, g1, _] = sums.centred(nf, residual_sum);
                    let reduction = if c11 > 1e-12 { g1 * g1 / c11 } else { 0.0 };
                    consider(&mut best, Candidate {
                        parent,
                        var,
                        knot: 0.0,
                        shape: CandidateShape::Indicator,
                        reduction,
                    });
                    continue;
                }

                for &knot in &knots[var] {
                    let mut sums = CandidateSums::default();
                    for i in 0..n {
                        let p = parent_values[i];
                        if p == 0.0 {
                            continue;
                        }
                        let b1 = p * (column[i] - knot).max(0.0);
                        let b2 = p * (knot - column[i]).max(0.0);
                        sums.s1 += b1;
                        sums.s2 += b2;
                        sums.s11 += b1 * b1;
                        sums.s22 += b2 * b2;
                        sums.s12 += b1 * b2;
                        sums.g1 += b1 * residual[i];
                        sums.g2 += b2 * residual[i];
                    }
                    let (reduction, shape) = pair_reduction(sums.centred(nf, residual_sum));
                    consider(&mut best, Candidate {
                        parent,
                        var,
                        knot,
                        shape,
                        reduction,
                    });
                }
            }
        }

        let Some(candidate) = best else { break };
        if candidate.reduction < FORWARD_THRESHOLD * tss {
            break;
        }

        let parent = terms[candidate.parent].clone();
        let hinge = |direction| Hinge {
            var: candidate.var,
            knot: candidate.knot,
            direction,
        };
        let mut new_terms = match candidate.shape {
            CandidateShape::Pair => vec![
                parent.with(hinge(HingeDirection::Above)),
                parent.with(hinge(HingeDirection::Below)),
            ],
            CandidateShape::AboveOnly => vec![parent.with(hinge(HingeDirection::Above))],
            CandidateShape::BelowOnly => vec![parent.with(hinge(HingeDirection::Below))],
            CandidateShape::Indicator => vec![parent.with(hinge(HingeDirection::Indicator))],
        };
        new_terms.truncate(max_terms - terms.len());

        let share = candidate.reduction / new_terms.len() as f64;
        for term in new_terms {
            basis.push(term.eval(x));
            terms.push(term);
            gains.push(share);
        }

        let normal = NormalEquations::new(&basis, y);
        let all: Vec<usize> = (0..basis.len()).collect();
        let (beta, _) = normal
            .solve(&all)
            .ok_or_else(|| AnalysisError::Singular("spline forward pass".to_string()))?;
        for (i, r) in residual.iter_mut().enumerate() {
            let fitted: f64 = basis.iter().zip(&beta).map(|(b, c)| b[i] * c).sum();
            *r = y[i] - fitted;
        }
    }

    Ok(ForwardPass { terms, gains })
}

fn consider(best: &mut Option<Candidate>, candidate: Candidate) {
    if candidate.reduction.is_finite()
        && best.as_ref().map_or(true, |b| candidate.reduction > b.reduction)
    {
        *best = Some(candidate);
    }
}

/// Forward terms plus the backward-elimination sequence, reusable for any `nprune`
#[derive(Debug, Clone)]
pub struct MarsPath {
    forward: ForwardPass,
    normal: NormalEquations,
    /// `subsets[s - 1]` is the best subset of size `s` found by elimination
    subsets: Vec<Vec<usize>>,
    rss: Vec<f64>,
    degree: usize,
    n: usize,
}

impl MarsPath {
    pub fn build(
        x: &FeatureMatrix,
        y: &[f64],
        dummy: &[bool],
        degree: usize,
        max_terms: usize,
    ) -> Result<Self, AnalysisError> {
        let forward = forward_pass(x, y, dummy, degree, max_terms)?;
        let basis: Vec<Vec<f64>> = forward.terms.iter().map(|t| t.eval(x)).collect();
        let normal = NormalEquations::new(&basis, y);

        let mut current: Vec<usize> = (0..forward.terms.len()).collect();
        let (_, full_rss) = normal
            .solve(&current)
            .ok_or_else(|| AnalysisError::Singular("spline backward pass".to_string()))?;
        let mut subsets = vec![current.clone()];
        let mut rss = vec![full_rss];

        while current.len() > 1 {
            let removal = (1..current.len())
                .filter_map(|pos| {
                    let mut candidate = current.clone();
                    candidate.remove(pos);
                    normal.solve(&candidate).map(|(_, r)| (candidate, r))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let Some((next, next_rss)) = removal else { break };
            current = next;
            subsets.push(current.clone());
            rss.push(next_rss);
        }

        subsets.reverse();
        rss.reverse();

        Ok(Self {
            forward,
            normal,
            subsets,
            rss,
            degree,
            n: x.n_rows(),
        })
    }

    /// Number of terms produced by the forward pass
    pub fn forward_terms(&self) -> usize {
        self.forward.terms.len()
    }

    fn gcv(&self, size: usize) -> f64 {
        let n = self.n as f64;
        let penalty = if self.degree > 1 { 3.0 } else { 2.0 };
        let effective = size as f64 + penalty * (size as f64 - 1.0) / 2.0;
        let denom = 1.0 - effective / n;
        if denom <= 0.0 {
            return f64::INFINITY;
        }
        (self.rss[size - 1] / n) / (denom * denom)
    }

    /// Best-GCV subset with at most `nprune` terms
    pub fn select(&self, nprune: usize) -> Result<MarsFit, AnalysisError> {
        let max_size = nprune.clamp(1, self.subsets.len());
        let size = (1..=max_size)
            .min_by(|&a, &b| self.gcv(a).total_cmp(&self.gcv(b)))
            .unwrap_or(1);
        let subset = &self.subsets[size - 1];
        let (coefficients, _) = self
            .normal
            .solve(subset)
            .ok_or_else(|| AnalysisError::Singular("spline pruning".to_string()))?;

        Ok(MarsFit {
            terms: subset.iter().map(|&i| self.forward.terms[i].clone()).collect(),
            gains: subset.iter().map(|&i| self.forward.gains[i]).collect(),
            coefficients,
        })
    }
}

/// Pruned spline model on transformed columns
#[derive(Debug, Clone, Serialize)]
pub struct MarsFit {
    pub terms: Vec<BasisTerm>,
    pub coefficients: Vec<f64>,
    gains: Vec<f64>,
}

impl MarsFit {
    /// Probability of `Left` per row of a transformed matrix
    pub fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        let mut fitted = vec![0.0; x.n_rows()];
        for (term, coefficient) in self.terms.iter().zip(&self.coefficients) {
            for (f, v) in fitted.iter_mut().zip(term.eval(x)) {
                *f += coefficient * v;
            }
        }
        fitted.into_iter().map(|v| v.clamp(0.0, 1.0)).collect()
    }

    /// Forward-pass gain of retained terms, credited to the columns they use
    pub fn column_importance(&self, n_cols: usize) -> Vec<f64> {
        let mut importance = vec![0.0; n_cols];
        for (term, gain) in self.terms.iter().zip(&self.gains) {
            if term.factors.is_empty() {
                continue;
            }
            let share = gain / term.factors.len() as f64;
            for h in &term.factors {
                importance[h.var] += share;
            }
        }
        importance
    }
}

/// Spline classifier with its own preprocessing
#[derive(Debug, Clone)]
pub struct MarsModel {
    recipe: Recipe,
    fit: MarsFit,
    importance: Vec<f64>,
}

impl MarsModel {
    /// Estimate the recipe, run both passes and keep at most `nprune` terms
    pub fn fit(
        predictors: &[Predictor],
        x: &FeatureMatrix,
        labels: &[bool],
        params: MarsParams,
        max_terms: usize,
    ) -> Result<Self, AnalysisError> {
        let recipe = Recipe::estimate(predictors, x);
        let transformed = recipe.apply(x);
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let path = MarsPath::build(&transformed, &y, &recipe.dummy_mask(), params.degree, max_terms)?;
        let fit = path.select(params.nprune)?;

        let mut importance = vec![0.0; predictors.len()];
        for (column, value) in fit.column_importance(recipe.steps.len()).into_iter().enumerate() {
            importance[recipe.steps[column].source()] += value;
        }

        Ok(Self {
            recipe,
            fit,
            importance,
        })
    }

    pub fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        self.fit.predict(&self.recipe.apply(x))
    }

    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    pub fn term_count(&self) -> usize {
        self.fit.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        // y switches from 1 to 0 at x = 0 and does not depend on the noise column
        let rows: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![(i as f64 - 50.0) / 10.0, ((i * 37) % 11) as f64])
            .collect();
        let y = (0..100).map(|i| if i < 50 { 1.0 } else { 0.0 }).collect();
        (FeatureMatrix::from_rows(&rows), y)
    }

    #[test]
    fn test_solve_linear_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve_linear_system(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-6);
        assert!((x[1] - 1.4).abs() < 1e-6);
    }

    #[test]
    fn test_candidate_knots_exclude_max() {
        let values: Vec<f64> = (0..20).map(f64::from).collect();
        let knots = candidate_knots(&values);
        assert!(!knots.is_empty());
        assert!(knots.iter().all(|&k| k < 19.0));
    }

    #[test]
    fn test_forward_pass_picks_signal() {
        let (x, y) = step_data();
        let forward = forward_pass(&x, &y, &[false, false], 1, 11).unwrap();
        assert!(forward.terms.len() > 1);
        assert_eq!(forward.terms[1].factors[0].var, 0);
        assert!(forward.terms.len() <= 11);
    }

    #[test]
    fn test_degree_limits_interactions() {
        let (x, y) = step_data();
        let forward = forward_pass(&x, &y, &[false, false], 1, 15).unwrap();
        assert!(forward.terms.iter().all(|t| t.degree() <= 1));
    }

    #[test]
    fn test_select_respects_nprune() {
        let (x, y) = step_data();
        let path = MarsPath::build(&x, &y, &[false, false], 2, 21).unwrap();
        for nprune in [1, 2, 5, 30] {
            let fit = path.select(nprune).unwrap();
            assert!(fit.terms.len() <= nprune.max(1));
            assert!(fit.terms.len() <= path.forward_terms());
        }
        let intercept_only = path.select(1).unwrap();
        assert!(intercept_only.terms[0].factors.is_empty());
    }

    #[test]
    fn test_predictions_separate_classes() {
        let (x, y) = step_data();
        let path = MarsPath::build(&x, &y, &[false, false], 1, 21).unwrap();
        let fit = path.select(10).unwrap();
        let p = fit.predict(&x);
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(p[10] > p[90]);
    }

    #[test]
    fn test_dummy_column_uses_indicator() {
        let rows: Vec<Vec<f64>> = (0..60).map(|i| vec![(i % 2) as f64]).collect();
        let y: Vec<f64> = (0..60).map(|i| (i % 2) as f64).collect();
        let x = FeatureMatrix::from_rows(&rows);
        let forward = forward_pass(&x, &y, &[true], 1, 5).unwrap();
        assert_eq!(forward.terms.len(), 2);
        assert_eq!(forward.terms[1].factors[0].direction, HingeDirection::Indicator);
    }
}
