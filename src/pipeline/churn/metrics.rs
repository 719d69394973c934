//! Classification metrics with `Left` as the event class

use serde::Serialize;

/// Area under the ROC curve via the Mann-Whitney statistic.
///
/// Tied scores share their average rank. Returns `None` when either class is
/// absent.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 || scores.len() != labels.len() {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based: positions start..end share (start + 1 + end) / 2
        let rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += rank * order[start..end].iter().filter(|&&i| labels[i]).count() as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Counts of predicted vs. actual labels at a probability threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfusionMatrix {
    pub true_left: usize,
    pub false_left: usize,
    pub true_current: usize,
    pub false_current: usize,
}

impl ConfusionMatrix {
    /// `p >= threshold` predicts `Left`
    pub fn from_probabilities(probabilities: &[f64], labels: &[bool], threshold: f64) -> Self {
        let mut matrix = Self::default();
        for (&p, &actual) in probabilities.iter().zip(labels) {
            match (p >= threshold, actual) {
                (true, true) => matrix.true_left += 1,
                (true, false) => matrix.false_left += 1,
                (false, false) => matrix.true_current += 1,
                (false, true) => matrix.false_current += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_left + self.false_left + self.true_current + self.false_current
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_left + self.true_current, self.total())
    }

    /// Share of leavers predicted to leave
    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_left, self.true_left + self.false_current)
    }

    /// Share of stayers predicted to stay
    pub fn specificity(&self) -> f64 {
        ratio(self.true_current, self.true_current + self.false_left)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Share of monthly charges carried by customers predicted to leave
pub fn revenue_loss_ratio(monthly_charges: &[f64], predicted_left: &[bool]) -> f64 {
    let total: f64 = monthly_charges.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    let at_risk: f64 = monthly_charges
        .iter()
        .zip(predicted_left)
        .filter(|(_, &left)| left)
        .map(|(m, _)| m)
        .sum();
    at_risk / total
}
