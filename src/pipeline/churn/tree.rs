//! CART classification trees on pre-binned predictors
//!
//! Predictors are discretised once per training matrix. A predictor with at
//! most `max_bins` distinct values keeps one bin per value (exact splits);
//! wider predictors are cut at quantiles. Splits minimise weighted Gini
//! impurity and thresholds are stored in value space, so prediction works on
//! raw rows.

use rand::rngs::StdRng;
use rand::seq::index;

use super::customers::FeatureMatrix;

/// Default number of bins per predictor
pub const DEFAULT_MAX_BINS: usize = 256;

/// Binned view of a training matrix
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    /// Bin index per column per row
    bins: Vec<Vec<u16>>,
    /// Upper cut of each bin except the last, per column: bin `b` holds
    /// values `<= cuts[b]`
    cuts: Vec<Vec<f64>>,
    n_rows: usize,
}

impl BinnedMatrix {
    pub fn from_matrix(x: &FeatureMatrix, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, u16::MAX as usize);
        let cuts: Vec<Vec<f64>> = x.columns.iter().map(|c| column_cuts(c, max_bins)).collect();
        let bins = x
            .columns
            .iter()
            .zip(&cuts)
            .map(|(column, cuts)| {
                column
                    .iter()
                    .map(|&v| cuts.partition_point(|&c| c < v) as u16)
                    .collect()
            })
            .collect();

        Self {
            bins,
            cuts,
            n_rows: x.n_rows(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.bins.len()
    }

    fn n_bins(&self, col: usize) -> usize {
        self.cuts[col].len() + 1
    }
}

/// Cut points between bins for one column
fn column_cuts(values: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted.dedup();

    if sorted.len() <= max_bins {
        return sorted.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let mut cuts: Vec<f64> = (1..max_bins)
        .map(|k| sorted[k * sorted.len() / max_bins - 1])
        .collect();
    cuts.dedup();
    cuts
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Predictors tried at each split
    pub mtry: usize,
    /// Nodes with this many samples or fewer become leaves
    pub min_node_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        /// Share of `Left` rows reaching this leaf
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

impl DecisionTree {
    /// Grow a tree on the rows in `sample` (duplicates allowed).
    ///
    /// Gini decreases are added to `importance`, one slot per predictor.
    pub fn fit(
        data: &BinnedMatrix,
        labels: &[bool],
        sample: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
        importance: &mut [f64],
    ) -> Self {
        let mut nodes = vec![Node::Leaf { probability: 0.0 }];
        let mut stack = vec![(0usize, sample)];
        let mtry = params.mtry.clamp(1, data.n_cols().max(1));

        while let Some((node_id, rows)) = stack.pop() {
            let positives = rows.iter().filter(|&&i| labels[i]).count();
            let probability = if rows.is_empty() {
                0.0
            } else {
                positives as f64 / rows.len() as f64
            };

            let pure = positives == 0 || positives == rows.len();
            if pure || rows.len() <= params.min_node_size || data.n_cols() == 0 {
                nodes[node_id] = Node::Leaf { probability };
                continue;
            }

            let features = index::sample(rng, data.n_cols(), mtry).into_vec();
            let best = best_split(data, labels, &rows, positives, &features);

            match best {
                Some(candidate) => {
                    importance[candidate.feature] += candidate.gain;
                    let column = &data.bins[candidate.feature];
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .partition(|&&i| column[i] as usize <= candidate.bin);

                    let left = nodes.len();
                    let right = left + 1;
                    nodes.push(Node::Leaf { probability });
                    nodes.push(Node::Leaf { probability });
                    nodes[node_id] = Node::Split {
                        feature: candidate.feature,
                        threshold: data.cuts[candidate.feature][candidate.bin],
                        left,
                        right,
                    };
                    stack.push((right, right_rows));
                    stack.push((left, left_rows));
                }
                None => nodes[node_id] = Node::Leaf { probability },
            }
        }

        Self { nodes }
    }

    /// Probability of `Left` for a raw row
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Gini impurity of a node, scaled by its size
fn weighted_gini(positives: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let p = positives / total;
    total * 2.0 * p * (1.0 - p)
}

fn best_split(
    data: &BinnedMatrix,
    labels: &[bool],
    rows: &[usize],
    positives: usize,
    features: &[usize],
) -> Option<SplitCandidate> {
    let total = rows.len() as f64;
    let parent = weighted_gini(positives as f64, total);
    let mut best: Option<SplitCandidate> = None;

    for &feature in features {
        let n_bins = data.n_bins(feature);
        if n_bins < 2 {
            continue;
        }
        let column = &data.bins[feature];
        let mut counts = vec![0usize; n_bins];
        let mut pos = vec![0usize; n_bins];
        for &i in rows {
            let b = column[i] as usize;
            counts[b] += 1;
            if labels[i] {
                pos[b] += 1;
            }
        }

        let mut left_n = 0usize;
        let mut left_pos = 0usize;
        for bin in 0..n_bins - 1 {
            left_n += counts[bin];
            left_pos += pos[bin];
            if left_n == 0 || counts[bin] == 0 {
                continue;
            }
            let right_n = rows.len() - left_n;
            if right_n == 0 {
                break;
            }
            let children = weighted_gini(left_pos as f64, left_n as f64)
                + weighted_gini((positives - left_pos) as f64, right_n as f64);
            let gain = parent - children;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate { feature, bin, gain });
            }
        }
    }

    best
}
