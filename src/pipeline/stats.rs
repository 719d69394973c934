//! Descriptive statistics shared by the pricing views and reports

use serde::Serialize;

/// Five-number summary of a distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl QuantileSummary {
    /// Summarise the defined (finite) values. Returns `None` when there are none.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let sorted = sorted_defined(values);
        if sorted.is_empty() {
            return None;
        }
        Some(Self {
            min: sorted[0],
            q1: quantile_sorted(&sorted, 0.25),
            median: quantile_sorted(&sorted, 0.5),
            q3: quantile_sorted(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Linear-interpolation quantile (Hyndman & Fan type 7) of the finite values.
///
/// `p` is clamped to [0, 1]. Returns `None` if no value is defined.
pub fn quantile(values: &[f64], p: f64) -> Option<f64> {
    let sorted = sorted_defined(values);
    if sorted.is_empty() {
        None
    } else {
        Some(quantile_sorted(&sorted, p))
    }
}

/// Type 7 quantile of an already sorted, non-empty slice
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let p = p.clamp(0.0, 1.0);
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn sorted_defined(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Arithmetic mean of the finite values, ignoring NaN and infinities.
pub fn mean_defined<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// One equal-width histogram bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Equal-width histogram over the finite values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

impl Histogram {
    /// Bin the finite values into `bins` equal-width bins spanning [min, max].
    ///
    /// The maximum lands in the last bin. A constant sample produces a single
    /// bin holding every value.
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let defined: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if defined.is_empty() || bins == 0 {
            return Self { bins: Vec::new() };
        }

        let min = defined.iter().copied().fold(f64::INFINITY, f64::min);
        let max = defined.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if max == min {
            return Self {
                bins: vec![HistogramBin {
                    lower: min,
                    upper: max,
                    count: defined.len(),
                }],
            };
        }

        let width = (max - min) / bins as f64;
        let mut counts = vec![0usize; bins];
        for v in &defined {
            let idx = (((v - min) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        Self {
            bins: counts
                .into_iter()
                .enumerate()
                .map(|(i, count)| HistogramBin {
                    lower: min + i as f64 * width,
                    upper: min + (i + 1) as f64 * width,
                    count,
                })
                .collect(),
        }
    }

    /// Total number of binned values
    pub fn total(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }

    /// Largest bin count, used to scale text bars
    pub fn max_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).max().unwrap_or(0)
    }
}
