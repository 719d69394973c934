//! Sales-value views over priced transactions

use std::collections::BTreeMap;

use serde::Serialize;

use super::pricing::PricedTransaction;
use super::stats::mean_defined;

/// How sales values are combined per product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesAggregate {
    Mean,
    Total,
}

/// One product in a sales view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesPoint {
    pub product_id: String,
    pub avg_price_per_unit: f64,
    pub sales_value: f64,
}

/// One transaction in the raw scatter
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantityPoint {
    pub price_per_unit: f64,
    pub quantity: f64,
}

/// Pair each product's average price per unit with its mean or total sales value.
///
/// Only transactions with a defined price per unit contribute. With
/// `max_sales` set, products whose combined sales exceed it are left out.
pub fn sales_view(
    priced: &[PricedTransaction],
    aggregate: SalesAggregate,
    max_sales: Option<f64>,
) -> Vec<SalesPoint> {
    let mut grouped: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for t in priced {
        if let (Some(ppu), Some(sales)) = (t.price_per_unit, t.sales_value) {
            let entry = grouped.entry(t.product_id.as_str()).or_default();
            entry.0.push(ppu);
            entry.1.push(sales);
        }
    }

    grouped
        .into_iter()
        .filter_map(|(product_id, (ppus, sales))| {
            let avg_price_per_unit = mean_defined(ppus)?;
            let sales_value = match aggregate {
                SalesAggregate::Mean => mean_defined(sales)?,
                SalesAggregate::Total => sales.iter().filter(|v| v.is_finite()).sum(),
            };
            Some(SalesPoint {
                product_id: product_id.to_string(),
                avg_price_per_unit,
                sales_value,
            })
        })
        .filter(|p| max_sales.map_or(true, |cap| p.sales_value <= cap))
        .collect()
}

/// Price per unit against quantity for every transaction under `ceiling`
pub fn quantity_scatter(priced: &[PricedTransaction], ceiling: f64) -> Vec<QuantityPoint> {
    priced
        .iter()
        .filter_map(|t| {
            let ppu = t.price_per_unit?;
            let quantity = t.quantity?;
            (ppu <= ceiling).then_some(QuantityPoint {
                price_per_unit: ppu,
                quantity,
            })
        })
        .collect()
}

/// One step of a binned-mean trend line
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Centre of the x bin
    pub x: f64,
    /// Mean y within the bin
    pub y: f64,
    pub count: usize,
}

/// Binned-mean smoother: equal-width bins over x, mean y per non-empty bin
pub fn binned_trend(points: &[(f64, f64)], bins: usize) -> Vec<TrendPoint> {
    let defined: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if defined.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = defined.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max = defined.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        let y = defined.iter().map(|p| p.1).sum::<f64>() / defined.len() as f64;
        return vec![TrendPoint {
            x: min,
            y,
            count: defined.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut sums = vec![(0.0f64, 0usize); bins];
    for (x, y) in &defined {
        let idx = (((x - min) / width) as usize).min(bins - 1);
        sums[idx].0 += y;
        sums[idx].1 += 1;
    }

    sums.into_iter()
        .enumerate()
        .filter(|(_, (_, count))| *count > 0)
        .map(|(i, (sum, count))| TrendPoint {
            x: min + (i as f64 + 0.5) * width,
            y: sum / count as f64,
            count,
        })
        .collect()
}
