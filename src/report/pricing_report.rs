//! Pricing analysis results and their console rendering

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, CellAlignment, Color, Table};
use console::style;
use serde::Serialize;

use crate::pipeline::{
    binned_trend, quantity_scatter, sales_view, AnalysisError, AnalysisSpec, FacetSummary, Histogram,
    PriceAnalysis, PriceAnalyzer, PricingPlan, QuantileSummary, QuantityPoint, SalesAggregate,
    SalesPoint, TrendPoint,
};

/// Bins used for the sales trend summaries
pub const TREND_BINS: usize = 10;

/// Width of text bars and the boxplot line
const CHART_WIDTH: usize = 40;

/// A sales view: its points and their binned trend
#[derive(Debug, Clone, Serialize)]
pub struct SalesTrend<P> {
    pub points: Vec<P>,
    pub trend: Vec<TrendPoint>,
}

impl<P> SalesTrend<P> {
    fn new(points: Vec<P>, xy: impl Fn(&P) -> (f64, f64)) -> Self {
        let pairs: Vec<(f64, f64)> = points.iter().map(xy).collect();
        Self {
            trend: binned_trend(&pairs, TREND_BINS),
            points,
        }
    }
}

/// Everything computed for one plan entry
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisOutcome {
    pub spec: AnalysisSpec,
    pub analysis: PriceAnalysis,
    pub histogram: Histogram,
    /// Average price per unit against mean sales value per product
    pub mean_sales: SalesTrend<SalesPoint>,
    /// Average price per unit against total sales value per product
    pub total_sales: SalesTrend<SalesPoint>,
    /// Price per unit against quantity per transaction, when a ceiling is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<SalesTrend<QuantityPoint>>,
}

impl AnalysisOutcome {
    /// Run one analysis of a plan
    pub fn compute(
        analyzer: &PriceAnalyzer<'_>,
        spec: &AnalysisSpec,
        histogram_bins: usize,
    ) -> Result<Self, AnalysisError> {
        let selection = spec.selection()?;
        let analysis = analyzer.analyze(&selection, spec.max_price_per_unit);
        let priced = analyzer.join(&selection);

        let view = |aggregate, cap| {
            SalesTrend::new(sales_view(&priced, aggregate, cap), |p: &SalesPoint| {
                (p.avg_price_per_unit, p.sales_value)
            })
        };
        let mean_sales = view(SalesAggregate::Mean, None);
        let total_sales = view(SalesAggregate::Total, spec.max_total_sales);

        let quantity = spec.scatter_ceiling.map(|ceiling| {
            SalesTrend::new(quantity_scatter(&priced, ceiling), |p: &QuantityPoint| {
                (p.price_per_unit, p.quantity)
            })
        });

        Ok(Self {
            histogram: Histogram::from_values(&analysis.histogram_values(), histogram_bins),
            spec: spec.clone(),
            analysis,
            mean_sales,
            total_sales,
            quantity,
        })
    }

    /// Print every view of this analysis
    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📊").cyan(),
            style(self.spec.name.to_uppercase()).white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());

        let mut scope = format!("unit {}", self.analysis.group.code());
        if let Some(category) = &self.analysis.category {
            scope.push_str(&format!(", category /{}/", category));
        }
        if let Some(max) = self.analysis.max_price_per_unit {
            scope.push_str(&format!(", cutoff {}", max));
        }
        println!("      {}", style(scope).dim());
        println!(
            "      {} products priced ({} selected, {} transactions joined)",
            style(self.analysis.product_count()).yellow().bold(),
            self.analysis.selected_products,
            self.analysis.joined_transactions
        );

        let Some(quantiles) = &self.analysis.quantiles else {
            println!("      {}", style("No priced products in this group").yellow());
            return;
        };

        println!();
        print_indented(&quantile_table(quantiles));
        println!();
        println!("      {}", boxplot_line(quantiles, CHART_WIDTH));
        println!();
        for line in histogram_lines(&self.histogram, CHART_WIDTH) {
            println!("      {}", line);
        }

        for (title, facets) in [
            ("By income", &self.analysis.income_facets),
            ("By household size", &self.analysis.household_size_facets),
        ] {
            if !facets.is_empty() {
                println!();
                println!("      {}", style(title).cyan());
                print_indented(&facet_table(facets));
            }
        }

        println!();
        println!("      {}", style("Sales trends").cyan());
        print_indented(&trend_table(self));
    }
}

/// Run every analysis of a plan in order
pub fn run_plan(analyzer: &PriceAnalyzer<'_>, plan: &PricingPlan) -> Result<Vec<AnalysisOutcome>, AnalysisError> {
    plan.analyses
        .iter()
        .map(|spec| AnalysisOutcome::compute(analyzer, spec, plan.histogram_bins))
        .collect()
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
        .collect()
}

fn number(value: f64) -> Cell {
    Cell::new(format!("{:.4}", value)).set_alignment(CellAlignment::Right)
}

/// Five-number summary as a one-row table
pub fn quantile_table(q: &QuantileSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Min", "Q1", "Median", "Q3", "Max"]));
    table.add_row(vec![
        number(q.min),
        number(q.q1),
        number(q.median).fg(Color::Green),
        number(q.q3),
        number(q.max),
    ]);
    table
}

/// One row per facet level
pub fn facet_table(facets: &[FacetSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["Level", "Rows", "Q1", "Median", "Q3"]));
    for facet in facets {
        let mut row = vec![Cell::new(&facet.level), Cell::new(facet.count)];
        match &facet.quantiles {
            Some(q) => row.extend([number(q.q1), number(q.median), number(q.q3)]),
            None => row.extend([Cell::new("-"), Cell::new("-"), Cell::new("-")]),
        }
        table.add_row(row);
    }
    table
}

fn trend_table(outcome: &AnalysisOutcome) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(header(&["View", "Points", "Low-x mean", "High-x mean"]));

    let mut views = vec![
        ("Mean sales", outcome.mean_sales.points.len(), &outcome.mean_sales.trend),
        ("Total sales", outcome.total_sales.points.len(), &outcome.total_sales.trend),
    ];
    if let Some(quantity) = &outcome.quantity {
        views.push(("Quantity", quantity.points.len(), &quantity.trend));
    }

    for (name, points, trend) in views {
        let ends = |point: Option<&TrendPoint>| point.map_or_else(|| Cell::new("-"), |p| number(p.y));
        table.add_row(vec![
            Cell::new(name),
            Cell::new(points),
            ends(trend.first()),
            ends(trend.last()),
        ]);
    }
    table
}

/// Horizontal bars, one per histogram bin
pub fn histogram_lines(histogram: &Histogram, width: usize) -> Vec<String> {
    let max = histogram.max_count();
    if max == 0 {
        return Vec::new();
    }
    histogram
        .bins
        .iter()
        .map(|bin| {
            let len = (bin.count * width).div_ceil(max);
            format!(
                "{:>9.4} │{:<width$} {}",
                bin.lower,
                "█".repeat(len),
                bin.count,
                width = width
            )
        })
        .collect()
}

/// Text boxplot: whiskers from min to max, box from Q1 to Q3, `┃` at the median
pub fn boxplot_line(q: &QuantileSummary, width: usize) -> String {
    let width = width.max(3);
    let span = q.max - q.min;
    let position = |v: f64| -> usize {
        if span <= 0.0 {
            0
        } else {
            (((v - q.min) / span) * (width - 1) as f64).round() as usize
        }
    };

    let (lo, hi, mid) = (position(q.q1), position(q.q3), position(q.median));
    let body: String = (0..width)
        .map(|i| {
            if i == mid {
                '┃'
            } else if i >= lo && i <= hi {
                '█'
            } else {
                '─'
            }
        })
        .collect();
    format!("{:.4} ├{}┤ {:.4}", q.min, body, q.max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::HistogramBin;

    fn summary() -> QuantileSummary {
        QuantileSummary::from_values(&(1..=10).map(f64::from).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn test_boxplot_line_marks_median() {
        let line = boxplot_line(&summary(), 19);
        assert!(line.starts_with("1.0000 ├"));
        assert!(line.ends_with("┤ 10.0000"));
        assert_eq!(line.matches('┃').count(), 1);
    }

    #[test]
    fn test_histogram_lines_scale_to_width() {
        let histogram = Histogram {
            bins: vec![
                HistogramBin {
                    lower: 0.0,
                    upper: 1.0,
                    count: 4,
                },
                HistogramBin {
                    lower: 1.0,
                    upper: 2.0,
                    count: 2,
                },
            ],
        };
        let lines = histogram_lines(&histogram, 10);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), 10);
        assert_eq!(lines[1].matches('█').count(), 5);
    }

    #[test]
    fn test_empty_histogram_has_no_lines() {
        assert!(histogram_lines(&Histogram { bins: Vec::new() }, 10).is_empty());
    }

    #[test]
    fn test_quantile_table_has_five_columns() {
        let rendered = quantile_table(&summary()).to_string();
        assert!(rendered.contains("Median"));
        assert!(rendered.contains("5.5000"));
    }
}
