//! Price-per-unit analysis by unit group and product category
//!
//! Each analysis joins the selected products to their transactions, computes
//! a per-transaction price per unit, averages it per product and summarises
//! the resulting distribution, optionally faceted by household demographics.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::products::{CategoryMatcher, Product, UnitGroup, UnitMatch};
use super::retail::{Demographic, Transaction};
use super::stats::{mean_defined, QuantileSummary};

/// Which products an analysis covers
#[derive(Debug, Clone)]
pub struct ProductSelection {
    pub group: UnitGroup,
    pub unit_match: UnitMatch,
    pub category: Option<CategoryMatcher>,
}

impl ProductSelection {
    pub fn unit(group: UnitGroup) -> Self {
        Self {
            group,
            unit_match: UnitMatch::Contains,
            category: None,
        }
    }

    pub fn with_category(mut self, matcher: CategoryMatcher) -> Self {
        self.category = Some(matcher);
        self
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.group.matches(&product.unit_token, self.unit_match)
            && self
                .category
                .as_ref()
                .map_or(true, |m| m.matches(product.category.as_deref()))
    }
}

/// Price per unit of a single transaction.
///
/// Undefined when quantity or package size is missing, zero or negative, or
/// when the result is not finite.
pub fn price_per_unit(sales_value: Option<f64>, quantity: Option<f64>, package_size: Option<f64>) -> Option<f64> {
    let sales = sales_value?;
    let quantity = quantity.filter(|q| *q > 0.0)?;
    let size = package_size.filter(|s| *s > 0.0)?;
    let ppu = sales / quantity / size;
    ppu.is_finite().then_some(ppu)
}

/// A transaction joined to its product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedTransaction {
    pub product_id: String,
    pub household_id: String,
    pub sales_value: Option<f64>,
    pub quantity: Option<f64>,
    pub price_per_unit: Option<f64>,
}

/// Average price per unit of one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAverage {
    pub product_id: String,
    pub avg_price_per_unit: f64,
    pub transactions: usize,
}

/// Household attribute used to split a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Income,
    HouseholdSize,
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facet::Income => write!(f, "income"),
            Facet::HouseholdSize => write!(f, "household size"),
        }
    }
}

/// Histogram row: one joined transaction carrying its product's average
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramPoint {
    pub product_id: String,
    pub avg_price_per_unit: f64,
    pub income: Option<String>,
    pub household_size: Option<String>,
}

impl HistogramPoint {
    fn level(&self, facet: Facet) -> Option<&str> {
        match facet {
            Facet::Income => self.income.as_deref(),
            Facet::HouseholdSize => self.household_size.as_deref(),
        }
    }
}

/// Distribution summary for one facet level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetSummary {
    pub level: String,
    pub count: usize,
    pub quantiles: Option<QuantileSummary>,
}

/// Results of one unit or category analysis
#[derive(Debug, Clone, Serialize)]
pub struct PriceAnalysis {
    pub group: UnitGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price_per_unit: Option<f64>,
    /// Products selected by unit and category, before the transaction join
    pub selected_products: usize,
    /// Transactions joined to the selected products
    pub joined_transactions: usize,
    /// Per-product averages after the cutoff, ordered by product id
    pub averages: Vec<ProductAverage>,
    /// Per-transaction histogram values (after the demographic join)
    #[serde(skip)]
    pub histogram_points: Vec<HistogramPoint>,
    pub quantiles: Option<QuantileSummary>,
    pub income_facets: Vec<FacetSummary>,
    pub household_size_facets: Vec<FacetSummary>,
}

impl PriceAnalysis {
    /// One value per product, for the boxplot view
    pub fn boxplot_values(&self) -> Vec<f64> {
        self.averages.iter().map(|a| a.avg_price_per_unit).collect()
    }

    /// One value per joined transaction, for the histogram view
    pub fn histogram_values(&self) -> Vec<f64> {
        self.histogram_points
            .iter()
            .map(|p| p.avg_price_per_unit)
            .collect()
    }

    pub fn product_count(&self) -> usize {
        self.averages.len()
    }
}

/// Join index over the normalized retail tables.
///
/// Built once and shared by every analysis in a plan.
pub struct PriceAnalyzer<'a> {
    products: &'a [Product],
    transactions_by_product: HashMap<&'a str, Vec<&'a Transaction>>,
    demographics: HashMap<&'a str, &'a Demographic>,
}

impl<'a> PriceAnalyzer<'a> {
    pub fn new(
        products: &'a [Product],
        transactions: &'a [Transaction],
        demographics: &'a [Demographic],
    ) -> Self {
        let mut transactions_by_product: HashMap<&str, Vec<&Transaction>> = HashMap::new();
        for t in transactions {
            transactions_by_product
                .entry(t.product_id.as_str())
                .or_default()
                .push(t);
        }

        let demographics = demographics
            .iter()
            .map(|d| (d.household_id.as_str(), d))
            .collect();

        Self {
            products,
            transactions_by_product,
            demographics,
        }
    }

    /// Products in the selection, in table order
    pub fn select(&self, selection: &ProductSelection) -> Vec<&'a Product> {
        self.products.iter().filter(|p| selection.matches(p)).collect()
    }

    /// Inner join of the selected products with their transactions
    pub fn join(&self, selection: &ProductSelection) -> Vec<PricedTransaction> {
        self.select(selection)
            .into_iter()
            .flat_map(|product| {
                self.transactions_by_product
                    .get(product.product_id.as_str())
                    .into_iter()
                    .flatten()
                    .map(move |t| PricedTransaction {
                        product_id: product.product_id.clone(),
                        household_id: t.household_id.clone(),
                        sales_value: t.sales_value,
                        quantity: t.quantity,
                        price_per_unit: price_per_unit(t.sales_value, t.quantity, product.package_size),
                    })
            })
            .collect()
    }

    /// Run the full analysis for a selection
    pub fn analyze(&self, selection: &ProductSelection, max_price_per_unit: Option<f64>) -> PriceAnalysis {
        let selected_products = self.select(selection).len();
        let priced = self.join(selection);
        let averages = apply_cutoff(average_price_per_product(&priced), max_price_per_unit);
        let histogram_points = self.histogram_points(&priced, &averages);

        PriceAnalysis {
            group: selection.group,
            category: selection.category.as_ref().map(|m| m.as_str().to_string()),
            max_price_per_unit,
            selected_products,
            joined_transactions: priced.len(),
            quantiles: QuantileSummary::from_values(
                &averages.iter().map(|a| a.avg_price_per_unit).collect::<Vec<_>>(),
            ),
            income_facets: facet_summaries(&histogram_points, Facet::Income),
            household_size_facets: facet_summaries(&histogram_points, Facet::HouseholdSize),
            averages,
            histogram_points,
        }
    }

    /// Attach product averages to priced transactions from households with demographics
    fn histogram_points(
        &self,
        priced: &[PricedTransaction],
        averages: &[ProductAverage],
    ) -> Vec<HistogramPoint> {
        let avg_by_product: HashMap<&str, f64> = averages
            .iter()
            .map(|a| (a.product_id.as_str(), a.avg_price_per_unit))
            .collect();

        priced
            .iter()
            .filter(|t| t.price_per_unit.is_some())
            .filter_map(|t| {
                let avg = *avg_by_product.get(t.product_id.as_str())?;
                let household = self.demographics.get(t.household_id.as_str())?;
                Some(HistogramPoint {
                    product_id: t.product_id.clone(),
                    avg_price_per_unit: avg,
                    income: household.income.clone(),
                    household_size: household.household_size.clone(),
                })
            })
            .collect()
    }
}

/// Mean price per unit per product over transactions with a defined metric.
///
/// Products with no defined metric are omitted.
pub fn average_price_per_product(priced: &[PricedTransaction]) -> Vec<ProductAverage> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for t in priced {
        if let Some(ppu) = t.price_per_unit {
            grouped.entry(t.product_id.as_str()).or_default().push(ppu);
        }
    }

    grouped
        .into_iter()
        .filter_map(|(product_id, values)| {
            let transactions = values.len();
            mean_defined(values).map(|avg_price_per_unit| ProductAverage {
                product_id: product_id.to_string(),
                avg_price_per_unit,
                transactions,
            })
        })
        .collect()
}

/// Drop products whose average exceeds `max`
pub fn apply_cutoff(averages: Vec<ProductAverage>, max: Option<f64>) -> Vec<ProductAverage> {
    match max {
        Some(max) => averages
            .into_iter()
            .filter(|a| a.avg_price_per_unit <= max)
            .collect(),
        None => averages,
    }
}

/// Quantile summaries per facet level, ordered by level.
///
/// Rows without a value for the facet are grouped under "Unknown".
pub fn facet_summaries(points: &[HistogramPoint], facet: Facet) -> Vec<FacetSummary> {
    let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for p in points {
        grouped
            .entry(p.level(facet).unwrap_or("Unknown").to_string())
            .or_default()
            .push(p.avg_price_per_unit);
    }

    grouped
        .into_iter()
        .map(|(level, values)| FacetSummary {
            count: values.len(),
            quantiles: QuantileSummary::from_values(&values),
            level,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, category: &str, size: Option<f64>, unit: &str) -> Product {
        Product {
            product_id: id.to_string(),
            category: Some(category.to_string()),
            package_size: size,
            unit_token: unit.to_string(),
        }
    }

    fn txn(product: &str, household: &str, sales: f64, quantity: f64) -> Transaction {
        Transaction {
            product_id: product.to_string(),
            household_id: household.to_string(),
            sales_value: Some(sales),
            quantity: Some(quantity),
        }
    }

    fn demo(household: &str, income: &str, size: &str) -> Demographic {
        Demographic {
            household_id: household.to_string(),
            income: Some(income.to_string()),
            household_size: Some(size.to_string()),
        }
    }

    #[test]
    fn test_price_per_unit_excludes_invalid() {
        assert_eq!(price_per_unit(Some(6.0), Some(2.0), Some(3.0)), Some(1.0));
        assert_eq!(price_per_unit(Some(6.0), Some(0.0), Some(3.0)), None);
        assert_eq!(price_per_unit(Some(6.0), Some(2.0), Some(0.0)), None);
        assert_eq!(price_per_unit(Some(6.0), Some(2.0), None), None);
        assert_eq!(price_per_unit(None, Some(2.0), Some(3.0)), None);
    }

    #[test]
    fn test_average_ignores_zero_quantity_transactions() {
        let products = vec![product("p1", "EGGS", Some(12.0), "CT")];
        let transactions = vec![
            txn("p1", "h1", 2.4, 1.0),  // 0.2
            txn("p1", "h1", 9.6, 2.0),  // 0.4
            txn("p1", "h2", 5.0, 0.0),  // excluded
        ];
        let analyzer = PriceAnalyzer::new(&products, &transactions, &[]);
        let priced = analyzer.join(&ProductSelection::unit(UnitGroup::Count));
        assert_eq!(priced.len(), 3);

        let averages = average_price_per_product(&priced);
        assert_eq!(averages.len(), 1);
        assert!((averages[0].avg_price_per_unit - 0.3).abs() < 1e-12);
        assert_eq!(averages[0].transactions, 2);
    }

    #[test]
    fn test_undefined_package_size_product_has_no_average() {
        let products = vec![product("p1", "EGGS", None, "CT")];
        let transactions = vec![txn("p1", "h1", 2.0, 1.0)];
        let analyzer = PriceAnalyzer::new(&products, &transactions, &[]);
        let analysis = analyzer.analyze(&ProductSelection::unit(UnitGroup::Count), None);
        assert_eq!(analysis.selected_products, 1);
        assert_eq!(analysis.joined_transactions, 1);
        assert_eq!(analysis.product_count(), 0);
        assert!(analysis.quantiles.is_none());
    }

    #[test]
    fn test_join_drops_products_without_transactions() {
        let products = vec![
            product("p1", "MILK", Some(1.0), "LB"),
            product("p2", "MILK", Some(1.0), "LB"),
        ];
        let transactions = vec![txn("p1", "h1", 3.0, 1.0)];
        let analyzer = PriceAnalyzer::new(&products, &transactions, &[]);
        let analysis = analyzer.analyze(&ProductSelection::unit(UnitGroup::Pounds), None);
        assert_eq!(analysis.selected_products, 2);
        assert_eq!(analysis.product_count(), 1);
    }

    #[test]
    fn test_cutoff_removes_expensive_products() {
        let products = vec![
            product("cheap", "SODA", Some(12.0), "OZ"),
            product("dear", "SODA", Some(1.0), "OZ"),
        ];
        let transactions = vec![txn("cheap", "h1", 1.2, 1.0), txn("dear", "h1", 5.0, 1.0)];
        let analyzer = PriceAnalyzer::new(&products, &transactions, &[]);
        let analysis = analyzer.analyze(&ProductSelection::unit(UnitGroup::Ounces), Some(0.498));
        let values = analysis.boxplot_values();
        assert_eq!(values.len(), 1);
        assert!((values[0] - 0.1).abs() < 1e-12);
        assert_eq!(analysis.averages[0].product_id, "cheap");
    }

    #[test]
    fn test_histogram_requires_demographics() {
        let products = vec![product("p1", "EGGS", Some(12.0), "CT")];
        let transactions = vec![
            txn("p1", "h1", 2.4, 1.0),
            txn("p1", "h2", 4.8, 1.0),
            txn("p1", "h3", 2.4, 1.0),
        ];
        let demographics = vec![demo("h1", "35-49K", "2"), demo("h2", "100-124K", "1")];
        let analyzer = PriceAnalyzer::new(&products, &transactions, &demographics);
        let analysis = analyzer.analyze(&ProductSelection::unit(UnitGroup::Count), None);

        // h3 has no demographics row and is dropped from the histogram only
        assert_eq!(analysis.histogram_values().len(), 2);
        assert_eq!(analysis.product_count(), 1);
        let avg = analysis.averages[0].avg_price_per_unit;
        assert!(analysis.histogram_values().iter().all(|v| (*v - avg).abs() < 1e-12));

        let levels: Vec<&str> = analysis
            .income_facets
            .iter()
            .map(|f| f.level.as_str())
            .collect();
        assert_eq!(levels, vec!["100-124K", "35-49K"]);
        assert_eq!(analysis.household_size_facets.len(), 2);
    }

    #[test]
    fn test_category_selection() {
        let products = vec![
            product("1", "BEER", Some(12.0), "OZ"),
            product("2", "BREAD", Some(20.0), "OZ"),
            product("3", "BEER LIGHT", Some(12.0), "OZ"),
        ];
        let analyzer = PriceAnalyzer::new(&products, &[], &[]);
        let selection = ProductSelection::unit(UnitGroup::Ounces)
            .with_category(CategoryMatcher::new("BEER").unwrap());
        let ids: Vec<&str> = analyzer
            .select(&selection)
            .iter()
            .map(|p| p.product_id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_unit_selection_substring() {
        let products = vec![
            product("1", "JUICE", Some(64.0), "FL OZ"),
            product("2", "EGGS", Some(12.0), "CT"),
        ];
        let analyzer = PriceAnalyzer::new(&products, &[], &[]);
        assert_eq!(analyzer.select(&ProductSelection::unit(UnitGroup::Ounces)).len(), 1);

        let exact = ProductSelection {
            group: UnitGroup::Ounces,
            unit_match: UnitMatch::Exact,
            category: None,
        };
        assert!(analyzer.select(&exact).is_empty());
    }
}
