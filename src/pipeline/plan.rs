//! Pricing plan: which analyses to run and their outlier cutoffs

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::pricing::ProductSelection;
use super::products::{CategoryMatcher, UnitGroup, UnitMatch};

/// Default number of histogram bins
pub const DEFAULT_HISTOGRAM_BINS: usize = 30;

/// One unit or category analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSpec {
    pub name: String,
    pub unit: UnitGroup,
    #[serde(default)]
    pub unit_match: UnitMatch,
    /// Case-sensitive regex matched against the product category
    #[serde(default)]
    pub category: Option<String>,
    /// Products averaging above this price per unit are excluded
    #[serde(default)]
    pub max_price_per_unit: Option<f64>,
    /// Products whose total sales exceed this are left out of the total-sales view
    #[serde(default)]
    pub max_total_sales: Option<f64>,
    /// Price-per-unit ceiling for the quantity scatter
    #[serde(default)]
    pub scatter_ceiling: Option<f64>,
}

impl AnalysisSpec {
    pub fn unit(name: &str, unit: UnitGroup) -> Self {
        Self {
            name: name.to_string(),
            unit,
            unit_match: UnitMatch::Contains,
            category: None,
            max_price_per_unit: None,
            max_total_sales: None,
            scatter_ceiling: None,
        }
    }

    /// Compile the unit and category rules into a product selection
    pub fn selection(&self) -> Result<ProductSelection, AnalysisError> {
        let mut selection = ProductSelection::unit(self.unit);
        selection.unit_match = self.unit_match;
        if let Some(pattern) = &self.category {
            selection = selection.with_category(CategoryMatcher::new(pattern)?);
        }
        Ok(selection)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if self.name.trim().is_empty() {
            return Err(AnalysisError::InvalidPlan("analysis name is empty".to_string()));
        }
        let limits = [
            ("max_price_per_unit", self.max_price_per_unit),
            ("max_total_sales", self.max_total_sales),
            ("scatter_ceiling", self.scatter_ceiling),
        ];
        for (field, value) in limits {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(AnalysisError::InvalidPlan(format!(
                        "{} of '{}' must be a positive number, got {}",
                        field, self.name, v
                    )));
                }
            }
        }
        self.selection().map(|_| ())
    }
}

/// Ordered list of pricing analyses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPlan {
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,
    #[serde(rename = "analysis", default)]
    pub analyses: Vec<AnalysisSpec>,
}

fn default_histogram_bins() -> usize {
    DEFAULT_HISTOGRAM_BINS
}

impl Default for PricingPlan {
    /// Count, pound and ounce groups plus the beer and bread categories
    fn default() -> Self {
        let mut count = AnalysisSpec::unit("Count", UnitGroup::Count);
        count.max_price_per_unit = Some(2.0);

        let pounds = AnalysisSpec::unit("Pounds", UnitGroup::Pounds);

        let mut ounces = AnalysisSpec::unit("Ounces", UnitGroup::Ounces);
        ounces.max_price_per_unit = Some(0.498);

        let mut beer = AnalysisSpec::unit("Beer", UnitGroup::Ounces);
        beer.category = Some("BEER".to_string());
        beer.max_price_per_unit = Some(0.35);
        beer.scatter_ceiling = Some(0.35);

        let mut bread = AnalysisSpec::unit("Bread", UnitGroup::Ounces);
        bread.category = Some("BREAD".to_string());

        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            analyses: vec![count, pounds, ounces, beer, bread],
        }
    }
}

impl PricingPlan {
    /// Parse a plan from TOML text and validate it
    pub fn from_toml(text: &str) -> Result<Self> {
        let plan: PricingPlan = toml::from_str(text).context("Failed to parse pricing plan")?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pricing plan: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In pricing plan {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.analyses.is_empty() {
            return Err(AnalysisError::InvalidPlan("no analyses defined".to_string()));
        }
        if self.histogram_bins == 0 {
            return Err(AnalysisError::InvalidPlan("histogram_bins must be at least 1".to_string()));
        }
        self.analyses.iter().try_for_each(AnalysisSpec::validate)
    }
}
