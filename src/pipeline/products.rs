//! Package size normalization
//!
//! Splits the combined `"<number> <unit>"` package size into a numeric
//! magnitude and a unit token, and filters products by category.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::AnalysisError;
use super::retail::RawProduct;

/// Unit groups analysed by the pricing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitGroup {
    Count,
    Pounds,
    Ounces,
}

/// How a unit token is compared with a group code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitMatch {
    Exact,
    #[default]
    Contains,
}

impl UnitGroup {
    /// Code as it appears in package size fields
    pub fn code(&self) -> &'static str {
        match self {
            UnitGroup::Count => "CT",
            UnitGroup::Pounds => "LB",
            UnitGroup::Ounces => "OZ",
        }
    }

    pub fn matches(&self, unit: &str, mode: UnitMatch) -> bool {
        match mode {
            UnitMatch::Exact => unit == self.code(),
            UnitMatch::Contains => unit.contains(self.code()),
        }
    }
}

impl std::fmt::Display for UnitGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnitGroup::Count => write!(f, "count"),
            UnitGroup::Pounds => write!(f, "pounds"),
            UnitGroup::Ounces => write!(f, "ounces"),
        }
    }
}

impl std::str::FromStr for UnitGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" | "ct" => Ok(UnitGroup::Count),
            "pounds" | "lb" => Ok(UnitGroup::Pounds),
            "ounces" | "oz" => Ok(UnitGroup::Ounces),
            _ => Err(format!(
                "Unknown unit group: '{}'. Use 'count', 'pounds' or 'ounces'.",
                s
            )),
        }
    }
}

/// Product with its package size split into magnitude and unit
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub product_id: String,
    pub category: Option<String>,
    /// `None` when the leading token is not a number
    pub package_size: Option<f64>,
    /// Unit text after the magnitude, e.g. `"OZ"` or `"FL OZ"`
    pub unit_token: String,
}

/// Split a raw package size on its first whitespace.
///
/// Returns `None` for absent, blank or single-token fields. A non-numeric
/// magnitude is kept as `None` rather than rejecting the row.
pub fn parse_package_size(raw: &str) -> Option<(Option<f64>, String)> {
    let trimmed = raw.trim();
    let (magnitude, unit) = trimmed.split_once(char::is_whitespace)?;
    let unit = unit.trim();
    if unit.is_empty() {
        return None;
    }
    Some((magnitude.parse::<f64>().ok(), unit.to_string()))
}

/// Normalize raw products, dropping rows without a well-formed package size
pub fn normalize_products(raw: &[RawProduct]) -> Vec<Product> {
    raw.iter()
        .filter_map(|p| {
            let (package_size, unit_token) = parse_package_size(p.package_size.as_deref()?)?;
            Some(Product {
                product_id: p.product_id.clone(),
                category: p.category.clone(),
                package_size,
                unit_token,
            })
        })
        .collect()
}

/// Case-sensitive category predicate compiled from a regex or literal substring
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    pattern: Regex,
}

impl CategoryMatcher {
    pub fn new(pattern: &str) -> Result<Self, AnalysisError> {
        Regex::new(pattern)
            .map(|pattern| Self { pattern })
            .map_err(|source| AnalysisError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Products without a category never match
    pub fn matches(&self, category: Option<&str>) -> bool {
        category.is_some_and(|c| self.pattern.is_match(c))
    }
}
