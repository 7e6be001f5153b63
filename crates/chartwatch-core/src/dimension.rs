//! Dimension keys: which chart context a comparison runs over.
//!
//! A caller supplies a loose [`DimensionQuery`] (every field optional, as it
//! arrives from a query string or CLI flags). [`DimensionKey::resolve`]
//! turns it into a validated key, applying defaults and rejecting
//! contradictory combinations.
//!
//! Subcategory has three states and they must not be conflated:
//!
//! | Query value | Filter | Matches |
//! |-------------|--------|---------|
//! | absent | [`SubcategoryFilter::Any`] | every subcategory, including none |
//! | `""` | [`SubcategoryFilter::None`] | only rows without a subcategory |
//! | `"Arcade"` | [`SubcategoryFilter::Exactly`] | only `Arcade` rows |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChartError, Result};

/// How a key constrains the subcategory column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "match", content = "value", rename_all = "snake_case")]
pub enum SubcategoryFilter {
    Any,
    None,
    Exactly(String),
}

impl SubcategoryFilter {
    /// Map a raw query value: absent → `Any`, blank → `None`, else `Exactly`.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None => SubcategoryFilter::Any,
            Some("") => SubcategoryFilter::None,
            Some(v) => SubcategoryFilter::Exactly(v.to_string()),
        }
    }

    pub fn matches(&self, subcategory: Option<&str>) -> bool {
        let stored = subcategory.unwrap_or("");
        match self {
            SubcategoryFilter::Any => true,
            SubcategoryFilter::None => stored.is_empty(),
            SubcategoryFilter::Exactly(v) => stored == v,
        }
    }
}

/// Unvalidated filters as supplied by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DimensionQuery {
    pub country: Option<String>,
    pub chart_type: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
}

/// Defaults and constraints applied while resolving a [`DimensionQuery`].
#[derive(Debug, Clone)]
pub struct DimensionRules {
    /// Used when the query has no country. `None` makes country mandatory.
    pub default_country: Option<String>,
    /// Chart under analysis when the query does not name one.
    pub default_chart_type: String,
    /// Categories that may carry a named subcategory. Empty = no constraint.
    pub subcategory_parents: Vec<String>,
}

impl Default for DimensionRules {
    fn default() -> Self {
        Self {
            default_country: None,
            default_chart_type: "top_free".to_string(),
            subcategory_parents: vec!["Games".to_string()],
        }
    }
}

/// A validated chart context.
///
/// `country` and `chart_type` are always concrete. `category: None` and
/// `subcategory: Any` leave those columns unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DimensionKey {
    pub country: String,
    pub chart_type: String,
    pub category: Option<String>,
    pub subcategory: SubcategoryFilter,
}

impl DimensionKey {
    pub fn new(country: &str, chart_type: &str) -> Self {
        Self {
            country: country.to_string(),
            chart_type: chart_type.to_string(),
            category: None,
            subcategory: SubcategoryFilter::Any,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_subcategory(mut self, subcategory: SubcategoryFilter) -> Self {
        self.subcategory = subcategory;
        self
    }

    /// Validate a query against `rules`.
    ///
    /// # Errors
    ///
    /// [`ChartError::InvalidDimensionKey`] when the country is missing (and
    /// there is no default) or malformed, when a filter is blank where a
    /// value is required, or when a named subcategory is requested without a
    /// category or under a category that has no subcategories.
    pub fn resolve(query: &DimensionQuery, rules: &DimensionRules) -> Result<Self> {
        let country = match non_blank(query.country.as_deref()) {
            Some(c) => c.to_ascii_uppercase(),
            None => match non_blank(rules.default_country.as_deref()) {
                Some(c) => c.to_ascii_uppercase(),
                None => {
                    return Err(ChartError::InvalidDimensionKey(
                        "country is required (no default_country configured)".to_string(),
                    ))
                }
            },
        };
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ChartError::InvalidDimensionKey(format!(
                "country must be a two-letter code, got '{}'",
                country
            )));
        }

        let chart_type = match &query.chart_type {
            None => rules.default_chart_type.clone(),
            Some(raw) => match non_blank(Some(raw)) {
                Some(c) => c.to_string(),
                None => {
                    return Err(ChartError::InvalidDimensionKey(
                        "chart_type must not be empty".to_string(),
                    ))
                }
            },
        };

        let category = match &query.category {
            None => None,
            Some(raw) => match non_blank(Some(raw)) {
                Some(c) => Some(c.to_string()),
                None => {
                    return Err(ChartError::InvalidDimensionKey(
                        "category must not be empty (omit it to match any category)".to_string(),
                    ))
                }
            },
        };

        let subcategory = SubcategoryFilter::from_query(query.subcategory.as_deref());
        if let SubcategoryFilter::Exactly(ref sub) = subcategory {
            let Some(ref cat) = category else {
                return Err(ChartError::InvalidDimensionKey(format!(
                    "subcategory '{}' requires a category",
                    sub
                )));
            };
            if !rules.subcategory_parents.is_empty()
                && !rules
                    .subcategory_parents
                    .iter()
                    .any(|p| p.eq_ignore_ascii_case(cat))
            {
                return Err(ChartError::InvalidDimensionKey(format!(
                    "category '{}' has no subcategories (subcategory '{}' requested)",
                    cat, sub
                )));
            }
        }

        Ok(Self {
            country,
            chart_type,
            category,
            subcategory,
        })
    }

    /// True when every column is pinned to one chart context, which is
    /// when rank conservation must hold for a loaded snapshot.
    pub fn is_fully_resolved(&self) -> bool {
        self.category.is_some() && self.subcategory != SubcategoryFilter::Any
    }

    pub fn matches(
        &self,
        country: &str,
        chart_type: &str,
        category: &str,
        subcategory: Option<&str>,
    ) -> bool {
        self.country == country
            && self.chart_type == chart_type
            && self.category.as_deref().map_or(true, |c| c == category)
            && self.subcategory.matches(subcategory)
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.country,
            self.chart_type,
            self.category.as_deref().unwrap_or("*")
        )?;
        match &self.subcategory {
            SubcategoryFilter::Any => write!(f, "/*"),
            SubcategoryFilter::None => Ok(()),
            SubcategoryFilter::Exactly(s) => write!(f, "/{}", s),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
