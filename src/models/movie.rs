use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// A single catalog entry, row-aligned with the embedding matrix
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    /// Title as it appears in the catalog
    #[serde(rename = "Movie Name")]
    pub name: String,
    /// Release year, if the catalog cell held one
    #[serde(rename = "Year of Release", deserialize_with = "lenient_year", default)]
    pub year: Option<i32>,
    /// Catalog rating, if present
    #[serde(rename = "Movie Rating", deserialize_with = "lenient_rating", default)]
    pub rating: Option<f64>,
}

impl Movie {
    /// Creates a new movie
    pub fn new(name: impl Into<String>, year: Option<i32>, rating: Option<f64>) -> Self {
        Self {
            name: name.into(),
            year,
            rating,
        }
    }
}

/// A standalone run of exactly four digits
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").expect("valid year regex"));

/// Extracts the first four-digit run, so `"(2008)"` and `"II 2016"` both parse
pub fn parse_year(raw: &str) -> Option<i32> {
    YEAR_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|year| year.as_str().parse().ok())
}

pub fn parse_rating(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|r| r.is_finite())
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_year))
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_rating))
}
