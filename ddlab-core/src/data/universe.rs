//! Index universe: which indices to analyze and from which start date.
//!
//! Run configs list their own `[[indices]]`; this module holds the spec type
//! and the built-in default list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One index to analyze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub symbol: String,
    pub name: String,
    /// First date included in the analysis.
    pub start_date: NaiveDate,
}

impl IndexSpec {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            start_date,
        }
    }
}

/// Ordered list of indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexUniverse {
    pub indices: Vec<IndexSpec>,
}

impl IndexUniverse {
    /// S&P 500 since 1955 and the Taiwan Weighted Index since 1990.
    pub fn default_indices() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        Self {
            indices: vec![
                IndexSpec::new("^GSPC", "S&P 500", date(1955, 1, 1)),
                IndexSpec::new("^TWII", "Taiwan Weighted Index", date(1990, 1, 1)),
            ],
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&IndexSpec> {
        self.indices.iter().find(|i| i.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_universe_has_spx_and_twii() {
        let u = IndexUniverse::default_indices();
        let symbols: Vec<&str> = u.indices.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["^GSPC", "^TWII"]);
        assert_eq!(
            u.get("^GSPC").unwrap().start_date,
            NaiveDate::from_ymd_opt(1955, 1, 1).unwrap()
        );
        assert_eq!(u.get("^TWII").unwrap().name, "Taiwan Weighted Index");
    }

    #[test]
    fn spec_deserializes_from_toml_table() {
        let spec: IndexSpec = toml::from_str(
            r#"
            symbol = "^N225"
            name = "Nikkei 225"
            start_date = "1970-01-01"
            "#,
        )
        .unwrap();
        assert_eq!(
            spec,
            IndexSpec::new("^N225", "Nikkei 225", NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
    }

    #[test]
    fn unknown_symbol_lookup_is_none() {
        assert!(IndexUniverse::default_indices().get("^DJI").is_none());
    }
}
