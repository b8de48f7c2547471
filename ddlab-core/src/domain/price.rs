//! PricePoint: a single daily close for one index.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Closing price of an index on a single calendar date.
///
/// Provider output and analyzer input. Series of price points are expected
/// in non-decreasing date order; gaps (weekends, holidays) are normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }

    /// A usable close is finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}
