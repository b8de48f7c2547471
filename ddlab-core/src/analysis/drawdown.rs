//! Drawdown analyzer: daily drawdown history, annual worst drawdowns,
//! the current reading and its historical percentile rank.
//!
//! Every function here is pure: price series in, derived tables out.
//! Nothing is cached between calls, so indices can be analyzed on separate
//! threads without coordination.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::resample::forward_fill_daily;
use crate::domain::PricePoint;

/// Rejected analyzer input. No partial report is produced for any of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("price series is empty")]
    EmptySeries,

    #[error("non-positive price {price} on {date}")]
    NonPositivePrice { date: NaiveDate, price: f64 },

    #[error("price series out of order: {date} follows {previous}")]
    OutOfOrder { previous: NaiveDate, date: NaiveDate },

    #[error("start date {start} is after the last available price date {last}")]
    StartAfterLastDate { start: NaiveDate, last: NaiveDate },
}

/// Drawdown state of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    /// Close for the day, forward-filled on non-trading days.
    pub price: f64,
    /// Highest price seen up to and including this day.
    pub running_max: f64,
    /// `(price - running_max) / running_max`, always in `[-1, 0]`.
    pub drawdown: f64,
}

/// One [`DrawdownPoint`] per calendar day, contiguous and strictly increasing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailySeries {
    points: Vec<DrawdownPoint>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DrawdownPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawdownPoint> {
        self.points.iter()
    }

    pub fn first(&self) -> Option<&DrawdownPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&DrawdownPoint> {
        self.points.last()
    }

    /// The deepest drawdown in the series (the classic maximum drawdown).
    ///
    /// On ties the earliest day is returned.
    pub fn worst(&self) -> Option<&DrawdownPoint> {
        self.points.iter().fold(None, |worst, p| match worst {
            Some(w) if w.drawdown <= p.drawdown => Some(w),
            _ => Some(p),
        })
    }
}

impl<'a> IntoIterator for &'a DailySeries {
    type Item = &'a DrawdownPoint;
    type IntoIter = std::slice::Iter<'a, DrawdownPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Worst daily drawdown of a calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnualDrawdown {
    pub year: i32,
    pub min_drawdown: f64,
}

/// One [`AnnualDrawdown`] per year present in a [`DailySeries`], ascending.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnualSeries {
    rows: Vec<AnnualDrawdown>,
}

impl AnnualSeries {
    /// Group a daily series by calendar year and keep each year's minimum.
    pub fn from_daily(daily: &DailySeries) -> Self {
        let mut rows: Vec<AnnualDrawdown> = Vec::new();
        for p in daily {
            let year = p.date.year();
            match rows.last_mut() {
                Some(row) if row.year == year => {
                    row.min_drawdown = row.min_drawdown.min(p.drawdown);
                }
                _ => rows.push(AnnualDrawdown {
                    year,
                    min_drawdown: p.drawdown,
                }),
            }
        }
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[AnnualDrawdown] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnnualDrawdown> {
        self.rows.iter()
    }

    /// Worst drawdown for `year`, if the year is covered.
    pub fn get(&self, year: i32) -> Option<f64> {
        self.rows
            .binary_search_by_key(&year, |r| r.year)
            .ok()
            .map(|i| self.rows[i].min_drawdown)
    }
}

impl<'a> IntoIterator for &'a AnnualSeries {
    type Item = &'a AnnualDrawdown;
    type IntoIter = std::slice::Iter<'a, AnnualDrawdown>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Complete drawdown analysis of one price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawdownReport {
    pub daily: DailySeries,
    pub annual: AnnualSeries,
    /// Drawdown of the most recent day.
    pub current_drawdown: f64,
    /// Percentage of days with a drawdown strictly worse than the current one.
    pub percentile: f64,
}

impl DrawdownReport {
    /// Analyze `prices` from `start_date` onwards.
    ///
    /// Points dated before `start_date` are ignored. The remaining points are
    /// resampled to calendar days with forward-fill, then the running maximum,
    /// daily drawdown, annual minimums, current reading and percentile rank
    /// are derived from that daily series.
    ///
    /// A single remaining point is a valid, degenerate range: one day with
    /// drawdown 0 and percentile 0.
    pub fn compute(prices: &[PricePoint], start_date: NaiveDate) -> Result<Self, InvalidInput> {
        validate(prices)?;

        let first_kept = prices.partition_point(|p| p.date < start_date);
        let window = &prices[first_kept..];
        if window.is_empty() {
            // validate() guarantees a last point
            let last = prices[prices.len() - 1].date;
            return Err(InvalidInput::StartAfterLastDate {
                start: start_date,
                last,
            });
        }

        let daily = drawdown_series(&forward_fill_daily(window));
        let annual = AnnualSeries::from_daily(&daily);
        let current_drawdown = daily.last().map_or(0.0, |p| p.drawdown);
        let percentile = percentile_rank(&daily, current_drawdown);

        tracing::debug!(
            observations = window.len(),
            days = daily.len(),
            years = annual.len(),
            current_drawdown,
            percentile,
            "drawdown computed"
        );

        Ok(Self {
            daily,
            annual,
            current_drawdown,
            percentile,
        })
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.daily.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.daily.last().map(|p| p.date)
    }
}

// ─── Building blocks ────────────────────────────────────────────────

/// Reject empty, unordered or non-positive input.
fn validate(prices: &[PricePoint]) -> Result<(), InvalidInput> {
    if prices.is_empty() {
        return Err(InvalidInput::EmptySeries);
    }
    if let Some(bad) = prices.iter().find(|p| !p.is_valid()) {
        return Err(InvalidInput::NonPositivePrice {
            date: bad.date,
            price: bad.price,
        });
    }
    if let Some(pair) = prices.windows(2).find(|w| w[1].date < w[0].date) {
        return Err(InvalidInput::OutOfOrder {
            previous: pair[0].date,
            date: pair[1].date,
        });
    }
    Ok(())
}

/// Running maximum and drawdown for an already daily series.
///
/// The running maximum is seeded with the first price. Prices are assumed
/// positive, so the running maximum is never zero.
pub fn drawdown_series(daily_prices: &[PricePoint]) -> DailySeries {
    let mut running_max = match daily_prices.first() {
        Some(p) => p.price,
        None => return DailySeries::default(),
    };

    let points = daily_prices
        .iter()
        .map(|p| {
            running_max = running_max.max(p.price);
            DrawdownPoint {
                date: p.date,
                price: p.price,
                running_max,
                drawdown: (p.price - running_max) / running_max,
            }
        })
        .collect();

    DailySeries { points }
}

/// Percentage of days whose drawdown is strictly below `current`.
///
/// Ties with `current` are not counted. Returns 0.0 for an empty series.
pub fn percentile_rank(daily: &DailySeries, current: f64) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }
    let worse = daily.iter().filter(|p| p.drawdown < current).count();
    worse as f64 / daily.len() as f64 * 100.0
}
