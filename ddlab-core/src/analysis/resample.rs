//! Calendar-day resampling with forward-fill.

use crate::domain::PricePoint;

/// Resample a validated, date-ordered series to one point per calendar day.
///
/// The output spans `[first.date, last.date]` with no gaps. Days without an
/// observation carry the most recent observed price. When a date appears more
/// than once, the last observation for that date wins.
///
/// Returns an empty vector for empty input.
pub fn forward_fill_daily(points: &[PricePoint]) -> Vec<PricePoint> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };

    let span = (last.date - first.date).num_days() as usize + 1;
    let mut filled = Vec::with_capacity(span);
    let mut observed = points.iter().peekable();
    let mut carried = first.price;

    for day in first.date.iter_days().take(span) {
        while let Some(p) = observed.next_if(|p| p.date == day) {
            carried = p.price;
        }
        filled.push(PricePoint::new(day, carried));
    }

    filled
}
