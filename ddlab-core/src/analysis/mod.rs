//! Drawdown analysis

pub mod alert;
pub mod drawdown;
pub mod resample;

pub use alert::{AlertLevel, AlertThresholds};
pub use drawdown::{
    drawdown_series, percentile_rank, AnnualDrawdown, AnnualSeries, DailySeries, DrawdownPoint,
    DrawdownReport, InvalidInput,
};
pub use resample::forward_fill_daily;
