//! Criterion benchmarks for the drawdown analyzer.
//!
//! Benchmarks:
//! 1. Forward-fill resampling of trading-day closes
//! 2. Full report computation over 10, 35 and 70 years of history

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use chrono::{Datelike, NaiveDate, Weekday};
use ddlab_core::analysis::{forward_fill_daily, DrawdownReport};
use ddlab_core::domain::PricePoint;

// ── Helpers ──────────────────────────────────────────────────────────

/// Weekday-only closes following a slow oscillating trend.
fn make_trading_days(years: i64) -> Vec<PricePoint> {
    let start = NaiveDate::from_ymd_opt(1955, 1, 3).unwrap();
    start
        .iter_days()
        .take((years * 365) as usize)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .enumerate()
        .map(|(i, date)| {
            let price = 100.0 + i as f64 * 0.05 + (i as f64 * 0.01).sin() * 20.0;
            PricePoint::new(date, price)
        })
        .collect()
}

fn bench_resample(c: &mut Criterion) {
    let prices = make_trading_days(35);
    c.bench_function("forward_fill_daily_35y", |b| {
        b.iter(|| forward_fill_daily(black_box(&prices)))
    });
}

fn bench_compute(c: &mut Criterion) {
    let mut group = c.benchmark_group("drawdown_report");
    for years in [10, 35, 70] {
        let prices = make_trading_days(years);
        let start = prices[0].date;
        group.bench_with_input(BenchmarkId::from_parameter(years), &prices, |b, prices| {
            b.iter(|| DrawdownReport::compute(black_box(prices), start))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_resample, bench_compute);
criterion_main!(benches);
