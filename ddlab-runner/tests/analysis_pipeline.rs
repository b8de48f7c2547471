//! Integration tests for the runner's load-then-analyze pipeline.
//!
//! A static in-memory provider stands in for Yahoo Finance; the Parquet
//! cache is real and lives in a per-test temp directory.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::NaiveDate;
use ddlab_core::analysis::AlertLevel;
use ddlab_core::data::{
    DataError, DataProvider, DataSource, FetchResult, IndexSpec, ParquetCache,
};
use ddlab_core::domain::PricePoint;
use ddlab_runner::{
    analyze_index, analyze_universe, load_prices, AnalysisConfig, AnalyzeError, LoadError,
    LoadOptions,
};

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_cache_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "ddlab_runner_pipeline_{}_{id}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

// ── Test providers ───────────────────────────────────────────────────

/// Serves a fixed series for every symbol and counts calls.
struct StaticProvider {
    points: Vec<PricePoint>,
    calls: AtomicUsize,
}

impl StaticProvider {
    fn new(points: Vec<PricePoint>) -> Self {
        Self {
            points,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if symbol == "^BROKEN" {
            return Err(DataError::NetworkUnreachable("connection reset".into()));
        }
        let points = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            points,
            source: DataSource::YahooFinance,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Always fails, as a blocked or unreachable upstream would.
struct FailingProvider;

impl DataProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn fetch(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        Err(DataError::NetworkUnreachable("no route to host".into()))
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// 2020-01-02 .. 2020-01-10 closes: peak 120 on the 6th, then a pullback.
fn sample_points() -> Vec<PricePoint> {
    vec![
        PricePoint::new(d(2020, 1, 2), 100.0),
        PricePoint::new(d(2020, 1, 3), 105.0),
        PricePoint::new(d(2020, 1, 6), 120.0),
        PricePoint::new(d(2020, 1, 7), 96.0),
        PricePoint::new(d(2020, 1, 8), 102.0),
        PricePoint::new(d(2020, 1, 9), 108.0),
        PricePoint::new(d(2020, 1, 10), 114.0),
    ]
}

fn opts(offline: bool, synthetic: bool) -> LoadOptions {
    LoadOptions {
        start: d(2020, 1, 1),
        end: d(2020, 1, 10),
        offline,
        synthetic,
        force: false,
    }
}

// ── Loading ──────────────────────────────────────────────────────────

#[test]
fn download_then_cache_hit() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());

    let first = load_prices("^GSPC", &cache, Some(&provider), &opts(false, false)).unwrap();
    assert_eq!(first.source, DataSource::YahooFinance);
    assert_eq!(first.points.len(), 7);

    let second = load_prices("^GSPC", &cache, Some(&provider), &opts(false, false)).unwrap();
    assert_eq!(second.source, DataSource::Cache);
    assert_eq!(second.points, first.points);
    assert_eq!(second.dataset_hash, first.dataset_hash);
    assert_eq!(provider.calls(), 1, "second load must not hit the network");
}

#[test]
fn force_redownloads_even_when_cached() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());

    load_prices("^GSPC", &cache, Some(&provider), &opts(false, false)).unwrap();
    let forced = LoadOptions {
        force: true,
        ..opts(false, false)
    };
    let again = load_prices("^GSPC", &cache, Some(&provider), &forced).unwrap();

    assert_eq!(again.source, DataSource::YahooFinance);
    assert_eq!(provider.calls(), 2);
}

#[test]
fn offline_without_cache_is_an_error() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());

    let err = load_prices("^GSPC", &cache, Some(&provider), &opts(true, false)).unwrap_err();

    assert!(matches!(err, LoadError::NoCachedDataOffline { .. }));
    assert_eq!(provider.calls(), 0);
}

#[test]
fn offline_uses_cache_written_earlier() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());
    load_prices("^GSPC", &cache, Some(&provider), &opts(false, false)).unwrap();

    let loaded = load_prices("^GSPC", &cache, None, &opts(true, false)).unwrap();
    assert_eq!(loaded.source, DataSource::Cache);
    assert_eq!(loaded.points.len(), 7);
}

#[test]
fn failed_download_is_a_hard_error() {
    let cache = ParquetCache::new(temp_cache_dir());

    let err = load_prices("^GSPC", &cache, Some(&FailingProvider), &opts(false, false))
        .unwrap_err();

    assert!(matches!(
        err,
        LoadError::DownloadFailed {
            source: DataError::NetworkUnreachable(_),
            ..
        }
    ));
    assert!(cache.get_meta("^GSPC").is_none(), "nothing may be cached");
}

#[test]
fn no_provider_online_is_an_error() {
    let cache = ParquetCache::new(temp_cache_dir());
    let err = load_prices("^GSPC", &cache, None, &opts(false, false)).unwrap_err();
    assert!(matches!(err, LoadError::NoProvider { .. }));
}

#[test]
fn synthetic_fallback_is_tagged() {
    let cache = ParquetCache::new(temp_cache_dir());

    let loaded =
        load_prices("^GSPC", &cache, Some(&FailingProvider), &opts(false, true)).unwrap();

    assert!(loaded.is_synthetic());
    // 2020-01-01 (Wed) .. 2020-01-10 (Fri): eight weekdays
    assert_eq!(loaded.points.len(), 8);
}

// ── Analysis ─────────────────────────────────────────────────────────

fn config_for(indices: Vec<IndexSpec>) -> AnalysisConfig {
    AnalysisConfig {
        indices,
        ..AnalysisConfig::default()
    }
}

#[test]
fn analyze_index_end_to_end() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());
    let spec = IndexSpec::new("^GSPC", "S&P 500", d(2020, 1, 1));
    let config = config_for(vec![spec.clone()]);

    let analysis = analyze_index(&spec, &config, &cache, Some(&provider), d(2020, 1, 10)).unwrap();
    let report = &analysis.report;

    // Calendar days 2020-01-02 .. 2020-01-10
    assert_eq!(report.daily.len(), 9);
    assert_eq!(report.first_date(), Some(d(2020, 1, 2)));
    assert!((report.current_drawdown - (114.0 / 120.0 - 1.0)).abs() < 1e-12);
    // Days strictly below -5%: 01-07 (-20%), 01-08 (-15%), 01-09 (-10%)
    assert!((report.percentile - 3.0 / 9.0 * 100.0).abs() < 1e-9);
    assert_eq!(analysis.alert, AlertLevel::Normal);
    assert_eq!(report.annual.len(), 1);
    assert_eq!(report.annual.get(2020), Some(-0.2));
}

#[test]
fn analyze_index_reports_no_result_on_download_failure() {
    let cache = ParquetCache::new(temp_cache_dir());
    let spec = IndexSpec::new("^GSPC", "S&P 500", d(2020, 1, 1));
    let config = config_for(vec![spec.clone()]);

    let err = analyze_index(&spec, &config, &cache, Some(&FailingProvider), d(2020, 1, 10))
        .unwrap_err();
    assert!(matches!(err, AnalyzeError::Data(LoadError::DownloadFailed { .. })));
}

#[test]
fn universe_keeps_config_order_and_isolates_failures() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());
    let config = config_for(vec![
        IndexSpec::new("^GSPC", "S&P 500", d(2020, 1, 1)),
        IndexSpec::new("^BROKEN", "Broken", d(2020, 1, 1)),
        IndexSpec::new("^TWII", "Taiwan Weighted Index", d(2020, 1, 1)),
    ]);

    let outcomes = analyze_universe(&config, &cache, Some(&provider), d(2020, 1, 10));

    let symbols: Vec<&str> = outcomes.iter().map(|o| o.spec.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["^GSPC", "^BROKEN", "^TWII"]);
    assert!(outcomes[0].result.is_ok());
    assert!(outcomes[1].result.is_err());
    assert!(outcomes[2].result.is_ok());
}

#[test]
fn start_date_filters_history() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(sample_points());
    // Starting after the peak: 01-07 becomes the first high-water mark
    let spec = IndexSpec::new("^GSPC", "S&P 500", d(2020, 1, 7));
    let config = config_for(vec![spec.clone()]);

    let analysis = analyze_index(&spec, &config, &cache, Some(&provider), d(2020, 1, 10)).unwrap();

    assert_eq!(analysis.report.first_date(), Some(d(2020, 1, 7)));
    assert_eq!(analysis.report.current_drawdown, 0.0);
    assert_eq!(analysis.report.percentile, 0.0);
    assert_eq!(analysis.alert, AlertLevel::Extreme);
}

// ── Cache integrity ──────────────────────────────────────────────────

/// Mid-year closes for 2021..2023; the 2022 close is the deep trough.
fn three_year_points() -> Vec<PricePoint> {
    vec![
        PricePoint::new(d(2021, 6, 1), 100.0),
        PricePoint::new(d(2022, 6, 1), 50.0),
        PricePoint::new(d(2023, 6, 1), 90.0),
    ]
}

fn three_year_opts(offline: bool) -> LoadOptions {
    LoadOptions {
        start: d(2021, 1, 1),
        end: d(2023, 12, 31),
        offline,
        synthetic: false,
        force: false,
    }
}

fn corrupt_partition(cache: &ParquetCache, symbol: &str, year: i32) {
    let path = cache
        .cache_dir()
        .join(format!("symbol={symbol}"))
        .join(format!("{year}.parquet"));
    std::fs::write(path, b"not a parquet file").unwrap();
}

#[test]
fn corrupt_partition_is_not_served_offline() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(three_year_points());
    load_prices("^GSPC", &cache, Some(&provider), &three_year_opts(false)).unwrap();
    corrupt_partition(&cache, "^GSPC", 2022);

    let err = load_prices("^GSPC", &cache, None, &three_year_opts(true)).unwrap_err();
    assert!(matches!(err, LoadError::NoCachedDataOffline { .. }));

    // Still refused on the next run; nothing partial was left behind
    let err = load_prices("^GSPC", &cache, None, &three_year_opts(true)).unwrap_err();
    assert!(matches!(err, LoadError::NoCachedDataOffline { .. }));
}

#[test]
fn corrupt_partition_triggers_redownload_online() {
    let cache = ParquetCache::new(temp_cache_dir());
    let provider = StaticProvider::new(three_year_points());
    load_prices("^GSPC", &cache, Some(&provider), &three_year_opts(false)).unwrap();
    corrupt_partition(&cache, "^GSPC", 2022);

    let spec = IndexSpec::new("^GSPC", "S&P 500", d(2021, 1, 1));
    let config = config_for(vec![spec.clone()]);
    let analysis =
        analyze_index(&spec, &config, &cache, Some(&provider), d(2023, 12, 31)).unwrap();

    assert_eq!(provider.calls(), 2);
    assert_eq!(analysis.source, DataSource::YahooFinance);
    assert_eq!(analysis.report.annual.get(2022), Some(-0.5));
    assert_eq!(cache.load("^GSPC").unwrap(), three_year_points());
}

// ── Provenance ───────────────────────────────────────────────────────

/// Replays recorded fixture data and labels it as synthetic.
struct ReplayProvider;

impl DataProvider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    fn fetch(&self, symbol: &str, _: NaiveDate, _: NaiveDate) -> Result<FetchResult, DataError> {
        Ok(FetchResult {
            symbol: symbol.to_string(),
            points: sample_points(),
            source: DataSource::Synthetic,
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}

#[test]
fn fetched_series_keeps_provider_source() {
    let cache = ParquetCache::new(temp_cache_dir());

    let loaded = load_prices("^GSPC", &cache, Some(&ReplayProvider), &opts(false, false)).unwrap();

    assert_eq!(loaded.source, DataSource::Synthetic);
    assert!(loaded.is_synthetic());
    assert_eq!(cache.get_meta("^GSPC").unwrap().source, DataSource::Synthetic);
}
