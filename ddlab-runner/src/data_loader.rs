//! Price loading for the runner.
//!
//! Resolves a symbol's closing prices with this fallback policy:
//! 1. Cache covers the requested window (and not `force`) and loads intact → use it
//! 2. Offline with a partially covering cache → use what is cached
//! 3. Provider available → download, cache, use
//! 4. `synthetic` → generate a tagged random walk
//! 5. Otherwise → fail; a failed fetch is never turned into a partial series
//!
//! Synthetic data is a developer-only debug mode and is always tagged.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use ddlab_core::data::{
    hash_points, CoverageResult, DataError, DataProvider, DataSource, FetchResult, ParquetCache,
};
use ddlab_core::domain::PricePoint;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(
        "no cached data for '{symbol}' and no network access (use --synthetic for synthetic data)"
    )]
    NoCachedDataOffline { symbol: String },

    #[error("download failed for '{symbol}': {source}")]
    DownloadFailed {
        symbol: String,
        #[source]
        source: DataError,
    },

    #[error("no provider configured to download '{symbol}'")]
    NoProvider { symbol: String },

    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how prices are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// First date requested.
    pub start: NaiveDate,
    /// Last date requested (normally today).
    pub end: NaiveDate,
    /// Never make network requests.
    pub offline: bool,
    /// Generate synthetic prices when real data is unavailable.
    pub synthetic: bool,
    /// Re-download even if cached.
    pub force: bool,
}

/// A resolved price series with provenance.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
    pub source: DataSource,
    /// BLAKE3 over dates and closes.
    pub dataset_hash: String,
}

impl LoadedSeries {
    fn new(symbol: &str, points: Vec<PricePoint>, source: DataSource) -> Self {
        let dataset_hash = hash_points(&points);
        Self {
            symbol: symbol.to_string(),
            points,
            source,
            dataset_hash,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }
}

/// Resolve the closing prices for one symbol.
pub fn load_prices(
    symbol: &str,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    opts: &LoadOptions,
) -> Result<LoadedSeries, LoadError> {
    if !opts.force {
        match cache.covers_range(symbol, opts.start, opts.end) {
            CoverageResult::FullyCovered => match cache.load(symbol) {
                Ok(points) => {
                    tracing::info!(symbol, points = points.len(), "loaded prices from cache");
                    return Ok(LoadedSeries::new(symbol, points, DataSource::Cache));
                }
                Err(e) => tracing::warn!(symbol, error = %e, "cached prices unusable"),
            },
            CoverageResult::PartiallyCovered {
                cached_start,
                cached_end,
            } if opts.offline => match cache.load(symbol) {
                Ok(points) => {
                    tracing::warn!(
                        symbol,
                        %cached_start,
                        %cached_end,
                        "offline: cache only partially covers the requested range"
                    );
                    return Ok(LoadedSeries::new(symbol, points, DataSource::Cache));
                }
                Err(e) => tracing::warn!(symbol, error = %e, "cached prices unusable"),
            },
            _ => {}
        }
    }

    let mut fetch_error = None;
    if !opts.offline {
        match provider {
            Some(prov) if prov.is_available() => match fetch_and_cache(prov, cache, symbol, opts) {
                Ok(fetched) => {
                    return Ok(LoadedSeries::new(symbol, fetched.points, fetched.source));
                }
                Err(e) => {
                    tracing::warn!(symbol, provider = prov.name(), error = %e, "download failed");
                    fetch_error = Some(e);
                }
            },
            Some(prov) => {
                tracing::warn!(symbol, provider = prov.name(), "provider unavailable");
                fetch_error = Some(DataError::CircuitBreakerTripped);
            }
            None => {}
        }
    }

    if opts.synthetic {
        tracing::warn!(symbol, "generating synthetic prices; results are tagged as synthetic");
        let points = generate_synthetic_points(symbol, opts.start, opts.end);
        return Ok(LoadedSeries::new(symbol, points, DataSource::Synthetic));
    }

    if opts.offline {
        return Err(LoadError::NoCachedDataOffline {
            symbol: symbol.to_string(),
        });
    }
    match fetch_error {
        Some(source) => Err(LoadError::DownloadFailed {
            symbol: symbol.to_string(),
            source,
        }),
        None => Err(LoadError::NoProvider {
            symbol: symbol.to_string(),
        }),
    }
}

fn fetch_and_cache(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    symbol: &str,
    opts: &LoadOptions,
) -> Result<FetchResult, DataError> {
    let fetched = provider.fetch(symbol, opts.start, opts.end)?;
    if fetched.points.is_empty() {
        return Err(DataError::EmptyRange {
            symbol: symbol.to_string(),
            start: opts.start,
            end: opts.end,
        });
    }
    cache.write(symbol, &fetched.points, opts.start, opts.end, fetched.source)?;
    Ok(fetched)
}

/// Deterministic weekday-only random walk starting at 100.0.
///
/// Seeded from the symbol so repeated runs agree.
fn generate_synthetic_points(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(symbol.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut price = 100.0_f64;
    let mut points = Vec::new();
    let mut current = start;

    while current <= end {
        if !matches!(current.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            price *= 1.0 + daily_return;
            points.push(PricePoint::new(current, price));
        }
        current += chrono::Duration::days(1);
    }

    points
}
