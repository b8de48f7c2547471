//! Download orchestrator: fetch several symbols into the cache with progress reporting.

use super::cache::{CoverageResult, ParquetCache};
use super::provider::{DataError, DataProvider, DownloadProgress};
use chrono::NaiveDate;

/// Download and cache several symbols over the same date range.
///
/// Symbols already covered by the cache are skipped unless `force` is set.
/// Once the provider's circuit breaker trips, the remaining symbols are
/// reported as failed without further requests.
pub fn download_symbols(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    symbols: &[&str],
    start: NaiveDate,
    end: NaiveDate,
    force: bool,
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = symbols.len();
    let mut succeeded = 0;
    let mut failed = 0;
    let mut errors: Vec<(String, DataError)> = Vec::new();

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        if !force && cache.covers_range(symbol, start, end) == CoverageResult::FullyCovered {
            tracing::debug!(symbol, "cache already covers requested range");
            progress.on_complete(symbol, i, total, &Ok(()));
            succeeded += 1;
            continue;
        }

        let result = download_single(provider, cache, symbol, start, end);
        progress.on_complete(symbol, i, total, &result);

        match result {
            Ok(()) => succeeded += 1,
            Err(e) => {
                errors.push((symbol.to_string(), e));
                failed += 1;
            }
        }

        if !provider.is_available() {
            for sym in &symbols[(i + 1)..total] {
                errors.push((sym.to_string(), DataError::CircuitBreakerTripped));
                failed += 1;
            }
            break;
        }
    }

    progress.on_batch_complete(succeeded, failed, total);

    DownloadSummary {
        total,
        succeeded,
        failed,
        errors,
    }
}

/// Fetch one symbol and replace its cache entry.
pub fn download_single(
    provider: &dyn DataProvider,
    cache: &ParquetCache,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(), DataError> {
    let fetched = provider.fetch(symbol, start, end)?;
    if fetched.points.is_empty() {
        return Err(DataError::EmptyRange {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    cache.write(symbol, &fetched.points, start, end, fetched.source)
}

#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl DownloadSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
