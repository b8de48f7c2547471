//! Parquet price cache with Hive-style partitioning.
//!
//! Layout: `{cache_dir}/symbol={SYMBOL}/{year}.parquet`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - A write replaces the whole symbol; stale year partitions are removed
//! - Integrity validation on load (schema check, row count > 0)
//! - Quarantine for corrupt files ({filename}.quarantined); the symbol's
//!   entry is then invalidated, never served partially
//! - Metadata sidecar per symbol (hash, requested and actual range, source)

use super::provider::{DataError, DataSource};
use crate::domain::PricePoint;
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const SYMBOL_DIR_PREFIX: &str = "symbol=";

/// Metadata sidecar for a cached symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub symbol: String,
    /// Range that was requested from the provider.
    pub requested_start: NaiveDate,
    pub requested_end: NaiveDate,
    /// Range actually present in the cached data.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub point_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub cached_at: chrono::NaiveDateTime,
}

/// How well the cache covers a requested date range.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageResult {
    NotCached,
    FullyCovered,
    PartiallyCovered {
        cached_start: NaiveDate,
        cached_end: NaiveDate,
    },
}

/// The Parquet cache.
pub struct ParquetCache {
    cache_dir: PathBuf,
}

impl ParquetCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `{cache_dir}/symbol={SYMBOL}/`, with path separators in the symbol replaced.
    fn symbol_dir(&self, symbol: &str) -> PathBuf {
        let safe: String = symbol
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.cache_dir.join(format!("{SYMBOL_DIR_PREFIX}{safe}"))
    }

    fn year_path(&self, symbol: &str, year: i32) -> PathBuf {
        self.symbol_dir(symbol).join(format!("{year}.parquet"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.symbol_dir(symbol).join("meta.json")
    }

    /// Replace the cached series for a symbol.
    ///
    /// `requested_start..=requested_end` is the window asked of the provider;
    /// it is recorded so later coverage checks do not re-download a range the
    /// provider simply has no data for.
    pub fn write(
        &self,
        symbol: &str,
        points: &[PricePoint],
        requested_start: NaiveDate,
        requested_end: NaiveDate,
        source: DataSource,
    ) -> Result<(), DataError> {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return Err(DataError::CacheError("no prices to cache".into()));
        };

        let sym_dir = self.symbol_dir(symbol);
        fs::create_dir_all(&sym_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut by_year: BTreeMap<i32, Vec<&PricePoint>> = BTreeMap::new();
        for p in points {
            by_year.entry(p.date.year()).or_default().push(p);
        }

        for (year, year_points) in &by_year {
            let mut df = points_to_dataframe(year_points)?;
            let path = self.year_path(symbol, *year);
            let tmp_path = path.with_extension("parquet.tmp");

            write_parquet(&mut df, &tmp_path)?;

            fs::rename(&tmp_path, &path).map_err(|e| {
                let _ = fs::remove_file(&tmp_path);
                DataError::CacheError(format!("atomic rename failed: {e}"))
            })?;
        }

        self.remove_stale_partitions(symbol, &by_year)?;

        let meta = CacheMeta {
            symbol: symbol.to_string(),
            requested_start,
            requested_end,
            start_date: first.date,
            end_date: last.date,
            point_count: points.len(),
            data_hash: hash_points(points),
            source,
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(symbol), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        tracing::debug!(symbol, points = points.len(), "cached price series");
        Ok(())
    }

    fn remove_stale_partitions(
        &self,
        symbol: &str,
        written: &BTreeMap<i32, Vec<&PricePoint>>,
    ) -> Result<(), DataError> {
        let entries = fs::read_dir(self.symbol_dir(symbol))
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }
            let year = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i32>().ok());
            if year.is_some_and(|y| !written.contains_key(&y)) {
                fs::remove_file(&path)
                    .map_err(|e| DataError::CacheError(format!("remove stale partition: {e}")))?;
            }
        }
        Ok(())
    }

    /// Load all cached prices for a symbol, sorted by date ascending.
    ///
    /// The series is all-or-nothing: a quarantined partition, or data that no
    /// longer matches the point count and hash in `meta.json`, invalidates the
    /// entry (its `meta.json` is removed) and returns `CacheError`.
    pub fn load(&self, symbol: &str) -> Result<Vec<PricePoint>, DataError> {
        let sym_dir = self.symbol_dir(symbol);
        if !sym_dir.exists() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        let mut all_points = Vec::new();
        let mut quarantined = 0usize;

        let entries =
            fs::read_dir(&sym_dir).map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;

        for entry in entries {
            let entry = entry.map_err(|e| DataError::CacheError(format!("dir entry: {e}")))?;
            let path = entry.path();

            // meta.json, .quarantined, .tmp
            if path.extension().and_then(|e| e.to_str()) != Some("parquet") {
                continue;
            }

            match load_and_validate_parquet(&path) {
                Ok(points) => all_points.extend(points),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "quarantining corrupt cache file"
                    );
                    let _ = fs::rename(&path, &quarantine);
                    quarantined += 1;
                }
            }
        }

        if quarantined > 0 {
            self.invalidate(symbol);
            return Err(DataError::CacheError(format!(
                "{quarantined} corrupt partition(s) quarantined for '{symbol}'"
            )));
        }

        if all_points.is_empty() {
            return Err(DataError::NoCachedData {
                symbol: symbol.to_string(),
            });
        }

        all_points.sort_by_key(|p| p.date);

        if let Some(meta) = self.get_meta(symbol) {
            if meta.point_count != all_points.len() || meta.data_hash != hash_points(&all_points) {
                tracing::warn!(
                    symbol,
                    expected = meta.point_count,
                    found = all_points.len(),
                    "cached data does not match its metadata"
                );
                self.invalidate(symbol);
                return Err(DataError::CacheError(format!(
                    "cached data for '{symbol}' does not match meta.json"
                )));
            }
        }

        Ok(all_points)
    }

    /// Drop the metadata sidecar and the remaining partitions so the symbol
    /// reads as not cached. Quarantined files are kept for inspection.
    fn invalidate(&self, symbol: &str) {
        let mut to_remove = vec![self.meta_path(symbol)];
        if let Ok(entries) = fs::read_dir(self.symbol_dir(symbol)) {
            to_remove.extend(
                entries
                    .flatten()
                    .map(|e| e.path())
                    .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("parquet")),
            );
        }
        for path in to_remove {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to invalidate cache file");
                }
            }
        }
    }

    pub fn get_meta(&self, symbol: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether the cached download for a symbol covers `start..=end`.
    pub fn covers_range(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CoverageResult {
        match self.get_meta(symbol) {
            None => CoverageResult::NotCached,
            Some(meta) if meta.requested_start <= start && meta.requested_end >= end => {
                CoverageResult::FullyCovered
            }
            Some(meta) => CoverageResult::PartiallyCovered {
                cached_start: meta.start_date,
                cached_end: meta.end_date,
            },
        }
    }

    /// Symbols with a directory in the cache, sorted.
    pub fn list_symbols(&self) -> Result<Vec<String>, DataError> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("read dir: {e}")))?;
        let mut symbols: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_prefix(SYMBOL_DIR_PREFIX))
                    .map(str::to_string)
            })
            .collect();
        symbols.sort();
        Ok(symbols)
    }

    /// Total size in bytes of the files cached for a symbol.
    pub fn symbol_size(&self, symbol: &str) -> u64 {
        fs::read_dir(self.symbol_dir(symbol))
            .map(|entries| {
                entries
                    .flatten()
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Deterministic BLAKE3 hash over dates and closes.
pub fn hash_points(points: &[PricePoint]) -> String {
    let mut hasher = blake3::Hasher::new();
    for p in points {
        hasher.update(p.date.to_string().as_bytes());
        hasher.update(&p.price.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn points_to_dataframe(points: &[&PricePoint]) -> Result<DataFrame, DataError> {
    let dates: Vec<i32> = points
        .iter()
        .map(|p| (p.date - epoch()).num_days() as i32)
        .collect();
    let closes: Vec<f64> = points.iter().map(|p| p.price).collect();

    DataFrame::new(vec![
        Column::new("date".into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
        Column::new("close".into(), closes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<PricePoint>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::ValidationError("empty parquet file".into()));
    }

    for col_name in ["date", "close"] {
        if df.column(col_name).is_err() {
            return Err(DataError::ValidationError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_points(&df)
}

fn dataframe_to_points(df: &DataFrame) -> Result<Vec<PricePoint>, DataError> {
    let map_err = |e: PolarsError| DataError::ParquetError(format!("column read: {e}"));

    let date_ca = df
        .column("date")
        .map_err(map_err)?
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;
    let close_ca = df
        .column("close")
        .map_err(map_err)?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("close column type: {e}")))?;

    let n = df.height();
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        let close = close_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null close at row {i}")))?;
        points.push(PricePoint::new(
            epoch() + chrono::Duration::days(days as i64),
            close,
        ));
    }

    Ok(points)
}
