//! Analysis runner: wires together price loading, the drawdown analyzer
//! and alert classification.
//!
//! Two entry points:
//! - `analyze_index()`: one index, loading its prices first. Used by the CLI.
//! - `analyze_universe()`: every index of a config, in parallel.
//!
//! `analyze_prices()` is the pure tail shared by both, for callers that
//! already hold a price series.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ddlab_core::analysis::{AlertLevel, AlertThresholds, DrawdownReport, InvalidInput};
use ddlab_core::data::{DataProvider, DataSource, IndexSpec, ParquetCache};

use crate::config::AnalysisConfig;
use crate::data_loader::{load_prices, LoadError, LoadOptions, LoadedSeries};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("data error: {0}")]
    Data(#[from] LoadError),

    #[error("invalid price series for '{symbol}': {source}")]
    Input {
        symbol: String,
        #[source]
        source: InvalidInput,
    },
}

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Drawdown analysis of one index, ready for export or display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexAnalysis {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub symbol: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub report: DrawdownReport,
    pub alert: AlertLevel,
    pub thresholds: AlertThresholds,
    pub source: DataSource,
    pub dataset_hash: String,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl IndexAnalysis {
    pub fn is_synthetic(&self) -> bool {
        self.source == DataSource::Synthetic
    }

    /// Human-readable explanation of the alert level.
    pub fn alert_description(&self) -> String {
        self.alert.describe(&self.thresholds)
    }
}

/// Outcome for one index of a universe run. Failures stay per index.
#[derive(Debug)]
pub struct IndexOutcome {
    pub spec: IndexSpec,
    pub result: Result<IndexAnalysis, AnalyzeError>,
}

/// Analyze an already loaded series.
pub fn analyze_prices(
    spec: &IndexSpec,
    series: &LoadedSeries,
    thresholds: &AlertThresholds,
) -> Result<IndexAnalysis, AnalyzeError> {
    let report = DrawdownReport::compute(&series.points, spec.start_date).map_err(|source| {
        AnalyzeError::Input {
            symbol: spec.symbol.clone(),
            source,
        }
    })?;
    let alert = AlertLevel::classify(report.percentile, thresholds);

    tracing::info!(
        symbol = %spec.symbol,
        current_drawdown = report.current_drawdown,
        percentile = report.percentile,
        %alert,
        "index analyzed"
    );

    Ok(IndexAnalysis {
        schema_version: SCHEMA_VERSION,
        symbol: spec.symbol.clone(),
        name: spec.name.clone(),
        start_date: spec.start_date,
        report,
        alert,
        thresholds: *thresholds,
        source: series.source,
        dataset_hash: series.dataset_hash.clone(),
    })
}

/// Load prices for one index and analyze them.
pub fn analyze_index(
    spec: &IndexSpec,
    config: &AnalysisConfig,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    end: NaiveDate,
) -> Result<IndexAnalysis, AnalyzeError> {
    let opts = LoadOptions {
        start: spec.start_date,
        end,
        offline: config.offline,
        synthetic: config.synthetic,
        force: config.force,
    };
    let series = load_prices(&spec.symbol, cache, provider, &opts)?;
    analyze_prices(spec, &series, &config.thresholds)
}

/// Analyze every index in the config, in parallel.
///
/// Outcomes are returned in config order. One index failing does not stop
/// the others.
pub fn analyze_universe(
    config: &AnalysisConfig,
    cache: &ParquetCache,
    provider: Option<&dyn DataProvider>,
    end: NaiveDate,
) -> Vec<IndexOutcome> {
    config
        .indices
        .par_iter()
        .map(|spec| {
            let result = analyze_index(spec, config, cache, provider, end);
            if let Err(e) = &result {
                tracing::warn!(symbol = %spec.symbol, error = %e, "index analysis failed");
            }
            IndexOutcome {
                spec: spec.clone(),
                result,
            }
        })
        .collect()
}
