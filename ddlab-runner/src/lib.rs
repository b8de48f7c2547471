//! DDLab Runner: index loading, analysis orchestration and export.
//!
//! This crate builds on `ddlab-core` to provide:
//! - TOML run configuration
//! - Price loading with cache/download/synthetic fallback
//! - Per-index and universe-wide drawdown analysis
//! - JSON/CSV artifacts and the terminal summary

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use config::{AnalysisConfig, ConfigError};
pub use data_loader::{load_prices, LoadError, LoadOptions, LoadedSeries};
pub use export::{
    export_annual_csv, export_daily_csv, export_json, import_json, load_artifacts,
    render_summary, save_artifacts,
};
pub use runner::{
    analyze_index, analyze_prices, analyze_universe, AnalyzeError, IndexAnalysis, IndexOutcome,
    SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn index_analysis_is_send_sync() {
        assert_send::<IndexAnalysis>();
        assert_sync::<IndexAnalysis>();
    }

    #[test]
    fn outcome_is_send() {
        assert_send::<IndexOutcome>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<AnalysisConfig>();
        assert_sync::<AnalysisConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
        assert_send::<LoadedSeries>();
        assert_sync::<LoadedSeries>();
    }
}
