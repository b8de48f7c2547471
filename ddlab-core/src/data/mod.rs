//! Price data: providers, caching and the index universe

pub mod cache;
pub mod circuit_breaker;
pub mod download;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use cache::{hash_points, CacheMeta, CoverageResult, ParquetCache};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use download::{download_single, download_symbols, DownloadSummary};
pub use provider::{
    DataError, DataProvider, DataSource, DownloadProgress, FetchResult, StdoutProgress,
};
pub use universe::{IndexSpec, IndexUniverse};
pub use yahoo::YahooProvider;
