//! DDLab CLI: download, analyze, and cache inspection commands.
//!
//! Commands:
//! - `download`: fetch index closes from Yahoo Finance and cache as Parquet
//! - `analyze`: drawdown analysis for the default universe, a TOML config, or one index
//! - `cache status`: report cache size, symbol count, date ranges

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use ddlab_core::data::{
    download_symbols, CircuitBreaker, DataProvider, IndexSpec, IndexUniverse, ParquetCache,
    StdoutProgress, YahooProvider,
};
use ddlab_runner::{analyze_universe, render_summary, save_artifacts, AnalysisConfig};

#[derive(Parser)]
#[command(
    name = "ddlab",
    about = "DDLab CLI: index maximum-drawdown analyzer"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download index closes from Yahoo Finance and cache as Parquet.
    Download {
        /// Symbols to download (e.g., ^GSPC ^TWII).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to the earliest start of the default universe.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
    /// Analyze drawdowns for the default universe, a TOML config, or a single index.
    Analyze {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Single index symbol (e.g., ^GSPC).
        #[arg(long)]
        index: Option<String>,

        /// Display name for --index. Defaults to the universe name or the symbol.
        #[arg(long)]
        name: Option<String>,

        /// Analysis start date (YYYY-MM-DD). Required with --index for symbols outside
        /// the default universe.
        #[arg(long)]
        start: Option<String>,

        /// Offline mode: no network access.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Use synthetic data as fallback.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Cache directory. Overrides the config file; defaults to ./data.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output directory for report artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Number of recent years shown in the annual table.
        #[arg(long, default_value_t = 10)]
        years: usize,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cache size, symbol count, and date ranges.
    Status {
        /// Cache directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            symbols,
            start,
            end,
            force,
            cache_dir,
        } => run_download(symbols, start, end, force, cache_dir),
        Commands::Analyze {
            config,
            index,
            name,
            start,
            offline,
            synthetic,
            force,
            cache_dir,
            output_dir,
            years,
        } => {
            let args = AnalyzeArgs {
                config,
                index,
                name,
                start,
                offline,
                synthetic,
                force,
                cache_dir,
            };
            run_analyze(args, &output_dir, years)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir } => run_cache_status(&cache_dir),
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn yahoo_provider() -> Result<YahooProvider> {
    let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
    Ok(YahooProvider::new(circuit_breaker)?)
}

fn run_download(
    symbols: Vec<String>,
    start: Option<String>,
    end: Option<String>,
    force: bool,
    cache_dir: PathBuf,
) -> Result<()> {
    let universe = IndexUniverse::default_indices();
    let start_date = match start.as_deref() {
        Some(s) => parse_date(s)?,
        None => universe
            .indices
            .iter()
            .map(|spec| spec.start_date)
            .min()
            .context("default universe is empty")?,
    };
    let end_date = match end.as_deref() {
        Some(s) => parse_date(s)?,
        None => chrono::Local::now().date_naive(),
    };
    if start_date > end_date {
        bail!("--start ({start_date}) is after --end ({end_date})");
    }

    let provider = yahoo_provider()?;
    let cache = ParquetCache::new(cache_dir);
    let progress = StdoutProgress;

    tracing::info!(symbols = symbols.len(), %start_date, %end_date, force, "starting download");
    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
    let summary = download_symbols(
        &provider, &cache, &sym_refs, start_date, end_date, force, &progress,
    );

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

struct AnalyzeArgs {
    config: Option<PathBuf>,
    index: Option<String>,
    name: Option<String>,
    start: Option<String>,
    offline: bool,
    synthetic: bool,
    force: bool,
    cache_dir: Option<PathBuf>,
}

/// Merge the config file (or defaults) with command-line overrides.
fn build_config(args: AnalyzeArgs) -> Result<AnalysisConfig> {
    if args.config.is_some() && args.index.is_some() {
        bail!("--config and --index are mutually exclusive");
    }
    if args.index.is_none() && (args.start.is_some() || args.name.is_some()) {
        bail!("--start and --name require --index");
    }

    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(symbol) = args.index {
        let known = IndexUniverse::default_indices().get(&symbol).cloned();
        let start_date = match (args.start.as_deref(), &known) {
            (Some(s), _) => parse_date(s)?,
            (None, Some(spec)) => spec.start_date,
            (None, None) => bail!("--start is required for index '{symbol}'"),
        };
        let name = args
            .name
            .or_else(|| known.map(|spec| spec.name))
            .unwrap_or_else(|| symbol.clone());
        config.indices = vec![IndexSpec::new(symbol, name, start_date)];
    }

    config.offline |= args.offline;
    config.synthetic |= args.synthetic;
    config.force |= args.force;
    if let Some(dir) = args.cache_dir {
        config.cache_dir = dir;
    }
    config.validate()?;
    Ok(config)
}

fn run_analyze(args: AnalyzeArgs, output_dir: &Path, years: usize) -> Result<()> {
    let config = build_config(args)?;

    let cache = ParquetCache::new(&config.cache_dir);
    let provider = if config.offline {
        None
    } else {
        Some(yahoo_provider()?)
    };
    let provider_ref = provider.as_ref().map(|p| p as &dyn DataProvider);
    let today = chrono::Local::now().date_naive();

    tracing::info!(
        indices = config.indices.len(),
        offline = config.offline,
        synthetic = config.synthetic,
        cache_dir = %config.cache_dir.display(),
        "starting analysis"
    );
    let outcomes = analyze_universe(&config, &cache, provider_ref, today);

    let mut failed = 0;
    for outcome in outcomes {
        match outcome.result {
            Ok(analysis) => {
                println!();
                print!("{}", render_summary(&analysis, years));
                let run_dir = save_artifacts(&analysis, output_dir)?;
                println!("Artifacts saved to: {}", run_dir.display());
            }
            Err(e) => {
                failed += 1;
                eprintln!("Error for {}: {:#}", outcome.spec.symbol, anyhow::Error::new(e));
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let cache = ParquetCache::new(cache_dir);
    let symbols = cache.list_symbols()?;
    if symbols.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let mut total_size: u64 = 0;
    let mut rows: Vec<(String, String, String, u64)> = Vec::with_capacity(symbols.len());
    for symbol in &symbols {
        let (date_range, points) = match cache.get_meta(symbol) {
            Some(meta) => (
                format!("{} to {}", meta.start_date, meta.end_date),
                format!("{} days", meta.point_count),
            ),
            None => ("(no meta)".into(), "-".into()),
        };
        let size = cache.symbol_size(symbol);
        total_size += size;
        rows.push((symbol.clone(), date_range, points, size));
    }

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", rows.len());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!("{:<8} {:<25} {:<12} {:>10}", "Symbol", "Date Range", "Points", "Size");
    println!("{}", "-".repeat(58));
    for (sym, range, points, size) in &rows {
        println!("{:<8} {:<25} {:<12} {:>10}", sym, range, points, format_size(*size));
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
