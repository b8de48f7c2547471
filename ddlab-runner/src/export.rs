//! Reporting and export: JSON, CSV and plain-text summaries.
//!
//! - **JSON**: full round-trip serialization of an `IndexAnalysis` with schema versioning
//! - **CSV**: daily and annual drawdown series for charting tools
//! - **Text**: the terminal summary (percentages rounded to 2 decimals)
//!
//! Unknown schema versions are rejected on load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ddlab_core::analysis::{AnnualSeries, DailySeries};

use crate::runner::{IndexAnalysis, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(analysis: &IndexAnalysis) -> Result<String> {
    serde_json::to_string_pretty(analysis).context("failed to serialize IndexAnalysis to JSON")
}

pub fn import_json(json: &str) -> Result<IndexAnalysis> {
    let analysis: IndexAnalysis =
        serde_json::from_str(json).context("failed to deserialize IndexAnalysis from JSON")?;
    if analysis.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            analysis.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(analysis)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: date, price, running_max, drawdown
pub fn export_daily_csv(daily: &DailySeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "price", "running_max", "drawdown"])?;
    for p in daily {
        wtr.write_record([
            &p.date.to_string(),
            &format!("{:.4}", p.price),
            &format!("{:.4}", p.running_max),
            &format!("{:.6}", p.drawdown),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: year, min_drawdown
pub fn export_annual_csv(annual: &AnnualSeries) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["year", "min_drawdown"])?;
    for row in annual {
        wtr.write_record([&row.year.to_string(), &format!("{:.6}", row.min_drawdown)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save `report.json`, `daily.csv` and `annual.csv` for one index.
///
/// The directory is `{symbol}_{timestamp}/` under `output_dir`, with a
/// leading `^` stripped from the symbol. Returns the directory path.
pub fn save_artifacts(analysis: &IndexAnalysis, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        file_safe_symbol(&analysis.symbol),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(analysis)?)?;
    std::fs::write(
        run_dir.join("daily.csv"),
        export_daily_csv(&analysis.report.daily)?,
    )?;
    std::fs::write(
        run_dir.join("annual.csv"),
        export_annual_csv(&analysis.report.annual)?,
    )?;

    Ok(run_dir)
}

pub fn load_artifacts(dir: &Path) -> Result<IndexAnalysis> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn file_safe_symbol(symbol: &str) -> String {
    symbol
        .trim_start_matches('^')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

// ─── Text summary ───────────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

/// Terminal summary for one index. `recent_years` limits the annual table.
pub fn render_summary(analysis: &IndexAnalysis, recent_years: usize) -> String {
    let report = &analysis.report;
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "=== {} ({}) ===", analysis.name, analysis.symbol);
    if let (Some(first), Some(last)) = (report.first_date(), report.last_date()) {
        let _ = writeln!(out, "Period:             {first} to {last} ({} days)", report.daily.len());
    }
    let _ = writeln!(out, "Current drawdown:   {}", pct(report.current_drawdown));
    let _ = writeln!(out, "Historical pct:     {:.2}%", report.percentile);
    if let Some(worst) = report.daily.worst() {
        let _ = writeln!(out, "Worst drawdown:     {} on {}", pct(worst.drawdown), worst.date);
    }
    let _ = writeln!(
        out,
        "Alert:              {}: {}",
        analysis.alert,
        analysis.alert_description()
    );

    if !report.annual.is_empty() && recent_years > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Annual worst drawdown (last {recent_years} years):");
        let rows = report.annual.rows();
        let skip = rows.len().saturating_sub(recent_years);
        for row in &rows[skip..] {
            let _ = writeln!(out, "  {}  {:>8}", row.year, pct(row.min_drawdown));
        }
    }

    if analysis.is_synthetic() {
        let _ = writeln!(out);
        let _ = writeln!(out, "WARNING: Results based on SYNTHETIC data");
    }

    out
}
