//! Alert level for a current drawdown reading, derived from its percentile rank.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentile cut-offs between alert levels (inclusive upper bounds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// At or below this percentile the drawdown is extreme.
    pub extreme: f64,
    /// At or below this percentile the drawdown is elevated.
    pub elevated: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            extreme: 10.0,
            elevated: 30.0,
        }
    }
}

/// How unusual the current drawdown is compared with the index's own history.
///
/// A low percentile means few days in the history were worse than today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Extreme,
    Elevated,
    Normal,
}

impl AlertLevel {
    pub fn classify(percentile: f64, thresholds: &AlertThresholds) -> Self {
        if percentile <= thresholds.extreme {
            AlertLevel::Extreme
        } else if percentile <= thresholds.elevated {
            AlertLevel::Elevated
        } else {
            AlertLevel::Normal
        }
    }

    /// One-line explanation for terminal and report output.
    pub fn describe(&self, thresholds: &AlertThresholds) -> String {
        match self {
            AlertLevel::Extreme => format!(
                "extreme drawdown (bottom {}% of history), possible buying opportunity",
                thresholds.extreme
            ),
            AlertLevel::Elevated => format!(
                "relatively large drawdown (bottom {}% of history), potential opportunity",
                thresholds.elevated
            ),
            AlertLevel::Normal => "not in a major drawdown, proceed with caution".to_string(),
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::Extreme => "EXTREME",
            AlertLevel::Elevated => "ELEVATED",
            AlertLevel::Normal => "NORMAL",
        };
        f.write_str(label)
    }
}
