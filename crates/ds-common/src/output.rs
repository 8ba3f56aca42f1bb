//! Output format selection for the CLI surface.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format for reports and errors.
///
/// `json` is the machine contract (stable field names, nulls as null);
/// `summary` is a short human rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Structured JSON output.
    #[default]
    Json,
    /// Human-readable summary.
    Summary,
}

impl OutputFormat {
    /// Whether this format is intended for machine consumption.
    pub fn is_machine(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}
