//! Error types for Drift Sentinel.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Every variant here is fatal to the call that raised it. Recovered
//! conditions (absent coupling backend, failing custom threshold model)
//! never become errors; they surface as flags inside the engine report.
//!
//! # Agent-Facing Output
//!
//! Errors serialize to structured JSON:
//! ```json
//! {
//!   "code": 10,
//!   "category": "validation",
//!   "message": "missing required columns: Actual, Unit_Cost",
//!   "recoverable": false,
//!   "context": { "columns": ["Actual", "Unit_Cost"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type alias for Drift Sentinel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Input-contract violations detected before any computation.
    Validation,
    /// Strategy/capability family (codes 20-29). Reserved: those
    /// conditions surface as report flags today, never as errors.
    Strategy,
    /// Diagnostics-layer input errors (engine output remains valid).
    Diagnostics,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::Strategy => write!(f, "strategy"),
            ErrorCategory::Diagnostics => write!(f, "diagnostics"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Drift Sentinel.
///
/// Row numbers in messages are 1-based data-row ordinals (the header row is
/// not counted).
#[derive(Error, Debug)]
pub enum Error {
    // Input validation errors (10-19)
    #[error("missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("column {column} has a missing or non-numeric value at row {row}")]
    NonNumericValue { column: String, row: usize },

    #[error("negative unit cost {value} at row {row}")]
    NegativeUnitCost { row: usize, value: f64 },

    #[error("unparseable timestamp `{value}` at row {row}")]
    UnparseableTimestamp { row: usize, value: String },

    #[error("column {column} has a non-boolean value `{value}` at row {row}")]
    InvalidFlag {
        column: String,
        row: usize,
        value: String,
    },

    #[error("malformed CSV at row {row}: {message}")]
    CsvFormat { row: usize, message: String },

    #[error("input is empty")]
    EmptyInput,

    // 20-29 reserved for strategy/capability errors. Currently unused:
    // strategy fallback and capability absence are report flags, not errors.

    // Diagnostics errors (30-39)
    #[error("engine output is missing columns: {}", columns.join(", "))]
    MissingDerivedColumns { columns: Vec<String> },

    #[error("baseline file {path} unreadable: {reason}")]
    BaselineUnreadable { path: String, reason: String },

    #[error("baseline series is empty")]
    BaselineEmpty,

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Input validation errors
    /// - 20-29: Strategy/capability errors (reserved)
    /// - 30-39: Diagnostics errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::MissingColumns { .. } => 10,
            Error::NonNumericValue { .. } => 11,
            Error::NegativeUnitCost { .. } => 12,
            Error::UnparseableTimestamp { .. } => 13,
            Error::InvalidFlag { .. } => 14,
            Error::CsvFormat { .. } => 15,
            Error::EmptyInput => 16,
            Error::MissingDerivedColumns { .. } => 30,
            Error::BaselineUnreadable { .. } => 31,
            Error::BaselineEmpty => 32,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MissingColumns { .. }
            | Error::NonNumericValue { .. }
            | Error::NegativeUnitCost { .. }
            | Error::UnparseableTimestamp { .. }
            | Error::InvalidFlag { .. }
            | Error::CsvFormat { .. }
            | Error::EmptyInput => ErrorCategory::Validation,

            Error::MissingDerivedColumns { .. }
            | Error::BaselineUnreadable { .. }
            | Error::BaselineEmpty => ErrorCategory::Diagnostics,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by retrying.
    ///
    /// Validation and diagnostics errors require the caller to fix the
    /// input; I/O errors may be transient.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::MissingColumns { .. } => "Missing Required Columns",
            Error::NonNumericValue { .. } => "Non-Numeric Value",
            Error::NegativeUnitCost { .. } => "Negative Unit Cost",
            Error::UnparseableTimestamp { .. } => "Unparseable Timestamp",
            Error::InvalidFlag { .. } => "Invalid Boolean Flag",
            Error::CsvFormat { .. } => "Malformed CSV",
            Error::EmptyInput => "Empty Input",
            Error::MissingDerivedColumns { .. } => "Missing Engine Output Columns",
            Error::BaselineUnreadable { .. } => "Baseline File Unreadable",
            Error::BaselineEmpty => "Empty Baseline",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::MissingColumns { .. } => {
                "Check the CSV header row. Column names are case-sensitive and remappable via config."
            }
            Error::NonNumericValue { .. } => {
                "Forecast/Actual/Unit_Cost cells must all be numeric. Fill or drop incomplete rows."
            }
            Error::NegativeUnitCost { .. } => {
                "Unit_Cost must be >= 0 for every row."
            }
            Error::UnparseableTimestamp { .. } => {
                "Dates must be ISO formatted, e.g. 2024-01-31 or 2024-01-31T06:00:00Z."
            }
            Error::InvalidFlag { .. } => {
                "Policy columns accept true/false, yes/no, or 1/0."
            }
            Error::CsvFormat { .. } => {
                "Every data row must have the same number of fields as the header."
            }
            Error::EmptyInput => "Provide a CSV with a header row and at least the required columns.",
            Error::MissingDerivedColumns { .. } => {
                "Run `analyze` first; `enrich` consumes its output table, not raw input."
            }
            Error::BaselineUnreadable { .. } => {
                "The baseline file must be a CSV with a `drift` or `Delta` column."
            }
            Error::BaselineEmpty => {
                "The baseline must contain at least one numeric drift value."
            }
            Error::Io(_) => "Check the path, permissions, and free disk space, then retry.",
            Error::Json(_) => "Check the JSON syntax of the referenced file.",
        }
    }
}

/// Structured error response for JSON output.
///
/// Used by machine consumers (`--format json`) for parseable error reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context (e.g., column names, row numbers).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = BTreeMap::new();

        match err {
            Error::MissingColumns { columns } | Error::MissingDerivedColumns { columns } => {
                context.insert("columns".to_string(), serde_json::json!(columns));
            }
            Error::NonNumericValue { column, row } => {
                context.insert("column".to_string(), serde_json::json!(column));
                context.insert("row".to_string(), serde_json::json!(row));
            }
            Error::NegativeUnitCost { row, value } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::UnparseableTimestamp { row, value } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::InvalidFlag { column, row, value } => {
                context.insert("column".to_string(), serde_json::json!(column));
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::CsvFormat { row, .. } => {
                context.insert("row".to_string(), serde_json::json!(row));
            }
            Error::BaselineUnreadable { path, .. } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human consumption: headline, reason, fix.
pub fn format_error_human(err: &Error) -> String {
    format!(
        "✗ {}\n  Reason: {}\n  Fix: {}",
        err.headline(),
        err,
        err.remediation()
    )
}
