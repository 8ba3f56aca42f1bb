//! Typed table model: input rows, derived drift records, and the CSV codec.
//!
//! The engine works on typed rows, not stringly frames. All column-presence
//! and cell-type validation happens here at the CSV boundary; once a row is
//! typed, derived-column presence is enforced by the type system.
//!
//! The CSV dialect is deliberately small: comma-separated, double-quote
//! quoting with `""` escapes, no multi-line fields. Input is expected to be
//! machine-generated.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical input column names (remappable via engine config).
pub const COL_DATE: &str = "Date";
pub const COL_FORECAST: &str = "Forecast";
pub const COL_ACTUAL: &str = "Actual";
pub const COL_UNIT_COST: &str = "Unit_Cost";

/// Derived column names written by the engine.
pub const COL_DRIFT: &str = "drift";
pub const COL_MEMORY: &str = "E";
pub const COL_THRESHOLD: &str = "Theta";
pub const COL_RUPTURE: &str = "rupture";
pub const COL_RUPTURE_PROB: &str = "rupture_prob";
pub const COL_LOSS: &str = "loss";

/// A parsed CSV table: header row plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawFrame {
    /// Parse CSV text into a frame.
    ///
    /// Blank lines are skipped. Every data row must have exactly as many
    /// fields as the header. Row numbers in errors are 1-based data-row
    /// ordinals.
    pub fn parse_csv(text: &str) -> Result<RawFrame> {
        let mut lines = text.lines().map(str::trim_end).filter(|l| !l.is_empty());

        let header_line = lines.next().ok_or(Error::EmptyInput)?;
        let headers = split_csv_line(header_line).map_err(|message| Error::CsvFormat {
            row: 0,
            message,
        })?;

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            let row_no = i + 1;
            let fields = split_csv_line(line).map_err(|message| Error::CsvFormat {
                row: row_no,
                message,
            })?;
            if fields.len() != headers.len() {
                return Err(Error::CsvFormat {
                    row: row_no,
                    message: format!(
                        "expected {} fields, found {}",
                        headers.len(),
                        fields.len()
                    ),
                });
            }
            rows.push(fields);
        }

        Ok(RawFrame { headers, rows })
    }

    /// Index of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Names from `wanted` that are absent from the header.
    pub fn missing_columns(&self, wanted: &[&str]) -> Vec<String> {
        wanted
            .iter()
            .filter(|name| self.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect()
    }

    /// Serialize the frame back to CSV.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&join_csv_row(self.headers.iter().cloned()));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&join_csv_row(row.iter().cloned()));
            out.push('\n');
        }
        out
    }
}

/// One validated input observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    pub timestamp: DateTime<Utc>,
    pub forecast: f64,
    pub actual: f64,
    pub unit_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<bool>,
}

/// One engine output row: the input observation plus derived values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub timestamp: DateTime<Utc>,
    pub forecast: f64,
    pub actual: f64,
    pub unit_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<bool>,
    /// |forecast - actual|.
    pub drift: f64,
    /// Accumulated drift memory after this step (0 on a rupture row).
    pub memory: f64,
    /// Threshold the drift was compared against.
    pub threshold: f64,
    pub rupture: bool,
    pub rupture_prob: f64,
    /// drift * unit_cost on rupture rows, else 0.
    pub loss: f64,
}

/// The engine's output table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftTable {
    pub records: Vec<DriftRecord>,
    /// Name of the segment column in CSV form, if the run was segmented.
    pub segment_name: Option<String>,
    /// Name of the boolean policy column in CSV form, if present.
    pub policy_name: Option<String>,
}

impl DriftTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rupture_count(&self) -> usize {
        self.records.iter().filter(|r| r.rupture).count()
    }

    pub fn total_loss(&self) -> f64 {
        self.records.iter().map(|r| r.loss).sum()
    }

    /// Drift column as a vector, in table order.
    pub fn drifts(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.drift).collect()
    }

    /// Margin (drift - threshold) column as a vector, in table order.
    pub fn margins(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.drift - r.threshold).collect()
    }

    /// Serialize to CSV with canonical column order: input columns, then
    /// `drift, E, Theta, rupture, rupture_prob, loss`.
    pub fn to_csv(&self) -> String {
        let mut headers = vec![COL_DATE, COL_FORECAST, COL_ACTUAL, COL_UNIT_COST];
        if let Some(seg) = &self.segment_name {
            headers.push(seg);
        }
        if let Some(pol) = &self.policy_name {
            headers.push(pol);
        }
        headers.extend([
            COL_DRIFT,
            COL_MEMORY,
            COL_THRESHOLD,
            COL_RUPTURE,
            COL_RUPTURE_PROB,
            COL_LOSS,
        ]);

        let mut out = String::new();
        out.push_str(&join_csv_row(headers.iter().map(|h| h.to_string())));
        out.push('\n');

        for rec in &self.records {
            let mut fields = vec![
                format_timestamp(rec.timestamp),
                rec.forecast.to_string(),
                rec.actual.to_string(),
                rec.unit_cost.to_string(),
            ];
            if self.segment_name.is_some() {
                fields.push(rec.segment.clone().unwrap_or_default());
            }
            if self.policy_name.is_some() {
                fields.push(match rec.policy {
                    Some(p) => p.to_string(),
                    None => String::new(),
                });
            }
            fields.extend([
                rec.drift.to_string(),
                rec.memory.to_string(),
                rec.threshold.to_string(),
                rec.rupture.to_string(),
                rec.rupture_prob.to_string(),
                rec.loss.to_string(),
            ]);
            out.push_str(&join_csv_row(fields.into_iter()));
            out.push('\n');
        }
        out
    }

    /// Parse an engine output table back from CSV.
    ///
    /// Requires `Date, Forecast, Actual, drift, Theta, loss, rupture` plus
    /// the named segment/policy columns when given. `Unit_Cost`, `E`, and
    /// `rupture_prob` are optional and default to 0 when absent. Rows are
    /// kept in file order.
    pub fn from_csv(
        text: &str,
        segment_col: Option<&str>,
        policy_col: Option<&str>,
    ) -> Result<DriftTable> {
        let frame = RawFrame::parse_csv(text)?;

        let mut required = vec![
            COL_DATE,
            COL_FORECAST,
            COL_ACTUAL,
            COL_DRIFT,
            COL_THRESHOLD,
            COL_LOSS,
            COL_RUPTURE,
        ];
        if let Some(seg) = segment_col {
            required.push(seg);
        }
        if let Some(pol) = policy_col {
            required.push(pol);
        }
        let missing = frame.missing_columns(&required);
        if !missing.is_empty() {
            return Err(Error::MissingDerivedColumns { columns: missing });
        }

        let idx = |name: &str| frame.column_index(name);
        let date_i = idx(COL_DATE).unwrap_or_default();
        let forecast_i = idx(COL_FORECAST).unwrap_or_default();
        let actual_i = idx(COL_ACTUAL).unwrap_or_default();
        let drift_i = idx(COL_DRIFT).unwrap_or_default();
        let theta_i = idx(COL_THRESHOLD).unwrap_or_default();
        let loss_i = idx(COL_LOSS).unwrap_or_default();
        let rupture_i = idx(COL_RUPTURE).unwrap_or_default();
        let cost_i = idx(COL_UNIT_COST);
        let memory_i = idx(COL_MEMORY);
        let prob_i = idx(COL_RUPTURE_PROB);
        let segment_i = segment_col.and_then(idx);
        let policy_i = policy_col.and_then(idx);

        let mut records = Vec::with_capacity(frame.len());
        for (i, row) in frame.rows.iter().enumerate() {
            let row_no = i + 1;
            let cell = |j: usize| row[j].as_str();

            let timestamp =
                parse_timestamp(cell(date_i)).ok_or_else(|| Error::UnparseableTimestamp {
                    row: row_no,
                    value: cell(date_i).to_string(),
                })?;

            let number = |j: usize, name: &str| -> Result<f64> {
                parse_numeric_cell(cell(j)).ok_or_else(|| Error::NonNumericValue {
                    column: name.to_string(),
                    row: row_no,
                })
            };
            let optional_number = |j: Option<usize>, name: &str| -> Result<f64> {
                match j {
                    Some(j) => number(j, name),
                    None => Ok(0.0),
                }
            };

            let rupture =
                parse_bool_cell(cell(rupture_i)).ok_or_else(|| Error::InvalidFlag {
                    column: COL_RUPTURE.to_string(),
                    row: row_no,
                    value: cell(rupture_i).to_string(),
                })?;

            let segment = segment_i.and_then(|j| {
                let v = cell(j).trim();
                if v.is_empty() {
                    None
                } else {
                    Some(v.to_string())
                }
            });
            let policy = match policy_i {
                Some(j) if !cell(j).trim().is_empty() => {
                    Some(parse_bool_cell(cell(j)).ok_or_else(|| Error::InvalidFlag {
                        column: policy_col.unwrap_or_default().to_string(),
                        row: row_no,
                        value: cell(j).to_string(),
                    })?)
                }
                _ => None,
            };

            records.push(DriftRecord {
                timestamp,
                forecast: number(forecast_i, COL_FORECAST)?,
                actual: number(actual_i, COL_ACTUAL)?,
                unit_cost: optional_number(cost_i, COL_UNIT_COST)?,
                segment,
                policy,
                drift: number(drift_i, COL_DRIFT)?,
                memory: optional_number(memory_i, COL_MEMORY)?,
                threshold: number(theta_i, COL_THRESHOLD)?,
                rupture,
                rupture_prob: optional_number(prob_i, COL_RUPTURE_PROB)?,
                loss: number(loss_i, COL_LOSS)?,
            });
        }

        Ok(DriftTable {
            records,
            segment_name: segment_col.map(str::to_string),
            policy_name: policy_col.map(str::to_string),
        })
    }
}

/// Parse a timestamp cell.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS`, and bare
/// `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    None
}

/// Format a timestamp cell: bare date at midnight, RFC 3339 otherwise.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Parse a numeric cell. Empty, unparseable, and non-finite cells are None.
pub fn parse_numeric_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a boolean cell: true/false, yes/no, 1/0 (case-insensitive).
pub fn parse_bool_cell(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Quote a field if it contains a comma, quote, or newline.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn join_csv_row(fields: impl Iterator<Item = String>) -> String {
    fields
        .map(|f| escape_csv_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

fn split_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cur.push(c);
            }
        } else {
            match c {
                '"' if cur.is_empty() => in_quotes = true,
                '"' => return Err("unexpected quote inside unquoted field".to_string()),
                ',' => fields.push(std::mem::take(&mut cur)),
                _ => cur.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(cur);
    Ok(fields)
}
