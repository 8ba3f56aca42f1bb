//! Input validation: raw CSV frame to typed rows.
//!
//! All column-presence and cell-type checks happen here, before any
//! computation. A failed check aborts the whole run; there is no partial
//! output.

use ds_common::table::{
    parse_bool_cell, parse_numeric_cell, parse_timestamp, RawFrame, SeriesRow,
};
use ds_common::{Error, Result};
use ds_config::ColumnMap;

/// Validate `frame` against the column mapping and produce typed rows
/// sorted by timestamp (stable, so equal timestamps keep input order).
pub fn rows_from_frame(frame: &RawFrame, columns: &ColumnMap) -> Result<Vec<SeriesRow>> {
    let mut wanted = vec![
        columns.date.as_str(),
        columns.forecast.as_str(),
        columns.actual.as_str(),
        columns.unit_cost.as_str(),
    ];
    if let Some(seg) = &columns.segment {
        wanted.push(seg.as_str());
    }
    if let Some(pol) = &columns.policy {
        wanted.push(pol.as_str());
    }
    let missing = frame.missing_columns(&wanted);
    if !missing.is_empty() {
        return Err(Error::MissingColumns { columns: missing });
    }
    if frame.rows.is_empty() {
        return Err(Error::EmptyInput);
    }

    // Presence was checked above.
    let date_idx = frame.column_index(&columns.date).unwrap_or(0);
    let forecast_idx = frame.column_index(&columns.forecast).unwrap_or(0);
    let actual_idx = frame.column_index(&columns.actual).unwrap_or(0);
    let cost_idx = frame.column_index(&columns.unit_cost).unwrap_or(0);
    let segment_idx = columns.segment.as_ref().and_then(|c| frame.column_index(c));
    let policy_idx = columns.policy.as_ref().and_then(|c| frame.column_index(c));

    let mut rows = Vec::with_capacity(frame.rows.len());
    for (i, cells) in frame.rows.iter().enumerate() {
        let row = i + 1;
        let timestamp =
            parse_timestamp(&cells[date_idx]).ok_or_else(|| Error::UnparseableTimestamp {
                row,
                value: cells[date_idx].clone(),
            })?;
        let forecast = numeric(cells, forecast_idx, &columns.forecast, row)?;
        let actual = numeric(cells, actual_idx, &columns.actual, row)?;
        let unit_cost = numeric(cells, cost_idx, &columns.unit_cost, row)?;
        if unit_cost < 0.0 {
            return Err(Error::NegativeUnitCost {
                row,
                value: unit_cost,
            });
        }
        let segment = segment_idx.map(|idx| cells[idx].trim().to_string());
        let policy = match policy_idx {
            Some(idx) => Some(parse_bool_cell(&cells[idx]).ok_or_else(|| Error::InvalidFlag {
                column: columns.policy.clone().unwrap_or_default(),
                row,
                value: cells[idx].clone(),
            })?),
            None => None,
        };
        rows.push(SeriesRow {
            timestamp,
            forecast,
            actual,
            unit_cost,
            segment,
            policy,
        });
    }

    rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    Ok(rows)
}

fn numeric(cells: &[String], idx: usize, column: &str, row: usize) -> Result<f64> {
    parse_numeric_cell(&cells[idx]).ok_or_else(|| Error::NonNumericValue {
        column: column.to_string(),
        row,
    })
}
