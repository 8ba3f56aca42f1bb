//! Baseline drift series loading and the in-scope score.

use std::fs;
use std::path::Path;

use ds_common::table::{parse_numeric_cell, DriftTable, RawFrame};
use ds_common::Error;
use ds_config::{BaselineMode, EpistemicConfig};
use ds_math::quantile;

/// Columns accepted as the drift series in a baseline file.
const BASELINE_COLUMNS: [&str; 2] = ["drift", "Delta"];

/// Load the baseline drift series per the configured mode.
///
/// Window mode yields the leading `baseline_window` drifts of `table`
/// (clamped to its length). File mode reads an external CSV and yields
/// its numeric `drift` or `Delta` values; an unreadable file or a file
/// with no numeric drift values is an error.
pub fn load_baseline(table: &DriftTable, cfg: &EpistemicConfig) -> Result<Vec<f64>, Error> {
    match (&cfg.baseline_mode, &cfg.baseline_file) {
        (BaselineMode::File, Some(path)) => load_baseline_file(path),
        (BaselineMode::File, None) => Err(Error::BaselineUnreadable {
            path: String::new(),
            reason: "file mode selected but no baseline file configured".to_string(),
        }),
        (BaselineMode::Window, _) => {
            let drifts = table.drifts();
            let n = cfg.baseline_window.max(1).min(drifts.len());
            Ok(drifts[..n].to_vec())
        }
    }
}

fn load_baseline_file(path: &Path) -> Result<Vec<f64>, Error> {
    let unreadable = |reason: String| Error::BaselineUnreadable {
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let frame = RawFrame::parse_csv(&text).map_err(|e| unreadable(e.to_string()))?;
    let idx = BASELINE_COLUMNS
        .iter()
        .find_map(|name| frame.column_index(name))
        .ok_or_else(|| unreadable("expected a 'drift' or 'Delta' column".to_string()))?;
    let values: Vec<f64> = frame
        .rows
        .iter()
        .filter_map(|row| row.get(idx))
        .filter_map(|cell| parse_numeric_cell(cell))
        .collect();
    if values.is_empty() {
        return Err(Error::BaselineEmpty);
    }
    Ok(values)
}

/// Fraction of `recent` inside the `[q_lo, q_hi]` quantile band of
/// `baseline`, inclusive at both ends. 0 when either series is empty.
pub fn scope_score(recent: &[f64], baseline: &[f64], q_lo: f64, q_hi: f64) -> f64 {
    if recent.is_empty() || baseline.is_empty() {
        return 0.0;
    }
    let lo = quantile(baseline, q_lo);
    let hi = quantile(baseline, q_hi);
    let inside = recent.iter().filter(|&&v| v >= lo && v <= hi).count();
    inside as f64 / recent.len() as f64
}
