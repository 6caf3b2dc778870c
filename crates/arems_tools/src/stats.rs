#![forbid(unsafe_code)]

//! Dashboard stats over a JSON export of orientee rows.

use std::fs;
use std::path::{Path, PathBuf};

use arems_engines::progress::compute_dashboard_stats;
use arems_kernel_contracts::orientee::{OrienteeRow, OrienteeSnapshot};
use arems_kernel_contracts::progress::DashboardStats;
use arems_kernel_contracts::ContractViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsFileError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a JSON array of orientee rows: {0}")]
    Decode(#[from] serde_json::Error),
    /// Index is zero-based, matching the array position in the file.
    #[error("row {index}: {source}")]
    Row {
        index: usize,
        #[source]
        source: ContractViolation,
    },
}

/// Parses rows and validates every one. A single bad row fails the file.
pub fn snapshots_from_json(raw: &str) -> Result<Vec<OrienteeSnapshot>, StatsFileError> {
    let rows: Vec<OrienteeRow> = serde_json::from_str(raw)?;
    rows.iter()
        .enumerate()
        .map(|(index, row)| {
            OrienteeSnapshot::from_row(row).map_err(|source| StatsFileError::Row { index, source })
        })
        .collect()
}

pub fn stats_from_json(raw: &str) -> Result<DashboardStats, StatsFileError> {
    Ok(compute_dashboard_stats(&snapshots_from_json(raw)?))
}

pub fn stats_from_file(path: &Path) -> Result<DashboardStats, StatsFileError> {
    let raw = fs::read_to_string(path).map_err(|source| StatsFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    stats_from_json(&raw)
}

pub fn render_stats(stats: &DashboardStats) -> String {
    let mut out = format!(
        "active orientees:   {}\nat risk:            {}\npending clearance:  {}\naverage progress:   {}%",
        stats.active_orientees, stats.at_risk_count, stats.pending_clearance, stats.avg_progress
    );
    if stats.guarded_orientees > 0 {
        out.push_str(&format!(
            "\nexcluded from average (non-positive target hours): {}",
            stats.guarded_orientees
        ));
    }
    out
}
