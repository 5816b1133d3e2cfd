//! Aggregate CPU utilization from the `cpu` line of `/proc/stat`.

use std::path::Path;

use serde::Serialize;

use super::fs::{FileSystem, SourceError};

/// Cumulative tick counters. `total == 0` means "no baseline yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuTicks {
    pub total: u64,
    pub idle: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuUsage {
    pub usage_percent: f64,
    pub idle_percent: f64,
}

impl CpuUsage {
    pub const IDLE: CpuUsage = CpuUsage {
        usage_percent: 0.0,
        idle_percent: 100.0,
    };
}

/// Parses the aggregate `cpu` line: total is the sum of every column, idle
/// is the fourth column.
pub fn parse_cpu_ticks(content: &str) -> Result<CpuTicks, SourceError> {
    let line = content
        .lines()
        .next()
        .ok_or_else(|| SourceError::Malformed("empty stat".into()))?;
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => {}
        other => {
            return Err(SourceError::Malformed(format!(
                "expected aggregate cpu line, found {other:?}"
            )));
        }
    }

    let values = fields
        .map(|f| f.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SourceError::Malformed(format!("non-numeric cpu counter: {e}")))?;
    if values.len() < 4 {
        return Err(SourceError::Malformed(format!(
            "expected at least 4 cpu counters, got {}",
            values.len()
        )));
    }

    Ok(CpuTicks {
        total: values.iter().fold(0u64, |acc, v| acc.saturating_add(*v)),
        idle: values[3],
    })
}

pub fn read_cpu_ticks(fs: &dyn FileSystem, proc_root: &Path) -> Result<CpuTicks, SourceError> {
    let content = fs.read_text(&proc_root.join("stat"))?;
    parse_cpu_ticks(&content)
}

/// Utilization between two readings.
///
/// A zero previous total (no baseline) and a non-advancing total both yield
/// [`CpuUsage::IDLE`].
pub fn compute_usage(previous: CpuTicks, current: CpuTicks) -> CpuUsage {
    if previous.total == 0 || current.total <= previous.total {
        return CpuUsage::IDLE;
    }

    let total_delta = (current.total - previous.total) as f64;
    let idle_delta = current.idle as f64 - previous.idle as f64;
    let usage = (100.0 * (total_delta - idle_delta) / total_delta).clamp(0.0, 100.0);

    CpuUsage {
        usage_percent: usage,
        idle_percent: 100.0 - usage,
    }
}

/// One sampling step: reads the current counters and computes utilization
/// against `previous`. An unreadable or malformed source counts as a zero
/// reading, so the next pass starts over without a baseline.
pub fn sample(fs: &dyn FileSystem, proc_root: &Path, previous: CpuTicks) -> (CpuUsage, CpuTicks) {
    let current = match read_cpu_ticks(fs, proc_root) {
        Ok(ticks) => ticks,
        Err(err) => {
            tracing::warn!(error = %err, "cpu counters unavailable, treating as zero reading");
            CpuTicks::default()
        }
    };
    (compute_usage(previous, current), current)
}
