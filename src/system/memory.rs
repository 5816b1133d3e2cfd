//! Memory and swap usage from `/proc/meminfo`.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use super::fs::{FileSystem, SourceError};

/// Derived memory figures, all in kB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total_kb: u64,
    pub used_kb: u64,
    pub free_kb: u64,
    pub used_percent: f64,
    pub free_percent: f64,
    pub swap_total_kb: u64,
    pub swap_used_kb: u64,
}

impl MemoryStats {
    pub fn swap_used_percent(&self) -> f64 {
        if self.swap_total_kb == 0 {
            0.0
        } else {
            100.0 * self.swap_used_kb as f64 / self.swap_total_kb as f64
        }
    }
}

/// Parses `Key: value [kB]` lines. Lines without a numeric value are skipped.
pub fn parse_meminfo(content: &str) -> HashMap<String, u64> {
    let mut table = HashMap::new();
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        if let Ok(value) = value.parse::<u64>() {
            table.insert(key.trim_end_matches(':').to_string(), value);
        }
    }
    table
}

/// Derives usage from a counter table. Buffers and page cache count as free.
pub fn derive_stats(table: &HashMap<String, u64>) -> MemoryStats {
    let get = |key: &str| table.get(key).copied().unwrap_or(0);

    let total_kb = get("MemTotal");
    let free_kb = get("MemFree")
        .saturating_add(get("Buffers"))
        .saturating_add(get("Cached"))
        .min(total_kb);
    let used_kb = total_kb - free_kb;
    let used_percent = if total_kb > 0 {
        100.0 * used_kb as f64 / total_kb as f64
    } else {
        0.0
    };

    let swap_total_kb = get("SwapTotal");
    let swap_used_kb = if swap_total_kb > 0 {
        swap_total_kb.saturating_sub(get("SwapFree"))
    } else {
        0
    };

    MemoryStats {
        total_kb,
        used_kb,
        free_kb,
        used_percent,
        free_percent: 100.0 - used_percent,
        swap_total_kb,
        swap_used_kb,
    }
}

pub fn read_memory(fs: &dyn FileSystem, proc_root: &Path) -> Result<MemoryStats, SourceError> {
    let content = fs.read_text(&proc_root.join("meminfo"))?;
    let table = parse_meminfo(&content);
    if table.is_empty() {
        return Err(SourceError::Malformed("no counters in meminfo".into()));
    }
    Ok(derive_stats(&table))
}

/// `None` means unknown, which callers must not confuse with zero usage.
pub fn sample(fs: &dyn FileSystem, proc_root: &Path) -> Option<MemoryStats> {
    match read_memory(fs, proc_root) {
        Ok(stats) => Some(stats),
        Err(err) => {
            tracing::warn!(error = %err, "memory counters unavailable");
            None
        }
    }
}
