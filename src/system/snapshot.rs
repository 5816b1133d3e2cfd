use serde::Serialize;

use super::memory::MemoryStats;
use super::mounts::MountEntry;
use super::process::ProcessRecord;

/// One immutable, internally consistent collection pass.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    /// 0 until the first pass has been published.
    pub sequence: u64,
    pub collected_at_unix_ms: u64,
    pub collection_ms: u64,
    pub cpu_usage_percent: f64,
    pub cpu_idle_percent: f64,
    pub cpu_history: Vec<f64>,
    /// `None` when the memory counters could not be read.
    pub memory: Option<MemoryStats>,
    pub memory_history: Vec<f64>,
    pub swap_history: Vec<f64>,
    pub process_count: usize,
    pub thread_count: u64,
    pub processes: Vec<ProcessRecord>,
    pub mounts: Vec<MountEntry>,
    /// The per-process pass stopped at its deadline before reading every pid.
    pub truncated: bool,
}

impl SystemSnapshot {
    pub fn empty() -> Self {
        SystemSnapshot {
            sequence: 0,
            collected_at_unix_ms: 0,
            collection_ms: 0,
            cpu_usage_percent: 0.0,
            cpu_idle_percent: 100.0,
            cpu_history: Vec::new(),
            memory: None,
            memory_history: Vec::new(),
            swap_history: Vec::new(),
            process_count: 0,
            thread_count: 0,
            processes: Vec::new(),
            mounts: Vec::new(),
            truncated: false,
        }
    }

    pub fn is_published(&self) -> bool {
        self.sequence > 0
    }

    pub fn process(&self, pid: u32) -> Option<&ProcessRecord> {
        self.processes.iter().find(|p| p.pid == pid)
    }
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
