//! Snapshot coordinator.
//!
//! A [`Collector`] owns the only persistent mutable state of the crate: the
//! CPU tick baseline, the utilization history and the published snapshot.
//! Each refresh runs one collection pass under the state lock and then swaps
//! the published `Arc<SystemSnapshot>` in a single assignment, so readers see
//! either the previous snapshot or the new one, never a mix.
//!
//! Refresh policy is synchronous: a caller that arrives while a pass is in
//! flight blocks until it finishes and receives that pass's snapshot instead
//! of starting another one.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::Config;

use super::cpu::{self, CpuTicks};
use super::fs::{FileSystem, RealFs};
use super::helper::{CapacityProbe, HelperProbe};
use super::history::{DEFAULT_CAPACITY, SystemHistory};
use super::memory;
use super::mounts::{self, DEFAULT_EXCLUDED_FS_TYPES};
use super::process::{self, ProcessRecord};
use super::resources::{self, ResourceSet};
use super::snapshot::SystemSnapshot;
use super::users::UserTable;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub proc_root: PathBuf,
    pub passwd_path: PathBuf,
    pub worker_threads: usize,
    /// Soft limit on the per-process pass, measured from the start of the
    /// collection. Pids not yet claimed when it expires are skipped.
    pub pass_deadline: Duration,
    pub classify_resources: bool,
    pub history_capacity: usize,
    pub excluded_fs_types: Vec<String>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            proc_root: PathBuf::from("/proc"),
            passwd_path: PathBuf::from("/etc/passwd"),
            worker_threads: 4,
            pass_deadline: Duration::from_millis(1500),
            classify_resources: false,
            history_capacity: DEFAULT_CAPACITY,
            excluded_fs_types: DEFAULT_EXCLUDED_FS_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl From<&Config> for CollectorSettings {
    fn from(config: &Config) -> Self {
        CollectorSettings {
            proc_root: config.collector.proc_root.clone(),
            passwd_path: config.collector.passwd_path.clone(),
            worker_threads: config.collector.worker_threads,
            pass_deadline: Duration::from_millis(config.collector.pass_deadline_ms),
            classify_resources: config.collector.classify_resources,
            history_capacity: config.general.history_capacity,
            excluded_fs_types: config.mounts.excluded_fs_types.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Collecting,
    Published,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Collecting,
            2 => Phase::Published,
            _ => Phase::Idle,
        }
    }
}

struct CollectorState {
    cpu_baseline: CpuTicks,
    history: SystemHistory,
    sequence: u64,
}

pub struct Collector {
    fs: Arc<dyn FileSystem>,
    probe: Arc<dyn CapacityProbe>,
    settings: CollectorSettings,
    state: Mutex<CollectorState>,
    published: Mutex<Arc<SystemSnapshot>>,
    phase: AtomicU8,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Collector {
    /// Builds a coordinator and takes the initial CPU baseline, so the first
    /// refresh already reports utilization over a real interval.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        probe: Arc<dyn CapacityProbe>,
        settings: CollectorSettings,
    ) -> Self {
        let cpu_baseline = cpu::read_cpu_ticks(fs.as_ref(), &settings.proc_root).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "no initial cpu baseline");
            CpuTicks::default()
        });
        let history = SystemHistory::new(settings.history_capacity);

        Collector {
            fs,
            probe,
            settings,
            state: Mutex::new(CollectorState {
                cpu_baseline,
                history,
                sequence: 0,
            }),
            published: Mutex::new(Arc::new(SystemSnapshot::empty())),
            phase: AtomicU8::new(Phase::Idle as u8),
        }
    }

    /// Coordinator over the live `/proc` with the subprocess capacity helper.
    pub fn from_config(config: &Config) -> Self {
        let probe = HelperProbe::new(
            config.mounts.helper_path.clone(),
            Duration::from_millis(config.mounts.helper_timeout_ms),
        );
        Self::new(
            Arc::new(RealFs),
            Arc::new(probe),
            CollectorSettings::from(config),
        )
    }

    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Most recently published snapshot, without collecting.
    pub fn latest(&self) -> Arc<SystemSnapshot> {
        Arc::clone(&lock(&self.published))
    }

    /// Runs a collection pass and returns the snapshot it published.
    pub fn refresh(&self) -> Arc<SystemSnapshot> {
        let seen = self.latest().sequence;
        let mut state = lock(&self.state);

        // Someone else's pass completed while we waited for the lock.
        let current = self.latest();
        if current.sequence != seen {
            return current;
        }

        self.phase.store(Phase::Collecting as u8, Ordering::Release);
        let snapshot = Arc::new(self.collect(&mut state));
        *lock(&self.published) = Arc::clone(&snapshot);
        self.phase.store(Phase::Published as u8, Ordering::Release);
        snapshot
    }

    /// On-demand descriptor inspection, independent of the refresh cycle.
    pub fn inspect(&self, pid: u32) -> ResourceSet {
        resources::inspect(self.fs.as_ref(), &self.settings.proc_root, pid)
    }

    fn collect(&self, state: &mut CollectorState) -> SystemSnapshot {
        let started = Instant::now();
        let sequence = state.sequence + 1;
        let _span = tracing::debug_span!("collector.refresh", sequence).entered();

        let fs = self.fs.as_ref();
        let root = self.settings.proc_root.as_path();

        // Usage is computed against the old baseline before it is replaced.
        let (cpu_usage, ticks) = cpu::sample(fs, root, state.cpu_baseline);
        state.cpu_baseline = ticks;
        state.history.cpu.push(cpu_usage.usage_percent);

        let memory = memory::sample(fs, root);
        if let Some(stats) = &memory {
            state.history.memory.push(stats.used_percent);
            state.history.swap.push(stats.swap_used_percent());
        }

        let pids = process::list_pids(fs, root);
        let (mut processes, truncated) = self.read_processes(&pids, started + self.settings.pass_deadline);
        let users = UserTable::load(fs, &self.settings.passwd_path);
        for record in &mut processes {
            record.user = Some(users.resolve(record.uid));
        }

        let mounts = mounts::enumerate(fs, root, &self.settings.excluded_fs_types, self.probe.as_ref());

        state.sequence = sequence;
        let thread_count = processes.iter().map(|p| u64::from(p.threads)).sum();
        let collection_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(
            sequence,
            processes = processes.len(),
            mounts = mounts.len(),
            truncated,
            collection_ms,
            "collection pass complete"
        );

        SystemSnapshot {
            sequence,
            collected_at_unix_ms: unix_millis(),
            collection_ms,
            cpu_usage_percent: cpu_usage.usage_percent,
            cpu_idle_percent: cpu_usage.idle_percent,
            cpu_history: state.history.cpu.to_vec(),
            memory,
            memory_history: state.history.memory.to_vec(),
            swap_history: state.history.swap.to_vec(),
            process_count: processes.len(),
            thread_count,
            processes,
            mounts,
            truncated,
        }
    }

    /// Reads every pid on a fixed pool of scoped workers pulling from a shared
    /// index. Exited processes are dropped here, so the snapshot only holds
    /// processes that were still readable.
    fn read_processes(&self, pids: &[u32], deadline: Instant) -> (Vec<ProcessRecord>, bool) {
        let _span = tracing::debug_span!("collector.processes", pids = pids.len()).entered();

        let workers = self.settings.worker_threads.clamp(1, pids.len().max(1));
        let next = AtomicUsize::new(0);
        let truncated = AtomicBool::new(false);
        let fs = self.fs.as_ref();
        let root = self.settings.proc_root.as_path();
        let classify = self.settings.classify_resources;

        let worker = || {
            let mut local = Vec::new();
            loop {
                let idx = next.fetch_add(1, Ordering::Relaxed);
                let Some(&pid) = pids.get(idx) else {
                    break;
                };
                if Instant::now() >= deadline {
                    truncated.store(true, Ordering::Relaxed);
                    break;
                }
                let mut record = process::read_process(fs, root, pid);
                if record.is_exited() {
                    continue;
                }
                if classify {
                    record.descriptors = Some(resources::inspect(fs, root, pid).counts());
                }
                local.push(record);
            }
            local
        };

        let mut records: Vec<ProcessRecord> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers).map(|_| scope.spawn(worker)).collect();
            handles
                .into_iter()
                .flat_map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        tracing::warn!("process worker panicked, its records are dropped");
                        Vec::new()
                    })
                })
                .collect()
        });
        records.sort_unstable_by_key(|r| r.pid);

        let truncated = truncated.into_inner();
        if truncated {
            tracing::warn!(
                read = records.len(),
                listed = pids.len(),
                "process pass hit its deadline, snapshot is partial"
            );
        }
        (records, truncated)
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
