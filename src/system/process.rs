use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use super::fs::{FileSystem, SourceError};
use super::resources::DescriptorCounts;

/// Lifecycle state as reported by the `State:` line of `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    Idle,
    Other(char),
    /// Sentinel: the process vanished before its identity could be read.
    Exited,
}

impl ProcessState {
    pub fn from_code(code: char) -> Self {
        match code {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskSleep,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::TracingStop,
            'X' | 'x' => ProcessState::Dead,
            'I' => ProcessState::Idle,
            other => ProcessState::Other(other),
        }
    }

    pub fn code(self) -> char {
        match self {
            ProcessState::Running => 'R',
            ProcessState::Sleeping => 'S',
            ProcessState::DiskSleep => 'D',
            ProcessState::Zombie => 'Z',
            ProcessState::Stopped => 'T',
            ProcessState::TracingStop => 't',
            ProcessState::Dead => 'X',
            ProcessState::Idle => 'I',
            ProcessState::Other(c) => c,
            ProcessState::Exited => '-',
        }
    }
}

/// Command line of a process, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Argument vector joined with single spaces.
    Args(String),
    /// Readable but empty, as for kernel threads.
    Empty,
    Exited,
    Denied,
    Unreadable(String),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Args(args) => f.write_str(args),
            CommandLine::Empty => f.write_str("[no command]"),
            CommandLine::Exited => f.write_str("[process exited]"),
            CommandLine::Denied => f.write_str("[access denied]"),
            CommandLine::Unreadable(reason) => write!(f, "[unreadable: {reason}]"),
        }
    }
}

impl Serialize for CommandLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub uid: u32,
    pub user: Option<String>,
    pub name: String,
    pub state: ProcessState,
    pub threads: u32,
    pub rss_kb: u64,
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub command: CommandLine,
    pub descriptors: Option<DescriptorCounts>,
}

impl ProcessRecord {
    /// Sentinel record for a process that was gone by the time it was read.
    /// Every numeric field is zeroed rather than carried over.
    pub fn exited(pid: u32) -> Self {
        ProcessRecord {
            pid,
            ppid: 0,
            uid: 0,
            user: None,
            name: String::new(),
            state: ProcessState::Exited,
            threads: 0,
            rss_kb: 0,
            utime_ticks: 0,
            stime_ticks: 0,
            command: CommandLine::Exited,
            descriptors: None,
        }
    }

    pub fn is_exited(&self) -> bool {
        self.state == ProcessState::Exited
    }

    pub fn total_ticks(&self) -> u64 {
        self.utime_ticks.saturating_add(self.stime_ticks)
    }
}

/// Identity fields from `/proc/<pid>/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFields {
    pub name: String,
    pub state: Option<char>,
    pub ppid: u32,
    pub uid: u32,
    pub threads: u32,
    pub rss_kb: u64,
}

/// Tolerant `status` parser: missing or non-numeric fields stay at their
/// defaults.
pub fn parse_status(content: &str) -> StatusFields {
    let mut fields = StatusFields::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        let first = || value.split_whitespace().next().unwrap_or("");
        match key {
            "Name" => fields.name = value.to_string(),
            "State" => fields.state = value.chars().next(),
            "PPid" => fields.ppid = first().parse().unwrap_or(0),
            // real, effective, saved, fs
            "Uid" => fields.uid = first().parse().unwrap_or(0),
            "Threads" => fields.threads = first().parse().unwrap_or(0),
            "VmRSS" => fields.rss_kb = first().parse().unwrap_or(0),
            _ => {}
        }
    }
    fields
}

/// User and kernel tick counters from `/proc/<pid>/stat`.
///
/// The command name is parenthesised and may itself contain spaces or
/// parentheses, so fields are counted from the last `)`.
pub fn parse_stat_ticks(content: &str) -> Result<(u64, u64), SourceError> {
    let after_comm = content
        .rfind(')')
        .ok_or_else(|| SourceError::Malformed("missing ')' in stat".into()))?;
    let fields: Vec<&str> = content[after_comm + 1..].split_whitespace().collect();
    // state(0) ppid(1) pgrp(2) session(3) tty_nr(4) tpgid(5) flags(6)
    // minflt(7) cminflt(8) majflt(9) cmajflt(10) utime(11) stime(12)
    let field = |idx: usize, name: &str| -> Result<u64, SourceError> {
        fields
            .get(idx)
            .ok_or_else(|| SourceError::Malformed(format!("stat has no {name} field")))?
            .parse()
            .map_err(|_| SourceError::Malformed(format!("invalid {name}")))
    };
    Ok((field(11, "utime")?, field(12, "stime")?))
}

/// NUL separators become spaces; surrounding whitespace is trimmed.
pub fn normalize_cmdline(raw: &[u8]) -> CommandLine {
    let joined: Vec<u8> = raw
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    let text = String::from_utf8_lossy(&joined).trim().to_string();
    if text.is_empty() {
        CommandLine::Empty
    } else {
        CommandLine::Args(text)
    }
}

/// Numeric entries of the proc root. Non-numeric names and pid 0 are
/// skipped; an unreadable root yields an empty list.
pub fn list_pids(fs: &dyn FileSystem, proc_root: &Path) -> Vec<u32> {
    let entries = match fs.read_dir(proc_root) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(root = %proc_root.display(), error = %err, "cannot list processes");
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|path| path.file_name()?.to_str())
        .filter(|name| name.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|name| name.parse::<u32>().ok())
        .filter(|&pid| pid > 0)
        .collect()
}

fn read_status(fs: &dyn FileSystem, base: &Path) -> Result<StatusFields, SourceError> {
    let content = fs.read_text(&base.join("status"))?;
    Ok(parse_status(&content))
}

fn read_ticks(fs: &dyn FileSystem, base: &Path) -> Result<(u64, u64), SourceError> {
    let content = fs.read_text(&base.join("stat"))?;
    parse_stat_ticks(&content)
}

fn read_cmdline(fs: &dyn FileSystem, base: &Path) -> Result<CommandLine, SourceError> {
    let raw = fs.read_bytes(&base.join("cmdline"))?;
    Ok(normalize_cmdline(&raw))
}

/// Reads one process. Each source may fail on its own because the process
/// can exit between reads:
///
/// - `status` gone: sentinel record, remaining reads skipped. Any other
///   `status` failure keeps the process with default identity fields.
/// - `stat` unreadable: zero ticks.
/// - `cmdline` unreadable: a [`CommandLine`] marker naming the reason.
pub fn read_process(fs: &dyn FileSystem, proc_root: &Path, pid: u32) -> ProcessRecord {
    let base = proc_root.join(pid.to_string());

    let status = match read_status(fs, &base) {
        Ok(status) => status,
        Err(SourceError::Gone) => {
            tracing::trace!(pid, "process exited before identity read");
            return ProcessRecord::exited(pid);
        }
        // Still alive: keep the record with default identity fields.
        Err(err) => {
            tracing::debug!(pid, error = %err, "process identity unreadable");
            StatusFields::default()
        }
    };

    let (utime_ticks, stime_ticks) = read_ticks(fs, &base).unwrap_or_else(|err| {
        tracing::trace!(pid, error = %err, "cpu ticks unreadable");
        (0, 0)
    });

    let command = match read_cmdline(fs, &base) {
        Ok(command) => command,
        Err(SourceError::Gone) => CommandLine::Exited,
        Err(SourceError::Denied) => CommandLine::Denied,
        Err(err) => CommandLine::Unreadable(err.to_string()),
    };

    ProcessRecord {
        pid,
        ppid: status.ppid,
        uid: status.uid,
        user: None,
        name: status.name,
        state: status
            .state
            .map(ProcessState::from_code)
            .unwrap_or(ProcessState::Other('?')),
        threads: status.threads,
        rss_kb: status.rss_kb,
        utime_ticks,
        stime_ticks,
        command,
        descriptors: None,
    }
}
