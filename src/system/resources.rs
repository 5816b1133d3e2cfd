//! Open descriptor and file lock inspection for a single process.
//!
//! Every entry of `/proc/<pid>/fd` lands in exactly one category of a
//! [`ResourceSet`]. Lock lines come from the system-wide `/proc/locks`
//! table, filtered to the inspected pid.

use std::path::Path;

use serde::Serialize;

use super::fs::{FileSystem, SourceError};

const SOCKET_MARKER: &str = "socket:";
const PIPE_MARKER: &str = "pipe:";
const ANON_MARKER: &str = "anon_inode:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Files,
    Sockets,
    Pipes,
    Anon,
    Errors,
}

/// One descriptor. `reason` is set only for entries in the error category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    pub fd: String,
    pub target: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceSet {
    pub pid: u32,
    pub files: Vec<Descriptor>,
    pub sockets: Vec<Descriptor>,
    pub pipes: Vec<Descriptor>,
    pub anon: Vec<Descriptor>,
    pub errors: Vec<Descriptor>,
    pub locks: Vec<String>,
}

/// Per-category totals, attached to process records when descriptor
/// classification runs as part of a collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DescriptorCounts {
    pub files: usize,
    pub sockets: usize,
    pub pipes: usize,
    pub anon: usize,
    pub errors: usize,
}

impl ResourceSet {
    pub fn empty(pid: u32) -> Self {
        ResourceSet {
            pid,
            ..Default::default()
        }
    }

    pub fn counts(&self) -> DescriptorCounts {
        DescriptorCounts {
            files: self.files.len(),
            sockets: self.sockets.len(),
            pipes: self.pipes.len(),
            anon: self.anon.len(),
            errors: self.errors.len(),
        }
    }

    pub fn descriptor_count(&self) -> usize {
        self.files.len() + self.sockets.len() + self.pipes.len() + self.anon.len() + self.errors.len()
    }

    fn push(&mut self, category: Category, descriptor: Descriptor) {
        let bucket = match category {
            Category::Files => &mut self.files,
            Category::Sockets => &mut self.sockets,
            Category::Pipes => &mut self.pipes,
            Category::Anon => &mut self.anon,
            Category::Errors => &mut self.errors,
        };
        bucket.push(descriptor);
    }
}

/// Classifies a link target. Rules are checked in order and the first match
/// wins: socket marker, pipe marker, bracketed or anon-inode target, existing
/// path, and anything else is an error.
pub fn classify(target: &str, exists: impl Fn(&Path) -> bool) -> Category {
    if target.starts_with(SOCKET_MARKER) {
        Category::Sockets
    } else if target.starts_with(PIPE_MARKER) {
        Category::Pipes
    } else if (target.starts_with('[') && target.ends_with(']')) || target.starts_with(ANON_MARKER)
    {
        Category::Anon
    } else if exists(Path::new(target)) {
        Category::Files
    } else {
        Category::Errors
    }
}

fn fd_sort_key(path: &Path) -> (u64, String) {
    let name = fd_name(path);
    (name.parse().unwrap_or(u64::MAX), name)
}

fn fd_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn table_failure(reason: String) -> Descriptor {
    Descriptor {
        fd: "*".to_string(),
        target: String::new(),
        reason: Some(reason),
    }
}

/// Filters lock-table lines owned by `pid`.
///
/// Lines look like `1: POSIX  ADVISORY  WRITE 1234 08:01:5678 0 EOF`; waiting
/// requests carry an extra `->` after the ordinal.
pub fn locks_for_pid(content: &str, pid: u32) -> Vec<String> {
    let wanted = pid.to_string();
    content
        .lines()
        .filter(|line| {
            let mut tokens = line.split_whitespace().skip(1).peekable();
            if tokens.peek() == Some(&"->") {
                tokens.next();
            }
            tokens.nth(3) == Some(wanted.as_str())
        })
        .map(str::to_string)
        .collect()
}

fn read_locks(fs: &dyn FileSystem, proc_root: &Path, pid: u32) -> Vec<String> {
    match fs.read_text(&proc_root.join("locks")) {
        Ok(content) => locks_for_pid(&content, pid),
        Err(err) => {
            tracing::debug!(pid, error = %err, "lock table unreadable");
            Vec::new()
        }
    }
}

/// Enumerates and classifies the descriptors of `pid`.
///
/// Failing to open the descriptor directory is reported as a single entry in
/// `errors` rather than as a failure of the whole inspection.
pub fn inspect(fs: &dyn FileSystem, proc_root: &Path, pid: u32) -> ResourceSet {
    let mut set = ResourceSet::empty(pid);
    let fd_dir = proc_root.join(pid.to_string()).join("fd");

    match fs.read_dir(&fd_dir).map_err(SourceError::from) {
        Ok(mut entries) => {
            entries.sort_by_cached_key(|p| fd_sort_key(p));
            for entry in entries {
                let (category, descriptor) = describe(fs, &entry);
                set.push(category, descriptor);
            }
        }
        Err(SourceError::Denied) => set.errors.push(table_failure(
            "permission denied opening descriptor table".to_string(),
        )),
        Err(SourceError::Gone) => set
            .errors
            .push(table_failure("process exited before inspection".to_string())),
        Err(err) => set
            .errors
            .push(table_failure(format!("descriptor table unreadable: {err}"))),
    }

    set.locks = read_locks(fs, proc_root, pid);
    set
}

fn describe(fs: &dyn FileSystem, entry: &Path) -> (Category, Descriptor) {
    let fd = fd_name(entry);
    match fs.read_link(entry).map_err(SourceError::from) {
        Ok(target) => {
            let target = target.to_string_lossy().into_owned();
            let category = classify(&target, |p| fs.exists(p));
            let reason = (category == Category::Errors).then(|| "target does not exist".to_string());
            (category, Descriptor { fd, target, reason })
        }
        Err(err) => {
            let reason = match err {
                SourceError::Denied => "access denied".to_string(),
                SourceError::Gone => "descriptor closed or link broken".to_string(),
                other => other.to_string(),
            };
            (
                Category::Errors,
                Descriptor {
                    fd,
                    target: String::new(),
                    reason: Some(reason),
                },
            )
        }
    }
}
