//! Filesystem seam for every `/proc` read.
//!
//! Samplers never touch `std::fs` directly: they go through [`FileSystem`] so
//! the same code runs against the live pseudo-filesystem ([`RealFs`]) or an
//! in-memory fixture ([`MockFs`]) in tests and benches.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// Read-only filesystem operations used by the collectors.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Raw bytes, for sources that are not guaranteed to be UTF-8
    /// (`cmdline` is NUL-separated and may carry arbitrary bytes).
    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Text of a kernel-generated file. Process names, mount points and
    /// passwd fields may carry arbitrary bytes; invalid UTF-8 is replaced
    /// instead of failing the whole read.
    fn read_text(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_bytes(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Direct children of `path` as full paths. No ordering guarantee.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Target of a symbolic link, unresolved.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    fn exists(&self, path: &Path) -> bool;
}

/// Classified failure of a single read site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The process or file vanished between listing and reading.
    Gone,
    /// The caller is not allowed to read the source.
    Denied,
    /// The source was read but its content could not be interpreted.
    Malformed(String),
    /// Any other I/O failure.
    Io(String),
}

// ESRCH: returned by some /proc/<pid> files once the task has been reaped.
const ESRCH: i32 = 3;

impl From<io::Error> for SourceError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SourceError::Gone,
            io::ErrorKind::PermissionDenied => SourceError::Denied,
            _ if err.raw_os_error() == Some(ESRCH) => SourceError::Gone,
            _ => SourceError::Io(err.to_string()),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Gone => write!(f, "no longer exists"),
            SourceError::Denied => write!(f, "permission denied"),
            SourceError::Malformed(reason) => write!(f, "malformed data: {reason}"),
            SourceError::Io(reason) => write!(f, "i/o error: {reason}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// Live filesystem, delegating to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(path)? {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                // Entries can disappear while the directory is being walked.
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(paths)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        std::fs::read_link(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// In-memory filesystem for fixtures.
///
/// Parent directories are created implicitly. Paths registered with
/// [`MockFs::deny`] fail every operation with `PermissionDenied`.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    files: HashMap<PathBuf, Vec<u8>>,
    directories: HashSet<PathBuf>,
    links: HashMap<PathBuf, PathBuf>,
    denied: HashSet<PathBuf>,
}

impl MockFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.files.insert(path, content.into());
    }

    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.directories.insert(path);
    }

    pub fn add_link(&mut self, path: impl AsRef<Path>, target: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        self.add_parents(&path);
        self.links.insert(path, target.as_ref().to_path_buf());
    }

    pub fn deny(&mut self, path: impl AsRef<Path>) {
        self.denied.insert(path.as_ref().to_path_buf());
    }

    /// Registers a process directory with the three files the detail reader
    /// consumes.
    pub fn add_process(&mut self, root: &Path, pid: u32, status: &str, stat: &str, cmdline: &[u8]) {
        let base = root.join(pid.to_string());
        self.add_dir(&base);
        self.add_file(base.join("status"), status);
        self.add_file(base.join("stat"), stat);
        self.add_file(base.join("cmdline"), cmdline.to_vec());
    }

    /// Drops everything under `path`, simulating an exited process.
    pub fn remove_tree(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.files.retain(|p, _| !p.starts_with(path));
        self.directories.retain(|p| !p.starts_with(path));
        self.links.retain(|p, _| !p.starts_with(path));
        self.denied.retain(|p| !p.starts_with(path));
    }

    fn add_parents(&mut self, path: &Path) {
        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                self.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }
    }

    fn check_access(&self, path: &Path) -> io::Result<()> {
        if self.denied.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("permission denied: {}", path.display()),
            ));
        }
        Ok(())
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("not found: {}", path.display()),
        )
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check_access(path)?;
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.check_access(path)?;
        if !self.directories.contains(path) {
            return Err(Self::not_found(path));
        }

        let mut entries = HashSet::new();
        let children = self
            .files
            .keys()
            .chain(self.links.keys())
            .chain(self.directories.iter());
        for child in children {
            if child != path && child.parent().is_some_and(|p| p == path) {
                entries.insert(child.clone());
            }
        }
        Ok(entries.into_iter().collect())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.check_access(path)?;
        self.links
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.directories.contains(path)
            || self
                .links
                .get(path)
                .is_some_and(|target| target != path && self.exists(target))
    }
}

/// Lets a fixture change between collection passes while a coordinator
/// holds it.
impl FileSystem for RwLock<MockFs> {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.read().unwrap_or_else(PoisonError::into_inner).read_to_string(path)
    }

    fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.read().unwrap_or_else(PoisonError::into_inner).read_bytes(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        self.read().unwrap_or_else(PoisonError::into_inner).read_dir(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.read().unwrap_or_else(PoisonError::into_inner).read_link(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.read().unwrap_or_else(PoisonError::into_inner).exists(path)
    }
}
