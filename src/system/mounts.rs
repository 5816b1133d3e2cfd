//! Mounted block-device filesystems with capacity statistics.

use std::fmt;
use std::path::Path;

use serde::{Serialize, Serializer};

use super::fs::FileSystem;
use super::helper::{CapacityProbe, DiskUsage};

pub const UNAVAILABLE: &str = "unavailable";

/// Pseudo and virtual filesystem types never reported as mounts.
pub const DEFAULT_EXCLUDED_FS_TYPES: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "proc",
    "sysfs",
    "cgroup",
    "cgroup2",
    "devpts",
    "mqueue",
    "debugfs",
    "tracefs",
    "securityfs",
    "pstore",
    "bpf",
    "configfs",
    "fusectl",
    "hugetlbfs",
    "autofs",
    "binfmt_misc",
    "overlay",
    "squashfs",
    "ramfs",
    "efivarfs",
    "nsfs",
];

/// A capacity figure, or the explicit marker that it could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Value(T),
    Unavailable,
}

impl<T: Copy> Reading<T> {
    pub fn value(&self) -> Option<T> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Unavailable)
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => fmt::Display::fmt(v, f),
            Reading::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => v.serialize(serializer),
            Reading::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

/// Device, mount point and type from one mount table line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total_bytes: Reading<u64>,
    pub used_bytes: Reading<u64>,
    pub free_bytes: Reading<u64>,
    pub percent_used: Reading<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}

impl MountEntry {
    pub fn with_usage(spec: MountSpec, usage: DiskUsage) -> Self {
        MountEntry {
            device: spec.device,
            mount_point: spec.mount_point,
            fs_type: spec.fs_type,
            total_bytes: Reading::Value(usage.total_bytes),
            used_bytes: Reading::Value(usage.used_bytes),
            free_bytes: Reading::Value(usage.free_bytes),
            percent_used: Reading::Value(usage.percent_used),
            unavailable_reason: None,
        }
    }

    pub fn unavailable(spec: MountSpec, reason: impl Into<String>) -> Self {
        MountEntry {
            device: spec.device,
            mount_point: spec.mount_point,
            fs_type: spec.fs_type,
            total_bytes: Reading::Unavailable,
            used_bytes: Reading::Unavailable,
            free_bytes: Reading::Unavailable,
            percent_used: Reading::Unavailable,
            unavailable_reason: Some(reason.into()),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.unavailable_reason.is_none()
    }
}

/// Decodes the `\ooo` octal escapes the kernel uses for whitespace and
/// backslashes in mount table fields.
pub fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let code = (bytes[i + 1] - b'0') as u32 * 64
                + (bytes[i + 2] - b'0') as u32 * 8
                + (bytes[i + 3] - b'0') as u32;
            if let Ok(byte) = u8::try_from(code) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Keeps real block devices whose type is not excluded. Short lines are
/// skipped.
pub fn parse_mounts(content: &str, excluded: &[String]) -> Vec<MountSpec> {
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            if !device.starts_with("/dev/") || excluded.iter().any(|t| t == fs_type) {
                return None;
            }
            Some(MountSpec {
                device: unescape_octal(device),
                mount_point: unescape_octal(mount_point),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Lists mounts and asks `probe` for each one's capacity. A failed probe
/// marks that entry unavailable and moves on to the next mount.
pub fn enumerate(
    fs: &dyn FileSystem,
    proc_root: &Path,
    excluded: &[String],
    probe: &dyn CapacityProbe,
) -> Vec<MountEntry> {
    let _span = tracing::debug_span!("collector.mounts").entered();

    let content = match fs.read_text(&proc_root.join("mounts")) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(error = %err, "mount table unavailable");
            return Vec::new();
        }
    };

    parse_mounts(&content, excluded)
        .into_iter()
        .map(|spec| match probe.probe(&spec.mount_point) {
            Ok(usage) => MountEntry::with_usage(spec, usage),
            Err(err) => {
                tracing::debug!(mount_point = %spec.mount_point, error = %err, "capacity unavailable");
                MountEntry::unavailable(spec, err.to_string())
            }
        })
        .collect()
}
