//! Client side of the disk capacity helper protocol.
//!
//! The helper is an external program invoked as `<helper> <mount-point>`.
//! On success it prints one JSON object with `total_bytes`, `used_bytes`,
//! `free_bytes` and `percent_used`; on failure it prints `{"error": "..."}`
//! and exits non-zero.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub percent_used: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// The helper binary could not be started.
    Missing(String),
    TimedOut(Duration),
    /// The helper answered with an `error` record.
    Reported(String),
    ExitStatus(String),
    Malformed(String),
    Io(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Missing(reason) => write!(f, "capacity helper not available: {reason}"),
            ProbeError::TimedOut(limit) => {
                write!(f, "capacity helper timed out after {}ms", limit.as_millis())
            }
            ProbeError::Reported(reason) => write!(f, "capacity helper reported: {reason}"),
            ProbeError::ExitStatus(status) => write!(f, "capacity helper exited with {status}"),
            ProbeError::Malformed(reason) => write!(f, "unparsable helper output: {reason}"),
            ProbeError::Io(reason) => write!(f, "capacity helper i/o error: {reason}"),
        }
    }
}

impl std::error::Error for ProbeError {}

/// Source of capacity statistics for one mount point.
pub trait CapacityProbe: Send + Sync {
    fn probe(&self, mount_point: &str) -> Result<DiskUsage, ProbeError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HelperReply {
    Usage(DiskUsage),
    Failure { error: String },
}

/// Interprets one line of helper output.
pub fn parse_reply(output: &str) -> Result<DiskUsage, ProbeError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::Malformed("empty output".into()));
    }
    match serde_json::from_str::<HelperReply>(trimmed) {
        Ok(HelperReply::Usage(usage)) => Ok(usage),
        Ok(HelperReply::Failure { error }) => Err(ProbeError::Reported(error)),
        Err(err) => Err(ProbeError::Malformed(err.to_string())),
    }
}

/// Runs the helper as a subprocess with a hard timeout.
///
/// Each probe drives the child on its own current-thread runtime, so it must
/// be called from blocking code, never from inside an async task.
#[derive(Debug, Clone)]
pub struct HelperProbe {
    program: PathBuf,
    timeout: Duration,
}

impl HelperProbe {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        HelperProbe {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, mount_point: &str) -> Result<DiskUsage, ProbeError> {
        let mut child = Command::new(&self.program)
            .arg(mount_point)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ProbeError::Missing(format!("{}: {e}", self.program.display()))
                }
                _ => ProbeError::Io(e.to_string()),
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProbeError::Io("helper stdout not captured".into()))?;

        // Output is read to EOF before waiting: a helper that forked a
        // child holding stdout open is still bounded by the timeout.
        let exchange = async {
            let mut raw = Vec::new();
            stdout.read_to_end(&mut raw).await?;
            let status = child.wait().await?;
            Ok::<_, io::Error>((status, raw))
        };

        let outcome = timeout(self.timeout, exchange).await;
        let (status, raw) = match outcome {
            Ok(Ok(done)) => done,
            Ok(Err(err)) => {
                let _ = child.kill().await;
                return Err(ProbeError::Io(err.to_string()));
            }
            Err(_) => {
                // kill() also reaps the child.
                let _ = child.kill().await;
                return Err(ProbeError::TimedOut(self.timeout));
            }
        };

        let output = String::from_utf8_lossy(&raw);
        if !status.success() {
            // Prefer the helper's own explanation when it gave one.
            return match parse_reply(&output) {
                Err(reported @ ProbeError::Reported(_)) => Err(reported),
                _ => Err(ProbeError::ExitStatus(status.to_string())),
            };
        }
        parse_reply(&output)
    }
}

impl CapacityProbe for HelperProbe {
    fn probe(&self, mount_point: &str) -> Result<DiskUsage, ProbeError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProbeError::Io(format!("helper runtime: {e}")))?;
        runtime.block_on(self.run(mount_point))
    }
}
