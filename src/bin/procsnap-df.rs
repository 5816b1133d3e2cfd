//! Capacity helper: `procsnap-df <mount-point>`.
//!
//! Prints one JSON record with `total_bytes`, `used_bytes`, `free_bytes` and
//! `percent_used`, or `{"error": "..."}` with exit status 1.

use std::io;
use std::path::Path;
use std::process::ExitCode;

use procsnap::system::helper::DiskUsage;
use serde_json::json;

fn main() -> ExitCode {
    let args: Vec<_> = std::env::args_os().collect();
    if args.len() != 2 {
        let program = args
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_else(|| "procsnap-df".to_string());
        eprintln!("usage: {program} <mount-point>");
        return ExitCode::from(2);
    }

    let path = Path::new(&args[1]);
    match disk_usage(path) {
        Ok(usage) => match serde_json::to_string(&usage) {
            Ok(line) => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                println!("{}", json!({ "error": format!("cannot encode usage: {err}") }));
                ExitCode::from(1)
            }
        },
        Err(err) => {
            println!(
                "{}",
                json!({ "error": format!("cannot stat {}: {err}", path.display()) })
            );
            ExitCode::from(1)
        }
    }
}

fn usage_from_blocks(blocks: u64, free_blocks: u64, block_size: u64) -> DiskUsage {
    let total_bytes = blocks.saturating_mul(block_size);
    let free_bytes = free_blocks.saturating_mul(block_size).min(total_bytes);
    let used_bytes = total_bytes - free_bytes;
    let percent_used = if total_bytes > 0 {
        (used_bytes as f64 / total_bytes as f64 * 10_000.0).round() / 100.0
    } else {
        0.0
    };
    DiskUsage {
        total_bytes,
        used_bytes,
        free_bytes,
        percent_used,
    }
}

#[cfg(unix)]
fn disk_usage(path: &Path) -> io::Result<DiskUsage> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: statvfs is plain data; zeroed is a valid initial value.
    let mut stats: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: c_path is NUL-terminated and stats is a valid out pointer.
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stats) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(usage_from_blocks(
        stats.f_blocks as u64,
        stats.f_bfree as u64,
        stats.f_frsize as u64,
    ))
}

#[cfg(not(unix))]
fn disk_usage(_path: &Path) -> io::Result<DiskUsage> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "statvfs is not available on this platform",
    ))
}
