//! Plain-text rendering of snapshots and resource sets for the CLI.

use std::fmt::Write;

use crate::format::{format_kb, format_reading_bytes, format_reading_percent, truncate_unicode};
use crate::system::resources::{Descriptor, ResourceSet};
use crate::system::snapshot::SystemSnapshot;

const MIN_COMMAND_WIDTH: usize = 10;

pub fn render_summary(snapshot: &SystemSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "CPU     {:>6.2}% used {:>6.2}% idle",
        snapshot.cpu_usage_percent, snapshot.cpu_idle_percent
    );
    match &snapshot.memory {
        Some(mem) => {
            let _ = writeln!(
                out,
                "Memory  {} / {} ({:.2}% used, {:.2}% free)",
                format_kb(mem.used_kb),
                format_kb(mem.total_kb),
                mem.used_percent,
                mem.free_percent
            );
            let _ = writeln!(
                out,
                "Swap    {} / {}",
                format_kb(mem.swap_used_kb),
                format_kb(mem.swap_total_kb)
            );
        }
        None => {
            let _ = writeln!(out, "Memory  unknown");
            let _ = writeln!(out, "Swap    unknown");
        }
    }
    let _ = writeln!(
        out,
        "Tasks   {} processes, {} threads",
        snapshot.process_count, snapshot.thread_count
    );
    if snapshot.truncated {
        let _ = writeln!(out, "        process list cut short at pass deadline");
    }
    out
}

pub fn render_mounts(snapshot: &SystemSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<16} {:<6} {:>11} {:>11} {:>11} {:>11}",
        "DEVICE", "MOUNT", "TYPE", "SIZE", "USED", "FREE", "USE%"
    );
    for mount in &snapshot.mounts {
        let _ = writeln!(
            out,
            "{:<16} {:<16} {:<6} {:>11} {:>11} {:>11} {:>11}",
            mount.device,
            mount.mount_point,
            mount.fs_type,
            format_reading_bytes(&mount.total_bytes),
            format_reading_bytes(&mount.used_bytes),
            format_reading_bytes(&mount.free_bytes),
            format_reading_percent(&mount.percent_used),
        );
    }
    out
}

/// Process table sorted by pid; commands are cut to fit `width` columns.
pub fn render_processes(snapshot: &SystemSnapshot, width: usize) -> String {
    let mut processes: Vec<_> = snapshot.processes.iter().collect();
    processes.sort_by_key(|p| p.pid);

    let mut out = String::new();
    let header = format!(
        "{:>7} {:>7} {:<10} {} {:>4} {:>9} {:>8} {:>8} ",
        "PID", "PPID", "USER", "S", "THR", "RSS", "UTIME", "STIME"
    );
    let command_width = width.saturating_sub(header.len()).max(MIN_COMMAND_WIDTH);
    let _ = writeln!(out, "{header}COMMAND");

    for p in processes {
        let user = p.user.clone().unwrap_or_else(|| p.uid.to_string());
        let _ = writeln!(
            out,
            "{:>7} {:>7} {:<10} {} {:>4} {:>9} {:>8} {:>8} {}",
            p.pid,
            p.ppid,
            truncate_unicode(&user, 10),
            p.state.code(),
            p.threads,
            format_kb(p.rss_kb),
            p.utime_ticks,
            p.stime_ticks,
            truncate_unicode(&p.command.to_string(), command_width),
        );
    }
    out
}

pub fn render_snapshot(snapshot: &SystemSnapshot, width: usize) -> String {
    format!(
        "{}\n{}\n{}",
        render_summary(snapshot),
        render_mounts(snapshot),
        render_processes(snapshot, width)
    )
}

fn render_section(out: &mut String, title: &str, entries: &[Descriptor]) {
    let _ = writeln!(out, "{title} ({})", entries.len());
    for entry in entries {
        match &entry.reason {
            Some(reason) if entry.target.is_empty() => {
                let _ = writeln!(out, "  {} [{reason}]", entry.fd);
            }
            Some(reason) => {
                let _ = writeln!(out, "  {} -> {} [{reason}]", entry.fd, entry.target);
            }
            None => {
                let _ = writeln!(out, "  {} -> {}", entry.fd, entry.target);
            }
        }
    }
}

pub fn render_resources(set: &ResourceSet) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PID {}", set.pid);
    render_section(&mut out, "Files", &set.files);
    render_section(&mut out, "Sockets", &set.sockets);
    render_section(&mut out, "Pipes", &set.pipes);
    render_section(&mut out, "Anon", &set.anon);
    render_section(&mut out, "Errors", &set.errors);
    let _ = writeln!(out, "Locks ({})", set.locks.len());
    for line in &set.locks {
        let _ = writeln!(out, "  {line}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::memory::MemoryStats;
    use crate::system::mounts::{MountEntry, MountSpec};
    use crate::system::process::{CommandLine, ProcessRecord, ProcessState};

    fn snapshot() -> SystemSnapshot {
        let mut snap = SystemSnapshot::empty();
        snap.sequence = 1;
        snap.cpu_usage_percent = 50.0;
        snap.cpu_idle_percent = 50.0;
        snap.memory = Some(MemoryStats {
            total_kb: 1000,
            used_kb: 700,
            free_kb: 300,
            used_percent: 70.0,
            free_percent: 30.0,
            swap_total_kb: 0,
            swap_used_kb: 0,
        });
        snap.process_count = 1;
        snap.thread_count = 4;
        snap.processes = vec![ProcessRecord {
            pid: 42,
            ppid: 1,
            uid: 1000,
            user: Some("alice".into()),
            name: "worker".into(),
            state: ProcessState::Sleeping,
            threads: 4,
            rss_kb: 2048,
            utime_ticks: 120,
            stime_ticks: 30,
            command: CommandLine::Args("worker --queue jobs --verbose".into()),
            descriptors: None,
        }];
        snap.mounts = vec![MountEntry::unavailable(
            MountSpec {
                device: "/dev/sdb1".into(),
                mount_point: "/mnt/x".into(),
                fs_type: "ext4".into(),
            },
            "permission denied",
        )];
        snap
    }

    #[test]
    fn summary_text() {
        insta::assert_snapshot!(render_summary(&snapshot()).trim_end(), @r"
CPU      50.00% used  50.00% idle
Memory  700 KB / 1000 KB (70.00% used, 30.00% free)
Swap    0 B / 0 B
Tasks   1 processes, 4 threads
");
    }

    #[test]
    fn unknown_memory_is_not_zero() {
        let mut snap = snapshot();
        snap.memory = None;
        let text = render_summary(&snap);
        assert!(text.contains("Memory  unknown"));
        assert!(!text.contains("0.00% used,"));
    }

    #[test]
    fn unavailable_mount_renders_marker_in_every_column() {
        let text = render_mounts(&snapshot());
        let row = text.lines().nth(1).unwrap();
        assert!(row.starts_with("/dev/sdb1"));
        assert_eq!(row.matches("unavailable").count(), 4);
    }

    #[test]
    fn process_command_is_truncated_to_width() {
        let text = render_processes(&snapshot(), 80);
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains("alice"));
        assert!(row.contains("2.0 MB"));
        assert!(row.ends_with('\u{2026}'));
        let wide = render_processes(&snapshot(), 200);
        assert!(wide.contains("worker --queue jobs --verbose"));
    }

    #[test]
    fn resource_report_lists_reasons() {
        let mut set = ResourceSet::empty(7);
        set.errors.push(Descriptor {
            fd: "*".into(),
            target: String::new(),
            reason: Some("permission denied opening descriptor table".into()),
        });
        let text = render_resources(&set);
        assert!(text.contains("Errors (1)\n  * [permission denied opening descriptor table]"));
        assert!(text.contains("Locks (0)"));
    }
}
