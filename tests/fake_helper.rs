//! Scripted stand-in for the capacity helper. Kept in its own test binary so
//! no other test forks while the script is being written.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use procsnap::system::collector::{Collector, CollectorSettings};
use procsnap::system::fs::MockFs;
use procsnap::system::helper::{CapacityProbe, HelperProbe, ProbeError};
use procsnap::system::mounts::Reading;

fn write_script(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("procsnap-fake-helper-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn collect_with(helper: &Path) -> procsnap::system::snapshot::SystemSnapshot {
    let mut mock = MockFs::new();
    mock.add_file("/proc/stat", "cpu  100 0 0 100 0\n");
    mock.add_file("/proc/mounts", "/dev/sda1 / ext4 rw 0 0\n/dev/sdb1 /mnt/x ext4 rw 0 0\n");
    let fs = Arc::new(RwLock::new(mock));
    let probe = HelperProbe::new(helper, Duration::from_secs(5));
    let collector = Collector::new(fs, Arc::new(probe), CollectorSettings::default());
    collector.refresh().as_ref().clone()
}

#[test]
fn scripted_helpers_are_honoured_and_bounded() {
    let helper = write_script(
        "df",
        r#"if [ "$1" = "/mnt/x" ]; then
  echo '{"error":"permission denied"}'
  exit 1
fi
echo '{"total_bytes": 2000, "used_bytes": 500, "free_bytes": 1500, "percent_used": 25.0}'"#,
    );
    let snap = collect_with(&helper);

    assert_eq!(snap.mounts.len(), 2);
    let root = &snap.mounts[0];
    assert_eq!(root.total_bytes, Reading::Value(2000));
    assert_eq!(root.percent_used, Reading::Value(25.0));

    let denied = &snap.mounts[1];
    assert_eq!(
        (denied.device.as_str(), denied.mount_point.as_str(), denied.fs_type.as_str()),
        ("/dev/sdb1", "/mnt/x", "ext4")
    );
    assert_eq!(denied.total_bytes, Reading::Unavailable);
    assert_eq!(denied.used_bytes, Reading::Unavailable);
    assert_eq!(denied.free_bytes, Reading::Unavailable);
    assert_eq!(denied.percent_used, Reading::Unavailable);
    assert_eq!(
        denied.unavailable_reason.as_deref(),
        Some("capacity helper reported: permission denied")
    );

    let garbage = write_script("garbage", "echo 'not json at all'");
    let snap = collect_with(&garbage);
    assert!(snap.mounts.iter().all(|m| m.total_bytes.is_unavailable()));

    // The wrapper exits at once but its background child keeps stdout open.
    let lingering = write_script(
        "lingering",
        "sleep 5 &\necho '{\"total_bytes\": 1, \"used_bytes\": 0, \"free_bytes\": 1, \"percent_used\": 0.0}'\nexit 0",
    );
    let limit = Duration::from_millis(300);
    let probe = HelperProbe::new(&lingering, limit);
    let started = Instant::now();
    assert_eq!(probe.probe("/"), Err(ProbeError::TimedOut(limit)));
    assert!(started.elapsed() < Duration::from_secs(3), "{:?}", started.elapsed());

    let _ = fs::remove_dir_all(helper.parent().unwrap());
}
