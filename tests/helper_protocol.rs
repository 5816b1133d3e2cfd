use std::process::Command;
use std::time::Duration;

use procsnap::system::helper::{CapacityProbe, HelperProbe, ProbeError, parse_reply};

const HELPER: &str = env!("CARGO_BIN_EXE_procsnap-df");

#[test]
fn reports_capacity_of_root() {
    let output = Command::new(HELPER).arg("/").output().unwrap();
    assert!(output.status.success());

    let usage = parse_reply(&String::from_utf8_lossy(&output.stdout)).unwrap();
    assert!(usage.total_bytes > 0);
    assert_eq!(usage.used_bytes + usage.free_bytes, usage.total_bytes);
    assert!((0.0..=100.0).contains(&usage.percent_used));
}

#[test]
fn missing_path_yields_error_record_and_status_one() {
    let output = Command::new(HELPER)
        .arg("/nonexistent/procsnap/path")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let message = value["error"].as_str().unwrap();
    assert!(message.contains("/nonexistent/procsnap/path"));
}

#[test]
fn wrong_argument_count_prints_usage() {
    let output = Command::new(HELPER).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("usage:"));
    assert!(output.stdout.is_empty());
}

#[test]
fn helper_error_text_reaches_the_caller() {
    let probe = HelperProbe::new(HELPER, Duration::from_secs(5));
    match probe.probe("/nonexistent/procsnap/path") {
        Err(ProbeError::Reported(reason)) => assert!(reason.contains("cannot stat")),
        other => panic!("unexpected probe result: {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn slow_helper_is_killed_at_timeout() {
    // `sleep 5` stands in for a helper stuck on an unresponsive mount.
    let probe = HelperProbe::new("sleep", Duration::from_millis(100));
    let started = std::time::Instant::now();
    assert_eq!(
        probe.probe("5"),
        Err(ProbeError::TimedOut(Duration::from_millis(100)))
    );
    assert!(started.elapsed() < Duration::from_secs(4));
}
