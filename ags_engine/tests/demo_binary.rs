use std::fs;
use std::process::Command;

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn demo_binary_writes_an_event_log() -> Result<()> {
    let temp_dir = tempdir().context("creating temporary directory for the event log")?;
    let log_path = temp_dir.path().join("events.json");
    let log_path_str = log_path.to_str().context("event log path is not valid UTF-8")?;

    let status = Command::new(env!("CARGO_BIN_EXE_ags_engine"))
        .args([
            "--frames",
            "50",
            "--fast-forward",
            "--event-log-json",
            log_path_str,
        ])
        .status()
        .context("executing the demo binary")?;

    assert!(status.success(), "demo binary exited with {status:?}");
    assert!(log_path.is_file(), "demo binary did not produce an event log");

    let report: Value = serde_json::from_str(&fs::read_to_string(&log_path)?)
        .context("parsing the event log")?;
    let total = report["total"].as_u64().context("event log has no total")?;
    assert!(total >= 1, "expected at least one diagnostic event");
    assert_eq!(report["events"][0]["label"], "room.load 1");
    Ok(())
}
