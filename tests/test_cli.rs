//! Integration test: the training binary's exit behaviour

use std::process::Command;
use tempfile::TempDir;

#[test]
fn test_missing_dataset_exits_nonzero_with_one_error_line() {
    let dir = TempDir::new().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_vehicle-load-train"))
        .current_dir(dir.path())
        .env("RUST_LOG", "vehicle_load=info")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));

    let logs = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let error_lines: Vec<&str> = logs.lines().filter(|l| l.contains("ERROR")).collect();
    assert_eq!(error_lines.len(), 1, "logs: {}", logs);
    assert!(error_lines[0].contains("No dataset found"));
    assert!(error_lines[0].contains("vehicle_data.csv"));
}

#[test]
fn test_version_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_vehicle-load-train"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("vehicle-load-train"));
}
