#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/standlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn standlink(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_standlink"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .output()
        .expect("standlink should run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths are utf-8")
}

#[test]
fn decode_writes_one_csv_per_session() {
    let dir = unique_temp_dir("decode");
    let capture = dir.join("data.bin");
    let out_dir = dir.join("decoded");

    let sim = standlink(&[
        "simulate",
        path_arg(&capture),
        "--capture",
        "--sessions",
        "2",
        "--frames",
        "10",
        "--rate",
        "250",
        "--garbage",
    ]);
    assert!(sim.status.success(), "simulate failed: {sim:?}");

    let output = standlink(&["decode", path_arg(&capture), "--out", path_arg(&out_dir)]);
    assert_eq!(output.status.code(), Some(0), "decode failed: {output:?}");

    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be json"))
        .collect();
    assert_eq!(rows.len(), 2);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["session"], i);
        assert_eq!(row["frames"], 10);
        assert_eq!(row["trailing_bytes"], 18);
        assert_eq!(row["rate"], "250.00 Hz");
    }

    for name in ["session_000.csv", "session_001.csv"] {
        let csv = std::fs::read_to_string(out_dir.join(name)).expect("session csv should exist");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[0].starts_with("timestamp_us,seq,valid_mask,status_bits,solenoid_state,"));
        assert!(lines[1].starts_with("0,0,15,0,32768,"));
    }
}

#[test]
fn decode_without_marker_is_data_invalid() {
    let dir = unique_temp_dir("nomarker");
    let capture = dir.join("zeros.bin");
    std::fs::write(&capture, vec![0u8; 512]).expect("capture should be writable");

    let output = standlink(&["decode", path_arg(&capture), "--out", path_arg(&dir)]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no marker found"), "stderr: {stderr}");
    assert!(!dir.join("session_000.csv").exists());
}

#[test]
fn bare_markers_produce_header_only_files() {
    let dir = unique_temp_dir("bare");
    let capture = dir.join("bare.bin");
    std::fs::write(&capture, [0xA5u8; 8]).expect("capture should be writable");
    let out_dir = dir.join("out");

    let output = standlink(&["decode", path_arg(&capture), "--out", path_arg(&out_dir)]);
    assert_eq!(output.status.code(), Some(0), "decode failed: {output:?}");

    for name in ["session_000.csv", "session_001.csv"] {
        let csv = std::fs::read_to_string(out_dir.join(name)).expect("session csv should exist");
        assert_eq!(csv.lines().count(), 1);
    }
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert!(stdout.contains("\"rate\":\"unknown\""));
}

#[test]
fn decode_rejects_zero_channels() {
    let dir = unique_temp_dir("zero-channels");
    let capture = dir.join("data.bin");
    std::fs::write(&capture, [0xA5u8; 4]).expect("capture should be writable");

    let output = standlink(&["decode", path_arg(&capture), "--channels", "0"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = standlink(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert_eq!(stdout.trim(), format!("standlink {}", env!("CARGO_PKG_VERSION")));
}
