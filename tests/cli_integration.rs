//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Get path to the sharelink binary
fn sharelink_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_sharelink"))
}

/// Run sharelink with passcode from stdin
fn run_sharelink_with_passcode(args: &[&str], passcode: &str) -> std::io::Result<Output> {
    let mut child = Command::new(sharelink_bin())
        .arg("--passcode-stdin")
        .args(args)
        .env_remove("SHARELINK_ORIGIN")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., file not found)
        let _ = stdin.write_all(passcode.as_bytes());
    }

    child.wait_with_output()
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}

fn stdout_line(output: &Output) -> String {
    String::from_utf8(output.stdout.clone())
        .unwrap()
        .trim_end()
        .to_string()
}

#[test]
fn test_open_known_link() {
    let link = fs::read_to_string(testdata_path("work-area.link")).unwrap();

    let result = run_sharelink_with_passcode(&["open", "-u", link.trim()], "correct horse\n").unwrap();

    assert!(
        result.status.success(),
        "open failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let opened: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(
        opened,
        serde_json::json!({"projectId": "abc123", "records": []})
    );
}

#[test]
fn test_seal_open_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let payload_path = testdata_path("work-area.json");
    let link_path = temp_dir.path().join("link.txt");
    let opened_path = temp_dir.path().join("opened.json");

    let result = run_sharelink_with_passcode(
        &[
            "seal",
            "-i",
            payload_path.to_str().unwrap(),
            "-p",
            "f3c1e2a4-0b7d-4c1e-9a55-3d2b7e9c0f11",
            "--origin",
            "https://app.utilitx.test/",
            "-o",
            link_path.to_str().unwrap(),
        ],
        "test",
    )
    .unwrap();

    assert!(
        result.status.success(),
        "seal failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let link = fs::read_to_string(&link_path).unwrap();
    assert!(link.starts_with(
        "https://app.utilitx.test/view/f3c1e2a4-0b7d-4c1e-9a55-3d2b7e9c0f11#version=1&salt="
    ));

    let result = run_sharelink_with_passcode(
        &[
            "open",
            "-u",
            link.trim(),
            "-o",
            opened_path.to_str().unwrap(),
        ],
        "test",
    )
    .unwrap();

    assert!(
        result.status.success(),
        "open failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    let original: serde_json::Value =
        serde_json::from_slice(&fs::read(&payload_path).unwrap()).unwrap();
    let opened: serde_json::Value =
        serde_json::from_slice(&fs::read(&opened_path).unwrap()).unwrap();
    assert_eq!(original, opened);
}

#[test]
fn test_seal_to_stdout_uses_default_origin() {
    let result = run_sharelink_with_passcode(
        &[
            "seal",
            "-i",
            testdata_path("work-area.json").to_str().unwrap(),
            "-p",
            "abc123",
        ],
        "test",
    )
    .unwrap();

    assert!(result.status.success());
    assert!(stdout_line(&result).starts_with("http://localhost:3000/view/abc123#version=1&"));
}

#[test]
fn test_reseal_operation() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.json");
    let second = temp_dir.path().join("second.json");

    fs::write(&first, r#"{"records":["a"]}"#).unwrap();
    fs::write(&second, r#"{"records":["a","b"]}"#).unwrap();

    let result = run_sharelink_with_passcode(
        &["seal", "-i", first.to_str().unwrap(), "-p", "abc123"],
        "test",
    )
    .unwrap();
    assert!(result.status.success());
    let old_link = stdout_line(&result);

    let result = run_sharelink_with_passcode(
        &["reseal", "-u", &old_link, "-i", second.to_str().unwrap()],
        "test",
    )
    .unwrap();
    assert!(
        result.status.success(),
        "reseal failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    let new_link = stdout_line(&result);
    assert_ne!(old_link, new_link);

    let result = run_sharelink_with_passcode(&["open", "-u", &new_link], "test").unwrap();
    assert!(result.status.success());
    let opened: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    assert_eq!(opened, serde_json::json!({"records": ["a", "b"]}));
}

#[test]
fn test_reseal_with_wrong_passcode_fails() {
    let temp_dir = TempDir::new().unwrap();
    let payload = temp_dir.path().join("payload.json");
    fs::write(&payload, "{}").unwrap();

    let result = run_sharelink_with_passcode(
        &["seal", "-i", payload.to_str().unwrap(), "-p", "abc123"],
        "correct_passcode",
    )
    .unwrap();
    assert!(result.status.success());
    let link = stdout_line(&result);

    let result = run_sharelink_with_passcode(
        &["reseal", "-u", &link, "-i", payload.to_str().unwrap()],
        "wrong_passcode",
    )
    .unwrap();

    assert!(!result.status.success());
    assert!(result.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(
        stderr.contains("wrong passcode or damaged link"),
        "Expected error message about the passcode, got: {}",
        stderr
    );
}

#[test]
fn test_open_wrong_passcode_fails() {
    let link = fs::read_to_string(testdata_path("work-area.link")).unwrap();

    let result = run_sharelink_with_passcode(&["open", "-u", link.trim()], "wrong horse").unwrap();

    assert!(!result.status.success());
    assert!(result.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("wrong passcode or damaged link"), "got: {}", stderr);
}

#[test]
fn test_open_incomplete_link_fails() {
    let result = run_sharelink_with_passcode(
        &["open", "-u", "https://app.utilitx.test/view/abc123#version=1&salt=abc"],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("invalid or expired link"), "got: {}", stderr);
}

#[test]
fn test_seal_nonexistent_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let nonexistent = temp_dir.path().join("nonexistent.json");

    let result = run_sharelink_with_passcode(
        &["seal", "-i", nonexistent.to_str().unwrap(), "-p", "abc123"],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("failed to read from"), "got: {}", stderr);
}

#[test]
fn test_seal_empty_passcode_fails() {
    let result = run_sharelink_with_passcode(
        &[
            "seal",
            "-i",
            testdata_path("work-area.json").to_str().unwrap(),
            "-p",
            "abc123",
        ],
        "\n",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("passcode must not be empty"), "got: {}", stderr);
}

#[test]
fn test_seal_invalid_project_fails() {
    let result = run_sharelink_with_passcode(
        &[
            "seal",
            "-i",
            testdata_path("work-area.json").to_str().unwrap(),
            "-p",
            "abc/123",
        ],
        "test",
    )
    .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("project id"), "got: {}", stderr);
}

#[test]
fn test_unknown_log_level_is_rejected() {
    let result = Command::new(sharelink_bin())
        .args(["--log-level", "verbose", "open", "-u", "https://x.test/view/a"])
        .stdin(Stdio::null())
        .output()
        .unwrap();

    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("verbose"), "got: {}", stderr);
    assert!(stderr.contains("--log-level"), "got: {}", stderr);
}

#[test]
fn test_log_level_accepts_known_levels() {
    let result = run_sharelink_with_passcode(
        &[
            "--log-level",
            "debug",
            "seal",
            "-i",
            testdata_path("work-area.json").to_str().unwrap(),
            "-p",
            "abc123",
        ],
        "test",
    )
    .unwrap();

    assert!(
        result.status.success(),
        "seal failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
    assert!(stdout_line(&result).starts_with("http://localhost:3000/view/abc123#"));
}

#[test]
fn test_help_output() {
    let result = Command::new(sharelink_bin()).arg("--help").output().unwrap();

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("seal"));
    assert!(stdout.contains("open"));
    assert!(stdout.contains("reseal"));
}
