//! Integration tests for GestureLink CLI commands

use std::process::Command;

use gesturelink::config::Config;

fn gesturelink() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gesturelink"))
}

/// Test that the help command works
#[test]
fn test_help_command() {
    let output = gesturelink()
        .arg("--help")
        .output()
        .expect("Failed to execute help command");

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: gesturelink"), "Should show usage");
    assert!(stdout.contains("console"), "Should show console command");
    assert!(stdout.contains("mock-backend"), "Should show mock-backend command");
    assert!(stdout.contains("config"), "Should show config command");
}

/// Test that the version command works
#[test]
fn test_version_command() {
    let output = gesturelink()
        .arg("--version")
        .output()
        .expect("Failed to execute version command");

    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gesturelink"), "Should show binary name");
    assert!(stdout.contains("0.1.0"), "Should show version number");
}

/// Test config show command with a missing file
#[test]
fn test_config_show_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = gesturelink()
        .args(["--config-file", path.to_str().unwrap(), "config", "show"])
        .output()
        .expect("Failed to execute config show command");

    assert!(output.status.success(), "Config show command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration from"), "Should show config source");
    assert!(stdout.contains("ws://localhost:5000"), "Should show default endpoint");
    assert!(stdout.contains("connect_timeout_ms"), "Should show timeouts");
}

/// Test config set persists the value
#[test]
fn test_config_set_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = gesturelink()
        .args([
            "--config-file",
            path.to_str().unwrap(),
            "config",
            "set",
            "backend.endpoint",
            "ws://127.0.0.1:6100",
        ])
        .output()
        .expect("Failed to execute config set command");

    assert!(output.status.success(), "Config set command should succeed");

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.backend.endpoint, "ws://127.0.0.1:6100");
}

/// Test config set rejects invalid values
#[test]
fn test_config_set_rejects_invalid_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = gesturelink()
        .args([
            "--config-file",
            path.to_str().unwrap(),
            "config",
            "set",
            "backend.endpoint",
            "http://example.com",
        ])
        .output()
        .expect("Failed to execute config set command");

    assert!(!output.status.success(), "Invalid endpoint should be rejected");
    assert!(!path.exists(), "Nothing should be written");
}

/// Console exits cleanly on end of input, even with no backend running
#[test]
fn test_console_exits_on_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let output = gesturelink()
        .args(["--config-file", path.to_str().unwrap(), "console"])
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute console command");

    assert!(output.status.success(), "Console should exit cleanly");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Disconnected"), "Should render the status line");
    assert!(stdout.contains("Session summary"), "Should print the summary");
}

/// An unusable config file is reported on stderr before falling back
#[test]
fn test_invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[backend]\nendpoint = \"http://typo:5000\"\n").unwrap();

    let output = gesturelink()
        .args(["--config-file", path.to_str().unwrap(), "console"])
        .env_remove("RUST_LOG")
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute console command");

    assert!(output.status.success(), "Console should still run on defaults");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load config"), "stderr: {}", stderr);
    assert!(stderr.contains("http://typo:5000"), "stderr: {}", stderr);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Backend: ws://localhost:5000"));
}

/// The console keeps info logs off stderr unless a level is asked for
#[test]
fn test_console_logs_only_warnings_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let quiet = gesturelink()
        .args(["--config-file", path.to_str().unwrap(), "console"])
        .env_remove("RUST_LOG")
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute console command");
    assert!(quiet.status.success());
    let stderr = String::from_utf8_lossy(&quiet.stderr);
    assert!(!stderr.contains("GestureLink starting"), "stderr: {}", stderr);

    let verbose = gesturelink()
        .args([
            "--config-file",
            path.to_str().unwrap(),
            "--log-level",
            "info",
            "console",
        ])
        .env_remove("RUST_LOG")
        .stdin(std::process::Stdio::null())
        .output()
        .expect("Failed to execute console command");
    assert!(verbose.status.success());
    let stderr = String::from_utf8_lossy(&verbose.stderr);
    assert!(stderr.contains("GestureLink starting"), "stderr: {}", stderr);
}
