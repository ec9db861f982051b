use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn driftfield() -> Command {
    Command::new(env!("CARGO_BIN_EXE_driftfield"))
}

#[test]
fn list_presets_shows_bundled_presets() {
    let output = driftfield().arg("list-presets").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("vortex"));
    assert!(stdout.contains("calm"));
    assert!(stdout.contains("ether"));
    assert!(stdout.contains("backdrop"));
}

#[test]
fn list_presets_reads_a_custom_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("presets.toml");
    fs::write(
        &path,
        r##"
version = 1

[beams.aurora]
light_color = "#88FFCC"
"##,
    )
    .unwrap();

    let output = driftfield()
        .arg("list-presets")
        .arg("--presets")
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("aurora"));
    assert!(!stdout.contains("calm"));
}

#[test]
fn list_presets_rejects_a_broken_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("presets.toml");
    fs::write(&path, "version = \"not a number\"").unwrap();

    let status = driftfield()
        .arg("list-presets")
        .arg("--presets")
        .arg(&path)
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn unknown_preset_fails_before_any_window_opens() {
    let output = driftfield()
        .args(["vortex", "--preset", "no-such-preset", "--export", "out.png"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("no-such-preset"));
}

#[test]
fn malformed_set_assignment_is_rejected() {
    let status = driftfield()
        .args(["ether", "--set", "mouse_force = fast", "--export", "out.png"])
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn no_arguments_prints_usage() {
    let output = driftfield().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Usage"));
}

#[test]
fn bad_size_flag_is_rejected() {
    let status = driftfield()
        .args(["beams", "--size", "12,34"])
        .status()
        .unwrap();
    assert!(!status.success());
}
