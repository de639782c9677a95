use std::path::Path;
use std::process::{Command, Output};

use rgss_host::bundle::{deflate, RawEntry};
use rgss_host::host::{load_data, save_data};

/// Run the binary against a throwaway config file.
fn rgss_host(args: &[&str]) -> Output {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("rgss-host.toml");
    std::fs::write(&config, "[log]\nlevel = \"error\"\n").unwrap();

    Command::new(env!("CARGO_BIN_EXE_rgss-host"))
        .arg("--config")
        .arg(&config)
        .args(args)
        .env_remove("RGSS_HOST_CONFIG")
        .output()
        .expect("Failed to spawn rgss-host")
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn sample(path: &Path) -> Vec<RawEntry> {
    let entries = vec![
        RawEntry::new(10, "Vocab", deflate(b"module Vocab; end").unwrap()),
        RawEntry::new(11, "", deflate(b"   ").unwrap()),
        RawEntry::new(12, "", deflate(b"rgss_main { SceneManager.run }").unwrap()),
    ];
    save_data(path, &entries).unwrap();
    entries
}

#[test]
fn test_cli_list() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("Scripts.rvdata2");
    sample(&file);

    let out = rgss_host(&["list", path_str(&file)]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Vocab"));
    assert!(lines[1].contains("Unknown 0"));
}

#[test]
fn test_cli_unpack_then_pack() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("Scripts.rvdata2");
    sample(&file);
    let unpacked = dir.path().join("scripts");
    let repacked = dir.path().join("Repacked.rvdata2");

    let out = rgss_host(&["unpack", path_str(&file), "-o", path_str(&unpacked)]);
    assert!(out.status.success());
    assert!(unpacked.join("index.toml").exists());
    assert!(unpacked.join("000-Vocab.rb").exists());

    let out = rgss_host(&["pack", path_str(&unpacked), "-o", path_str(&repacked)]);
    assert!(out.status.success());

    let entries = load_data(&repacked).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Vocab", ""]);
    assert_eq!(entries[1].index, 12);
}

#[test]
fn test_cli_check_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = rgss_host(&["check", path_str(&dir.path().join("nope.rvdata2"))]);
    assert!(!out.status.success());
}

#[test]
fn test_cli_check_malformed_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("Scripts.rvdata2");
    std::fs::write(&file, b"garbage").unwrap();

    let out = rgss_host(&["check", path_str(&file)]);
    assert!(!out.status.success());
}

#[test]
fn test_cli_check_ok() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("Scripts.rvdata2");
    sample(&file);

    let out = rgss_host(&["check", path_str(&file)]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("scripts:   2"));
}
