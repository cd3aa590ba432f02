#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::path::PathBuf;

pub fn telterm_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("telterm"));
    for var in [
        "TELTERM_COLS",
        "TELTERM_ROWS",
        "TELTERM_ENCODING",
        "TELTERM_TERMINAL_TYPE",
        "TELTERM_SCROLLBACK",
        "TELTERM_RETRY_PAUSE",
        "TELTERM_MAX_ATTEMPTS",
        "TELTERM_SAVE_CURSOR",
        "TELTERM_LOG",
        "RUST_LOG",
        "NO_COLOR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

pub fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

pub fn write_capture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// `count` numbered lines separated by CR LF, the last one unterminated.
pub fn numbered_lines(count: usize) -> Vec<u8> {
    (0..count)
        .map(|i| format!("line {i}"))
        .collect::<Vec<_>>()
        .join("\r\n")
        .into_bytes()
}
