// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

pub const TWEETS: &str = "id,user,message\n\
    1,foo,hello\n\
    2,bar,@foo hi!\n\
    3,baz,learning #EasyBatch today\n\
    4,foo,#EasyBatch rocks\n\
    5,bar,nothing to see\n\
    6,baz,bye #EasyBatch\n";

/// Run the recordflow binary with the given arguments; config files are
/// always ignored so the host environment cannot leak in
pub fn run_recordflow(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_recordflow"))
        .arg("--ignore-config")
        .args(args)
        .env_remove("RECORDFLOW_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute recordflow");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Write `content` to `name` inside `dir`
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write test file");
    path
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}
