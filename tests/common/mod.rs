// tests/common/mod.rs

//! Shared fixtures for integration tests: tree builders and executable
//! stub scripts standing in for the platform tools.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use systune::Tunables;

/// Create a file (and its parents) under `root`, returning its path.
pub fn write_file(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Drop an executable shell script into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Short timeouts so failing paths do not stall the suite.
pub fn test_tunables() -> Tunables {
    Tunables {
        readiness_timeout_secs: 1,
        readiness_poll_secs: 0,
        batch_timeout_secs: 5,
        item_timeout_secs: 5,
        install_timeout_secs: 5,
        generator_timeout_secs: 5,
        probe_timeout_secs: 5,
        ..Tunables::default()
    }
}
