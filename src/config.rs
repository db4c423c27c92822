// src/config.rs

//! Tunable constants, loaded from an optional TOML file
//!
//! The retry and timeout bounds have no derivation from first principles;
//! they are operational configuration. Defaults below apply when
//! `/etc/systune/config.toml` is absent; a malformed file logs a warning
//! and falls back to defaults rather than blocking startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/systune/config.toml";

/// Timeout and path configuration for all subsystems.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tunables {
    /// Total budget waiting for the image-transaction daemon to go idle
    pub readiness_timeout_secs: u64,
    /// Sleep between readiness polls
    pub readiness_poll_secs: u64,
    /// Bound for a batch kernel-argument operation
    pub batch_timeout_secs: u64,
    /// Bound for each per-token fallback operation
    pub item_timeout_secs: u64,
    /// Default bound for package installation
    pub install_timeout_secs: u64,
    /// Bound for the boot-configuration generator
    pub generator_timeout_secs: u64,
    /// Bound for read-only probes (status queries)
    pub probe_timeout_secs: u64,
    /// Root directory holding timestamped backup sets
    pub backup_root: PathBuf,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            readiness_timeout_secs: 180,
            readiness_poll_secs: 6,
            batch_timeout_secs: 300,
            item_timeout_secs: 60,
            install_timeout_secs: 600,
            generator_timeout_secs: 120,
            probe_timeout_secs: 10,
            backup_root: PathBuf::from("/var/lib/systune/backups"),
        }
    }
}

impl Tunables {
    /// Load from the default path, degrading to defaults on any problem.
    pub fn load() -> Self {
        Self::load_from(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load from an explicit path; a missing file is not an error, a
    /// malformed one logs a warning and yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(tunables) => tunables,
                Err(e) => {
                    warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn generator_timeout(&self) -> Duration {
        Duration::from_secs(self.generator_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let t = Tunables::default();
        assert_eq!(t.readiness_timeout_secs, 180);
        assert_eq!(t.batch_timeout_secs, 300);
        assert_eq!(t.item_timeout_secs, 60);
        assert_eq!(t.backup_root, PathBuf::from("/var/lib/systune/backups"));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let t = Tunables::load_from(Path::new("/nonexistent/systune.toml"));
        assert_eq!(t.batch_timeout_secs, Tunables::default().batch_timeout_secs);
    }

    #[test]
    fn test_partial_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_timeout_secs = 42").unwrap();
        writeln!(file, "backup_root = \"/tmp/bk\"").unwrap();

        let t = Tunables::load_from(file.path());
        assert_eq!(t.batch_timeout_secs, 42);
        assert_eq!(t.backup_root, PathBuf::from("/tmp/bk"));
        // Unspecified fields keep defaults
        assert_eq!(t.item_timeout_secs, 60);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_timeout_secs = \"not a number\"").unwrap();

        let t = Tunables::load_from(file.path());
        assert_eq!(t.batch_timeout_secs, Tunables::default().batch_timeout_secs);
    }
}
