// src/packages/rpm_ostree.rs

//! Layered package backend for image-based deployments
//!
//! Installation layers packages onto the next deployment; they are not
//! active until reboot. "Installed" therefore means present in the booted
//! RPM database *or* already layered into the pending deployment —
//! otherwise a second run would try to re-layer an already-requested
//! package and fail.

use crate::config::Tunables;
use crate::error::Result;
use crate::exec::run_tool;
use crate::packages::PackageManager;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct OstreePackageBackend {
    program: PathBuf,
    query_program: PathBuf,
    tunables: Tunables,
}

impl OstreePackageBackend {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            program: PathBuf::from("rpm-ostree"),
            query_program: PathBuf::from("rpm"),
            tunables,
        }
    }

    /// Substitute tool binaries (stub scripts in tests).
    pub fn with_programs(mut self, program: &Path, query_program: &Path) -> Self {
        self.program = program.to_path_buf();
        self.query_program = query_program.to_path_buf();
        self
    }

    fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Packages layered into the default deployment, pending or booted.
    fn layered_packages(&self) -> Vec<String> {
        let result = match run_tool(
            &self.program(),
            &["status", "--json"],
            self.tunables.probe_timeout(),
        ) {
            Ok(r) if r.success() => r,
            _ => return Vec::new(),
        };
        let Ok(status) = serde_json::from_str::<serde_json::Value>(&result.stdout) else {
            return Vec::new();
        };
        status
            .get("deployments")
            .and_then(|d| d.as_array())
            .and_then(|d| d.first())
            .and_then(|d| d.get("packages"))
            .and_then(|p| p.as_array())
            .map(|pkgs| {
                pkgs.iter()
                    .filter_map(|p| p.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PackageManager for OstreePackageBackend {
    fn install(&self, names: &[String], timeout: Duration) -> Result<bool> {
        let missing: Vec<&String> = names.iter().filter(|n| !self.is_installed(n)).collect();
        if missing.is_empty() {
            debug!("All {} packages already installed or layered", names.len());
            return Ok(true);
        }

        let mut args: Vec<String> = vec!["install".to_string()];
        args.extend(missing.iter().map(|n| n.to_string()));
        let result = run_tool(&self.program(), &args, timeout)?;

        if result.success() {
            info!(
                "Layered {} package(s); they take effect after the next reboot",
                missing.len()
            );
            Ok(true)
        } else {
            warn!("Package layering failed (exit {:?})", result.exit_code);
            Ok(false)
        }
    }

    fn remove(&self, names: &[String]) -> Result<bool> {
        let present: Vec<&String> = names.iter().filter(|n| self.is_installed(n)).collect();
        if present.is_empty() {
            debug!("None of the {} packages are installed", names.len());
            return Ok(true);
        }

        let mut args: Vec<String> = vec!["uninstall".to_string()];
        args.extend(present.iter().map(|n| n.to_string()));
        let result = run_tool(&self.program(), &args, self.tunables.install_timeout())?;
        Ok(result.success())
    }

    fn is_installed(&self, name: &str) -> bool {
        let booted = run_tool(
            &self.query_program.to_string_lossy(),
            &["-q", name],
            self.tunables.probe_timeout(),
        )
        .map(|r| r.success())
        .unwrap_or(false);

        booted || self.layered_packages().iter().any(|p| p == name)
    }

    fn update(&self) -> Result<bool> {
        let result = run_tool(
            &self.program(),
            &["refresh-md"],
            self.tunables.install_timeout(),
        )?;
        Ok(result.success())
    }

    fn status_text(&self) -> String {
        run_tool(&self.program(), &["status"], self.tunables.probe_timeout())
            .map(|r| r.stdout)
            .unwrap_or_else(|e| format!("(status unavailable: {})\n", e))
    }

    fn changes_require_reboot(&self) -> bool {
        true
    }
}
