// src/packages/dnf.rs

//! dnf package backend for traditional RPM hosts
//!
//! Immediate effect; failures surface the tool's exit status. Installed
//! state is checked against the RPM database with `rpm -q` rather than
//! dnf's slower resolver paths.

use crate::config::Tunables;
use crate::error::Result;
use crate::exec::run_tool;
use crate::packages::PackageManager;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub struct DnfBackend {
    program: PathBuf,
    query_program: PathBuf,
    tunables: Tunables,
}

impl DnfBackend {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            program: PathBuf::from("dnf"),
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
}

impl PackageManager for DnfBackend {
    fn install(&self, names: &[String], timeout: Duration) -> Result<bool> {
        let missing: Vec<&String> = names.iter().filter(|n| !self.is_installed(n)).collect();
        if missing.is_empty() {
            debug!("All {} packages already installed", names.len());
            return Ok(true);
        }

        let mut args: Vec<String> = vec!["install".to_string(), "-y".to_string()];
        args.extend(missing.iter().map(|n| n.to_string()));
        let result = run_tool(&self.program(), &args, timeout)?;

        if !result.success() {
            warn!("dnf install failed (exit {:?})", result.exit_code);
        }
        Ok(result.success())
    }

    fn remove(&self, names: &[String]) -> Result<bool> {
        let present: Vec<&String> = names.iter().filter(|n| self.is_installed(n)).collect();
        if present.is_empty() {
            debug!("None of the {} packages are installed", names.len());
            return Ok(true);
        }

        let mut args: Vec<String> = vec!["remove".to_string(), "-y".to_string()];
        args.extend(present.iter().map(|n| n.to_string()));
        let result = run_tool(&self.program(), &args, self.tunables.install_timeout())?;
        Ok(result.success())
    }

    fn is_installed(&self, name: &str) -> bool {
        run_tool(
            &self.query_program.to_string_lossy(),
            &["-q", name],
            self.tunables.probe_timeout(),
        )
        .map(|r| r.success())
        .unwrap_or(false)
    }

    fn update(&self) -> Result<bool> {
        let result = run_tool(
            &self.program(),
            &["makecache", "--refresh"],
            self.tunables.install_timeout(),
        )?;
        Ok(result.success())
    }

    fn status_text(&self) -> String {
        let listed = run_tool(
            &self.query_program.to_string_lossy(),
            &["-qa", "--qf", "%{NAME}-%{VERSION}-%{RELEASE}.%{ARCH}\n"],
            self.tunables.probe_timeout(),
        );
        match listed {
            Ok(r) if r.success() => {
                let mut lines: Vec<&str> = r.stdout.lines().collect();
                lines.sort_unstable();
                let mut out = lines.join("\n");
                out.push('\n');
                out
            }
            _ => "(installed package list unavailable)\n".to_string(),
        }
    }
}
