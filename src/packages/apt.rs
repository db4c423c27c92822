// src/packages/apt.rs

//! apt-family package backend for Debian-derived hosts
//!
//! Installed state is read from the dpkg database via `dpkg-query`; the
//! status field must say "install ok installed" — a removed-but-configured
//! package is not installed.

use crate::config::Tunables;
use crate::error::Result;
use crate::exec::{run_command, run_tool};
use crate::packages::PackageManager;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

pub struct AptBackend {
    program: PathBuf,
    query_program: PathBuf,
    tunables: Tunables,
}

impl AptBackend {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            program: PathBuf::from("apt-get"),
            query_program: PathBuf::from("dpkg-query"),
            tunables,
        }
    }

    /// Substitute tool binaries (stub scripts in tests).
    pub fn with_programs(mut self, program: &Path, query_program: &Path) -> Self {
        self.program = program.to_path_buf();
        self.query_program = query_program.to_path_buf();
        self
    }

    /// apt-get with the frontend noninteractive — these runs happen from a
    /// tool, never from a terminal a human is watching for prompts.
    fn apt_command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("DEBIAN_FRONTEND", "noninteractive");
        for arg in args {
            cmd.arg(arg);
        }
        cmd
    }
}

impl PackageManager for AptBackend {
    fn install(&self, names: &[String], timeout: Duration) -> Result<bool> {
        let missing: Vec<&String> = names.iter().filter(|n| !self.is_installed(n)).collect();
        if missing.is_empty() {
            debug!("All {} packages already installed", names.len());
            return Ok(true);
        }

        let mut args: Vec<String> = vec!["install".to_string(), "-y".to_string()];
        args.extend(missing.iter().map(|n| n.to_string()));
        let result = run_command(self.apt_command(&args), timeout)?;

        if !result.success() {
            warn!("apt-get install failed (exit {:?})", result.exit_code);
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
        let result = run_command(self.apt_command(&args), self.tunables.install_timeout())?;
        Ok(result.success())
    }

    fn is_installed(&self, name: &str) -> bool {
        run_tool(
            &self.query_program.to_string_lossy(),
            &["-W", "-f", "${Status}", name],
            self.tunables.probe_timeout(),
        )
        .map(|r| r.success() && r.stdout.contains("install ok installed"))
        .unwrap_or(false)
    }

    fn update(&self) -> Result<bool> {
        let args = vec!["update".to_string()];
        let result = run_command(self.apt_command(&args), self.tunables.install_timeout())?;
        Ok(result.success())
    }

    fn status_text(&self) -> String {
        let listed = run_tool(
            &self.query_program.to_string_lossy(),
            &["-W", "-f", "${Package} ${Version}\n"],
            self.tunables.probe_timeout(),
        );
        match listed {
            Ok(r) if r.success() => r.stdout,
            _ => "(installed package list unavailable)\n".to_string(),
        }
    }
}
