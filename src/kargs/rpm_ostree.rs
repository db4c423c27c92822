// src/kargs/rpm_ostree.rs

//! Image-transactional kernel-argument backend
//!
//! Every mutating call walks the same state machine: wait for the image
//! daemon to go idle (bounded retries, one daemon-reset attempt if stuck),
//! issue a single batch request covering all tokens (each atomic deployment
//! is expensive — it stages a new bootable root), and on batch failure fall
//! back to one-token-at-a-time with independent outcomes so a single bad
//! token cannot block the rest.

use crate::config::Tunables;
use crate::error::{Error, Result};
use crate::exec::run_tool;
use crate::kargs::{KargToken, KernelParamManager, KernelParameterSet};
use crate::retry::batch_with_fallback;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

const CMDLINE_PATH: &str = "/proc/cmdline";

/// Kernel-argument backend driving `rpm-ostree kargs`.
pub struct OstreeKargsBackend {
    program: PathBuf,
    reset_program: PathBuf,
    cmdline_path: PathBuf,
    tunables: Tunables,
}

impl OstreeKargsBackend {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            program: PathBuf::from("rpm-ostree"),
            reset_program: PathBuf::from("systemctl"),
            cmdline_path: PathBuf::from(CMDLINE_PATH),
            tunables,
        }
    }

    /// Substitute the image tool binary (stub scripts in tests).
    pub fn with_program(mut self, program: &std::path::Path) -> Self {
        self.program = program.to_path_buf();
        self
    }

    /// Substitute the daemon-reset binary.
    pub fn with_reset_program(mut self, program: &std::path::Path) -> Self {
        self.reset_program = program.to_path_buf();
        self
    }

    /// Substitute the effective-cmdline source.
    pub fn with_cmdline_path(mut self, path: &std::path::Path) -> Self {
        self.cmdline_path = path.to_path_buf();
        self
    }

    fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn status_json(&self) -> Result<serde_json::Value> {
        let result = run_tool(
            &self.program(),
            &["status", "--json"],
            self.tunables.probe_timeout(),
        )?;
        if !result.success() {
            return Err(Error::CommandFailed(format!(
                "{} status --json failed (exit {:?})",
                self.program(),
                result.exit_code
            )));
        }
        Ok(serde_json::from_str(&result.stdout)?)
    }

    fn transaction_in_progress(status: &serde_json::Value) -> bool {
        status.get("transaction").is_some_and(|t| !t.is_null())
    }

    /// Poll until the daemon is idle. If still busy at the overall
    /// deadline, restart the daemon once and re-check before giving up.
    fn wait_ready(&self) -> Result<()> {
        let total = self.tunables.readiness_timeout();
        let deadline = Instant::now() + total;

        loop {
            match self.status_json() {
                Ok(status) if !Self::transaction_in_progress(&status) => return Ok(()),
                Ok(_) => debug!("Image transaction in progress, waiting"),
                Err(e) => debug!("Image daemon status unavailable: {}", e),
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(self.tunables.readiness_poll());
        }

        warn!(
            "Image daemon still busy after {}s; attempting one daemon reset",
            total.as_secs()
        );
        let _ = run_tool(
            &self.reset_program.to_string_lossy(),
            &["restart", "rpm-ostreed"],
            self.tunables.item_timeout(),
        );
        std::thread::sleep(self.tunables.readiness_poll());

        match self.status_json() {
            Ok(status) if !Self::transaction_in_progress(&status) => Ok(()),
            _ => Err(Error::TransactionTimeout(total.as_secs())),
        }
    }

    /// The configured listing: kargs of the default (possibly staged)
    /// deployment.
    fn configured_params(&self) -> Result<KernelParameterSet> {
        let result = run_tool(&self.program(), &["kargs"], self.tunables.probe_timeout())?;
        if !result.success() {
            return Err(Error::CommandFailed(format!(
                "{} kargs failed (exit {:?})",
                self.program(),
                result.exit_code
            )));
        }
        Ok(KernelParameterSet::parse(result.stdout.trim()))
    }

    /// Run one `kargs` invocation carrying the given change arguments.
    fn run_kargs(&self, change_args: &[String], timeout: std::time::Duration) -> bool {
        let mut args: Vec<String> = vec!["kargs".to_string()];
        args.extend(change_args.iter().cloned());
        match run_tool(&self.program(), &args, timeout) {
            Ok(result) => result.success(),
            Err(e) => {
                warn!("kargs invocation failed to start: {}", e);
                false
            }
        }
    }

    /// Apply a per-item map of change arguments with batch-then-fallback
    /// semantics. Returns the typed partial-apply error unless every item
    /// ultimately succeeded.
    fn apply_changes(&self, changes: Vec<(String, Vec<String>)>) -> Result<bool> {
        if changes.is_empty() {
            return Ok(true);
        }

        let items: Vec<String> = changes.iter().map(|(item, _)| item.clone()).collect();
        let by_item: HashMap<String, Vec<String>> = changes.into_iter().collect();

        let batch_args: Vec<String> = items
            .iter()
            .flat_map(|i| by_item[i].iter().cloned())
            .collect();

        let outcome = batch_with_fallback(
            &items,
            |_| self.run_kargs(&batch_args, self.tunables.batch_timeout()),
            |item| self.run_kargs(&by_item[item], self.tunables.item_timeout()),
        );

        if outcome.all_ok() {
            Ok(true)
        } else {
            Err(Error::PartialApply {
                succeeded: outcome.succeeded(),
                failed: outcome.failed(),
            })
        }
    }
}

impl KernelParamManager for OstreeKargsBackend {
    /// What the running kernel booted with; staged changes do not appear
    /// here until reboot.
    fn get_current_params(&self) -> KernelParameterSet {
        match std::fs::read_to_string(&self.cmdline_path) {
            Ok(line) => KernelParameterSet::parse(&line),
            Err(e) => {
                warn!("Could not read {}: {}", self.cmdline_path.display(), e);
                KernelParameterSet::new()
            }
        }
    }

    fn get_pending_params(&self) -> Option<KernelParameterSet> {
        let configured = self.configured_params().ok()?;
        let current = self.get_current_params();
        if same_tokens(&configured, &current) {
            None
        } else {
            Some(configured)
        }
    }

    fn append_params(&self, tokens: &[KargToken]) -> Result<bool> {
        if tokens.is_empty() {
            return Ok(true);
        }
        self.wait_ready()?;

        let configured = self.configured_params().unwrap_or_else(|e| {
            warn!("Could not read configured kargs ({}); assuming empty", e);
            KernelParameterSet::new()
        });

        let mut changes = Vec::new();
        for token in tokens {
            match configured.get(token.key()) {
                Some(existing) if existing == token => {
                    debug!("Already configured: {}", token);
                }
                Some(_) => changes.push((
                    token.as_str().to_string(),
                    vec![format!("--replace={}", token)],
                )),
                None => changes.push((
                    token.as_str().to_string(),
                    vec![format!("--append={}", token)],
                )),
            }
        }

        if changes.is_empty() {
            info!("All {} kernel arguments already configured", tokens.len());
            return Ok(true);
        }
        self.apply_changes(changes)
    }

    fn remove_params(&self, tokens: &[KargToken]) -> Result<bool> {
        if tokens.is_empty() {
            return Ok(true);
        }
        self.wait_ready()?;

        let configured = match self.configured_params() {
            Ok(set) => set,
            Err(e) => {
                warn!("Could not read configured kargs ({}); assuming empty", e);
                KernelParameterSet::new()
            }
        };

        let targets: Vec<&KargToken> = tokens
            .iter()
            .filter(|t| configured.contains_key(t.key()))
            .collect();
        if targets.is_empty() {
            debug!("No targeted kernel arguments configured; nothing to remove");
            return Ok(true);
        }

        let changes: Vec<(String, Vec<String>)> = targets
            .iter()
            .map(|t| (t.key().to_string(), vec![format!("--delete={}", t.key())]))
            .collect();

        let applied = self.apply_changes(changes);

        // Success means confirmed absent afterward, not just a zero exit.
        let after = self.configured_params().unwrap_or_default();
        let still_present: Vec<String> = targets
            .iter()
            .filter(|t| after.contains_key(t.key()))
            .map(|t| t.key().to_string())
            .collect();

        match applied {
            Ok(true) if still_present.is_empty() => Ok(true),
            Ok(true) => Err(Error::PartialApply {
                succeeded: targets
                    .iter()
                    .map(|t| t.key().to_string())
                    .filter(|k| !still_present.contains(k))
                    .collect(),
                failed: still_present,
            }),
            Ok(false) => Ok(false),
            Err(Error::PartialApply { succeeded, .. }) => Err(Error::PartialApply {
                succeeded: succeeded
                    .into_iter()
                    .filter(|k| !still_present.contains(k))
                    .collect(),
                failed: still_present,
            }),
            Err(e) => Err(e),
        }
    }
}

/// Order-insensitive token comparison for the pending-vs-current check.
fn same_tokens(a: &KernelParameterSet, b: &KernelParameterSet) -> bool {
    let mut a_raw: Vec<&str> = a.tokens().iter().map(|t| t.as_str()).collect();
    let mut b_raw: Vec<&str> = b.tokens().iter().map(|t| t.as_str()).collect();
    a_raw.sort_unstable();
    b_raw.sort_unstable();
    a_raw == b_raw
}
