// src/backup/mod.rs

//! Backup sets: capture, lookup, pruning, and the reset primitives
//!
//! One backup set is captured per mutating invocation, named by timestamp
//! under the backup root, and holds everything a rollback needs to
//! identify a consistent snapshot: a state-summary text file, a
//! kernel-argument text file, a mirror of the configuration tree, and a
//! compressed archive of the same tree. Sets are never mutated after
//! capture and live until pruned.

mod exclusions;
mod restore;
mod rollback;

pub use exclusions::{ExclusionMatrix, TUNING_KARG_KEYS, TUNING_REPO_GLOBS};
pub use restore::{RestoreOptions, RestorePlan, copy_tree, mirror_tree};
pub use rollback::{RollbackOptions, perform_rollback};

use crate::error::{Error, Result};
use crate::kargs::{KargToken, KernelParamManager, KernelParameterSet};
use chrono::Local;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

const STATE_FILE: &str = "state.txt";
const KARGS_FILE: &str = "kargs.txt";
const ETC_MIRROR: &str = "etc";
const ETC_ARCHIVE: &str = "etc.tar.gz";

/// Everything capture records besides the tree itself. Assembled by the
/// caller so capture has no dependency on live backends.
#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    /// Platform identification lines for the state summary
    pub platform_summary: String,
    /// Human-readable package-manager status dump
    pub package_status: String,
    /// Effective kernel arguments (what the running kernel sees)
    pub effective_kargs: KernelParameterSet,
    /// Configured kernel arguments (what applies after next boot)
    pub configured_kargs: KernelParameterSet,
}

/// Handle to one timestamped backup set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub id: String,
    pub path: PathBuf,
}

impl BackupSet {
    pub fn etc_mirror(&self) -> PathBuf {
        self.path.join(ETC_MIRROR)
    }

    pub fn kargs_file(&self) -> PathBuf {
        self.path.join(KARGS_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.path.join(STATE_FILE)
    }

    pub fn archive_file(&self) -> PathBuf {
        self.path.join(ETC_ARCHIVE)
    }
}

pub struct BackupManager {
    root: PathBuf,
    etc_dir: PathBuf,
}

impl BackupManager {
    pub fn new(backup_root: &Path) -> Self {
        Self {
            root: backup_root.to_path_buf(),
            etc_dir: PathBuf::from("/etc"),
        }
    }

    /// Point the manager at an alternative configuration tree (fixtures).
    pub fn with_etc_dir(mut self, etc_dir: &Path) -> Self {
        self.etc_dir = etc_dir.to_path_buf();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn etc_dir(&self) -> &Path {
        &self.etc_dir
    }

    /// Capture a point-in-time snapshot. Runs strictly before any
    /// mutation; a failure here aborts the mutating step that wanted it.
    pub fn capture(&self, ctx: &CaptureContext) -> Result<BackupSet> {
        let set = self.allocate_set()?;

        restore::copy_tree(&self.etc_dir, &set.etc_mirror())?;
        self.write_archive(&set)?;
        self.write_kargs(&set, ctx)?;
        self.write_state(&set, ctx)?;

        info!("Captured backup set {} at {}", set.id, set.path.display());
        Ok(set)
    }

    fn allocate_set(&self) -> Result<BackupSet> {
        fs::create_dir_all(&self.root)?;
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

        // Two captures in the same second get numeric suffixes
        for attempt in 0..100u32 {
            let id = if attempt == 0 {
                stamp.clone()
            } else {
                format!("{}-{}", stamp, attempt + 1)
            };
            let path = self.root.join(&id);
            if !path.exists() {
                fs::create_dir(&path)?;
                return Ok(BackupSet { id, path });
            }
        }
        Err(Error::Backup(format!(
            "could not allocate a backup directory under {}",
            self.root.display()
        )))
    }

    /// Compressed archive of the mirror, written atomically next to it.
    fn write_archive(&self, set: &BackupSet) -> Result<()> {
        let tmp = NamedTempFile::new_in(&set.path)?;
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder
            .append_dir_all(ETC_MIRROR, set.etc_mirror())
            .map_err(|e| Error::Backup(format!("archiving {}: {}", set.id, e)))?;
        builder
            .into_inner()
            .and_then(|enc| enc.finish())
            .map_err(|e| Error::Backup(format!("finalizing archive for {}: {}", set.id, e)))?;
        tmp.persist(set.archive_file())
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn write_kargs(&self, set: &BackupSet, ctx: &CaptureContext) -> Result<()> {
        let mut file = fs::File::create(set.kargs_file())?;
        writeln!(file, "effective: {}", ctx.effective_kargs.to_cmdline())?;
        writeln!(file, "configured: {}", ctx.configured_kargs.to_cmdline())?;
        Ok(())
    }

    fn write_state(&self, set: &BackupSet, ctx: &CaptureContext) -> Result<()> {
        let mut file = fs::File::create(set.state_file())?;
        writeln!(file, "backup-set: {}", set.id)?;
        writeln!(file, "captured: {}", Local::now().to_rfc3339())?;
        writeln!(file, "kernel: {}", kernel_version())?;
        writeln!(file, "{}", ctx.platform_summary.trim_end())?;
        writeln!(file)?;
        writeln!(file, "--- package manager status ---")?;
        write!(file, "{}", ctx.package_status)?;
        Ok(())
    }

    /// All backup sets under the root, oldest first. Timestamped names
    /// sort chronologically.
    pub fn list(&self) -> Result<Vec<BackupSet>> {
        let mut sets = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sets),
            Err(e) => return Err(Error::Io(e)),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                sets.push(BackupSet {
                    id: entry.file_name().to_string_lossy().into_owned(),
                    path: entry.path(),
                });
            }
        }
        sets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sets)
    }

    /// Resolve an explicit id, or the most recent set when none given.
    pub fn resolve(&self, target: Option<&str>) -> Result<BackupSet> {
        match target {
            Some(id) => {
                let path = self.root.join(id);
                if path.is_dir() {
                    Ok(BackupSet {
                        id: id.to_string(),
                        path,
                    })
                } else {
                    Err(Error::RollbackTargetNotFound(id.to_string()))
                }
            }
            None => self
                .list()?
                .pop()
                .ok_or_else(|| Error::RollbackTargetNotFound("latest".to_string())),
        }
    }

    /// Keep the newest `keep` sets, delete the rest. Returns removed ids.
    pub fn prune(&self, keep: usize) -> Result<Vec<String>> {
        let sets = self.list()?;
        let excess = sets.len().saturating_sub(keep);
        let mut removed = Vec::new();
        for set in sets.into_iter().take(excess) {
            fs::remove_dir_all(&set.path)?;
            info!("Pruned backup set {}", set.id);
            removed.push(set.id);
        }
        Ok(removed)
    }
}

/// Parse a set's recorded kernel-argument capture:
/// (effective, configured).
pub fn read_recorded_kargs(set: &BackupSet) -> Result<(KernelParameterSet, KernelParameterSet)> {
    let content = fs::read_to_string(set.kargs_file())
        .map_err(|e| Error::Restore(format!("backup set {} has no karg capture: {}", set.id, e)))?;

    let mut effective = KernelParameterSet::new();
    let mut configured = KernelParameterSet::new();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("effective:") {
            effective = KernelParameterSet::parse(rest.trim());
        } else if let Some(rest) = line.strip_prefix("configured:") {
            configured = KernelParameterSet::parse(rest.trim());
        }
    }
    Ok((effective, configured))
}

/// Remove every kernel argument this tool's optimizations may have added.
/// The backend handles absent keys as no-ops and, on the transactional
/// side, applies the batch-then-individual fallback internally.
pub fn reset_known_kargs(kargs: &dyn KernelParamManager, dry_run: bool) -> Result<bool> {
    let known: Vec<KargToken> = TUNING_KARG_KEYS
        .iter()
        .filter_map(|k| KargToken::parse(k))
        .collect();

    let current = kargs.get_current_params();
    let pending = kargs.get_pending_params().unwrap_or_default();
    let present: Vec<&str> = known
        .iter()
        .map(|t| t.key())
        .filter(|k| current.contains_key(k) || pending.contains_key(k))
        .collect();

    if present.is_empty() {
        info!("No tuning kernel arguments are set; nothing to reset");
        return Ok(true);
    }
    if dry_run {
        info!("Would remove kernel arguments: {}", present.join(" "));
        return Ok(true);
    }

    info!("Removing kernel arguments: {}", present.join(" "));
    kargs.remove_params(&known)
}

/// Delete repository definitions the optimizer may have installed, then
/// report what was removed so the caller can refresh metadata.
pub fn reset_repositories(etc_dir: &Path, dry_run: bool) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for pattern in TUNING_REPO_GLOBS {
        let full = etc_dir.join(pattern);
        let Some(full_str) = full.to_str() else {
            continue;
        };
        let matches = match glob::glob(full_str) {
            Ok(paths) => paths,
            Err(e) => {
                warn!("Bad repository glob {}: {}", pattern, e);
                continue;
            }
        };
        for path in matches.flatten() {
            if dry_run {
                info!("Would remove repository file {}", path.display());
            } else {
                info!("Removing repository file {}", path.display());
                fs::remove_file(&path)?;
            }
            removed.push(path);
        }
    }
    if removed.is_empty() {
        info!("No optimizer-added repository files found");
    }
    Ok(removed)
}

fn kernel_version() -> String {
    fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
