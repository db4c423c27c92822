// src/backup/restore.rs

//! Configuration-tree mirroring with exclusions
//!
//! Makes the live tree match the base tree: copy what differs, delete what
//! the base does not have, leave protected paths alone. Not a 3-way merge;
//! each file is replaced atomically (temp file + rename in the target
//! directory, copy fallback across filesystems) so a crash mid-restore
//! never leaves a half-written file visible.

use crate::backup::exclusions::ExclusionMatrix;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    /// Drop SAFE-tier protection; CRITICAL always stands
    pub aggressive: bool,
    /// Compute and log the full plan without touching the live tree
    pub dry_run: bool,
}

/// What a restore did — or, under dry-run, would do. Paths are relative
/// to the tree root.
#[derive(Debug, Default)]
pub struct RestorePlan {
    pub copied: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    pub protected: Vec<PathBuf>,
}

impl RestorePlan {
    pub fn is_noop(&self) -> bool {
        self.copied.is_empty() && self.deleted.is_empty()
    }
}

/// Mirror `base` onto `live`, honoring the exclusion matrix.
pub fn mirror_tree(
    base: &Path,
    live: &Path,
    matrix: &ExclusionMatrix,
    opts: &RestoreOptions,
) -> Result<RestorePlan> {
    if !base.is_dir() {
        return Err(Error::Restore(format!(
            "base tree {} does not exist",
            base.display()
        )));
    }

    let mut plan = RestorePlan::default();
    copy_phase(base, live, matrix, opts, &mut plan)?;
    delete_phase(base, live, matrix, opts, &mut plan)?;

    info!(
        "{}: {} copied, {} deleted, {} protected",
        if opts.dry_run { "Restore plan" } else { "Restored" },
        plan.copied.len(),
        plan.deleted.len(),
        plan.protected.len()
    );
    Ok(plan)
}

/// Walk the base tree and bring every unprotected entry over.
fn copy_phase(
    base: &Path,
    live: &Path,
    matrix: &ExclusionMatrix,
    opts: &RestoreOptions,
    plan: &mut RestorePlan,
) -> Result<()> {
    let mut walker = WalkDir::new(base).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| Error::Restore(e.to_string()))?;
        if entry.path() == base {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?
            .to_path_buf();

        if matrix.is_protected(&rel, opts.aggressive) {
            debug!("Protected, not overwriting: {}", rel.display());
            plan.protected.push(rel);
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }

        let target = live.join(&rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if !opts.dry_run {
                fs::create_dir_all(&target)?;
                mirror_metadata(entry.path(), &target)?;
            }
        } else if file_type.is_symlink() {
            let wanted = fs::read_link(entry.path())?;
            let existing = fs::read_link(&target).ok();
            if existing.as_deref() != Some(wanted.as_path()) {
                plan.copied.push(rel);
                if !opts.dry_run {
                    if target.symlink_metadata().is_ok() {
                        remove_any(&target)?;
                    }
                    std::os::unix::fs::symlink(&wanted, &target)?;
                }
            }
        } else if files_differ(entry.path(), &target)? {
            plan.copied.push(rel);
            if !opts.dry_run {
                copy_file_atomic(entry.path(), &target)?;
            }
        }
    }
    Ok(())
}

/// Walk the live tree bottom-up and drop everything the base lacks.
fn delete_phase(
    base: &Path,
    live: &Path,
    matrix: &ExclusionMatrix,
    opts: &RestoreOptions,
    plan: &mut RestorePlan,
) -> Result<()> {
    if !live.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(live).follow_links(false).contents_first(true) {
        let entry = entry.map_err(|e| Error::Restore(e.to_string()))?;
        if entry.path() == live {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(live)
            .map_err(|_| Error::InvalidPath(entry.path().display().to_string()))?
            .to_path_buf();

        if base.join(&rel).symlink_metadata().is_ok() {
            continue;
        }
        if matrix.is_protected(&rel, opts.aggressive) {
            debug!("Protected, not deleting: {}", rel.display());
            plan.protected.push(rel);
            continue;
        }

        plan.deleted.push(rel.clone());
        if !opts.dry_run {
            if entry.file_type().is_dir() {
                // Stays behind when protected children survived inside
                if let Err(e) = fs::remove_dir(entry.path()) {
                    debug!("Leaving directory {}: {}", rel.display(), e);
                    plan.deleted.pop();
                }
            } else {
                fs::remove_file(entry.path())?;
            }
        }
    }
    Ok(())
}

/// Size check first, then content compare. Configuration files are small;
/// byte comparison keeps the decision exact without tracking hashes.
fn files_differ(a: &Path, b: &Path) -> Result<bool> {
    let meta_b = match b.symlink_metadata() {
        Ok(m) => m,
        Err(_) => return Ok(true),
    };
    if !meta_b.is_file() {
        return Ok(true);
    }
    if a.metadata()?.len() != meta_b.len() {
        return Ok(true);
    }
    Ok(fs::read(a)? != fs::read(b)?)
}

/// Atomic per-file replacement: write next to the target, carry over
/// mode and ownership, rename into place.
fn copy_file_atomic(src: &Path, dst: &Path) -> Result<()> {
    let parent = dst
        .parent()
        .ok_or_else(|| Error::InvalidPath(dst.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    let mut reader = fs::File::open(src)?;
    io::copy(&mut reader, tmp.as_file_mut())?;

    let meta = src.metadata()?;
    fs::set_permissions(tmp.path(), meta.permissions())?;
    restore_ownership(tmp.path(), &meta);

    if dst.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false) {
        remove_any(dst)?;
    }
    tmp.persist(dst).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn mirror_metadata(src: &Path, dst: &Path) -> Result<()> {
    let meta = src.metadata()?;
    fs::set_permissions(dst, meta.permissions())?;
    restore_ownership(dst, &meta);
    Ok(())
}

/// Ownership restore needs root; without it the copy is still correct
/// content-wise, so a refusal is logged and tolerated.
fn restore_ownership(path: &Path, meta: &fs::Metadata) {
    let uid = nix::unistd::Uid::from_raw(meta.uid());
    let gid = nix::unistd::Gid::from_raw(meta.gid());
    if let Err(e) = nix::unistd::chown(path, Some(uid), Some(gid)) {
        debug!("Could not restore ownership on {}: {}", path.display(), e);
    }
}

fn remove_any(path: &Path) -> Result<()> {
    let meta = path.symlink_metadata()?;
    if meta.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Recursive copy of a whole tree (no deletions, no exclusions): the
/// capture path for backup mirrors.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Err(Error::Backup(format!(
            "source tree {} does not exist",
            src.display()
        )));
    }
    fs::create_dir_all(dst)?;
    let plan = mirror_tree(
        src,
        dst,
        &ExclusionMatrix::none(),
        &RestoreOptions {
            aggressive: true,
            dry_run: false,
        },
    )
    .map_err(|e| match e {
        Error::Restore(msg) => Error::Backup(msg),
        other => other,
    })?;
    if !plan.deleted.is_empty() {
        warn!(
            "Capture target was not empty; {} stale entries removed",
            plan.deleted.len()
        );
    }
    Ok(())
}
