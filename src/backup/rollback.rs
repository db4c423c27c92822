// src/backup/rollback.rs

//! Rollback to a captured backup set
//!
//! Rollback intentionally restores everything: the operator is explicitly
//! asking to undo, so no exclusion matrix applies to the tree restore.
//! Kernel arguments are reverted by clearing the known tuning keys and
//! re-appending the values recorded in the set's effective-command-line
//! capture. Running rollback twice against the same set converges to the
//! same end state as running it once.

use crate::backup::exclusions::{ExclusionMatrix, TUNING_KARG_KEYS};
use crate::backup::restore::{RestoreOptions, mirror_tree};
use crate::backup::{BackupManager, BackupSet, read_recorded_kargs};
use crate::error::{Error, Result};
use crate::kargs::{KargToken, KernelParamManager};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct RollbackOptions {
    pub dry_run: bool,
}

/// Restore the configuration tree and kernel arguments recorded in `set`.
pub fn perform_rollback(
    mgr: &BackupManager,
    set: &BackupSet,
    kargs: &dyn KernelParamManager,
    opts: &RollbackOptions,
) -> Result<()> {
    let mirror = set.etc_mirror();
    if !mirror.is_dir() {
        return Err(Error::Restore(format!(
            "backup set {} has no configuration mirror",
            set.id
        )));
    }

    info!(
        "Rolling back to backup set {}{}",
        set.id,
        if opts.dry_run { " (dry run)" } else { "" }
    );

    // Verbatim tree restore: no exclusions on an explicit undo
    mirror_tree(
        &mirror,
        mgr.etc_dir(),
        &ExclusionMatrix::none(),
        &RestoreOptions {
            aggressive: true,
            dry_run: opts.dry_run,
        },
    )?;

    let (recorded_effective, _) = read_recorded_kargs(set)?;

    let known: Vec<KargToken> = TUNING_KARG_KEYS
        .iter()
        .filter_map(|k| KargToken::parse(k))
        .collect();
    let recorded_tuning: Vec<KargToken> = recorded_effective
        .tokens()
        .iter()
        .filter(|t| TUNING_KARG_KEYS.contains(&t.key()))
        .cloned()
        .collect();

    if opts.dry_run {
        info!(
            "Would clear tuning kernel arguments, then re-append: {}",
            if recorded_tuning.is_empty() {
                "(none recorded)".to_string()
            } else {
                recorded_tuning
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        );
        return Ok(());
    }

    if !kargs.remove_params(&known)? {
        warn!("Clearing tuning kernel arguments reported failure; continuing with re-append");
    }
    if !recorded_tuning.is_empty() && !kargs.append_params(&recorded_tuning)? {
        return Err(Error::Restore(format!(
            "could not re-append recorded kernel arguments for backup set {}",
            set.id
        )));
    }

    info!("Rollback to {} complete; reboot for kernel-argument changes to take effect", set.id);
    Ok(())
}
