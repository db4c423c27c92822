// src/commands/rollback.rs

//! Rollback and backup-listing commands

use crate::backup::{BackupManager, RollbackOptions, perform_rollback};
use crate::commands::{ensure_root, platform_services};
use crate::config::Tunables;
use crate::lock::HostLock;
use anyhow::Result;
use std::path::PathBuf;

pub fn cmd_rollback(
    tunables: &Tunables,
    target: Option<String>,
    dry_run: bool,
    backup_dir: Option<PathBuf>,
) -> Result<()> {
    if !dry_run {
        ensure_root()?;
    }
    let services = platform_services(tunables)?;
    let kargs = services.kernel_params()?;

    let _lock = if dry_run {
        None
    } else {
        Some(HostLock::acquire(HostLock::DEFAULT_PATH)?)
    };

    let root = backup_dir.unwrap_or_else(|| tunables.backup_root.clone());
    let manager = BackupManager::new(&root);
    let set = manager.resolve(target.as_deref())?;

    println!(
        "Rolling back to backup set {} ({}){}",
        set.id,
        set.path.display(),
        if dry_run { " [dry run]" } else { "" }
    );
    perform_rollback(&manager, &set, kargs, &RollbackOptions { dry_run })?;

    if !dry_run {
        println!("Rollback complete. Reboot for kernel-argument changes to take effect.");
    }
    Ok(())
}

pub fn cmd_backups(
    tunables: &Tunables,
    prune: Option<usize>,
    backup_dir: Option<PathBuf>,
) -> Result<()> {
    let root = backup_dir.unwrap_or_else(|| tunables.backup_root.clone());
    let manager = BackupManager::new(&root);

    let sets = manager.list()?;
    if sets.is_empty() {
        println!("No backup sets under {}", root.display());
        return Ok(());
    }

    println!("Backup sets under {} (oldest first):", root.display());
    for set in &sets {
        let archived = if set.archive_file().is_file() {
            "archived"
        } else {
            "mirror only"
        };
        println!("  {}  ({})", set.id, archived);
    }

    if let Some(keep) = prune {
        ensure_root()?;
        let removed = manager.prune(keep)?;
        if removed.is_empty() {
            println!("Nothing pruned; {} set(s) retained.", sets.len());
        } else {
            println!("Pruned {} set(s): {}", removed.len(), removed.join(", "));
        }
    }

    Ok(())
}
