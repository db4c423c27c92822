// src/commands/backup.rs

//! Backup command - capture a backup set on demand

use crate::backup::BackupManager;
use crate::commands::{capture_context, ensure_root, platform_services};
use crate::config::Tunables;
use anyhow::Result;
use std::path::PathBuf;

pub fn cmd_backup(tunables: &Tunables, backup_dir: Option<PathBuf>) -> Result<()> {
    ensure_root()?;
    let services = platform_services(tunables)?;

    let root = backup_dir.unwrap_or_else(|| tunables.backup_root.clone());
    let manager = BackupManager::new(&root);

    let set = manager.capture(&capture_context(&services))?;
    println!("Backup captured: {}", set.path.display());
    println!("  mirror:  {}", set.etc_mirror().display());
    println!("  archive: {}", set.archive_file().display());
    Ok(())
}
