// src/commands/reset.rs

//! Reset command - revert tuning with a safety net
//!
//! Order is fixed: capture a backup, then kernel arguments, then the
//! configuration tree, then repositories. A failing step is logged and the
//! remaining steps still run; only precondition failures (privilege,
//! platform, backend) abort the command.

use crate::backup::{
    BackupManager, ExclusionMatrix, RestoreOptions, TUNING_KARG_KEYS, mirror_tree,
    reset_known_kargs, reset_repositories,
};
use crate::commands::{capture_context, ensure_root, platform_services};
use crate::config::Tunables;
use crate::exec::run_tool;
use crate::lock::HostLock;
use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Pristine copy of /etc maintained by image-based deployments
const USR_ETC: &str = "/usr/etc";

pub struct ResetArgs {
    pub dry_run: bool,
    pub skip_kargs: bool,
    pub skip_etc: bool,
    pub skip_repos: bool,
    pub aggressive: bool,
    pub base_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub no_reboot_prompt: bool,
}

pub fn cmd_reset(tunables: &Tunables, args: ResetArgs) -> Result<()> {
    if !args.dry_run {
        ensure_root()?;
    }
    let services = platform_services(tunables)?;
    // Resolving the backend up front is a precondition: a host without a
    // registered kernel-argument backend cannot be safely reset.
    let kargs = services.kernel_params()?;

    let _lock = if args.dry_run {
        None
    } else {
        Some(HostLock::acquire(HostLock::DEFAULT_PATH)?)
    };

    let root = args
        .backup_dir
        .clone()
        .unwrap_or_else(|| tunables.backup_root.clone());
    let manager = BackupManager::new(&root);

    if args.dry_run {
        println!("Dry run: a backup would be captured under {}", root.display());
    } else {
        let set = manager.capture(&capture_context(&services))?;
        println!("Backup captured: {}", set.path.display());
    }

    let mut kargs_touched = false;

    if args.skip_kargs {
        info!("Kernel-argument step skipped by request");
    } else {
        let current = kargs.get_current_params();
        let pending = kargs.get_pending_params().unwrap_or_default();
        let present = TUNING_KARG_KEYS
            .iter()
            .any(|k| current.contains_key(k) || pending.contains_key(k));

        match reset_known_kargs(kargs, args.dry_run) {
            Ok(true) => kargs_touched = present && !args.dry_run,
            Ok(false) => warn!("Kernel-argument reset reported failure; see log above"),
            Err(e) => error!("Kernel-argument reset failed: {}", e),
        }
    }

    if args.skip_etc {
        info!("Configuration-tree step skipped by request");
    } else {
        run_etc_step(&manager, args.base_dir.as_deref(), args.aggressive, args.dry_run);
    }

    if args.skip_repos {
        info!("Repository step skipped by request");
    } else {
        run_repo_step(&services, manager.etc_dir(), args.dry_run);
    }

    if kargs_touched {
        println!("\nKernel arguments changed; a reboot is required for them to take effect.");
        if !args.no_reboot_prompt {
            prompt_reboot(tunables);
        }
    }

    Ok(())
}

fn run_etc_step(manager: &BackupManager, base_dir: Option<&Path>, aggressive: bool, dry_run: bool) {
    let base = base_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(USR_ETC));
    if !base.is_dir() {
        warn!(
            "No pristine base tree at {} (traditional platform?); \
             configuration-tree step skipped. Pass --base-dir to restore from a backup mirror.",
            base.display()
        );
        return;
    }

    let opts = RestoreOptions { aggressive, dry_run };
    match mirror_tree(&base, manager.etc_dir(), &ExclusionMatrix::builtin(), &opts) {
        Ok(plan) => {
            if dry_run {
                for path in &plan.copied {
                    println!("would restore: {}", path.display());
                }
                for path in &plan.deleted {
                    println!("would delete:  {}", path.display());
                }
                for path in &plan.protected {
                    println!("protected:     {}", path.display());
                }
            }
        }
        Err(e) => error!("Configuration-tree restore failed: {}", e),
    }
}

fn run_repo_step(
    services: &crate::services::PlatformServices,
    etc_dir: &Path,
    dry_run: bool,
) {
    match reset_repositories(etc_dir, dry_run) {
        Ok(removed) => {
            if !removed.is_empty() && !dry_run {
                match services.package_manager() {
                    Ok(pm) => match pm.update() {
                        Ok(true) => info!("Package metadata refreshed"),
                        Ok(false) => warn!("Package metadata refresh reported failure"),
                        Err(e) => error!("Package metadata refresh failed: {}", e),
                    },
                    Err(e) => warn!("No package backend to refresh metadata: {}", e),
                }
            }
        }
        Err(e) => error!("Repository reset failed: {}", e),
    }
}

fn prompt_reboot(tunables: &Tunables) {
    print!("Reboot now? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_ok()
        && matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    {
        info!("Rebooting at operator request");
        let _ = run_tool(
            "systemctl",
            &["reboot"],
            Duration::from_secs(tunables.item_timeout_secs),
        );
    }
}
