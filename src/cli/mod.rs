// src/cli/mod.rs

//! CLI definitions for systune
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! Commands:
//! - `status` - Show detected platform and kernel-argument state
//! - `backup` - Capture a backup set before manual experimentation
//! - `reset` - Revert tuning (kernel arguments, /etc, repositories)
//! - `rollback` - Restore a captured backup set
//! - `backups` - List (and optionally prune) backup sets
//! - `completions` - Generate shell completion scripts

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "systune")]
#[command(author = "Systune Project")]
#[command(version)]
#[command(about = "Platform-aware performance tuning with safe rollback", long_about = None)]
pub struct Cli {
    /// Path to the tunables config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show detected platform, kernel arguments, and pending changes
    Status,

    /// Capture a backup set (configuration tree, kernel arguments,
    /// package state)
    Backup {
        /// Override the backup root directory
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<PathBuf>,
    },

    /// Revert performance tuning applied by this tool
    Reset {
        /// Log the full plan without touching the system
        #[arg(long)]
        dry_run: bool,

        /// Skip the kernel-argument step
        #[arg(long)]
        skip_kargs: bool,

        /// Skip the configuration-tree step
        #[arg(long)]
        skip_etc: bool,

        /// Skip the repository-reset step
        #[arg(long)]
        skip_repos: bool,

        /// Drop SAFE-tier exclusions during the configuration-tree step
        /// (CRITICAL identity paths stay protected)
        #[arg(long)]
        aggressive: bool,

        /// Override the pristine base tree for the configuration-tree step
        #[arg(long, value_name = "DIR")]
        base_dir: Option<PathBuf>,

        /// Override the backup root directory
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<PathBuf>,

        /// Print the reboot reminder without prompting
        #[arg(long)]
        no_reboot_prompt: bool,
    },

    /// Roll back to a captured backup set (most recent when omitted)
    Rollback {
        /// Backup set id (timestamp)
        target: Option<String>,

        /// Log the full plan without touching the system
        #[arg(long)]
        dry_run: bool,

        /// Override the backup root directory
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<PathBuf>,
    },

    /// List captured backup sets
    Backups {
        /// Keep only the newest N sets, deleting the rest
        #[arg(long, value_name = "N")]
        prune: Option<usize>,

        /// Override the backup root directory
        #[arg(long, value_name = "DIR")]
        backup_dir: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}
