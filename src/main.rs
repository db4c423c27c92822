// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use systune::cli::{Cli, Commands};
use systune::commands;
use systune::config::Tunables;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let tunables = match &cli.config {
        Some(path) => Tunables::load_from(path),
        None => Tunables::load(),
    };

    match cli.command {
        Commands::Status => commands::cmd_status(&tunables),
        Commands::Backup { backup_dir } => commands::cmd_backup(&tunables, backup_dir),
        Commands::Reset {
            dry_run,
            skip_kargs,
            skip_etc,
            skip_repos,
            aggressive,
            base_dir,
            backup_dir,
            no_reboot_prompt,
        } => commands::cmd_reset(
            &tunables,
            commands::ResetArgs {
                dry_run,
                skip_kargs,
                skip_etc,
                skip_repos,
                aggressive,
                base_dir,
                backup_dir,
                no_reboot_prompt,
            },
        ),
        Commands::Rollback {
            target,
            dry_run,
            backup_dir,
        } => commands::cmd_rollback(&tunables, target, dry_run, backup_dir),
        Commands::Backups { prune, backup_dir } => {
            commands::cmd_backups(&tunables, prune, backup_dir)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "systune",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}
