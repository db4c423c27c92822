// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: backup root override
fn backup_dir_arg() -> Arg {
    Arg::new("backup_dir")
        .long("backup-dir")
        .value_name("DIR")
        .help("Override the backup root directory")
}

/// Common argument: dry run
fn dry_run_arg() -> Arg {
    Arg::new("dry_run")
        .long("dry-run")
        .action(clap::ArgAction::SetTrue)
        .help("Log the full plan without touching the system")
}

fn build_cli() -> Command {
    Command::new("systune")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Systune Project")
        .about("Platform-aware performance tuning with safe rollback")
        .subcommand_required(true)
        .subcommand(Command::new("status").about("Show detected platform and kernel-argument state"))
        .subcommand(
            Command::new("backup")
                .about("Capture a backup set")
                .arg(backup_dir_arg()),
        )
        .subcommand(
            Command::new("reset")
                .about("Revert performance tuning applied by this tool")
                .arg(dry_run_arg())
                .arg(
                    Arg::new("skip_kargs")
                        .long("skip-kargs")
                        .action(clap::ArgAction::SetTrue)
                        .help("Skip the kernel-argument step"),
                )
                .arg(
                    Arg::new("skip_etc")
                        .long("skip-etc")
                        .action(clap::ArgAction::SetTrue)
                        .help("Skip the configuration-tree step"),
                )
                .arg(
                    Arg::new("skip_repos")
                        .long("skip-repos")
                        .action(clap::ArgAction::SetTrue)
                        .help("Skip the repository-reset step"),
                )
                .arg(
                    Arg::new("aggressive")
                        .long("aggressive")
                        .action(clap::ArgAction::SetTrue)
                        .help("Drop SAFE-tier exclusions (CRITICAL identity paths stay protected)"),
                )
                .arg(
                    Arg::new("base_dir")
                        .long("base-dir")
                        .value_name("DIR")
                        .help("Override the pristine base tree"),
                )
                .arg(backup_dir_arg())
                .arg(
                    Arg::new("no_reboot_prompt")
                        .long("no-reboot-prompt")
                        .action(clap::ArgAction::SetTrue)
                        .help("Print the reboot reminder without prompting"),
                ),
        )
        .subcommand(
            Command::new("rollback")
                .about("Roll back to a captured backup set")
                .arg(Arg::new("target").help("Backup set id (most recent when omitted)"))
                .arg(dry_run_arg())
                .arg(backup_dir_arg()),
        )
        .subcommand(
            Command::new("backups")
                .about("List captured backup sets")
                .arg(
                    Arg::new("prune")
                        .long("prune")
                        .value_name("N")
                        .help("Keep only the newest N sets"),
                )
                .arg(backup_dir_arg()),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("systune.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
