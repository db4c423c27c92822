// tests/grub_backend.rs

//! End-to-end coverage of the bootloader-file kernel-argument backend
//! against fixture trees and a stub boot-menu generator.

mod common;

use common::{test_tunables, write_file, write_script};
use std::fs;
use std::path::PathBuf;
use systune::kargs::{GrubKargsBackend, KargToken};
use systune::{Error, KernelParamManager};
use tempfile::TempDir;

const GRUB_CONTENT: &str = r#"GRUB_TIMEOUT=5
GRUB_DISTRIBUTOR="$(sed 's, release .*$,,g' /etc/system-release)"
GRUB_CMDLINE_LINUX_DEFAULT="quiet rhgb"
# local note kept verbatim
GRUB_DISABLE_RECOVERY="true"
"#;

fn token(s: &str) -> KargToken {
    KargToken::parse(s).unwrap()
}

struct Fixture {
    _dir: TempDir,
    config: PathBuf,
    backend: GrubKargsBackend,
}

fn setup(content: &str, generator_body: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "default/grub", content);
    let boot_cfg = write_file(dir.path(), "boot/grub2/grub.cfg", "# compiled menu\n");
    let generator = write_script(dir.path(), "mkconfig", generator_body);

    let backend = GrubKargsBackend::new(test_tunables())
        .with_paths(
            &config,
            // First candidate intentionally missing: the backend must use
            // the first location that exists.
            vec![dir.path().join("boot/efi/EFI/fedora/grub.cfg"), boot_cfg],
        )
        .with_generator(&generator);

    Fixture {
        _dir: dir,
        config,
        backend,
    }
}

fn cmdline_line(config: &PathBuf) -> String {
    fs::read_to_string(config)
        .unwrap()
        .lines()
        .find(|l| l.starts_with("GRUB_CMDLINE_LINUX_DEFAULT="))
        .unwrap()
        .to_string()
}

#[test]
fn test_current_params_parse_the_config_line() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    let current = fx.backend.get_current_params();
    assert!(current.contains_key("quiet"));
    assert!(current.contains_key("rhgb"));
    assert_eq!(current.len(), 2);
    // No staging exists for this backend
    assert!(fx.backend.get_pending_params().is_none());
}

#[test]
fn test_append_dedups_existing_flag() {
    // The stored line already contains `quiet rhgb`; appending `quiet`
    // must leave exactly one `quiet`.
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("quiet")]).unwrap());

    let line = cmdline_line(&fx.config);
    assert_eq!(line.matches("quiet").count(), 1);
    assert!(line.contains("rhgb"));
}

#[test]
fn test_append_updates_existing_value() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("mitigations=auto")]).unwrap());
    assert!(fx.backend.append_params(&[token("mitigations=off")]).unwrap());

    let current = fx.backend.get_current_params();
    assert_eq!(current.get("mitigations").unwrap().value(), Some("off"));
    assert_eq!(cmdline_line(&fx.config).matches("mitigations").count(), 1);
}

#[test]
fn test_append_is_idempotent() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("threadirqs")]).unwrap());
    let after_first = fs::read_to_string(&fx.config).unwrap();

    assert!(fx.backend.append_params(&[token("threadirqs")]).unwrap());
    let after_second = fs::read_to_string(&fx.config).unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(cmdline_line(&fx.config).matches("threadirqs").count(), 1);
}

#[test]
fn test_unrelated_lines_survive_rewrites() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("mitigations=off")]).unwrap());

    let content = fs::read_to_string(&fx.config).unwrap();
    assert!(content.contains("GRUB_TIMEOUT=5"));
    assert!(content.contains("# local note kept verbatim"));
    assert!(content.contains("GRUB_DISABLE_RECOVERY=\"true\""));
}

#[test]
fn test_line_appended_when_absent() {
    let fx = setup("GRUB_TIMEOUT=5\n", "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("quiet")]).unwrap());
    assert_eq!(cmdline_line(&fx.config), "GRUB_CMDLINE_LINUX_DEFAULT=\"quiet\"");
}

#[test]
fn test_edit_creates_timestamped_backup() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.append_params(&[token("quiet")]).unwrap());

    let backups: Vec<_> = fs::read_dir(fx.config.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .collect();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        fs::read_to_string(backups[0].path()).unwrap(),
        GRUB_CONTENT,
        "backup must hold the pre-edit content"
    );
}

#[test]
fn test_remove_absent_key_is_noop_without_edit() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.remove_params(&[token("mitigations")]).unwrap());

    // Untouched: no backup appeared and the line is unchanged
    let backups = fs::read_dir(fx.config.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".bak"))
        .count();
    assert_eq!(backups, 0);
    assert_eq!(fs::read_to_string(&fx.config).unwrap(), GRUB_CONTENT);
}

#[test]
fn test_remove_present_key() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(fx.backend.remove_params(&[token("rhgb")]).unwrap());

    let current = fx.backend.get_current_params();
    assert!(current.contains_key("quiet"));
    assert!(!current.contains_key("rhgb"));
}

#[test]
fn test_replace_param_swaps_in_one_edit() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 0\n");
    assert!(
        fx.backend
            .replace_param(&token("rhgb"), &token("splash"))
            .unwrap()
    );

    let current = fx.backend.get_current_params();
    assert!(!current.contains_key("rhgb"));
    assert!(current.contains_key("splash"));
    assert!(current.contains_key("quiet"));
}

#[test]
fn test_generator_failure_is_call_failure() {
    let fx = setup(GRUB_CONTENT, "#!/bin/sh\nexit 1\n");
    let applied = fx.backend.append_params(&[token("quiet")]).unwrap();
    assert!(!applied, "a menu that was never regenerated must not report success");
}

#[test]
fn test_missing_boot_menu_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_file(dir.path(), "default/grub", GRUB_CONTENT);
    let generator = write_script(dir.path(), "mkconfig", "#!/bin/sh\nexit 0\n");

    let backend = GrubKargsBackend::new(test_tunables())
        .with_paths(&config, vec![dir.path().join("nope/grub.cfg")])
        .with_generator(&generator);

    let result = backend.append_params(&[token("quiet")]);
    assert!(matches!(result, Err(Error::CommandFailed(_))));
}

#[test]
fn test_missing_config_file_yields_empty_set() {
    let dir = TempDir::new().unwrap();
    let backend = GrubKargsBackend::new(test_tunables()).with_paths(
        &dir.path().join("default/grub"),
        vec![dir.path().join("boot/grub2/grub.cfg")],
    );
    assert!(backend.get_current_params().is_empty());
}
