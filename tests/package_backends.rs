// tests/package_backends.rs

//! Package-backend idempotence, observed through stub tools that track
//! every invocation and keep installed state in marker files.

mod common;

use common::{test_tunables, write_script};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use systune::PackageManager;
use systune::packages::{AptBackend, DnfBackend};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    backend: Box<dyn PackageManager>,
    log: PathBuf,
}

fn names(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn log_lines(fx: &Fixture) -> Vec<String> {
    fs::read_to_string(&fx.log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// dnf-shaped fixture: `rpm -q` consults marker files, the dnf stub logs
/// every call and flips markers on install/remove.
fn dnf_fixture(preinstalled: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let markers = dir.path().join("markers");
    fs::create_dir_all(&markers).unwrap();
    for name in preinstalled {
        fs::write(markers.join(name), "").unwrap();
    }
    let log = dir.path().join("log");
    fs::write(&log, "").unwrap();

    let rpm = write_script(
        dir.path(),
        "rpm-stub",
        &format!(
            r#"#!/bin/sh
[ "$1" = "-q" ] || exit 1
[ -f "{markers}/$2" ] && exit 0
exit 1
"#,
            markers = markers.display()
        ),
    );

    let dnf = write_script(
        dir.path(),
        "dnf-stub",
        &format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
action="$1"
shift
[ "$1" = "-y" ] && shift
case "$action" in
  install) for p in "$@"; do touch "{markers}/$p"; done ;;
  remove)  for p in "$@"; do rm -f "{markers}/$p"; done ;;
esac
exit 0
"#,
            log = log.display(),
            markers = markers.display()
        ),
    );

    let backend = DnfBackend::new(test_tunables()).with_programs(&dnf, &rpm);
    Fixture {
        _dir: dir,
        backend: Box::new(backend),
        log,
    }
}

/// apt-shaped fixture with a dpkg-query stub speaking the status format.
fn apt_fixture(preinstalled: &[&str]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let markers = dir.path().join("markers");
    fs::create_dir_all(&markers).unwrap();
    for name in preinstalled {
        fs::write(markers.join(name), "").unwrap();
    }
    let log = dir.path().join("log");
    fs::write(&log, "").unwrap();

    let dpkg_query = write_script(
        dir.path(),
        "dpkg-query-stub",
        &format!(
            r#"#!/bin/sh
# dpkg-query -W -f ${{Status}} <name>
name="$4"
if [ -f "{markers}/$name" ]; then
  printf 'install ok installed'
  exit 0
fi
exit 1
"#,
            markers = markers.display()
        ),
    );

    let apt_get = write_script(
        dir.path(),
        "apt-get-stub",
        &format!(
            r#"#!/bin/sh
echo "$@" >> "{log}"
action="$1"
shift
[ "$1" = "-y" ] && shift
case "$action" in
  install) for p in "$@"; do touch "{markers}/$p"; done ;;
  remove)  for p in "$@"; do rm -f "{markers}/$p"; done ;;
esac
exit 0
"#,
            log = log.display(),
            markers = markers.display()
        ),
    );

    let backend = AptBackend::new(test_tunables()).with_programs(&apt_get, &dpkg_query);
    Fixture {
        _dir: dir,
        backend: Box::new(backend),
        log,
    }
}

fn timeout() -> Duration {
    Duration::from_secs(5)
}

#[test]
fn test_dnf_install_skips_already_installed() {
    let fx = dnf_fixture(&["tuned"]);
    assert!(fx.backend.install(&names(&["tuned"]), timeout()).unwrap());
    // Installer never invoked
    assert!(log_lines(&fx).is_empty());
}

#[test]
fn test_dnf_install_twice_invokes_installer_once() {
    let fx = dnf_fixture(&[]);

    assert!(fx.backend.install(&names(&["gamemode"]), timeout()).unwrap());
    assert!(fx.backend.install(&names(&["gamemode"]), timeout()).unwrap());

    let lines = log_lines(&fx);
    assert_eq!(lines, vec!["install -y gamemode"]);
    assert!(fx.backend.is_installed("gamemode"));
}

#[test]
fn test_dnf_install_filters_mixed_batch() {
    let fx = dnf_fixture(&["tuned"]);
    assert!(
        fx.backend
            .install(&names(&["tuned", "gamemode"]), timeout())
            .unwrap()
    );
    // Only the missing package reaches the installer
    assert_eq!(log_lines(&fx), vec!["install -y gamemode"]);
}

#[test]
fn test_dnf_remove_absent_is_success_without_invocation() {
    let fx = dnf_fixture(&[]);
    assert!(fx.backend.remove(&names(&["gamemode"])).unwrap());
    assert!(log_lines(&fx).is_empty());
}

#[test]
fn test_dnf_remove_twice_invokes_once() {
    let fx = dnf_fixture(&["gamemode"]);

    assert!(fx.backend.remove(&names(&["gamemode"])).unwrap());
    assert!(fx.backend.remove(&names(&["gamemode"])).unwrap());

    assert_eq!(log_lines(&fx), vec!["remove -y gamemode"]);
    assert!(!fx.backend.is_installed("gamemode"));
}

#[test]
fn test_dnf_update_refreshes_metadata() {
    let fx = dnf_fixture(&[]);
    assert!(fx.backend.update().unwrap());
    assert_eq!(log_lines(&fx), vec!["makecache --refresh"]);
}

#[test]
fn test_apt_install_is_idempotent() {
    let fx = apt_fixture(&[]);

    assert!(fx.backend.install(&names(&["zram-tools"]), timeout()).unwrap());
    assert!(fx.backend.install(&names(&["zram-tools"]), timeout()).unwrap());

    assert_eq!(log_lines(&fx), vec!["install -y zram-tools"]);
}

#[test]
fn test_apt_is_installed_requires_status_match() {
    let fx = apt_fixture(&["zram-tools"]);
    assert!(fx.backend.is_installed("zram-tools"));
    assert!(!fx.backend.is_installed("missing-pkg"));
}

#[test]
fn test_apt_remove_absent_is_success() {
    let fx = apt_fixture(&[]);
    assert!(fx.backend.remove(&names(&["zram-tools"])).unwrap());
    assert!(log_lines(&fx).is_empty());
}

#[test]
fn test_failing_tool_reports_false_not_error() {
    let dir = TempDir::new().unwrap();
    let markers = dir.path().join("markers");
    fs::create_dir_all(&markers).unwrap();

    let rpm = write_script(dir.path(), "rpm-stub", "#!/bin/sh\nexit 1\n");
    let dnf = write_script(dir.path(), "dnf-stub", "#!/bin/sh\nexit 1\n");

    let backend = DnfBackend::new(test_tunables()).with_programs(&dnf, &rpm);
    let applied = backend.install(&names(&["gamemode"]), timeout()).unwrap();
    assert!(!applied, "tool failure is Ok(false), not an error");
}

#[test]
fn test_missing_tool_is_a_typed_error() {
    let backend = DnfBackend::new(test_tunables()).with_programs(
        Path::new("/nonexistent/dnf"),
        Path::new("/nonexistent/rpm"),
    );
    let result = backend.install(&names(&["gamemode"]), timeout());
    assert!(matches!(result, Err(systune::Error::CommandFailed(_))));
}
