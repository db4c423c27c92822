// tests/ostree_backend.rs

//! Image-transactional backend driven against a stateful stub standing in
//! for the image tool. The stub rejects multi-argument change requests,
//! which forces every batch attempt into the per-token fallback path.

mod common;

use common::{test_tunables, write_file, write_script};
use std::fs;
use std::path::{Path, PathBuf};
use systune::kargs::{KargToken, OstreeKargsBackend};
use systune::{Error, KernelParamManager};
use tempfile::TempDir;

fn token(s: &str) -> KargToken {
    KargToken::parse(s).unwrap()
}

struct Fixture {
    _dir: TempDir,
    backend: OstreeKargsBackend,
    state: PathBuf,
    log: PathBuf,
}

/// Build a stub whose `kargs` subcommand reads and mutates a state file.
/// Any invocation carrying more than one change argument exits nonzero,
/// and tokens containing `stuck` can never be changed.
fn setup(initial_kargs: &str, cmdline: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let state = write_file(dir.path(), "state", &format!("{}\n", initial_kargs));
    let log = dir.path().join("log");
    fs::write(&log, "").unwrap();
    let cmdline_path = write_file(dir.path(), "cmdline", &format!("{}\n", cmdline));

    let body = format!(
        r#"#!/bin/sh
STATE="{state}"
LOG="{log}"
case "$1" in
  status)
    echo '{{"deployments":[{{"id":"host-1"}}]}}'
    exit 0
    ;;
  kargs)
    shift
    if [ $# -eq 0 ]; then
      cat "$STATE"
      exit 0
    fi
    echo "$@" >> "$LOG"
    if [ $# -gt 1 ]; then
      exit 1
    fi
    arg="$1"
    case "$arg" in
      *stuck*) exit 1 ;;
      --delete=*)
        key="${{arg#--delete=}}"
        new=""
        for t in $(cat "$STATE"); do
          case "$t" in
            "$key"|"$key"=*) ;;
            *) new="$new $t" ;;
          esac
        done
        echo $new > "$STATE"
        exit 0
        ;;
      --append=*)
        echo "$(cat "$STATE") ${{arg#--append=}}" > "$STATE"
        exit 0
        ;;
      --replace=*)
        tok="${{arg#--replace=}}"
        key="${{tok%%=*}}"
        new=""
        for t in $(cat "$STATE"); do
          case "$t" in
            "$key"|"$key"=*) ;;
            *) new="$new $t" ;;
          esac
        done
        echo $new "$tok" > "$STATE"
        exit 0
        ;;
      *) exit 1 ;;
    esac
    ;;
  *) exit 1 ;;
esac
"#,
        state = state.display(),
        log = log.display(),
    );
    let program = write_script(dir.path(), "rpm-ostree-stub", &body);

    let backend = OstreeKargsBackend::new(test_tunables())
        .with_program(&program)
        .with_cmdline_path(&cmdline_path);

    Fixture {
        _dir: dir,
        backend,
        state,
        log,
    }
}

fn state_of(fx: &Fixture) -> String {
    fs::read_to_string(&fx.state).unwrap().trim().to_string()
}

fn log_lines(fx: &Fixture) -> Vec<String> {
    fs::read_to_string(&fx.log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_single_append_succeeds_in_batch() {
    let fx = setup("root=UUID=abc quiet", "root=UUID=abc quiet");
    assert!(fx.backend.append_params(&[token("threadirqs")]).unwrap());

    assert!(state_of(&fx).contains("threadirqs"));
    // One change argument fits in one batch call; no fallback happened
    assert_eq!(log_lines(&fx), vec!["--append=threadirqs"]);
}

#[test]
fn test_multi_append_falls_back_per_token() {
    let fx = setup("root=UUID=abc quiet", "root=UUID=abc quiet");
    assert!(
        fx.backend
            .append_params(&[token("mitigations=off"), token("threadirqs")])
            .unwrap()
    );

    let state = state_of(&fx);
    assert!(state.contains("mitigations=off"));
    assert!(state.contains("threadirqs"));

    // Batch attempt first, then one call per token
    let lines = log_lines(&fx);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "--append=mitigations=off --append=threadirqs");
    assert_eq!(lines[1], "--append=mitigations=off");
    assert_eq!(lines[2], "--append=threadirqs");
}

#[test]
fn test_append_already_configured_invokes_nothing() {
    let fx = setup("quiet mitigations=off", "quiet");
    assert!(fx.backend.append_params(&[token("mitigations=off")]).unwrap());
    assert!(log_lines(&fx).is_empty());
}

#[test]
fn test_append_existing_key_uses_replace() {
    let fx = setup("quiet mitigations=auto", "quiet mitigations=auto");
    assert!(fx.backend.append_params(&[token("mitigations=off")]).unwrap());

    let state = state_of(&fx);
    assert!(state.contains("mitigations=off"));
    assert!(!state.contains("mitigations=auto"));
    assert_eq!(log_lines(&fx), vec!["--replace=mitigations=off"]);
}

#[test]
fn test_remove_partial_failure_reports_both_sides() {
    let fx = setup("quiet threadirqs stuckkey=1", "quiet");
    let result = fx.backend.remove_params(&[
        token("threadirqs"),
        token("stuckkey"),
        token("nosuchkey"),
    ]);

    match result {
        Err(Error::PartialApply { succeeded, failed }) => {
            assert_eq!(succeeded, vec!["threadirqs".to_string()]);
            assert_eq!(failed, vec!["stuckkey".to_string()]);
        }
        other => panic!("expected PartialApply, got {:?}", other),
    }

    // The removable token really is gone despite the overall failure
    let state = state_of(&fx);
    assert!(!state.contains("threadirqs"));
    assert!(state.contains("stuckkey=1"));
}

#[test]
fn test_remove_absent_keys_invokes_nothing() {
    let fx = setup("root=UUID=abc quiet", "root=UUID=abc quiet");
    assert!(fx.backend.remove_params(&[token("mitigations")]).unwrap());
    assert!(log_lines(&fx).is_empty());
}

#[test]
fn test_pending_params_differ_until_reboot() {
    // Staged deployment has the new token; the booted cmdline does not.
    let fx = setup("root=UUID=abc quiet mitigations=off", "root=UUID=abc quiet");

    let current = fx.backend.get_current_params();
    assert!(!current.contains_key("mitigations"));

    let pending = fx.backend.get_pending_params().expect("staged set differs");
    assert!(pending.contains_key("mitigations"));
}

#[test]
fn test_pending_params_none_when_converged() {
    let fx = setup("root=UUID=abc quiet", "quiet root=UUID=abc");
    assert!(fx.backend.get_pending_params().is_none());
}

#[test]
fn test_stuck_transaction_times_out_after_daemon_reset() {
    let dir = TempDir::new().unwrap();
    let busy = write_script(
        dir.path(),
        "busy-stub",
        r#"#!/bin/sh
case "$1" in
  status) echo '{"transaction":["upgrade"],"deployments":[]}'; exit 0 ;;
  *) exit 1 ;;
esac
"#,
    );
    let reset_log = dir.path().join("reset-log");
    let reset = write_script(
        dir.path(),
        "reset-stub",
        &format!("#!/bin/sh\necho \"$@\" >> \"{}\"\nexit 0\n", reset_log.display()),
    );

    let backend = OstreeKargsBackend::new(test_tunables())
        .with_program(&busy)
        .with_reset_program(&reset);

    let result = backend.append_params(&[token("threadirqs")]);
    assert!(matches!(result, Err(Error::TransactionTimeout(_))));

    // Exactly one daemon-reset attempt before giving up
    let resets = fs::read_to_string(&reset_log).unwrap();
    assert_eq!(resets.lines().count(), 1);
    assert!(resets.contains("restart rpm-ostreed"));
}

#[test]
fn test_effective_cmdline_read_failure_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let backend = OstreeKargsBackend::new(test_tunables())
        .with_cmdline_path(Path::new("/nonexistent/cmdline"))
        .with_program(&dir.path().join("missing-stub"));
    assert!(backend.get_current_params().is_empty());
}
