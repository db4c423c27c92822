// src/backup/exclusions.rs

//! Two-tier path protection for configuration-tree restore
//!
//! A careless full restore of a stateful host's `/etc` can destroy SSH
//! host identity, break every user login, or delete VPN and virtualization
//! state that cannot be regenerated. The matrix is the boundary between
//! "clean slate" and "bricked host":
//!
//! - CRITICAL: authentication and machine identity. Always protected; no
//!   override exists.
//! - SAFE: stateful service configuration and secrets. Protected unless
//!   the operator explicitly opts into aggressive mode.
//!
//! This is versioned static data shipped with the tool, reviewed like any
//! other safety-critical constant. It is not user-editable state.
//!
//! The same file carries the other two versioned lists the reset tool
//! depends on: the kernel-argument keys this tool may have added, and the
//! repository-definition globs it may have dropped into `/etc`.

use glob::Pattern;
use std::path::Path;

/// Account databases, host keys, machine identity. Paths are relative to
/// the configuration-tree root; an entry protects its whole subtree.
const CRITICAL_PATTERNS: &[&str] = &[
    "passwd",
    "passwd-",
    "shadow",
    "shadow-",
    "group",
    "group-",
    "gshadow",
    "gshadow-",
    "subuid",
    "subgid",
    "sudoers",
    "sudoers.d",
    "ssh/ssh_host_*",
    "machine-id",
    "hostname",
    "fstab",
    "crypttab",
];

/// Stateful service configuration, secrets, virtualization/container
/// state, desktop defaults.
const SAFE_PATTERNS: &[&str] = &[
    "NetworkManager/system-connections",
    "wireguard",
    "openvpn",
    "ipsec.d",
    "libvirt",
    "lvm",
    "containers",
    "docker",
    "pki",
    "sssd",
    "krb5.keytab",
    "cups",
    "firewalld",
    "dconf",
    "X11/xorg.conf.d",
];

/// Kernel-argument keys this tool's optimizations may have added. The
/// kernel-argument reset removes exactly these, never the whole line.
pub const TUNING_KARG_KEYS: &[&str] = &[
    "mitigations",
    "amd_pstate",
    "intel_pstate",
    "processor.max_cstate",
    "intel_idle.max_cstate",
    "threadirqs",
    "preempt",
    "nowatchdog",
    "nmi_watchdog",
    "split_lock_detect",
    "transparent_hugepage",
    "zswap.enabled",
    "nvme_core.default_ps_max_latency_us",
    "pcie_aspm",
    "pcie_aspm.policy",
    "usbcore.autosuspend",
    "clocksource",
];

/// Repository definition files the optimizer may have installed, relative
/// to the configuration-tree root.
pub const TUNING_REPO_GLOBS: &[&str] = &[
    "yum.repos.d/_copr:copr.fedorainfracloud.org:*.repo",
    "yum.repos.d/_copr_*.repo",
    "apt/sources.list.d/*-tuning.list",
];

/// Compiled CRITICAL/SAFE matcher.
pub struct ExclusionMatrix {
    critical: Vec<Pattern>,
    safe: Vec<Pattern>,
}

impl ExclusionMatrix {
    /// The matrix shipped with this version of the tool.
    pub fn builtin() -> Self {
        Self {
            critical: compile(CRITICAL_PATTERNS),
            safe: compile(SAFE_PATTERNS),
        }
    }

    /// An empty matrix: nothing is protected. Used by rollback, which
    /// intentionally restores everything the operator asked to undo.
    pub fn none() -> Self {
        Self {
            critical: Vec::new(),
            safe: Vec::new(),
        }
    }

    /// Whether `rel` (relative to the tree root) must not be touched.
    /// CRITICAL applies unconditionally; SAFE drops away in aggressive
    /// mode.
    pub fn is_protected(&self, rel: &Path, aggressive: bool) -> bool {
        if any_match(&self.critical, rel) {
            return true;
        }
        !aggressive && any_match(&self.safe, rel)
    }
}

/// A pattern protects the path it names and everything below it.
fn any_match(patterns: &[Pattern], rel: &Path) -> bool {
    patterns.iter().any(|pattern| {
        let mut candidate = Some(rel);
        while let Some(path) = candidate {
            if pattern.matches_path(path) {
                return true;
            }
            candidate = path.parent().filter(|p| !p.as_os_str().is_empty());
        }
        false
    })
}

fn compile(patterns: &[&str]) -> Vec<Pattern> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).expect("builtin exclusion pattern must compile"))
        .collect()
}
