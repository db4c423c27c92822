// src/platform/detect.rs

//! Platform detection probes
//!
//! `detect()` is side-effect-free beyond read-only probes: it parses
//! `/etc/os-release`, asks the image tool for its deployment status with a
//! bounded timeout, and checks for bootloader configuration on disk. It
//! never fails; anything unparseable resolves to the unknown platform so
//! callers fail fast later, at the factory, instead of here.

use crate::config::Tunables;
use crate::exec::run_tool;
use crate::platform::{BootMethod, PackageManagerKind, PlatformInfo, PlatformType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const OS_RELEASE_PATH: &str = "/etc/os-release";
const GRUB_DEFAULT_PATH: &str = "/etc/default/grub";
const LOADER_ENTRIES_PATH: &str = "/boot/loader/entries";

/// Parsed subset of `/etc/os-release`.
#[derive(Debug, Clone, Default)]
pub struct OsRelease {
    pub id: String,
    pub id_like: String,
    pub name: String,
    pub version_id: String,
    pub pretty_name: String,
}

impl OsRelease {
    /// Parse the key=value format of os-release. Unquotes double- and
    /// single-quoted values; unknown keys are ignored.
    pub fn parse(content: &str) -> Self {
        let mut fields: HashMap<&str, String> = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            fields.insert(key, value.to_string());
        }

        Self {
            id: fields.remove("ID").unwrap_or_default(),
            id_like: fields.remove("ID_LIKE").unwrap_or_default(),
            name: fields.remove("NAME").unwrap_or_default(),
            version_id: fields.remove("VERSION_ID").unwrap_or_default(),
            pretty_name: fields.remove("PRETTY_NAME").unwrap_or_default(),
        }
    }

    fn is_rpm_family(&self) -> bool {
        let ids = ["fedora", "rhel", "centos", "rocky", "almalinux", "nobara", "bazzite"];
        ids.contains(&self.id.as_str()) || ids.iter().any(|id| self.id_like.contains(id))
    }

    fn is_deb_family(&self) -> bool {
        let ids = ["debian", "ubuntu", "pop", "linuxmint", "elementary"];
        ids.contains(&self.id.as_str()) || ids.iter().any(|id| self.id_like.contains(id))
    }
}

/// Raw probe results, separated from classification so the mapping from
/// probes to `PlatformInfo` is a pure function.
#[derive(Debug, Clone, Default)]
pub struct PlatformProbes {
    pub os_release: OsRelease,
    /// Image tool answered with at least one deployment
    pub image_deployment_active: bool,
    /// ujust-style convenience layer present
    pub has_extension_layer: bool,
    pub has_grub_config: bool,
    pub has_loader_entries: bool,
    pub has_dnf: bool,
    pub has_apt: bool,
}

/// Classify probe results into an immutable snapshot. Pure and total:
/// every probe combination maps to some `PlatformInfo`.
pub fn classify(probes: &PlatformProbes) -> PlatformInfo {
    let os = &probes.os_release;

    let (platform_type, is_immutable, package_manager) = if probes.image_deployment_active {
        let ptype = if probes.has_extension_layer {
            PlatformType::ImageExtensions
        } else {
            PlatformType::ImagePlain
        };
        (ptype, true, PackageManagerKind::ImageTransactional)
    } else if os.is_rpm_family() && probes.has_dnf {
        (PlatformType::TraditionalRpm, false, PackageManagerKind::Dnf)
    } else if os.is_deb_family() && probes.has_apt {
        (PlatformType::TraditionalDeb, false, PackageManagerKind::Apt)
    } else {
        (PlatformType::Unknown, false, PackageManagerKind::Unknown)
    };

    let boot_method = if probes.image_deployment_active {
        BootMethod::ImageTransactional
    } else if probes.has_grub_config || probes.has_loader_entries {
        BootMethod::BootloaderFile
    } else {
        BootMethod::Unknown
    };

    PlatformInfo {
        platform_type,
        distro_name: os.name.clone(),
        distro_version: os.version_id.clone(),
        is_immutable,
        has_extension_layer: probes.has_extension_layer,
        package_manager,
        boot_method,
    }
}

/// Runs the read-only probes and produces the per-process snapshot.
pub struct PlatformDetector {
    tunables: Tunables,
    os_release_path: PathBuf,
    grub_config_path: PathBuf,
    loader_entries_path: PathBuf,
}

impl PlatformDetector {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            tunables,
            os_release_path: PathBuf::from(OS_RELEASE_PATH),
            grub_config_path: PathBuf::from(GRUB_DEFAULT_PATH),
            loader_entries_path: PathBuf::from(LOADER_ENTRIES_PATH),
        }
    }

    /// Override probe paths, for exercising detection against fixtures.
    pub fn with_paths(mut self, os_release: &Path, grub_config: &Path, loader_entries: &Path) -> Self {
        self.os_release_path = os_release.to_path_buf();
        self.grub_config_path = grub_config.to_path_buf();
        self.loader_entries_path = loader_entries.to_path_buf();
        self
    }

    /// Detect the platform. Never fails; determinism: identical OS state
    /// yields an identical snapshot.
    pub fn detect(&self) -> PlatformInfo {
        let probes = self.gather();
        let info = classify(&probes);
        if info.platform_type == PlatformType::Unknown {
            warn!(
                "Platform could not be classified (os-release id '{}'); mutation will be refused",
                probes.os_release.id
            );
        } else {
            debug!(
                "Detected platform: {} ({} {}), package manager {}, boot method {}",
                info.platform_type,
                info.distro_name,
                info.distro_version,
                info.package_manager,
                info.boot_method
            );
        }
        info
    }

    fn gather(&self) -> PlatformProbes {
        let os_release = std::fs::read_to_string(&self.os_release_path)
            .map(|c| OsRelease::parse(&c))
            .unwrap_or_default();

        let image_deployment_active = self.probe_image_deployments();

        PlatformProbes {
            os_release,
            image_deployment_active,
            has_extension_layer: which::which("ujust").is_ok(),
            has_grub_config: self.grub_config_path.is_file(),
            has_loader_entries: self.loader_entries_path.is_dir(),
            has_dnf: which::which("dnf").is_ok(),
            has_apt: which::which("apt-get").is_ok(),
        }
    }

    /// Ask the image tool for its status and verify the response actually
    /// contains deployment data. Any failure (missing tool, timeout,
    /// malformed JSON, empty deployment list) means "not image-based".
    fn probe_image_deployments(&self) -> bool {
        if which::which("rpm-ostree").is_err() {
            return false;
        }
        let result = match run_tool(
            "rpm-ostree",
            &["status", "--json"],
            self.tunables.probe_timeout(),
        ) {
            Ok(r) => r,
            Err(e) => {
                debug!("rpm-ostree status probe failed: {}", e);
                return false;
            }
        };
        if !result.success() {
            return false;
        }
        match serde_json::from_str::<serde_json::Value>(&result.stdout) {
            Ok(status) => status
                .get("deployments")
                .and_then(|d| d.as_array())
                .is_some_and(|d| !d.is_empty()),
            Err(e) => {
                debug!("rpm-ostree status produced malformed JSON: {}", e);
                false
            }
        }
    }
}
