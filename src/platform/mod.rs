// src/platform/mod.rs

//! Platform identification
//!
//! A `PlatformInfo` snapshot is produced once per process by the detector
//! and never mutated; every downstream component branches on its fields.
//! Backend selection is a closed set of tagged variants resolved by the
//! factory, which keeps the backend matrix exhaustively testable.

mod detect;

pub use detect::{OsRelease, PlatformDetector, PlatformProbes};

use strum_macros::{Display, EnumString};

/// Overall platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum PlatformType {
    /// Image-based deployment carrying a convenience extension layer (ujust)
    #[strum(serialize = "image-extensions")]
    ImageExtensions,
    /// Image-based deployment without an extension layer
    #[strum(serialize = "image-plain")]
    ImagePlain,
    /// Traditional mutable root with RPM packaging
    #[strum(serialize = "traditional-rpm")]
    TraditionalRpm,
    /// Traditional mutable root with Debian packaging
    #[strum(serialize = "traditional-deb")]
    TraditionalDeb,
    #[strum(serialize = "unknown")]
    Unknown,
}

/// Which package manager is authoritative on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum PackageManagerKind {
    /// Layered installs staged into the next image deployment (rpm-ostree)
    #[strum(serialize = "image-transactional")]
    ImageTransactional,
    #[strum(serialize = "dnf")]
    Dnf,
    #[strum(serialize = "apt")]
    Apt,
    #[strum(serialize = "unknown")]
    Unknown,
}

/// How persisted kernel boot arguments are mutated on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum BootMethod {
    /// Atomic kernel-argument transactions through the image tool
    #[strum(serialize = "image-transactional")]
    ImageTransactional,
    /// Editing a bootloader configuration file and regenerating the menu
    #[strum(serialize = "bootloader-file")]
    BootloaderFile,
    #[strum(serialize = "unknown")]
    Unknown,
}

/// Immutable snapshot of everything detection learned about this host.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub platform_type: PlatformType,
    pub distro_name: String,
    pub distro_version: String,
    pub is_immutable: bool,
    pub has_extension_layer: bool,
    pub package_manager: PackageManagerKind,
    pub boot_method: BootMethod,
}

impl PlatformInfo {
    /// Conservative value used when nothing could be classified.
    pub fn unknown() -> Self {
        Self {
            platform_type: PlatformType::Unknown,
            distro_name: String::new(),
            distro_version: String::new(),
            is_immutable: false,
            has_extension_layer: false,
            package_manager: PackageManagerKind::Unknown,
            boot_method: BootMethod::Unknown,
        }
    }
}
