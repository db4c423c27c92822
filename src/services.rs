// src/services.rs

//! Backend factory
//!
//! Binds one `PlatformInfo` snapshot to concrete backends, constructed
//! lazily and cached for the process lifetime. Dispatch is over the closed
//! variant sets, so an unrecognized platform is a typed
//! `UnsupportedPlatform` error — "this host cannot be safely mutated by
//! this tool" — not a silent skip and not a crash.

use crate::config::Tunables;
use crate::error::{Error, Result};
use crate::kargs::{GrubKargsBackend, KernelParamManager, OstreeKargsBackend};
use crate::packages::{AptBackend, DnfBackend, OstreePackageBackend, PackageManager};
use crate::platform::{BootMethod, PackageManagerKind, PlatformInfo};
use std::sync::OnceLock;

pub struct PlatformServices {
    info: PlatformInfo,
    tunables: Tunables,
    package_manager: OnceLock<Box<dyn PackageManager>>,
    kernel_params: OnceLock<Box<dyn KernelParamManager>>,
}

impl PlatformServices {
    pub fn new(info: PlatformInfo, tunables: Tunables) -> Self {
        Self {
            info,
            tunables,
            package_manager: OnceLock::new(),
            kernel_params: OnceLock::new(),
        }
    }

    pub fn info(&self) -> &PlatformInfo {
        &self.info
    }

    /// The package backend for this host, constructed on first use.
    pub fn package_manager(&self) -> Result<&dyn PackageManager> {
        if let Some(backend) = self.package_manager.get() {
            return Ok(backend.as_ref());
        }

        let backend: Box<dyn PackageManager> = match self.info.package_manager {
            PackageManagerKind::ImageTransactional => {
                Box::new(OstreePackageBackend::new(self.tunables.clone()))
            }
            PackageManagerKind::Dnf => Box::new(DnfBackend::new(self.tunables.clone())),
            PackageManagerKind::Apt => Box::new(AptBackend::new(self.tunables.clone())),
            PackageManagerKind::Unknown => {
                return Err(Error::UnsupportedPlatform(format!(
                    "no package backend registered (platform '{}')",
                    self.info.platform_type
                )));
            }
        };

        Ok(self.package_manager.get_or_init(|| backend).as_ref())
    }

    /// The kernel-argument backend for this host, constructed on first use.
    pub fn kernel_params(&self) -> Result<&dyn KernelParamManager> {
        if let Some(backend) = self.kernel_params.get() {
            return Ok(backend.as_ref());
        }

        let backend: Box<dyn KernelParamManager> = match self.info.boot_method {
            BootMethod::ImageTransactional => {
                Box::new(OstreeKargsBackend::new(self.tunables.clone()))
            }
            BootMethod::BootloaderFile => Box::new(GrubKargsBackend::new(self.tunables.clone())),
            BootMethod::Unknown => {
                return Err(Error::UnsupportedPlatform(format!(
                    "no kernel-argument backend registered (platform '{}')",
                    self.info.platform_type
                )));
            }
        };

        Ok(self.kernel_params.get_or_init(|| backend).as_ref())
    }
}
