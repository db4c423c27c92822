// src/commands/mod.rs

//! Command implementations for the systune CLI
//!
//! Precondition failures (not root, unrecognized platform, missing
//! backend) abort with a non-zero exit. Individual reset steps that fail
//! or are skipped do not: they are logged and the run continues, so a
//! partially applicable host still gets every step that can work.

mod backup;
mod reset;
mod rollback;
mod status;

pub use backup::cmd_backup;
pub use reset::{ResetArgs, cmd_reset};
pub use rollback::{cmd_backups, cmd_rollback};
pub use status::cmd_status;

use crate::backup::CaptureContext;
use crate::config::Tunables;
use crate::platform::{PlatformDetector, PlatformInfo, PlatformType};
use crate::services::PlatformServices;
use anyhow::{Result, bail};
use tracing::warn;

/// Detect the platform and bind backends. Refuses unclassifiable hosts:
/// mutation on an unknown platform is never safe.
pub(crate) fn platform_services(tunables: &Tunables) -> Result<PlatformServices> {
    let info = PlatformDetector::new(tunables.clone()).detect();
    if info.platform_type == PlatformType::Unknown {
        bail!(
            "this host could not be classified as a supported platform; \
             refusing to continue"
        );
    }
    Ok(PlatformServices::new(info, tunables.clone()))
}

/// Mutating commands require full privileges; everything they touch is
/// host-global.
pub(crate) fn ensure_root() -> Result<()> {
    if !nix::unistd::Uid::effective().is_root() {
        bail!("this operation mutates host state and must run as root");
    }
    Ok(())
}

pub(crate) fn render_platform(info: &PlatformInfo) -> String {
    format!(
        "platform: {}\ndistro: {} {}\nimmutable: {}\nextension-layer: {}\npackage-manager: {}\nboot-method: {}",
        info.platform_type,
        info.distro_name,
        info.distro_version,
        info.is_immutable,
        info.has_extension_layer,
        info.package_manager,
        info.boot_method,
    )
}

/// Assemble everything a backup set records. Degrades field by field so a
/// missing backend never blocks capture of the rest.
pub(crate) fn capture_context(services: &PlatformServices) -> CaptureContext {
    let package_status = match services.package_manager() {
        Ok(pm) => pm.status_text(),
        Err(e) => {
            warn!("No package status for backup: {}", e);
            format!("(unavailable: {})\n", e)
        }
    };

    let (effective, configured) = match services.kernel_params() {
        Ok(kp) => {
            let current = kp.get_current_params();
            let configured = kp.get_pending_params().unwrap_or_else(|| current.clone());
            (current, configured)
        }
        Err(e) => {
            warn!("No kernel-argument capture for backup: {}", e);
            Default::default()
        }
    };

    CaptureContext {
        platform_summary: render_platform(services.info()),
        package_status,
        effective_kargs: effective,
        configured_kargs: configured,
    }
}
