// src/packages/mod.rs

//! Package management through the platform's authoritative manager
//!
//! Backends never keep an in-memory view of the installed set; every query
//! goes back to the OS so repeated runs cannot act on stale state.
//! Idempotence is a hard requirement: installing an already-installed
//! package (or removing an absent one) returns success without re-invoking
//! the underlying tool, because orchestrators call these repeatedly across
//! runs and must never fail merely because a prior run already converged.

mod apt;
mod dnf;
mod rpm_ostree;

pub use apt::AptBackend;
pub use dnf::DnfBackend;
pub use rpm_ostree::OstreePackageBackend;

use crate::error::Result;
use std::time::Duration;

/// Contract implemented by each platform family's backend.
///
/// Mutating methods return `Ok(false)` when the underlying tool ran and
/// reported failure (including a timeout); orchestrators treat that as
/// "optimization not applied" and continue, rather than aborting the run.
pub trait PackageManager {
    /// Install packages, skipping any that are already installed. Success
    /// with nothing left to do does not invoke the installer at all.
    fn install(&self, names: &[String], timeout: Duration) -> Result<bool>;

    /// Remove packages; absent packages are skipped, and removing nothing
    /// is success.
    fn remove(&self, names: &[String]) -> Result<bool>;

    fn is_installed(&self, name: &str) -> bool;

    /// Refresh package metadata.
    fn update(&self) -> Result<bool>;

    /// Human-readable state dump recorded into backup sets.
    fn status_text(&self) -> String;

    /// Whether installs land in the next deployment rather than the
    /// running system — a property of the platform, not an error.
    fn changes_require_reboot(&self) -> bool {
        false
    }
}
