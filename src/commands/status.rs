// src/commands/status.rs

//! Status command - read-only platform and kernel-argument report

use crate::commands::render_platform;
use crate::config::Tunables;
use crate::platform::PlatformDetector;
use crate::services::PlatformServices;
use anyhow::Result;

pub fn cmd_status(tunables: &Tunables) -> Result<()> {
    let info = PlatformDetector::new(tunables.clone()).detect();
    println!("{}", render_platform(&info));

    let services = PlatformServices::new(info, tunables.clone());
    match services.kernel_params() {
        Ok(kargs) => {
            let current = kargs.get_current_params();
            println!("\nkernel arguments (effective):");
            println!("  {}", current.to_cmdline());
            match kargs.get_pending_params() {
                Some(pending) => {
                    println!("kernel arguments (pending, after reboot):");
                    println!("  {}", pending.to_cmdline());
                    println!("\nA reboot is required for pending kernel arguments.");
                }
                None => println!("kernel arguments (pending): none staged"),
            }
        }
        Err(e) => println!("\nkernel arguments: unavailable ({})", e),
    }

    if let Ok(pm) = services.package_manager()
        && pm.changes_require_reboot()
    {
        println!("\nPackage installs on this platform are layered into the next deployment and need a reboot to activate.");
    }

    Ok(())
}
