// src/lib.rs

//! Systune
//!
//! Platform-aware performance tuning engine for Linux hosts. Applies and
//! safely reverts kernel boot arguments, installed packages, and `/etc`
//! configuration across image-based/immutable and traditional/mutable
//! platforms.
//!
//! # Architecture
//!
//! - Detection-first: one immutable `PlatformInfo` snapshot per process
//! - Closed backend matrix: rpm-ostree / GRUB kernel-argument backends,
//!   rpm-ostree / dnf / apt package backends, resolved once by the factory
//! - Backup-before-mutate: every destructive operation is preceded by a
//!   timestamped snapshot of `/etc`, kernel arguments, and package state
//! - Partial-failure tolerance: batch operations fall back to per-item
//!   application with independent outcomes

pub mod backup;
pub mod cli;
pub mod commands;
pub mod config;
mod error;
pub mod exec;
pub mod kargs;
pub mod lock;
pub mod packages;
pub mod platform;
pub mod retry;
pub mod services;

pub use backup::{
    BackupManager, BackupSet, CaptureContext, ExclusionMatrix, RestoreOptions, RollbackOptions,
};
pub use config::Tunables;
pub use error::{Error, Result};
pub use kargs::{KargToken, KernelParamManager, KernelParameterSet};
pub use lock::HostLock;
pub use packages::PackageManager;
pub use platform::{
    BootMethod, PackageManagerKind, PlatformDetector, PlatformInfo, PlatformType,
};
pub use services::PlatformServices;
