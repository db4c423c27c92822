// src/kargs/grub.rs

//! Bootloader-file kernel-argument backend
//!
//! Sequential and non-transactional: back up the config file, parse the
//! kernel-argument line, mutate the token set in memory, rewrite the file
//! preserving unrelated lines, then regenerate the compiled boot menu. A
//! rewritten source file whose boot menu was never regenerated is silently
//! inert, so regeneration failure is a hard failure for the whole call.

use crate::config::Tunables;
use crate::error::{Error, Result};
use crate::exec::run_tool;
use crate::kargs::{KargToken, KernelParamManager, KernelParameterSet};
use chrono::Local;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const GRUB_DEFAULT_PATH: &str = "/etc/default/grub";
const CMDLINE_KEY: &str = "GRUB_CMDLINE_LINUX_DEFAULT";

/// Known compiled-menu locations, in probe order: legacy BIOS, EFI,
/// Debian family.
const BOOT_CFG_CANDIDATES: &[&str] = &[
    "/boot/grub2/grub.cfg",
    "/boot/efi/EFI/fedora/grub.cfg",
    "/boot/grub/grub.cfg",
];

fn cmdline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("^{}=(.*)$", CMDLINE_KEY)).unwrap())
}

/// Kernel-argument backend editing `/etc/default/grub`.
pub struct GrubKargsBackend {
    config_path: PathBuf,
    boot_cfg_candidates: Vec<PathBuf>,
    generator_override: Option<PathBuf>,
    tunables: Tunables,
}

impl GrubKargsBackend {
    pub fn new(tunables: Tunables) -> Self {
        Self {
            config_path: PathBuf::from(GRUB_DEFAULT_PATH),
            boot_cfg_candidates: BOOT_CFG_CANDIDATES.iter().map(PathBuf::from).collect(),
            generator_override: None,
            tunables,
        }
    }

    /// Point the backend at alternative paths (fixture trees).
    pub fn with_paths(mut self, config_path: &Path, boot_cfg_candidates: Vec<PathBuf>) -> Self {
        self.config_path = config_path.to_path_buf();
        self.boot_cfg_candidates = boot_cfg_candidates;
        self
    }

    /// Use an explicit generator command instead of probing for
    /// grub2-mkconfig / grub-mkconfig.
    pub fn with_generator(mut self, generator: &Path) -> Self {
        self.generator_override = Some(generator.to_path_buf());
        self
    }

    /// Extract the raw (unquoted) kernel-argument line value.
    fn read_cmdline_value(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        for line in content.lines() {
            if let Some(caps) = cmdline_re().captures(line) {
                return Some(unquote(caps.get(1).map_or("", |m| m.as_str())));
            }
        }
        None
    }

    /// Shared mutation path: backup, edit in memory, rewrite, regenerate.
    fn mutate<F>(&self, op: F) -> Result<bool>
    where
        F: FnOnce(&mut KernelParameterSet),
    {
        let original = match fs::read_to_string(&self.config_path) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Io(e)),
        };

        // Cheap, always performed before any edit
        if original.is_some() {
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            let backup_path = self
                .config_path
                .with_extension(format!("{}.bak", stamp));
            fs::copy(&self.config_path, &backup_path)?;
            debug!("Backed up {} to {}", self.config_path.display(), backup_path.display());
        }

        let content = original.unwrap_or_default();
        let mut set = KernelParameterSet::new();
        let mut cmdline_idx: Option<usize> = None;
        let mut lines: Vec<String> = Vec::new();

        for line in content.lines() {
            if cmdline_idx.is_none()
                && let Some(caps) = cmdline_re().captures(line)
            {
                let value = unquote(caps.get(1).map_or("", |m| m.as_str()));
                set = KernelParameterSet::parse(&value);
                cmdline_idx = Some(lines.len());
                lines.push(String::new());
            } else {
                lines.push(line.to_string());
            }
        }

        op(&mut set);
        let new_line = format!("{}=\"{}\"", CMDLINE_KEY, set.to_cmdline());

        match cmdline_idx {
            Some(idx) => lines[idx] = new_line,
            None => lines.push(new_line),
        }

        self.write_config(&lines)?;
        info!("{} now: {}", CMDLINE_KEY, set.to_cmdline());

        self.regenerate()
    }

    /// Atomic rewrite: write to a temp file in the same directory, carry
    /// over the original mode, then rename over the target.
    fn write_config(&self, lines: &[String]) -> Result<()> {
        let parent = self
            .config_path
            .parent()
            .ok_or_else(|| Error::InvalidPath(self.config_path.display().to_string()))?;
        fs::create_dir_all(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        for line in lines {
            writeln!(tmp, "{}", line)?;
        }
        tmp.flush()?;

        if let Ok(meta) = fs::metadata(&self.config_path) {
            fs::set_permissions(tmp.path(), meta.permissions())?;
        }

        tmp.persist(&self.config_path)
            .map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Compile the edited file into the actual boot menu. The output path
    /// is the first existing known location for this bootloader family.
    fn regenerate(&self) -> Result<bool> {
        let generator = match &self.generator_override {
            Some(path) => path.clone(),
            None => which::which("grub2-mkconfig")
                .or_else(|_| which::which("grub-mkconfig"))
                .map_err(|_| {
                    Error::CommandFailed(
                        "no boot-configuration generator found (tried grub2-mkconfig, grub-mkconfig)"
                            .to_string(),
                    )
                })?,
        };

        let output = self
            .boot_cfg_candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| {
                Error::CommandFailed(format!(
                    "no compiled boot menu found at any known location ({})",
                    self.boot_cfg_candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;

        let result = run_tool(
            &generator.to_string_lossy(),
            &["-o", &output.to_string_lossy()],
            self.tunables.generator_timeout(),
        )?;

        if result.success() {
            info!("Regenerated boot menu at {}", output.display());
            Ok(true)
        } else {
            warn!(
                "Boot menu regeneration failed (exit {:?}, timed_out={}); the edited {} is inert until regenerated",
                result.exit_code,
                result.timed_out,
                self.config_path.display()
            );
            Ok(false)
        }
    }
}

impl KernelParamManager for GrubKargsBackend {
    fn get_current_params(&self) -> KernelParameterSet {
        self.read_cmdline_value()
            .map(|v| KernelParameterSet::parse(&v))
            .unwrap_or_default()
    }

    /// No staging exists for this backend; configured equals effective.
    fn get_pending_params(&self) -> Option<KernelParameterSet> {
        None
    }

    fn append_params(&self, tokens: &[KargToken]) -> Result<bool> {
        if tokens.is_empty() {
            return Ok(true);
        }
        self.mutate(|set| {
            for token in tokens {
                set.apply(token.clone());
            }
        })
    }

    fn remove_params(&self, tokens: &[KargToken]) -> Result<bool> {
        let current = self.get_current_params();
        if !tokens.iter().any(|t| current.contains_key(t.key())) {
            debug!("No targeted kernel arguments present; nothing to remove");
            return Ok(true);
        }
        self.mutate(|set| {
            for token in tokens {
                set.remove_key(token.key());
            }
        })
    }

    /// One file rewrite and one regeneration for the whole swap.
    fn replace_param(&self, old: &KargToken, new: &KargToken) -> Result<bool> {
        self.mutate(|set| {
            set.remove_key(old.key());
            set.apply(new.clone());
        })
    }
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .to_string()
}
