// src/kargs/mod.rs

//! Kernel boot argument model and backend contract
//!
//! A kernel argument ("karg") is either a bare flag (`quiet`) or a
//! `key=value` pair. Within any set produced by this crate no two tokens
//! share a key; bare flags are keyed by their full text. Applying the same
//! token twice, or an updated value for an existing key, must converge to
//! exactly one entry per key — that dedup rule is the core correctness
//! property of every mutating call.

mod grub;
mod rpm_ostree;

pub use grub::GrubKargsBackend;
pub use rpm_ostree::OstreeKargsBackend;

use crate::error::Result;
use std::fmt;

/// One kernel boot argument token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KargToken {
    raw: String,
}

impl KargToken {
    /// Build a token from raw text. Returns `None` when the key side is
    /// empty or contains whitespace — that can never be a single token.
    /// Values may contain spaces; they were quoted on the command line
    /// and are re-quoted on render.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let key = raw.split_once('=').map_or(raw, |(k, _)| k);
        if key.is_empty() || key.chars().any(char::is_whitespace) {
            return None;
        }
        Some(Self {
            raw: raw.to_string(),
        })
    }

    /// The dedup key: text before the first `=`, or the whole token for a
    /// bare flag.
    pub fn key(&self) -> &str {
        self.raw.split_once('=').map_or(self.raw.as_str(), |(k, _)| k)
    }

    pub fn value(&self) -> Option<&str> {
        self.raw.split_once('=').map(|(_, v)| v)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for KargToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// An ordered, key-unique collection of kernel argument tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelParameterSet {
    tokens: Vec<KargToken>,
}

impl KernelParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a full command line. Double quotes group values containing
    /// spaces (`acpi_osi="Windows 2015"`); later duplicates of a key win.
    pub fn parse(line: &str) -> Self {
        let mut set = Self::new();
        for piece in split_cmdline(line) {
            if let Some(token) = KargToken::parse(&piece) {
                set.apply(token);
            }
        }
        set
    }

    pub fn tokens(&self) -> &[KargToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.tokens.iter().any(|t| t.key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&KargToken> {
        self.tokens.iter().find(|t| t.key() == key)
    }

    /// Insert a token, first stripping any existing token with the same
    /// key. Last write wins; order of unrelated tokens is preserved.
    pub fn apply(&mut self, token: KargToken) {
        self.tokens.retain(|t| t.key() != token.key());
        self.tokens.push(token);
    }

    /// Remove by key. Returns whether anything was removed; removing an
    /// absent key is a no-op, not an error.
    pub fn remove_key(&mut self, key: &str) -> bool {
        let before = self.tokens.len();
        self.tokens.retain(|t| t.key() != key);
        self.tokens.len() != before
    }

    /// Render back to a command line, re-quoting values with spaces.
    pub fn to_cmdline(&self) -> String {
        self.tokens
            .iter()
            .map(|t| quote_token(t.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split a kernel command line into raw token strings, honoring double
/// quotes inside values.
fn split_cmdline(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn quote_token(raw: &str) -> String {
    match raw.split_once('=') {
        Some((key, value)) if value.contains(' ') => format!("{}=\"{}\"", key, value),
        _ => raw.to_string(),
    }
}

/// Backend contract for reading and mutating persisted kernel arguments.
///
/// Mutating methods return `Ok(true)` on success, `Ok(false)` when the
/// underlying tool ran and reported failure, and a typed error for
/// unrecoverable conditions (stuck transaction daemon, partial batch
/// apply). `get_current_params` never fails.
pub trait KernelParamManager {
    /// The effective set — what the running kernel booted with.
    fn get_current_params(&self) -> KernelParameterSet;

    /// The staged set that will apply at next boot, or `None` when it does
    /// not differ from the effective set. Bootloader-file backends always
    /// return `None`: there is no separate staging there.
    fn get_pending_params(&self) -> Option<KernelParameterSet>;

    /// For each token, strip any existing token sharing its key, then add
    /// it. Converges: applying the same set twice is idempotent.
    fn append_params(&self, tokens: &[KargToken]) -> Result<bool>;

    /// Remove tokens by key. Absent keys are a no-op, not an error.
    fn remove_params(&self, tokens: &[KargToken]) -> Result<bool>;

    /// Swap one token for another: remove by the old token's key, then
    /// append the new token.
    fn replace_param(&self, old: &KargToken, new: &KargToken) -> Result<bool> {
        let removed = self.remove_params(std::slice::from_ref(old))?;
        let appended = self.append_params(std::slice::from_ref(new))?;
        Ok(removed && appended)
    }

    /// Kernel arguments never take effect without a reboot.
    fn requires_reboot(&self) -> bool {
        true
    }
}
