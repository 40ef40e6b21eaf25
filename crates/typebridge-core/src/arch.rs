//! Target architecture configuration.
//!
//! [`ArchConfig`] carries every per-target constant the translation engine
//! needs: address and word widths, the convention names used by the
//! signature builder's fallback, the table of runtime helpers that receive an
//! injection marker, and how a signature refresh merges into an existing
//! prototype.
//!
//! # Example
//!
//! ```
//! use typebridge_core::{ArchConfig, RefreshMode};
//!
//! let arch = ArchConfig::x86()
//!     .with_inject_helper("_chkstk", "alloca_probe")
//!     .with_refresh_mode(RefreshMode::FullSignature);
//!
//! assert_eq!(arch.addr_size, 4);
//! assert_eq!(arch.inject_for("_chkstk"), Some("alloca_probe"));
//! ```

/// Convention name tried first when a descriptor declares none.
pub const FAST_CONVENTION: &str = "__fastcall";

/// Runtime helper that receives an injection marker by default.
pub const ALLOCA_PROBE: &str = "alloca_probe";

/// How a signature refresh merges into an existing prototype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshMode {
    /// Only parameter names change. Types, storage and flags are kept.
    #[default]
    NamesOnly,
    /// Types come from the derived signature; storage of existing slots is kept.
    FullSignature,
}

/// Per-target constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchConfig {
    /// Descriptive target name.
    pub name: String,
    /// Address width in bytes.
    pub addr_size: u32,
    /// Addressable unit size in bytes.
    pub word_size: u32,
    /// Convention used when the declared (or guessed) one is not registered.
    pub default_convention: String,
    /// Convention guessed when the descriptor declares none.
    pub fast_convention: String,
    /// Function name to injection handler name.
    pub inject_helpers: Vec<(String, String)>,
    /// Refresh merge behaviour.
    pub refresh_mode: RefreshMode,
}

impl ArchConfig {
    /// Create a configuration with the standard fast convention and the
    /// `alloca_probe` injection.
    pub fn new(
        name: impl Into<String>,
        addr_size: u32,
        word_size: u32,
        default_convention: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            addr_size,
            word_size,
            default_convention: default_convention.into(),
            fast_convention: FAST_CONVENTION.to_string(),
            inject_helpers: vec![(ALLOCA_PROBE.to_string(), ALLOCA_PROBE.to_string())],
            refresh_mode: RefreshMode::default(),
        }
    }

    /// 32-bit little-endian x86.
    pub fn x86() -> Self {
        Self::new("x86:LE:32:default", 4, 1, "__cdecl")
    }

    /// 64-bit little-endian x86 (Windows ABI).
    pub fn x86_64() -> Self {
        Self::new("x86:LE:64:default", 8, 1, "__fastcall")
    }

    // === Builder Methods ===

    /// Set the address width.
    pub fn with_addr_size(mut self, addr_size: u32) -> Self {
        self.addr_size = addr_size;
        self
    }

    /// Set the word width.
    pub fn with_word_size(mut self, word_size: u32) -> Self {
        self.word_size = word_size;
        self
    }

    /// Set the default convention name.
    pub fn with_default_convention(mut self, name: impl Into<String>) -> Self {
        self.default_convention = name.into();
        self
    }

    /// Set the convention guessed for undeclared conventions.
    pub fn with_fast_convention(mut self, name: impl Into<String>) -> Self {
        self.fast_convention = name.into();
        self
    }

    /// Add (or replace) an injection for a function name.
    pub fn with_inject_helper(
        mut self,
        function: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        let function = function.into();
        let handler = handler.into();
        match self.inject_helpers.iter_mut().find(|(f, _)| *f == function) {
            Some(entry) => entry.1 = handler,
            None => self.inject_helpers.push((function, handler)),
        }
        self
    }

    /// Remove every injection.
    pub fn without_inject_helpers(mut self) -> Self {
        self.inject_helpers.clear();
        self
    }

    /// Set the refresh merge behaviour.
    pub fn with_refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.refresh_mode = mode;
        self
    }

    /// Injection handler for a function name.
    pub fn inject_for(&self, function: &str) -> Option<&str> {
        self.inject_helpers
            .iter()
            .find(|(f, _)| f == function)
            .map(|(_, handler)| handler.as_str())
    }
}

impl Default for ArchConfig {
    fn default() -> Self {
        Self::x86_64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let x86 = ArchConfig::x86();
        assert_eq!((x86.addr_size, x86.word_size), (4, 1));
        assert_eq!(x86.default_convention, "__cdecl");

        let x64 = ArchConfig::default();
        assert_eq!(x64.addr_size, 8);
        assert_eq!(x64.default_convention, "__fastcall");
        assert_eq!(x64.fast_convention, FAST_CONVENTION);
        assert_eq!(x64.refresh_mode, RefreshMode::NamesOnly);
    }

    #[test]
    fn alloca_probe_injected_by_default() {
        let arch = ArchConfig::x86();
        assert_eq!(arch.inject_for("alloca_probe"), Some("alloca_probe"));
        assert_eq!(arch.inject_for("memcpy"), None);
    }

    #[test]
    fn inject_helper_replaces_existing() {
        let arch = ArchConfig::x86().with_inject_helper("alloca_probe", "chkstk");
        assert_eq!(arch.inject_helpers.len(), 1);
        assert_eq!(arch.inject_for("alloca_probe"), Some("chkstk"));
    }

    #[test]
    fn without_inject_helpers_clears_table() {
        let arch = ArchConfig::x86_64().without_inject_helpers();
        assert_eq!(arch.inject_for("alloca_probe"), None);
    }
}
