//! Runtime configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration consumed by the application context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub loader: LoaderConfig,
    pub compiler: CompilerConfig,
    pub assertion: AssertionConfig,
}

/// Library loading switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Modules are inspected for declarations but never made invokable.
    pub reflection_only: bool,
    /// Defer loading of a module's compile-time references until asked.
    pub lazy_full_reflection: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            reflection_only: false,
            lazy_full_reflection: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Only precompiled scripts may run; the filesystem is never consulted.
    pub only_precompiled: bool,
    /// The process is a build-time compiler rather than a serving runtime.
    pub build_time: bool,
    /// Root that relative script paths are resolved against.
    pub source_root: PathBuf,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            only_precompiled: false,
            build_time: false,
            source_root: PathBuf::from("."),
        }
    }
}

/// `assert()` behaviour; copied into every script context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AssertionConfig {
    pub active: bool,
    /// Suppress error reporting while the assertion expression runs.
    pub quiet: bool,
    pub report_warning: bool,
    pub terminate: bool,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            active: true,
            quiet: false,
            report_warning: true,
            terminate: false,
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        toml::from_str(data).context("parsing runtime configuration")
    }

    /// Load configuration from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Load configuration from disk or fall back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Non-precompiled scripts may be read straight from the filesystem.
    pub fn allows_filesystem_scripts(&self) -> bool {
        !self.compiler.only_precompiled || self.compiler.build_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config = RuntimeConfig::from_toml_str("[assertion]\nquiet = true\n").expect("parse");
        assert!(config.assertion.quiet);
        assert!(config.assertion.active);
        assert!(config.loader.lazy_full_reflection);
        assert_eq!(config.compiler.source_root, PathBuf::from("."));
    }

    #[test]
    fn load_reads_file_and_missing_file_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("runtime.toml");
        assert_eq!(
            RuntimeConfig::load_or_default(&path).expect("defaults"),
            RuntimeConfig::default()
        );

        fs::write(&path, "[loader]\nreflection_only = true\n[compiler]\nonly_precompiled = true\n")
            .expect("write config");
        let config = RuntimeConfig::load(&path).expect("load");
        assert!(config.loader.reflection_only);
        assert!(!config.allows_filesystem_scripts());
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[loader\n").expect("write config");
        let err = RuntimeConfig::load(&path).expect_err("should fail");
        assert!(format!("{err}").contains("broken.toml"));
    }
}
