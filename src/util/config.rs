//! Configuration file support for bindery.
//!
//! bindery reads two configuration files:
//! - Global: `~/.bindery/config.toml` - User-wide defaults
//! - Project: `<bindings-dir>/bindery.toml` (or `--config <path>`) - Overrides
//!
//! Project config takes precedence over global config. Every setting is
//! optional; anything left unset falls back to the built-in PyRosetta profile
//! in [`crate::core::defaults`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// File name of the project config inside the bindings directory.
pub const PROJECT_CONFIG_NAME: &str = "bindery.toml";

/// bindery configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Binding generator settings
    pub generator: GeneratorConfig,

    /// Header selection
    pub filter: FilterConfig,

    /// Library ordering
    pub tiers: TierConfig,

    /// Tool checkouts
    pub tools: ToolsConfig,

    /// Network settings
    pub net: NetConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Default number of parallel jobs (None = auto-detect)
    pub jobs: Option<usize>,

    /// Compiler name (clang, gcc, ...)
    pub compiler: Option<String>,

    /// Default CMake build type
    pub build_type: Option<String>,

    /// Name of the binding project (`build/<name>/...`)
    pub binding_name: Option<String>,

    /// Python version the bindings target, e.g. "3.9"
    pub python_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Path to a prebuilt generator; skips building one
    pub binder: Option<PathBuf>,

    /// Generator policy file, relative to the bindings directory
    pub config_file: Option<String>,

    pub root_module: Option<String>,

    /// Language standard (`c++11`)
    pub std: Option<String>,

    /// Commands run in the source root before headers are collected
    pub prepare: Option<Vec<String>>,

    /// System include directories, relative to the source root
    pub system_include_dirs: Option<Vec<String>>,

    /// Extra user include directories, relative to the source root
    pub include_dirs: Option<Vec<String>>,

    /// Extra preprocessor defines, added to the built-in set
    pub defines: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub header_roots: Option<Vec<String>>,
    pub banned_dirs: Option<Vec<String>>,
    pub banned_headers: Option<Vec<String>>,
    pub generated_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierConfig {
    /// Library groups in dependency order
    pub groups: Option<Vec<String>>,

    /// Group whose libraries are ordered by shard
    pub sharded: Option<String>,

    /// Descriptors under `src/` that are skipped
    pub exclude: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub llvm_url: Option<String>,
    pub clang_url: Option<String>,
    pub clang_extra_url: Option<String>,

    /// LLVM branch checked out in all three repositories
    pub llvm_release: Option<String>,

    pub pybind11_url: Option<String>,
    pub pybind11_revision: Option<String>,

    /// Generator sources, relative to the source root
    pub generator_source: Option<PathBuf>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    /// Attempts for clones and fetches (None = retry until cancelled)
    pub retry_attempts: Option<u32>,

    /// Pause between attempts, in seconds
    pub retry_delay_secs: Option<u64>,
}

/// Overwrite `dst` with `src` when `src` is set.
fn merge_opt<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let Config {
            build,
            generator,
            filter,
            tiers,
            tools,
            net,
        } = other;

        // Build settings
        merge_opt(&mut self.build.jobs, build.jobs);
        merge_opt(&mut self.build.compiler, build.compiler);
        merge_opt(&mut self.build.build_type, build.build_type);
        merge_opt(&mut self.build.binding_name, build.binding_name);
        merge_opt(&mut self.build.python_version, build.python_version);

        // Generator settings
        merge_opt(&mut self.generator.binder, generator.binder);
        merge_opt(&mut self.generator.config_file, generator.config_file);
        merge_opt(&mut self.generator.root_module, generator.root_module);
        merge_opt(&mut self.generator.std, generator.std);
        merge_opt(&mut self.generator.prepare, generator.prepare);
        merge_opt(
            &mut self.generator.system_include_dirs,
            generator.system_include_dirs,
        );
        merge_opt(&mut self.generator.include_dirs, generator.include_dirs);
        merge_opt(&mut self.generator.defines, generator.defines);

        // Header filter
        merge_opt(&mut self.filter.header_roots, filter.header_roots);
        merge_opt(&mut self.filter.banned_dirs, filter.banned_dirs);
        merge_opt(&mut self.filter.banned_headers, filter.banned_headers);
        merge_opt(&mut self.filter.generated_patterns, filter.generated_patterns);

        // Tiers
        merge_opt(&mut self.tiers.groups, tiers.groups);
        merge_opt(&mut self.tiers.sharded, tiers.sharded);
        merge_opt(&mut self.tiers.exclude, tiers.exclude);

        // Tools
        merge_opt(&mut self.tools.llvm_url, tools.llvm_url);
        merge_opt(&mut self.tools.clang_url, tools.clang_url);
        merge_opt(&mut self.tools.clang_extra_url, tools.clang_extra_url);
        merge_opt(&mut self.tools.llvm_release, tools.llvm_release);
        merge_opt(&mut self.tools.pybind11_url, tools.pybind11_url);
        merge_opt(&mut self.tools.pybind11_revision, tools.pybind11_revision);
        merge_opt(&mut self.tools.generator_source, tools.generator_source);

        // Net settings
        merge_opt(&mut self.net.retry_attempts, net.retry_attempts);
        merge_opt(&mut self.net.retry_delay_secs, net.retry_delay_secs);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`bindery.toml` or `--config`)
/// 2. Global config (~/.bindery/config.toml)
/// 3. Defaults
///
/// A project config must parse whenever it exists, and must exist when given
/// explicitly. A malformed global config only produces a warning.
pub fn load_config(global_path: Option<&Path>, project_path: &Path, explicit: bool) -> Result<Config> {
    let mut config = Config::default();

    // Load global config first
    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    // Project config overrides global
    if explicit || project_path.exists() {
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}

/// Get the global bindery config directory (~/.bindery).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".bindery"))
}

/// Get the global config path (~/.bindery/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path inside the bindings directory.
pub fn project_config_path(bindings_dir: &Path) -> PathBuf {
    bindings_dir.join(PROJECT_CONFIG_NAME)
}
