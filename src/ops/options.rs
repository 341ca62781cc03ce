//! Resolved settings for one binding build.
//!
//! [`BindingOptions`] is assembled once from built-in defaults, the merged
//! config files and command-line overrides, then passed by reference to every
//! phase. Nothing reads settings from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::builder::cmake::ProjectSettings;
use crate::builder::util::{detect_tool_version, parse_python_version};
use crate::core::defaults;
use crate::core::{
    BuildRoot, BuildRootKey, BuildType, CompilerFamily, HeaderFilter, Platform, RuntimeVersion,
    SourceTree, TierOrder,
};
use crate::util::config::Config;
use crate::util::process::{find_executable, RetryPolicy, DEFAULT_RETRY_DELAY};

/// Settings given on the command line; they win over the config files.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub jobs: Option<usize>,
    pub compiler: Option<String>,
    pub build_type: Option<BuildType>,
    pub binder: Option<PathBuf>,
    pub binder_debug: bool,
    pub cross_compile: bool,
    pub pybind11: Option<PathBuf>,
    pub annotate_includes: bool,
}

/// How the generator is obtained and invoked.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Prebuilt generator; built from source when unset
    pub binder: Option<PathBuf>,
    /// Build the generator in debug mode
    pub debug: bool,
    /// Absolute path of the generator policy file
    pub config_file: PathBuf,
    pub root_module: String,
    pub std: String,
    pub annotate_includes: bool,
    /// Shell commands run in the source root before generation
    pub prepare: Vec<String>,
    /// Relative to the source root
    pub system_include_dirs: Vec<String>,
    /// Relative to the source root, after `src` and `src/platform/<platform>`
    pub include_dirs: Vec<String>,
    /// Added to the built-in defines
    pub extra_defines: Vec<String>,
}

/// Which headers go into the include manifest.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    pub header_roots: Vec<String>,
    pub banned_dirs: Vec<String>,
    pub banned_headers: Vec<String>,
    pub generated_patterns: Vec<String>,
}

impl FilterOptions {
    pub fn header_filter(&self) -> Result<HeaderFilter> {
        HeaderFilter::new(
            &self.banned_dirs,
            &self.banned_headers,
            &self.generated_patterns,
        )
    }
}

/// Where tool sources come from.
#[derive(Debug, Clone)]
pub struct ToolOptions {
    pub generator_name: String,
    /// Generator sources, linked into the clang tools tree
    pub generator_source: PathBuf,
    pub llvm_url: String,
    pub clang_url: String,
    pub clang_extra_url: String,
    pub llvm_release: String,
    pub pybind11_url: String,
    pub pybind11_revision: String,
}

/// Every setting of one build.
#[derive(Debug, Clone)]
pub struct BindingOptions {
    pub tree: SourceTree,
    pub binding_name: String,
    pub platform: Platform,
    pub cross_compile: bool,
    pub compiler: String,
    pub build_type: BuildType,
    pub runtime: RuntimeVersion,
    pub jobs: usize,
    pub generator: GeneratorOptions,
    pub filter: FilterOptions,
    pub tiers: TierOrder,
    /// Primary descriptors that are not libraries
    pub exclude: Vec<String>,
    pub tools: ToolOptions,
    /// Retry behavior for network operations
    pub retry: RetryPolicy,
    /// pybind11 include directory; fetched when unset
    pub pybind11: Option<PathBuf>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl BindingOptions {
    /// Combine defaults, config and overrides. `runtime` must already be resolved
    /// (see [`resolve_runtime`]).
    pub fn resolve(
        tree: SourceTree,
        config: &Config,
        overrides: Overrides,
        runtime: RuntimeVersion,
    ) -> Result<Self> {
        let build_type = match overrides.build_type {
            Some(t) => t,
            None => match config.build.build_type {
                Some(ref s) => s
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("invalid `build.build_type` in config")?,
                None => BuildType::default(),
            },
        };

        let jobs = overrides
            .jobs
            .or(config.build.jobs)
            .unwrap_or(1);

        let compiler = overrides
            .compiler
            .or_else(|| config.build.compiler.clone())
            .unwrap_or_else(|| defaults::COMPILER.to_string());

        let gen = &config.generator;
        let config_file = tree.bindings_dir().join(
            gen.config_file
                .as_deref()
                .unwrap_or(defaults::GENERATOR_CONFIG),
        );

        let generator = GeneratorOptions {
            binder: overrides.binder.or_else(|| gen.binder.clone()),
            debug: overrides.binder_debug,
            config_file,
            root_module: gen
                .root_module
                .clone()
                .unwrap_or_else(|| defaults::ROOT_MODULE.to_string()),
            std: gen
                .std
                .clone()
                .unwrap_or_else(|| defaults::CXX_STANDARD.to_string()),
            annotate_includes: overrides.annotate_includes,
            prepare: gen
                .prepare
                .clone()
                .unwrap_or_else(|| strings(defaults::PREPARE_COMMANDS)),
            system_include_dirs: gen
                .system_include_dirs
                .clone()
                .unwrap_or_else(|| strings(defaults::SYSTEM_INCLUDE_DIRS)),
            include_dirs: gen.include_dirs.clone().unwrap_or_default(),
            extra_defines: gen.defines.clone().unwrap_or_default(),
        };

        let f = &config.filter;
        let filter = FilterOptions {
            header_roots: f
                .header_roots
                .clone()
                .unwrap_or_else(|| strings(defaults::HEADER_ROOTS)),
            banned_dirs: f
                .banned_dirs
                .clone()
                .unwrap_or_else(|| strings(defaults::BANNED_DIRS)),
            banned_headers: f
                .banned_headers
                .clone()
                .unwrap_or_else(|| strings(defaults::BANNED_HEADERS)),
            generated_patterns: f
                .generated_patterns
                .clone()
                .unwrap_or_else(|| strings(defaults::GENERATED_PATTERNS)),
        };
        // Catch bad patterns before any phase runs.
        filter.header_filter()?;

        let tiers = TierOrder::new(
            config
                .tiers
                .groups
                .clone()
                .unwrap_or_else(|| strings(defaults::TIER_GROUPS)),
            Some(
                config
                    .tiers
                    .sharded
                    .clone()
                    .unwrap_or_else(|| defaults::SHARDED_GROUP.to_string()),
            ),
        );

        let t = &config.tools;
        let tools = ToolOptions {
            generator_name: defaults::GENERATOR_NAME.to_string(),
            generator_source: match t.generator_source {
                Some(ref p) => tree.root().join(p),
                None => tree.bindings_dir().join(defaults::GENERATOR_NAME),
            },
            llvm_url: t.llvm_url.clone().unwrap_or_else(|| defaults::LLVM_URL.to_string()),
            clang_url: t.clang_url.clone().unwrap_or_else(|| defaults::CLANG_URL.to_string()),
            clang_extra_url: t
                .clang_extra_url
                .clone()
                .unwrap_or_else(|| defaults::CLANG_EXTRA_URL.to_string()),
            llvm_release: t
                .llvm_release
                .clone()
                .unwrap_or_else(|| defaults::LLVM_RELEASE.to_string()),
            pybind11_url: t
                .pybind11_url
                .clone()
                .unwrap_or_else(|| defaults::PYBIND11_URL.to_string()),
            pybind11_revision: t
                .pybind11_revision
                .clone()
                .unwrap_or_else(|| defaults::PYBIND11_REVISION.to_string()),
        };

        let delay = config
            .net
            .retry_delay_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        let retry = match config.net.retry_attempts {
            Some(n) => RetryPolicy::bounded(n, delay),
            None => RetryPolicy::forever(delay),
        };

        Ok(BindingOptions {
            tree,
            binding_name: config
                .build
                .binding_name
                .clone()
                .unwrap_or_else(|| defaults::BINDING_NAME.to_string()),
            platform: Platform::current(),
            cross_compile: overrides.cross_compile,
            compiler,
            build_type,
            runtime,
            jobs,
            generator,
            filter,
            tiers,
            exclude: config
                .tiers
                .exclude
                .clone()
                .unwrap_or_else(|| strings(defaults::EXCLUDED_LIBRARIES)),
            tools,
            retry,
            pybind11: overrides.pybind11,
        })
    }

    pub fn compiler_family(&self) -> CompilerFamily {
        CompilerFamily::from_compiler(&self.compiler)
    }

    pub fn build_root(&self) -> BuildRoot {
        BuildRoot::new(
            self.tree.root(),
            &BuildRootKey {
                binding_name: self.binding_name.clone(),
                platform: self.platform,
                cross_compile: self.cross_compile,
                compiler: self.compiler_family(),
                runtime: self.runtime,
                build_type: self.build_type,
            },
        )
    }

    /// Global preprocessor defines for this platform and build type.
    pub fn defines(&self) -> Vec<String> {
        let mut defines = strings(defaults::DEFINES);
        if self.platform == Platform::MacOs {
            defines.push("UNUSUAL_ALLOCATOR_DECLARATION".to_string());
        }
        if self.build_type.is_optimized_without_asserts() {
            defines.push("NDEBUG".to_string());
        }
        defines.extend(self.generator.extra_defines.iter().cloned());
        defines
    }

    /// Absolute system include directories, without pybind11.
    pub fn system_include_dirs(&self) -> Vec<PathBuf> {
        self.generator
            .system_include_dirs
            .iter()
            .map(|d| self.tree.root().join(d))
            .collect()
    }

    /// Absolute user include directories.
    pub fn include_dirs(&self) -> Vec<PathBuf> {
        let platform_dir = Path::new("src").join("platform").join(self.platform.as_str());
        [PathBuf::from("src"), platform_dir]
            .into_iter()
            .chain(self.generator.include_dirs.iter().map(PathBuf::from))
            .map(|d| self.tree.root().join(d))
            .collect()
    }

    /// Settings of the top-level CMake project, given the pybind11 include directory.
    pub fn project_settings(&self, pybind11_include: &Path) -> ProjectSettings {
        let mut system_include_dirs = self.system_include_dirs();
        system_include_dirs.push(pybind11_include.to_path_buf());

        ProjectSettings {
            system_include_dirs,
            include_dirs: self.include_dirs(),
            defines: self.defines(),
        }
    }
}

/// Pick the target Python version: command line, then config, then the `python3` on PATH.
pub fn resolve_runtime(
    cli: Option<RuntimeVersion>,
    config: &Config,
) -> Result<RuntimeVersion> {
    if let Some(v) = cli {
        return Ok(v);
    }
    if let Some(ref s) = config.build.python_version {
        return s
            .parse()
            .map_err(anyhow::Error::msg)
            .context("invalid `build.python_version` in config");
    }
    detect_python_version()
}

/// Ask the Python interpreter on PATH for its version.
pub fn detect_python_version() -> Result<RuntimeVersion> {
    let python = find_executable("python3")
        .or_else(|| find_executable("python"))
        .context("no Python interpreter found on PATH; pass --python-version")?;

    let version = detect_tool_version(&python, parse_python_version)?;
    tracing::debug!("Detected Python {} at {}", version, python.display());
    Ok(version.into())
}
