//! Build root layout.
//!
//! Every combination of platform, compiler family, Python version and build
//! type gets its own tree:
//!
//! ```text
//! <source-root>/build/<binding>/<platform>/<compiler>/python-<X.Y>/<type>/
//!     source/   generated bindings, CMake fragments, links to src/ and external/
//!     build/    CMake/Ninja output
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Result;

use crate::util::fs::ensure_dir;

/// Host platform as seen by the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Cygwin,
    Windows,
    Unknown,
}

impl Platform {
    /// Platform this binary is running on.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "cygwin" => Platform::Cygwin,
            "windows" => Platform::Windows,
            _ => Platform::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Cygwin => "cygwin",
            Platform::Windows => "windows",
            Platform::Unknown => "unknown",
        }
    }

    /// Whether the platform supports the symlinks the build relies on.
    pub fn supports_symlinks(&self) -> bool {
        !matches!(self, Platform::Windows | Platform::Cygwin)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler family guessed from the configured compiler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    Clang,
    Gcc,
    Cl,
    Unknown,
}

impl CompilerFamily {
    /// Guess the family from a compiler name or path (`clang-3.8`, `/usr/bin/gcc`, `cl`).
    pub fn from_compiler(compiler: &str) -> Self {
        if compiler.contains("clang") {
            CompilerFamily::Clang
        } else if compiler.contains("gcc") {
            CompilerFamily::Gcc
        } else if compiler.contains("cl") {
            CompilerFamily::Cl
        } else {
            CompilerFamily::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompilerFamily::Clang => "clang",
            CompilerFamily::Gcc => "gcc",
            CompilerFamily::Cl => "cl",
            CompilerFamily::Unknown => "unknown",
        }
    }

    /// C and C++ driver names used to pin the compiler for CMake.
    pub fn drivers(&self) -> (&'static str, &'static str) {
        match self {
            CompilerFamily::Clang => ("clang", "clang++"),
            _ => ("gcc", "g++"),
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CMake build type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildType {
    #[default]
    Release,
    Debug,
    MinSizeRel,
    RelWithDebInfo,
}

impl BuildType {
    pub const ALL: [BuildType; 4] = [
        BuildType::Release,
        BuildType::Debug,
        BuildType::MinSizeRel,
        BuildType::RelWithDebInfo,
    ];

    /// Name as CMake spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Release => "Release",
            BuildType::Debug => "Debug",
            BuildType::MinSizeRel => "MinSizeRel",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
        }
    }

    /// Whether assertions are compiled out (`NDEBUG`).
    pub fn is_optimized_without_asserts(&self) -> bool {
        matches!(self, BuildType::Release | BuildType::MinSizeRel)
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "invalid build type '{}'; expected one of: Release, Debug, MinSizeRel, RelWithDebInfo",
                    s
                )
            })
    }
}

/// `major.minor` of the Python the bindings are built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeVersion {
    pub major: u64,
    pub minor: u64,
}

impl RuntimeVersion {
    pub fn new(major: u64, minor: u64) -> Self {
        RuntimeVersion { major, minor }
    }

    /// Directory segment of the build root (`python-3.9`).
    pub fn tag(&self) -> String {
        format!("python-{}", self)
    }
}

impl From<semver::Version> for RuntimeVersion {
    fn from(v: semver::Version) -> Self {
        RuntimeVersion::new(v.major, v.minor)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for RuntimeVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::builder::util::parse_version_flexible(s)
            .map(RuntimeVersion::from)
            .ok_or_else(|| format!("invalid Python version '{}'; expected e.g. 3.9", s))
    }
}

/// Everything the build root path depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRootKey {
    pub binding_name: String,
    pub platform: Platform,
    pub cross_compile: bool,
    pub compiler: CompilerFamily,
    pub runtime: RuntimeVersion,
    pub build_type: BuildType,
}

/// Build root for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRoot {
    path: PathBuf,
}

impl BuildRoot {
    /// Compute the build root below `source_root` without touching the filesystem.
    pub fn new(source_root: &Path, key: &BuildRootKey) -> Self {
        let platform = if key.cross_compile {
            "cross_compile"
        } else {
            key.platform.as_str()
        };

        let path = source_root
            .join("build")
            .join(&key.binding_name)
            .join(platform)
            .join(key.compiler.as_str())
            .join(key.runtime.tag())
            .join(key.build_type.as_str().to_lowercase());

        BuildRoot { path }
    }

    /// Create the `source` and `build` directories if they are missing.
    pub fn create(&self) -> Result<()> {
        ensure_dir(&self.source_dir())?;
        ensure_dir(&self.build_dir())?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where generated sources and CMake files go.
    pub fn source_dir(&self) -> PathBuf {
        self.path.join("source")
    }

    /// Where CMake and Ninja run.
    pub fn build_dir(&self) -> PathBuf {
        self.path.join("build")
    }
}
