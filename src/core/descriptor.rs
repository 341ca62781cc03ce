//! Per-library source descriptors.
//!
//! A descriptor is a small TOML document next to the library sources:
//!
//! ```toml
//! defines = ["SQLITE_THREADSAFE=0"]
//!
//! [sources]
//! "utility"    = ["exit", "string_util"]
//! "utility/io" = ["izstream", "kernel.cu"]
//! ```
//!
//! Only the two keys above are accepted; anything else is a parse error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::util::fs::glob_files;

/// Where a descriptor lives and how its library is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// A library of the main source tree (`src/<name>.src.settings`)
    Primary,
    /// A bundled third-party library (`external/<name>.external.settings`)
    External,
}

impl DescriptorKind {
    /// File-name suffix identifying descriptors of this kind.
    pub fn suffix(&self) -> &'static str {
        match self {
            DescriptorKind::Primary => ".src.settings",
            DescriptorKind::External => ".external.settings",
        }
    }

    /// Extension appended to source entries that have none.
    pub fn default_extension(&self) -> &'static str {
        "cc"
    }
}

/// Error loading a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("descriptor not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read descriptor: {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed descriptor {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Source list and preprocessor defines of one library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceDescriptor {
    /// Directory (relative to the kind's base) -> source entries
    pub sources: BTreeMap<String, Vec<String>>,

    /// Preprocessor define tokens (`NAME` or `NAME=value`)
    #[serde(default)]
    pub defines: Vec<String>,
}

impl SourceDescriptor {
    /// Parse descriptor text; `path` is only used for error messages.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, DescriptorError> {
        toml::from_str(contents).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the descriptor of library `name` from `dir`.
    pub fn load(dir: &Path, name: &str, kind: DescriptorKind) -> Result<Self, DescriptorError> {
        let path = descriptor_path(dir, name, kind);
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                DescriptorError::NotFound { path: path.clone() }
            } else {
                DescriptorError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        Self::parse(&path, &contents)
    }

    /// Build a descriptor in code.
    pub fn from_entries<'a>(
        sources: impl IntoIterator<Item = (&'a str, &'a [&'a str])>,
        defines: &[&str],
    ) -> Self {
        SourceDescriptor {
            sources: sources
                .into_iter()
                .map(|(dir, files)| {
                    (
                        dir.to_string(),
                        files.iter().map(|f| f.to_string()).collect(),
                    )
                })
                .collect(),
            defines: defines.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Path of the descriptor for library `name`.
pub fn descriptor_path(dir: &Path, name: &str, kind: DescriptorKind) -> PathBuf {
    dir.join(format!("{}{}", name, kind.suffix()))
}

/// List the library names with a descriptor of `kind` in `dir`, sorted.
pub fn discover(dir: &Path, kind: DescriptorKind, exclude: &[String]) -> anyhow::Result<Vec<String>> {
    let suffix = kind.suffix();
    let files = glob_files(dir, &[format!("*{}", suffix)])?;

    Ok(files
        .iter()
        .filter_map(|path| path.file_name()?.to_str()?.strip_suffix(suffix))
        .filter(|name| !name.is_empty() && !exclude.iter().any(|e| e.as_str() == *name))
        .map(str::to_string)
        .collect())
}

/// Third-party libraries that ship without a descriptor file.
pub fn builtin_external() -> Vec<(String, SourceDescriptor)> {
    const CPPDB_SOURCES: &[&str] = &[
        "atomic_counter.cpp",
        "conn_manager.cpp",
        "driver_manager.cpp",
        "frontend.cpp",
        "backend.cpp",
        "mutex.cpp",
        "pool.cpp",
        "shared_object.cpp",
        "sqlite3_backend.cpp",
        "utils.cpp",
    ];
    const CPPDB_DEFINES: &[&str] = &[
        "CPPDB_EXPORTS",
        "CPPDB_DISABLE_SHARED_OBJECT_LOADING",
        "CPPDB_DISABLE_THREAD_SAFETY",
        "CPPDB_WITH_SQLITE3",
        r#"CPPDB_LIBRARY_PREFIX=\"lib\""#,
        r#"CPPDB_LIBRARY_SUFFIX=\".dylib\""#,
        r#"CPPDB_SOVERSION=\"0\""#,
        "CPPDB_MAJOR=0",
        "CPPDB_MINOR=3",
        "CPPDB_PATCH=0",
        r#"CPPDB_VERSION=\"0.3.0\""#,
    ];

    const SQLITE_SOURCES: &[&str] = &["sqlite3.c"];

    vec![
        (
            "cppdb".to_string(),
            SourceDescriptor::from_entries([("dbio/cppdb", CPPDB_SOURCES)], CPPDB_DEFINES),
        ),
        (
            "sqlite3".to_string(),
            SourceDescriptor::from_entries(
                [("dbio/sqlite3", SQLITE_SOURCES)],
                &[
                    "SQLITE_DISABLE_LFS",
                    "SQLITE_OMIT_LOAD_EXTENSION",
                    "SQLITE_THREADSAFE=0",
                ],
            ),
        ),
    ]
}
