//! Library units and their build order.
//!
//! Each descriptor compiles into one [`LibraryUnit`]: an object library whose
//! source list is the descriptor's entries (extension defaulted) plus every
//! header found in the listed directories. Primary units are ordered by
//! [`TierOrder`]; external units follow in the order they were given.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::descriptor::{DescriptorKind, SourceDescriptor};

/// File extensions treated as dependency-only headers.
const HEADER_EXTENSIONS: &[&str] = &[".hh", ".h"];

/// Error building the library set.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library `{name}` does not belong to any known group (known groups: {known})")]
    UnknownGroup { name: String, known: String },

    #[error("library `{name}` is defined more than once")]
    Duplicate { name: String },

    #[error("failed to scan {} for headers of library `{name}`", path.display())]
    ScanDir {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One object library of the generated build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryUnit {
    /// Target name, taken from the descriptor file name
    pub name: String,
    pub kind: DescriptorKind,
    /// Directory the source paths are relative to
    pub base: PathBuf,
    /// Relative source paths, sorted and unique
    pub sources: Vec<String>,
    pub defines: Vec<String>,
}

impl LibraryUnit {
    /// Compile a descriptor into a unit, scanning its directories under `base` for headers.
    pub fn compile(
        name: &str,
        kind: DescriptorKind,
        descriptor: &SourceDescriptor,
        base: &Path,
    ) -> Result<Self, LibraryError> {
        let mut headers = Vec::new();
        for dir in descriptor.sources.keys() {
            let dir_path = base.join(dir);
            for header in scan_headers(&dir_path).map_err(|source| LibraryError::ScanDir {
                name: name.to_string(),
                path: dir_path.clone(),
                source,
            })? {
                headers.push(format!("{}/{}", dir, header));
            }
        }

        Ok(Self::assemble(name, kind, descriptor, base, headers))
    }

    /// Compile a built-in descriptor. Its source list is complete, so no
    /// directory is scanned and `base` need not exist yet.
    pub fn compile_listed(
        name: &str,
        kind: DescriptorKind,
        descriptor: &SourceDescriptor,
        base: &Path,
    ) -> Self {
        Self::assemble(name, kind, descriptor, base, Vec::new())
    }

    fn assemble(
        name: &str,
        kind: DescriptorKind,
        descriptor: &SourceDescriptor,
        base: &Path,
        mut sources: Vec<String>,
    ) -> Self {
        for (dir, entries) in &descriptor.sources {
            for entry in entries {
                sources.push(expand_entry(dir, entry, kind.default_extension()));
            }
        }

        sources.sort();
        sources.dedup();

        LibraryUnit {
            name: name.to_string(),
            kind,
            base: base.to_path_buf(),
            sources,
            defines: descriptor.defines.clone(),
        }
    }

    /// Absolute source paths, in order.
    pub fn resolved_sources(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.sources.iter().map(|s| self.base.join(s))
    }
}

/// Expand one descriptor entry into a path relative to the kind's base.
///
/// Entries that already carry an extension (`kernel.cu`) pass through.
pub fn expand_entry(dir: &str, entry: &str, default_extension: &str) -> String {
    let file_name = entry.rsplit('/').next().unwrap_or(entry);
    if file_name.contains('.') {
        format!("{}/{}", dir, entry)
    } else {
        format!("{}/{}.{}", dir, entry, default_extension)
    }
}

/// Header file names directly inside `dir`, sorted.
fn scan_headers(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut headers = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if HEADER_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                headers.push(name.to_string());
            }
        }
    }
    headers.sort();
    Ok(headers)
}

/// Sort key of a primary library.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TierKey {
    /// Position of the library's group in the tier list
    pub tier: usize,
    /// Second name component for libraries of the sharded group, empty otherwise
    pub shard: String,
    pub name: String,
}

/// Fixed dependency order over top-level library groups.
///
/// A library belongs to the first group its name starts with. Each group
/// may only depend on groups listed before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierOrder {
    groups: Vec<String>,
    sharded: Option<String>,
}

impl TierOrder {
    pub fn new(groups: Vec<String>, sharded: Option<String>) -> Self {
        TierOrder { groups, sharded }
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Compute the sort key for `name`.
    pub fn key(&self, name: &str) -> Result<TierKey, LibraryError> {
        let tier = self
            .groups
            .iter()
            .position(|g| name.starts_with(g.as_str()))
            .ok_or_else(|| LibraryError::UnknownGroup {
                name: name.to_string(),
                known: self.groups.join(", "),
            })?;

        let shard = match self.sharded {
            Some(ref group) if self.groups[tier] == *group => {
                name.split('.').nth(1).unwrap_or_default().to_string()
            }
            _ => String::new(),
        };

        Ok(TierKey {
            tier,
            shard,
            name: name.to_string(),
        })
    }

    /// Compare two library names by tier.
    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering, LibraryError> {
        Ok(self.key(a)?.cmp(&self.key(b)?))
    }
}

/// All units of one build, in emission order.
#[derive(Debug, Clone, Default)]
pub struct LibrarySet {
    units: Vec<LibraryUnit>,
}

impl LibrarySet {
    /// Order primary units by tier and append external units after them.
    pub fn assemble(
        primary: Vec<LibraryUnit>,
        external: Vec<LibraryUnit>,
        tiers: &TierOrder,
    ) -> Result<Self, LibraryError> {
        let mut keyed = primary
            .into_iter()
            .map(|unit| Ok((tiers.key(&unit.name)?, unit)))
            .collect::<Result<Vec<_>, LibraryError>>()?;
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));

        let units: Vec<_> = keyed
            .into_iter()
            .map(|(_, unit)| unit)
            .chain(external)
            .collect();

        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name.as_str()) {
                return Err(LibraryError::Duplicate {
                    name: unit.name.clone(),
                });
            }
        }

        Ok(LibrarySet { units })
    }

    pub fn units(&self) -> &[LibraryUnit] {
        &self.units
    }

    /// Unit names in emission order.
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
