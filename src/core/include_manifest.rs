//! The aggregate include file handed to the binding generator.
//!
//! Every bindable header under the configured roots becomes one
//! `#include <relative/path.hh>` line. Forward-declaration headers, banned
//! directories, banned headers and generated option files are left out.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::util::fs::update_file;

/// File name of the aggregate include for `root_module` (`all_rosetta_includes.hh`).
pub fn manifest_file_name(root_module: &str) -> String {
    format!("all_{}_includes.hh", root_module)
}

const HEADER_SUFFIX: &str = ".hh";
const FORWARD_SUFFIX: &str = ".fwd.hh";

/// Rules deciding which headers are bound.
#[derive(Debug, Clone, Default)]
pub struct HeaderFilter {
    /// Directories relative to the source root, matched component-wise
    banned_dirs: Vec<PathBuf>,
    /// Headers relative to `src/`, matched exactly
    banned_headers: BTreeSet<String>,
    /// Glob patterns relative to `src/`
    generated: Vec<glob::Pattern>,
}

impl HeaderFilter {
    pub fn new(
        banned_dirs: &[String],
        banned_headers: &[String],
        generated_patterns: &[String],
    ) -> Result<Self> {
        let generated = generated_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).with_context(|| format!("invalid header pattern: {}", p))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(HeaderFilter {
            banned_dirs: banned_dirs.iter().map(PathBuf::from).collect(),
            banned_headers: banned_headers.iter().cloned().collect(),
            generated,
        })
    }

    /// Whether the header at `from_root` (relative to the source root, with
    /// `include` relative to `src/`) should be bound.
    pub fn accepts(&self, from_root: &Path, include: &str) -> bool {
        if !include.ends_with(HEADER_SUFFIX) || include.ends_with(FORWARD_SUFFIX) {
            return false;
        }
        if self.banned_dirs.iter().any(|dir| from_root.starts_with(dir)) {
            return false;
        }
        if self.banned_headers.contains(include) {
            return false;
        }
        !self.generated.iter().any(|p| p.matches(include))
    }
}

/// Sorted, de-duplicated set of include paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeManifest {
    includes: BTreeSet<String>,
}

impl IncludeManifest {
    /// Walk `roots` (relative to `src/`) under `source_root` and keep the headers `filter` accepts.
    pub fn collect(source_root: &Path, roots: &[String], filter: &HeaderFilter) -> Result<Self> {
        let src = source_root.join("src");
        let mut includes = BTreeSet::new();

        for root in roots {
            let dir = src.join(root);
            if !dir.is_dir() {
                tracing::debug!("Header root {} does not exist, skipping", dir.display());
                continue;
            }

            for entry in WalkDir::new(&dir).follow_links(true) {
                let entry =
                    entry.with_context(|| format!("failed to scan headers in {}", dir.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let rel = entry
                    .path()
                    .strip_prefix(&src)
                    .with_context(|| format!("header outside {}", src.display()))?;
                let include = to_include(rel);
                let from_root = Path::new("src").join(rel);

                if filter.accepts(&from_root, &include) {
                    includes.insert(include);
                }
            }
        }

        Ok(IncludeManifest { includes })
    }

    pub fn from_includes<I, S>(includes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        IncludeManifest {
            includes: includes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.includes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for include in &self.includes {
            out.push_str("#include <");
            out.push_str(include);
            out.push_str(">\n");
        }
        out
    }

    /// Write the manifest into `dir`, leaving an identical file untouched.
    pub fn write(&self, dir: &Path, root_module: &str) -> Result<PathBuf> {
        let path = dir.join(manifest_file_name(root_module));
        update_file(&path, &self.render())?;
        Ok(path)
    }
}

/// Forward-slash include path, regardless of host separators.
fn to_include(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
