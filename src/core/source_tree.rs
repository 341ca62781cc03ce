//! Well-known locations inside a Rosetta source checkout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// A Rosetta source root (`main/source`) and its bindings directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    root: PathBuf,
    bindings: PathBuf,
}

impl SourceTree {
    /// `root` is the source root; `bindings` is relative to it.
    pub fn new(root: impl Into<PathBuf>, bindings: impl AsRef<Path>) -> Self {
        let root = root.into();
        let bindings = root.join(bindings);
        SourceTree { root, bindings }
    }

    /// Resolve `root` to an absolute path and check that it looks like a source root.
    pub fn discover(root: &Path, bindings: &Path) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("source root not found: {}", root.display()))?;

        let tree = SourceTree::new(root, bindings);
        if !tree.src_dir().is_dir() {
            anyhow::bail!(
                "{} does not look like a source root: missing src/ directory",
                tree.root.display()
            );
        }
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn external_dir(&self) -> PathBuf {
        self.root.join("external")
    }

    /// Directory holding the binding project's own files (templates, tests, demos).
    pub fn bindings_dir(&self) -> &Path {
        &self.bindings
    }

    /// Rosetta database, a sibling of the source root.
    pub fn database_dir(&self) -> PathBuf {
        match self.root.parent() {
            Some(parent) => parent.join("database"),
            None => self.root.join("..").join("database"),
        }
    }

    /// Tool checkouts (LLVM, pybind11) live here.
    pub fn prefix_dir(&self) -> PathBuf {
        self.root.join("build").join("prefix")
    }
}
