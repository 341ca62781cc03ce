//! Test fixtures for common test scenarios.
//!
//! [`SourceTreeFixture`] lays out a miniature version of the library source
//! tree (`src/`, `external/`, the bindings directory) on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Relative location of the bindings directory inside a fixture tree.
pub const FIXTURE_BINDINGS_DIR: &str = "src/python/PyRosetta";

/// Fixture for a library source tree.
#[derive(Debug, Clone, Default)]
pub struct SourceTreeFixture {
    /// Files relative to the tree root -> content.
    pub files: BTreeMap<PathBuf, String>,
    /// Empty directories relative to the tree root.
    pub dirs: Vec<PathBuf>,
}

impl SourceTreeFixture {
    /// Create an empty fixture.
    pub fn new() -> Self {
        Self::default()
    }

    /// A small tree with two tiers of primary libraries and the directories
    /// the built-in external libraries scan.
    pub fn minimal() -> Self {
        SourceTreeFixture::new()
            .with_descriptor("utility", &descriptors::simple("utility", &["exit"], &[]))
            .with_descriptor("core.1", &descriptors::simple("core/pose", &["Pose"], &[]))
            .with_file("src/utility/exit.cc", "")
            .with_file("src/utility/exit.hh", "")
            .with_file("src/utility/exit.fwd.hh", "")
            .with_file("src/core/pose/Pose.cc", "")
            .with_file("src/core/pose/Pose.hh", "")
            .with_file("external/dbio/cppdb/frontend.h", "")
            .with_file("external/dbio/sqlite3/sqlite3.h", "")
            .with_dir(FIXTURE_BINDINGS_DIR)
    }

    /// Add a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    /// Add an empty directory.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.push(path.into());
        self
    }

    /// Add a primary library descriptor (`src/<name>.src.settings`).
    pub fn with_descriptor(self, name: &str, content: &str) -> Self {
        self.with_file(format!("src/{name}.src.settings"), content)
    }

    /// Add an external library descriptor (`external/<name>.external.settings`).
    pub fn with_external_descriptor(self, name: &str, content: &str) -> Self {
        self.with_file(format!("external/{name}.external.settings"), content)
    }

    /// Write this fixture below `base_path`, returning the tree root.
    pub fn write_to(&self, base_path: &Path) -> std::io::Result<PathBuf> {
        let root = base_path.join("main").join("source");
        std::fs::create_dir_all(root.join("src"))?;
        std::fs::create_dir_all(root.join("external"))?;

        for dir in &self.dirs {
            std::fs::create_dir_all(root.join(dir))?;
        }

        for (rel_path, content) in &self.files {
            let full_path = root.join(rel_path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&full_path, content)?;
        }

        Ok(root)
    }
}

/// Common descriptor templates.
pub mod descriptors {
    /// A descriptor with a single directory.
    pub fn simple(dir: &str, stems: &[&str], defines: &[&str]) -> String {
        format!(
            "defines = [{}]\n\n[sources]\n\"{}\" = [{}]\n",
            quoted(defines),
            dir,
            quoted(stems)
        )
    }

    fn quoted(items: &[&str]) -> String {
        items
            .iter()
            .map(|s| format!("\"{}\"", s))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
