//! Binding generator invocation.
//!
//! The generator is a clang-based tool: it parses the aggregate include file
//! and writes one C++ source per namespace below the prefix, plus a
//! `<root-module>.sources` manifest listing what it wrote.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::util::define_flags;
use crate::util::process::ProcessBuilder;

/// An artifact a phase needed was not produced.
#[derive(Debug, Error)]
#[error("{what} not found at {}", path.display())]
pub struct MissingArtifact {
    pub what: String,
    pub path: PathBuf,
}

impl MissingArtifact {
    pub fn new(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        MissingArtifact {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Error unless `path` exists.
    pub fn check(what: &str, path: &Path) -> Result<(), MissingArtifact> {
        if path.exists() {
            Ok(())
        } else {
            Err(MissingArtifact::new(what, path))
        }
    }
}

/// One run of the generator.
#[derive(Debug, Clone)]
pub struct BinderInvocation {
    pub binder: PathBuf,
    /// Generator policy file
    pub config: PathBuf,
    pub root_module: String,
    /// Output directory; also the working directory
    pub prefix: PathBuf,
    pub include_file: PathBuf,
    pub annotate_includes: bool,
    /// Language standard (`c++11`)
    pub std: String,
    /// Passed before the other system dirs (libc++ on macOS)
    pub extra_system_include_dirs: Vec<PathBuf>,
    pub system_include_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
}

impl BinderInvocation {
    /// Generator arguments followed by `--` and the clang front-end flags.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "--config".to_string(),
            self.config.display().to_string(),
            "--root-module".to_string(),
            self.root_module.clone(),
            "--prefix".to_string(),
            format!("{}/", self.prefix.display()),
        ];
        if self.annotate_includes {
            args.push("--annotate-includes".to_string());
        }
        args.push(self.include_file.display().to_string());

        args.push("--".to_string());
        args.push(format!("-std={}", self.std));
        for dir in self
            .extra_system_include_dirs
            .iter()
            .chain(&self.system_include_dirs)
        {
            args.push("-isystem".to_string());
            args.push(dir.display().to_string());
        }
        args.extend(self.include_dirs.iter().map(|d| format!("-I{}", d.display())));
        args.extend(define_flags(&self.defines));
        args
    }

    pub fn command(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.binder)
            .args(self.args())
            .cwd(&self.prefix)
    }

    /// Where the generator lists the sources it wrote.
    pub fn sources_manifest(&self) -> PathBuf {
        sources_manifest_path(&self.prefix, &self.root_module)
    }
}

pub fn sources_manifest_path(prefix: &Path, root_module: &str) -> PathBuf {
    prefix.join(format!("{}.sources", root_module))
}

/// Read the generator's whitespace-separated source list.
pub fn read_sources_manifest(path: &Path) -> anyhow::Result<Vec<String>> {
    MissingArtifact::check("generated sources manifest", path)?;
    let contents = crate::util::fs::read_to_string(path)?;
    Ok(contents.split_whitespace().map(str::to_string).collect())
}
