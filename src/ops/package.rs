//! Assemble an installable Python package from a finished build.
//!
//! Layout of the destination:
//!
//! ```text
//! <dest>/self-test.py
//! <dest>/demo/...            bindings' demo scripts
//! <dest>/test/...            bindings' tests
//! <dest>/setup/...           bindings' package files
//! <dest>/setup/database/...  the database
//! <dest>/setup/rosetta.so    the compiled module
//! <dest>/setup/pyrosetta/... Python sources produced by the build
//! ```
//!
//! Packaging is additive: files already at the destination are kept. Every
//! source must exist; a missing one is a [`MissingArtifact`] error and
//! nothing is copied.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::MissingArtifact;
use crate::util::fs::{copy_file_additive, copy_tree_additive, ensure_dir};

use super::options::BindingOptions;

/// Files copied into the package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
    pub dest: PathBuf,
    /// Number of files newly copied
    pub copied: usize,
}

/// Name of the compiled module inside the build dir.
fn module_file(opts: &BindingOptions) -> String {
    format!("{}.so", opts.generator.root_module)
}

/// Copy build outputs and metadata into `dest`.
pub fn create_package(opts: &BindingOptions, dest: &Path) -> Result<PackageReport> {
    tracing::info!("Creating Python package at: {}...", dest.display());

    let bindings = opts.tree.bindings_dir();
    let build = opts.build_root().build_dir();
    let setup = dest.join("setup");

    let module = build.join(module_file(opts));
    let self_test = bindings.join("src").join("self-test.py");
    let trees = [
        ("demo scripts", bindings.join("src").join("demo"), dest.join("demo")),
        ("tests", bindings.join("src").join("test"), dest.join("test")),
        ("database", opts.tree.database_dir(), setup.join("database")),
        ("package files", bindings.join("package"), setup.clone()),
        ("Python sources", build.join("pyrosetta"), setup.join("pyrosetta")),
    ];

    MissingArtifact::check("compiled module", &module)?;
    MissingArtifact::check("self-test script", &self_test)?;
    for (what, src, _) in &trees {
        MissingArtifact::check(what, src)?;
    }
    ensure_dir(&setup)?;

    let mut copied = 0;
    let mut file = |src: &Path, dst: &Path| -> Result<()> {
        if copy_file_additive(src, dst)? {
            copied += 1;
        }
        Ok(())
    };

    file(&self_test, &dest.join("self-test.py")).context("failed to copy self-test script")?;
    file(&module, &setup.join(module_file(opts)))?;

    for (_, src, dst) in &trees {
        copied += copy_tree_additive(src, dst)?;
    }

    tracing::info!("Copied {} files into {}", copied, dest.display());
    Ok(PackageReport {
        dest: dest.to_path_buf(),
        copied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{defaults, Platform, RuntimeVersion, SourceTree};
    use crate::ops::options::Overrides;
    use crate::test_support::SourceTreeFixture;
    use crate::util::config::Config;
    use std::fs;
    use tempfile::TempDir;

    fn options(root: &Path) -> BindingOptions {
        let mut opts = BindingOptions::resolve(
            SourceTree::new(root, defaults::BINDINGS_DIR),
            &Config::default(),
            Overrides::default(),
            RuntimeVersion::new(3, 9),
        )
        .unwrap();
        opts.platform = Platform::Linux;
        opts
    }

    fn bindings_file(rel: &str) -> String {
        format!("{}/{}", defaults::BINDINGS_DIR, rel)
    }

    #[test]
    fn test_create_package_layout_and_additivity() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal()
            .with_file(bindings_file("src/self-test.py"), "selftest")
            .with_file(bindings_file("src/demo/d1.py"), "demo")
            .with_file(bindings_file("src/test/T001.py"), "test")
            .with_file(bindings_file("package/setup.py"), "setup")
            .write_to(tmp.path())
            .unwrap();
        let opts = options(&root);

        fs::create_dir_all(root.join("../database/chemical")).unwrap();
        fs::write(root.join("../database/chemical/atoms.txt"), "C").unwrap();

        let build = opts.build_root().build_dir();
        fs::create_dir_all(build.join("pyrosetta")).unwrap();
        fs::write(build.join("rosetta.so"), "ELF").unwrap();
        fs::write(build.join("pyrosetta/__init__.py"), "").unwrap();

        let dest = tmp.path().join("dist");
        fs::create_dir_all(dest.join("setup")).unwrap();
        fs::write(dest.join("setup/setup.py"), "customized").unwrap();

        let report = create_package(&opts, &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("self-test.py")).unwrap(), "selftest");
        assert!(dest.join("demo/d1.py").exists());
        assert!(dest.join("test/T001.py").exists());
        assert!(dest.join("setup/database/chemical/atoms.txt").exists());
        assert!(dest.join("setup/rosetta.so").exists());
        assert!(dest.join("setup/pyrosetta/__init__.py").exists());
        assert_eq!(fs::read_to_string(dest.join("setup/setup.py")).unwrap(), "customized");
        assert_eq!(report.copied, 6);

        let again = create_package(&opts, &dest).unwrap();
        assert_eq!(again.copied, 0);
    }

    #[test]
    fn test_create_package_requires_database() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal()
            .with_file(bindings_file("src/self-test.py"), "selftest")
            .with_file(bindings_file("src/demo/d1.py"), "demo")
            .with_file(bindings_file("src/test/T001.py"), "test")
            .with_file(bindings_file("package/setup.py"), "setup")
            .write_to(tmp.path())
            .unwrap();
        let opts = options(&root);

        let build = opts.build_root().build_dir();
        fs::create_dir_all(build.join("pyrosetta")).unwrap();
        fs::write(build.join("rosetta.so"), "ELF").unwrap();

        let dest = tmp.path().join("dist");
        let err = create_package(&opts, &dest).unwrap_err();

        let missing = err.downcast_ref::<MissingArtifact>().unwrap();
        assert_eq!(missing.path, opts.tree.database_dir());
        assert!(!dest.join("self-test.py").exists());
    }

    #[test]
    fn test_create_package_requires_module() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal().write_to(tmp.path()).unwrap();

        let err = create_package(&options(&root), &tmp.path().join("dist")).unwrap_err();
        assert!(err.downcast_ref::<MissingArtifact>().is_some());
    }
}
