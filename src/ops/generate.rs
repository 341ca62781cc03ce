//! The generation phase: from a source tree to a ready-to-configure CMake project.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::cmake::{emit_project, load_template};
use crate::builder::generator::{read_sources_manifest, BinderInvocation};
use crate::core::defaults::MACOS_LIBCXX_INCLUDE;
use crate::core::descriptor::{builtin_external, discover, DescriptorKind, SourceDescriptor};
use crate::core::{IncludeManifest, LibrarySet, LibraryUnit, Platform};
use crate::util::fs::{copy_tree_additive, ensure_dir, relative_path, replace_symlink, symlink};
use crate::util::process::{Executor, ProcessBuilder};

use super::options::BindingOptions;

/// What the generation phase produced.
#[derive(Debug, Clone)]
pub struct Generated {
    /// Library units in emission order
    pub units: Vec<String>,
    /// Sources written by the generator, relative to the build source dir
    pub sources: Vec<String>,
    pub include_file: PathBuf,
    pub cmake_lists: PathBuf,
}

/// Compile every primary and external descriptor into an ordered library set.
pub fn compile_library_set(opts: &BindingOptions) -> Result<LibrarySet> {
    let src = opts.tree.src_dir();
    let external = opts.tree.external_dir();

    let mut primary = Vec::new();
    for name in discover(&src, DescriptorKind::Primary, &opts.exclude)? {
        let descriptor = SourceDescriptor::load(&src, &name, DescriptorKind::Primary)?;
        primary.push(LibraryUnit::compile(
            &name,
            DescriptorKind::Primary,
            &descriptor,
            &src,
        )?);
    }

    let mut externals = Vec::new();
    for (name, descriptor) in builtin_external() {
        externals.push(LibraryUnit::compile_listed(
            &name,
            DescriptorKind::External,
            &descriptor,
            &external,
        ));
    }
    for name in discover(&external, DescriptorKind::External, &[])? {
        let descriptor = SourceDescriptor::load(&external, &name, DescriptorKind::External)?;
        externals.push(LibraryUnit::compile(
            &name,
            DescriptorKind::External,
            &descriptor,
            &external,
        )?);
    }

    tracing::debug!(
        "Compiled {} primary and {} external libraries",
        primary.len(),
        externals.len()
    );
    Ok(LibrarySet::assemble(primary, externals, &opts.tiers)?)
}

/// Copy the bindings' own Python sources into the build dir and link the database.
fn copy_supplemental_files(opts: &BindingOptions, build_dir: &Path) -> Result<()> {
    let source = opts.tree.bindings_dir().join("src");
    if source.is_dir() {
        let copied = copy_tree_additive(&source, build_dir)?;
        tracing::debug!("Copied {} supplemental files", copied);
    }

    if opts.platform.supports_symlinks() {
        let link = build_dir.join("database");
        if std::fs::symlink_metadata(&link).is_err() {
            let target = relative_path(build_dir, &opts.tree.database_dir());
            symlink(&target, &link)
                .with_context(|| format!("failed to link database at {}", link.display()))?;
        }
    }
    Ok(())
}

fn run_prepare_commands(opts: &BindingOptions, executor: &Executor) -> Result<()> {
    for line in &opts.generator.prepare {
        executor.execute(
            "Updating version, options and residue-type-enum files...",
            &ProcessBuilder::shell(line).cwd(opts.tree.root()),
        )?;
    }
    Ok(())
}

/// Run the generation phase.
///
/// `binder` is the generator executable; `pybind11_include` its include directory.
pub fn generate(
    opts: &BindingOptions,
    executor: &Executor,
    binder: &Path,
    pybind11_include: &Path,
) -> Result<Generated> {
    let root = opts.build_root();
    root.create()?;
    let prefix = root.source_dir();

    copy_supplemental_files(opts, &root.build_dir())?;
    run_prepare_commands(opts, executor)?;

    for (name, target) in [
        ("src", opts.tree.src_dir()),
        ("external", opts.tree.external_dir()),
    ] {
        replace_symlink(&target, &prefix.join(name))?;
    }

    let filter = opts.filter.header_filter()?;
    let manifest = IncludeManifest::collect(opts.tree.root(), &opts.filter.header_roots, &filter)?;
    tracing::info!("Collected {} headers to bind", manifest.len());
    let include_file = manifest.write(&prefix, &opts.generator.root_module)?;

    let invocation = BinderInvocation {
        binder: binder.to_path_buf(),
        config: opts.generator.config_file.clone(),
        root_module: opts.generator.root_module.clone(),
        prefix: prefix.clone(),
        include_file: include_file.clone(),
        annotate_includes: opts.generator.annotate_includes,
        std: opts.generator.std.clone(),
        extra_system_include_dirs: if opts.platform == Platform::MacOs {
            vec![PathBuf::from(MACOS_LIBCXX_INCLUDE)]
        } else {
            Vec::new()
        },
        system_include_dirs: opts.system_include_dirs(),
        include_dirs: opts.include_dirs(),
        defines: opts.defines(),
    };
    executor
        .execute("Generating bindings...", &invocation.command())
        .context("binding generator failed")?;

    let sources = read_sources_manifest(&invocation.sources_manifest())?;
    tracing::info!("Generator produced {} sources", sources.len());

    let set = compile_library_set(opts)?;
    let template = load_template(opts.tree.bindings_dir())?;
    ensure_dir(&prefix)?;
    let cmake_lists = emit_project(
        &prefix,
        &set,
        &opts.project_settings(pybind11_include),
        &sources,
        &template,
    )?;

    Ok(Generated {
        units: set.names().into_iter().map(str::to_string).collect(),
        sources,
        include_file,
        cmake_lists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MissingArtifact;
    use crate::core::{defaults, LibraryError, RuntimeVersion, SourceTree};
    use crate::ops::options::Overrides;
    use crate::test_support::{descriptors, MockExecutor, MockProcessOutput, SourceTreeFixture};
    use crate::util::config::Config;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn options(root: &Path, prepare: Vec<String>) -> BindingOptions {
        let mut config = Config::default();
        config.generator.prepare = Some(prepare);
        let mut opts = BindingOptions::resolve(
            SourceTree::new(root, defaults::BINDINGS_DIR),
            &config,
            Overrides::default(),
            RuntimeVersion::new(3, 9),
        )
        .unwrap();
        opts.platform = Platform::Linux;
        opts
    }

    fn ok_executor() -> (Arc<MockExecutor>, Executor) {
        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockProcessOutput::success(""));
        let executor = Executor::with_spawner(mock.clone());
        (mock, executor)
    }

    #[test]
    fn test_compile_library_set_orders_tiers_then_externals() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal()
            .with_descriptor("apps", &descriptors::simple("apps", &["main"], &[]))
            .with_external_descriptor("zlib", &descriptors::simple("zlib", &["inflate"], &["Z"]))
            .with_dir("external/zlib")
            .write_to(tmp.path())
            .unwrap();

        let set = compile_library_set(&options(&root, Vec::new())).unwrap();
        assert_eq!(set.names(), vec!["utility", "core.1", "cppdb", "sqlite3", "zlib"]);

        let utility = &set.units()[0];
        assert_eq!(
            utility.sources,
            vec!["utility/exit.cc", "utility/exit.fwd.hh", "utility/exit.hh"]
        );
    }

    #[test]
    fn test_compile_library_set_without_bundled_database_sources() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::new()
            .with_descriptor("utility", &descriptors::simple("utility", &["exit"], &[]))
            .with_file("src/utility/exit.cc", "")
            .write_to(tmp.path())
            .unwrap();

        let set = compile_library_set(&options(&root, Vec::new())).unwrap();
        assert_eq!(set.names(), vec!["utility", "cppdb", "sqlite3"]);
        assert_eq!(set.units()[2].sources, vec!["dbio/sqlite3/sqlite3.c"]);
    }

    #[test]
    fn test_compile_library_set_rejects_unknown_group() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal()
            .with_descriptor("plugins", &descriptors::simple("utility", &["exit"], &[]))
            .write_to(tmp.path())
            .unwrap();

        let err = compile_library_set(&options(&root, Vec::new())).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LibraryError>(),
            Some(LibraryError::UnknownGroup { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_generate_writes_project() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal()
            .with_file(format!("{}/src/demo/d1.py", defaults::BINDINGS_DIR), "print(1)")
            .write_to(tmp.path())
            .unwrap();
        let opts = options(&root, vec!["./version.py".to_string()]);

        let prefix = opts.build_root().source_dir();
        std::fs::create_dir_all(&prefix).unwrap();
        std::fs::write(prefix.join("rosetta.sources"), "rosetta.cpp rosetta/utility.cpp\n").unwrap();

        let (mock, executor) = ok_executor();
        let generated =
            generate(&opts, &executor, Path::new("/tools/binder"), Path::new("/p/include")).unwrap();

        assert_eq!(generated.units, vec!["utility", "core.1", "cppdb", "sqlite3"]);
        assert_eq!(generated.sources, vec!["rosetta.cpp", "rosetta/utility.cpp"]);

        let calls = mock.calls();
        assert_eq!(calls[0], "/bin/sh -c ./version.py");
        assert!(calls[1].starts_with("/tools/binder --config "));
        assert!(calls[1].contains("-- -std=c++11 -isystem "));

        let includes = std::fs::read_to_string(&generated.include_file).unwrap();
        assert_eq!(includes, "#include <core/pose/Pose.hh>\n#include <utility/exit.hh>\n");

        let lists = std::fs::read_to_string(&generated.cmake_lists).unwrap();
        assert!(lists.contains("include(utility.cmake)\ninclude(core.1.cmake)\ninclude(cppdb.cmake)"));
        assert!(lists.contains("rosetta/utility.cpp\n$<TARGET_OBJECTS:utility>"));
        assert!(lists.contains("/p/include"));
        assert!(prefix.join("core.1.cmake").exists());

        let build = opts.build_root().build_dir();
        assert!(build.join("demo/d1.py").exists());
        assert!(std::fs::symlink_metadata(build.join("database")).is_ok());
        assert!(std::fs::symlink_metadata(prefix.join("src")).unwrap().file_type().is_symlink());
    }

    #[test]
    fn test_generate_requires_sources_manifest() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal().write_to(tmp.path()).unwrap();
        let opts = options(&root, Vec::new());

        let (_mock, executor) = ok_executor();
        let err = generate(&opts, &executor, Path::new("binder"), Path::new("/p/include")).unwrap_err();
        assert!(err.downcast_ref::<MissingArtifact>().is_some());
        assert!(!opts.build_root().source_dir().join("CMakeLists.txt").exists());
    }

    #[test]
    fn test_generate_stops_when_generator_fails() {
        let tmp = TempDir::new().unwrap();
        let root = SourceTreeFixture::minimal().write_to(tmp.path()).unwrap();
        let opts = options(&root, Vec::new());

        let mock = Arc::new(MockExecutor::new());
        mock.expect_prefix("binder", MockProcessOutput::failure(2, "clang: error"));
        let executor = Executor::with_spawner(mock.clone());

        let err = generate(&opts, &executor, Path::new("binder"), Path::new("/p/include")).unwrap_err();
        assert!(format!("{:#}", err).contains("binding generator failed"));
        assert_eq!(mock.calls().len(), 1);
    }
}
