//! Acquisition of the binding generator and pybind11.
//!
//! Both live under `<source-root>/build/prefix`. Clones and fetches go
//! through the retry policy, since they depend on the network; everything
//! else fails fast.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::{BuildTools, CMakeBuilder, MissingArtifact};
use crate::core::BuildType;
use crate::util::fs::{ensure_dir, replace_symlink, update_file};
use crate::util::process::{Executor, ProcessBuilder, RetryPolicy, RunOptions};

use super::options::BindingOptions;

fn git(repo: &Path) -> ProcessBuilder {
    ProcessBuilder::new("git").cwd(repo)
}

/// Clone `url` into `parent/name` unless that directory exists.
fn clone_if_missing(
    executor: &Executor,
    parent: &Path,
    name: &str,
    url: &str,
    retry: RetryPolicy,
) -> Result<PathBuf> {
    let dest = parent.join(name);
    if dest.is_dir() {
        tracing::debug!("{} already present", dest.display());
        return Ok(dest);
    }

    ensure_dir(parent)?;
    executor
        .run(
            &format!("Cloning {}...", name),
            &git(parent).args(["clone", url, name]),
            &RunOptions::until_success(retry),
        )
        .with_context(|| format!("failed to clone {}", url))?;
    Ok(dest)
}

/// Check out and hard-reset to `revision`, fetching first if it is not known locally.
fn checkout(executor: &Executor, repo: &Path, revision: &str, retry: RetryPolicy) -> Result<()> {
    let message = format!("Checking out {} in {}...", revision, repo.display());
    if try_checkout(executor, &message, repo, revision)? {
        return Ok(());
    }

    executor
        .run(
            &format!("Fetching {}...", repo.display()),
            &git(repo).arg("fetch"),
            &RunOptions::until_success(retry),
        )
        .with_context(|| format!("failed to fetch {}", repo.display()))?;

    if !try_checkout(executor, &message, repo, revision)? {
        bail!("revision {} not found in {}", revision, repo.display());
    }
    Ok(())
}

/// Bring a branch checkout up to date: fetch, check out, then pull.
fn update_branch(executor: &Executor, repo: &Path, branch: &str, retry: RetryPolicy) -> Result<()> {
    executor
        .run(
            &format!("Fetching {}...", repo.display()),
            &git(repo).arg("fetch"),
            &RunOptions::until_success(retry),
        )
        .with_context(|| format!("failed to fetch {}", repo.display()))?;

    let message = format!("Checking out {} in {}...", branch, repo.display());
    if !try_checkout(executor, &message, repo, branch)? {
        bail!("revision {} not found in {}", branch, repo.display());
    }

    executor
        .run(
            &format!("Updating {}...", repo.display()),
            &git(repo).arg("pull"),
            &RunOptions::until_success(retry).silent(),
        )
        .with_context(|| format!("failed to pull {}", repo.display()))?;
    Ok(())
}

fn try_checkout(executor: &Executor, message: &str, repo: &Path, revision: &str) -> Result<bool> {
    let opts = RunOptions::report().silent();

    let out = executor.run(message, &git(repo).args(["checkout", revision]), &opts)?;
    if !out.success() {
        return Ok(false);
    }
    let out = executor.run(
        message,
        &git(repo).args(["reset", "--hard", revision]),
        &opts,
    )?;
    Ok(out.success())
}

/// Append `line` to `path` unless it already contains it as a full line.
fn append_line_once(path: &Path, line: &str) -> Result<()> {
    let mut contents = if path.exists() {
        crate::util::fs::read_to_string(path)?
    } else {
        String::new()
    };

    if contents.lines().any(|l| l.trim() == line) {
        return Ok(());
    }

    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(line);
    contents.push('\n');
    update_file(path, &contents)?;
    Ok(())
}

/// LLVM checkout layout for the generator build.
#[derive(Debug, Clone)]
pub struct LlvmLayout {
    /// `<prefix>/llvm-3.8`
    pub root: PathBuf,
}

impl LlvmLayout {
    pub fn new(prefix: &Path) -> Self {
        LlvmLayout {
            root: prefix.join(crate::core::defaults::LLVM_DIR),
        }
    }

    pub fn llvm(&self) -> PathBuf {
        self.root.join("llvm")
    }

    pub fn clang(&self) -> PathBuf {
        self.llvm().join("tools").join("clang")
    }

    pub fn extra(&self) -> PathBuf {
        self.clang().join("tools").join("extra")
    }

    /// `llvm/build_<release>.<platform>.<debug|release>`
    pub fn build_dir(&self, release: &str, platform: &str, debug: bool) -> PathBuf {
        self.llvm().join(format!(
            "build_{}.{}.{}",
            release,
            platform,
            if debug { "debug" } else { "release" }
        ))
    }
}

/// Fetch LLVM and clang, link the generator sources in, and build the generator.
///
/// Returns the path of the generator executable.
pub fn install_generator(
    opts: &BindingOptions,
    executor: &Executor,
    tools: &BuildTools,
) -> Result<PathBuf> {
    let t = &opts.tools;
    let layout = LlvmLayout::new(&opts.tree.prefix_dir());
    let release = t.llvm_release.as_str();

    tracing::info!("Installing {} into {}", t.generator_name, layout.root.display());

    let llvm = clone_if_missing(executor, &layout.root, "llvm", &t.llvm_url, opts.retry)?;
    checkout(executor, &llvm, release, opts.retry)?;

    let clang = clone_if_missing(executor, &llvm.join("tools"), "clang", &t.clang_url, opts.retry)?;
    checkout(executor, &clang, release, opts.retry)?;

    let extra = clone_if_missing(
        executor,
        &clang.join("tools"),
        "extra",
        &t.clang_extra_url,
        opts.retry,
    )?;
    checkout(executor, &extra, release, opts.retry)?;

    let source = crate::util::fs::normalize_path(&t.generator_source);
    replace_symlink(&source, &extra.join(&t.generator_name))?;
    append_line_once(
        &extra.join("CMakeLists.txt"),
        &format!("add_subdirectory({})", t.generator_name),
    )?;

    let build_dir = layout.build_dir(release, opts.platform.as_str(), opts.generator.debug);
    let build_type = if opts.generator.debug {
        BuildType::Debug
    } else {
        BuildType::Release
    };

    CMakeBuilder::new(tools, llvm.clone(), build_dir.clone(), build_type)
        .args(["-DLLVM_ENABLE_EH=1", "-DLLVM_ENABLE_RTTI=ON"])
        .jobs(opts.jobs)
        .build(executor)
        .with_context(|| format!("failed to build {}", t.generator_name))?;

    let executable = build_dir.join("bin").join(&t.generator_name);
    MissingArtifact::check("generator executable", &executable)?;
    Ok(executable)
}

/// Fetch pybind11 and update it to the pinned branch. Returns its include directory.
pub fn install_pybind11(opts: &BindingOptions, executor: &Executor) -> Result<PathBuf> {
    let t = &opts.tools;
    let prefix = opts.tree.prefix_dir();

    let package = clone_if_missing(executor, &prefix, "pybind11", &t.pybind11_url, opts.retry)?;
    update_branch(executor, &package, &t.pybind11_revision, opts.retry)?;

    let include = package.join("include");
    MissingArtifact::check("pybind11 header", &include.join("pybind11").join("pybind11.h"))?;
    Ok(include)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{defaults, RuntimeVersion, SourceTree};
    use crate::ops::options::Overrides;
    use crate::test_support::{MockExecutor, MockProcessOutput};
    use crate::util::config::Config;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn options(root: &Path) -> BindingOptions {
        let mut config = Config::default();
        config.net.retry_attempts = Some(2);
        config.net.retry_delay_secs = Some(0);
        BindingOptions::resolve(
            SourceTree::new(root, defaults::BINDINGS_DIR),
            &config,
            Overrides {
                jobs: Some(4),
                ..Default::default()
            },
            RuntimeVersion::new(3, 9),
        )
        .unwrap()
    }

    #[test]
    fn test_append_line_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("CMakeLists.txt");
        std::fs::write(&path, "add_subdirectory(tool-extra)").unwrap();

        append_line_once(&path, "add_subdirectory(binder)").unwrap();
        append_line_once(&path, "add_subdirectory(binder)").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "add_subdirectory(tool-extra)\nadd_subdirectory(binder)\n"
        );
    }

    #[test]
    fn test_checkout_fetches_unknown_revision() {
        let mock = Arc::new(MockExecutor::new());
        mock.expect_times("git checkout PyRosetta", MockProcessOutput::failure(1, "no such ref"), 1);
        mock.expect("git fetch", MockProcessOutput::success(""));
        mock.expect("git checkout PyRosetta", MockProcessOutput::success(""));
        mock.expect("git reset --hard PyRosetta", MockProcessOutput::success(""));
        let executor = Executor::with_spawner(mock.clone());

        checkout(&executor, Path::new("/repo"), "PyRosetta", RetryPolicy::bounded(1, Duration::ZERO))
            .unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                "git checkout PyRosetta",
                "git fetch",
                "git checkout PyRosetta",
                "git reset --hard PyRosetta",
            ]
        );
    }

    #[test]
    fn test_clone_retries_then_gives_up() {
        let tmp = TempDir::new().unwrap();
        let mock = Arc::new(MockExecutor::new());
        mock.expect_prefix("git clone", MockProcessOutput::failure(128, "network unreachable"));
        let executor = Executor::with_spawner(mock.clone());

        let err = clone_if_missing(
            &executor,
            tmp.path(),
            "pybind11",
            "https://example.invalid/pybind11.git",
            RetryPolicy::bounded(3, Duration::ZERO),
        )
        .unwrap_err();

        assert!(format!("{:#}", err).contains("failed to clone"));
        assert_eq!(mock.calls().len(), 3);
    }

    #[test]
    fn test_install_pybind11() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        let package = opts.tree.prefix_dir().join("pybind11");
        std::fs::create_dir_all(package.join("include/pybind11")).unwrap();

        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockProcessOutput::success(""));
        let executor = Executor::with_spawner(mock.clone());

        // Header missing: the checkout succeeded but produced nothing usable.
        let err = install_pybind11(&opts, &executor).unwrap_err();
        assert!(err.downcast_ref::<MissingArtifact>().is_some());

        std::fs::write(package.join("include/pybind11/pybind11.h"), "").unwrap();
        assert_eq!(install_pybind11(&opts, &executor).unwrap(), package.join("include"));
        assert!(!mock.calls().iter().any(|c| c.starts_with("git clone")));
    }

    #[test]
    fn test_install_pybind11_updates_existing_checkout() {
        let tmp = TempDir::new().unwrap();
        let opts = options(tmp.path());
        let package = opts.tree.prefix_dir().join("pybind11");
        std::fs::create_dir_all(package.join("include/pybind11")).unwrap();
        std::fs::write(package.join("include/pybind11/pybind11.h"), "").unwrap();

        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockProcessOutput::success(""));
        let executor = Executor::with_spawner(mock.clone());

        install_pybind11(&opts, &executor).unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                "git fetch",
                "git checkout PyRosetta",
                "git reset --hard PyRosetta",
                "git pull",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_generator() {
        let tmp = TempDir::new().unwrap();
        let mut opts = options(tmp.path());
        opts.platform = crate::core::Platform::Linux;

        let layout = LlvmLayout::new(&opts.tree.prefix_dir());
        std::fs::create_dir_all(layout.extra()).unwrap();
        std::fs::write(layout.extra().join("CMakeLists.txt"), "add_subdirectory(clang-tidy)\n").unwrap();
        std::fs::create_dir_all(&opts.tools.generator_source).unwrap();

        let build_dir = layout.build_dir("release_38", "linux", false);
        std::fs::create_dir_all(build_dir.join("bin")).unwrap();
        std::fs::write(build_dir.join("bin/binder"), "").unwrap();

        let mock = Arc::new(MockExecutor::new());
        mock.set_default(MockProcessOutput::success(""));
        let executor = Executor::with_spawner(mock.clone());

        let exe = install_generator(&opts, &executor, &BuildTools::new("cmake", "ninja")).unwrap();
        assert_eq!(exe, build_dir.join("bin/binder"));

        let calls = mock.calls();
        assert!(calls.contains(&"git checkout release_38".to_string()));
        assert!(calls.contains(
            &"cmake -G Ninja -DCMAKE_BUILD_TYPE=Release -DLLVM_ENABLE_EH=1 -DLLVM_ENABLE_RTTI=ON .."
                .to_string()
        ));
        assert_eq!(calls.last().unwrap(), "ninja -j4");

        assert!(std::fs::symlink_metadata(layout.extra().join("binder"))
            .unwrap()
            .file_type()
            .is_symlink());
        let lists = std::fs::read_to_string(layout.extra().join("CMakeLists.txt")).unwrap();
        assert_eq!(lists.matches("add_subdirectory(binder)").count(), 1);
    }
}
