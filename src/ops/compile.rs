//! The compile phase: configure and build the generated project.

use anyhow::{Context, Result};

use crate::builder::{BuildTools, CMakeBuilder};
use crate::core::defaults::MIN_CMAKE_VERSION;
use crate::core::Platform;
use crate::util::process::{find_executable, Executor};

use super::options::BindingOptions;

/// Extra CMake arguments: compiler pinning (Linux only) and the Python version.
pub fn cmake_args(opts: &BindingOptions) -> Result<Vec<String>> {
    let mut args = Vec::new();

    if opts.platform == Platform::Linux {
        let (cc, cxx) = opts.compiler_family().drivers();
        for (var, driver) in [("CMAKE_C_COMPILER", cc), ("CMAKE_CXX_COMPILER", cxx)] {
            let path = find_executable(driver)
                .with_context(|| format!("compiler `{}` not found on PATH", driver))?;
            args.push(format!("-D{}={}", var, path.display()));
        }
    }

    args.push(format!("-DPYROSETTA_PYTHON_VERSION={}", opts.runtime));
    Ok(args)
}

/// Run CMake and Ninja in the build dir.
pub fn compile(opts: &BindingOptions, executor: &Executor, tools: &BuildTools) -> Result<()> {
    let min: semver::Version = MIN_CMAKE_VERSION
        .parse()
        .context("invalid minimum CMake version")?;
    tools.require_cmake_version(&min)?;

    let root = opts.build_root();
    root.create()?;

    CMakeBuilder::new(tools, root.source_dir(), root.build_dir(), opts.build_type)
        .args(cmake_args(opts)?)
        .jobs(opts.jobs)
        .build(executor)
}
