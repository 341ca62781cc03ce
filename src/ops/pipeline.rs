//! The full build: tools, generation, compilation, packaging.
//!
//! Phases run in a fixed order. Skipped phases assume their outputs are
//! already on disk; nothing else is recorded between runs.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::BuildTools;
use crate::util::process::Executor;

use super::compile::compile;
use super::generate::{generate, Generated};
use super::options::BindingOptions;
use super::package::{create_package, PackageReport};
use super::tools::{install_generator, install_pybind11};

/// Which phases to run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub skip_generation: bool,
    pub skip_building: bool,
    /// Create a package at this path after building
    pub package: Option<PathBuf>,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub build_root: PathBuf,
    pub binder: Option<PathBuf>,
    pub pybind11_include: Option<PathBuf>,
    pub generated: Option<Generated>,
    pub compiled: bool,
    pub package: Option<PackageReport>,
}

/// Run the requested phases.
///
/// `tools` locates CMake and Ninja; it is only consulted when something needs building.
pub fn run(
    opts: &BindingOptions,
    request: &PipelineRequest,
    executor: &Executor,
    tools: impl Fn() -> Result<BuildTools>,
) -> Result<PipelineReport> {
    let root = opts.build_root();
    root.create()?;
    tracing::info!(
        "Creating {} in \"{}\" mode in: {}",
        opts.binding_name,
        opts.build_type,
        root.path().display()
    );

    let mut report = PipelineReport {
        build_root: root.path().to_path_buf(),
        ..Default::default()
    };

    let needs_generator = !request.skip_generation;
    let binder = match opts.generator.binder {
        Some(ref path) => Some(path.clone()),
        None if needs_generator => Some(install_generator(opts, executor, &tools()?)?),
        None => None,
    };

    let pybind11 = match opts.pybind11 {
        Some(ref path) => path.clone(),
        None => install_pybind11(opts, executor)?,
    };

    if request.skip_generation {
        tracing::info!("Option --skip-generation-phase is supplied, skipping generation phase...");
    } else if let Some(ref binder) = binder {
        report.generated = Some(generate(opts, executor, binder, &pybind11)?);
    }

    if request.skip_building {
        tracing::info!("Option --skip-building-phase is supplied, skipping building phase...");
    } else {
        compile(opts, executor, &tools()?)?;
        report.compiled = true;
    }

    if let Some(ref dest) = request.package {
        report.package = Some(create_package(opts, dest)?);
    }

    report.binder = binder;
    report.pybind11_include = Some(pybind11);
    Ok(report)
}
