//! The build command: resolve options and run the pipeline.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::Cli;
use bindery::builder::BuildTools;
use bindery::core::{defaults, SourceTree};
use bindery::ops::{resolve_runtime, run, BindingOptions, Overrides, PipelineRequest};
use bindery::util::config::{global_config_path, load_config, project_config_path};
use bindery::util::process::Executor;

pub fn execute(args: Cli) -> Result<()> {
    let tree = SourceTree::discover(&args.source_root, Path::new(defaults::BINDINGS_DIR))?;

    // Load configuration (global + project)
    let explicit = args.config.is_some();
    let project_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_config_path(tree.bindings_dir()));
    let config = load_config(global_config_path().as_deref(), &project_path, explicit)?;

    let runtime = resolve_runtime(args.python_version, &config)?;

    let overrides = Overrides {
        jobs: args.jobs,
        compiler: args.compiler,
        build_type: args.build_type,
        binder: args.binder,
        binder_debug: args.binder_debug,
        cross_compile: args.cross_compile,
        pybind11: args.pybind11,
        annotate_includes: args.annotate_includes,
    };
    let opts = BindingOptions::resolve(tree, &config, overrides, runtime)?;

    if args.print_build_root {
        let root = opts.build_root();
        root.create()?;
        let mut stdout = std::io::stdout().lock();
        write!(stdout, "{}", root.path().display()).context("failed to write to stdout")?;
        stdout.flush()?;
        return Ok(());
    }

    let request = PipelineRequest {
        skip_generation: args.skip_generation_phase,
        skip_building: args.skip_building_phase,
        package: args.create_package,
    };

    let executor = Executor::new();
    let report = run(&opts, &request, &executor, BuildTools::locate)?;

    tracing::info!("Build root: {}", report.build_root.display());
    if let Some(generated) = report.generated {
        tracing::info!(
            "Generated {} sources for {} libraries",
            generated.sources.len(),
            generated.units.len()
        );
    }
    if let Some(package) = report.package {
        tracing::info!("Package ready at {}", package.dest.display());
    }
    Ok(())
}
