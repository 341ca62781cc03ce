//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use bindery::core::{BuildType, RuntimeVersion};

/// bindery - generate, build and package Python bindings for Rosetta
#[derive(Parser)]
#[command(name = "bindery")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of parallel build jobs (0 lets Ninja decide) [default: 1]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Assume the bindings are already generated and skip the generator
    #[arg(short = 's', long)]
    pub skip_generation_phase: bool,

    /// Skip compiling the generated bindings
    #[arg(short = 'd', long)]
    pub skip_building_phase: bool,

    /// Build type: Release, Debug, MinSizeRel or RelWithDebInfo [default: Release]
    #[arg(long = "type", value_name = "TYPE")]
    pub build_type: Option<BuildType>,

    /// Compiler to use [default: clang]
    #[arg(long)]
    pub compiler: Option<String>,

    /// Path to a prebuilt generator; otherwise it is fetched and built under build/prefix
    #[arg(long)]
    pub binder: Option<PathBuf>,

    /// Build the generator in debug mode (only used without --binder)
    #[arg(long)]
    pub binder_debug: bool,

    /// Print the build root for the given options and exit
    #[arg(long)]
    pub print_build_root: bool,

    /// Use the cross-compile build root
    #[arg(long)]
    pub cross_compile: bool,

    /// Path to the pybind11 include directory; otherwise it is fetched under build/prefix
    #[arg(long)]
    pub pybind11: Option<PathBuf>,

    /// Create a Python package at the given path after building
    #[arg(long, value_name = "PATH")]
    pub create_package: Option<PathBuf>,

    /// Annotate includes in generated sources
    #[arg(long)]
    pub annotate_includes: bool,

    /// Library source root
    #[arg(long, default_value = "../../..")]
    pub source_root: PathBuf,

    /// Python version to build for, e.g. 3.9 [default: detected from python3]
    #[arg(long, value_name = "X.Y")]
    pub python_version: Option<RuntimeVersion>,

    /// Project config file [default: <bindings-dir>/bindery.toml]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
