//! High-level operations.
//!
//! This module contains the phases of a binding build and the pipeline
//! that sequences them.

pub mod compile;
pub mod generate;
pub mod options;
pub mod package;
pub mod pipeline;
pub mod tools;

pub use compile::compile;
pub use generate::{compile_library_set, generate, Generated};
pub use options::{resolve_runtime, BindingOptions, Overrides};
pub use package::{create_package, PackageReport};
pub use pipeline::{run, PipelineReport, PipelineRequest};
pub use tools::{install_generator, install_pybind11};
