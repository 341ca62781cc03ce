//! bindery - build orchestrator for generated Python bindings of a large C++ library
//!
//! This crate compiles per-library source descriptors into CMake object
//! libraries, drives the binding generator over the library's headers, and
//! builds and packages the resulting extension module.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for bindery unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted process spawner and on-disk
/// source tree fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{BuildRoot, LibrarySet, LibraryUnit, SourceDescriptor, SourceTree};
pub use ops::{BindingOptions, PipelineRequest};
pub use util::config::Config;
pub use util::process::Executor;
