//! Build-file generation and native build driving.
//!
//! This module turns a [`crate::core::LibrarySet`] into a CMake project,
//! invokes the binding generator, and runs CMake/Ninja.

pub mod cmake;
pub mod generator;
pub mod util;

pub use cmake::{BuildTools, CMakeBuilder, ProjectSettings};
pub use generator::{BinderInvocation, MissingArtifact};
