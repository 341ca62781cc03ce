//! Core data structures for bindery.
//!
//! This module contains the foundational types used throughout the build:
//! - Library descriptors and the library set compiled from them
//! - The include manifest handed to the generator
//! - Source tree and build root layout

pub mod build_root;
pub mod defaults;
pub mod descriptor;
pub mod include_manifest;
pub mod library;
pub mod source_tree;

pub use build_root::{BuildRoot, BuildRootKey, BuildType, CompilerFamily, Platform, RuntimeVersion};
pub use descriptor::{DescriptorError, DescriptorKind, SourceDescriptor};
pub use include_manifest::{HeaderFilter, IncludeManifest};
pub use library::{LibraryError, LibrarySet, LibraryUnit, TierOrder};
pub use source_tree::SourceTree;
