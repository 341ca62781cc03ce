//! Shared utilities for the builder module.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::util::process::ProcessBuilder;

/// Detect a tool's version by running it with --version and parsing the output.
///
/// stdout and stderr are both handed to the parser, since some tools
/// (Python 2 among them) print their version on stderr.
///
/// # Example
/// ```ignore
/// let version = detect_tool_version(Path::new("cmake"), |out| {
///     out.lines()
///         .find_map(|l| l.strip_prefix("cmake version "))
///         .and_then(parse_version_flexible)
/// })?;
/// ```
pub fn detect_tool_version<F>(tool: &Path, version_parser: F) -> Result<semver::Version>
where
    F: FnOnce(&str) -> Option<semver::Version>,
{
    let output = ProcessBuilder::new(tool)
        .arg("--version")
        .exec()
        .with_context(|| format!("failed to run {} --version", tool.display()))?;

    if !output.success() {
        bail!("{} --version failed", tool.display());
    }

    version_parser(&output.output).ok_or_else(|| {
        anyhow::anyhow!(
            "could not parse {} version from output: {}",
            tool.display(),
            output.output.trim()
        )
    })
}

/// Parse a version string into semver::Version, handling incomplete versions.
///
/// Handles versions like "3.20.5", "3.5.0-rc1", "3.9+" or only major.minor parts.
pub fn parse_version_flexible(version_str: &str) -> Option<semver::Version> {
    // Remove any suffix after the first non-version character
    let clean_version = version_str
        .trim()
        .split(|c: char| !c.is_ascii_digit() && c != '.')
        .next()
        .unwrap_or(version_str);

    // Try direct parse first
    if let Ok(v) = clean_version.parse() {
        return Some(v);
    }

    // Handle versions with less than 3 parts
    let parts: Vec<&str> = clean_version.split('.').collect();
    let major = parts.first().and_then(|s| s.parse().ok())?;
    let minor = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    Some(semver::Version::new(major, minor, patch))
}

/// Find the version in the output of `python --version` (`Python 3.9.1`).
pub fn parse_python_version(output: &str) -> Option<semver::Version> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Python "))
        .and_then(parse_version_flexible)
}

/// Find the version in the output of `cmake --version` (`cmake version 3.20.5`).
pub fn parse_cmake_version(output: &str) -> Option<semver::Version> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("cmake version "))
        .and_then(parse_version_flexible)
}

/// Render defines as compiler flags (`FOO=1` -> `-DFOO=1`).
pub fn define_flags<'a>(defines: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    defines.into_iter().map(|d| format!("-D{}", d)).collect()
}
