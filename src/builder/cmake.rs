//! CMake project generation and the CMake/Ninja driver.
//!
//! Each [`LibraryUnit`] becomes an object-library fragment `<name>.cmake`.
//! The top-level `CMakeLists.txt` is produced from a template by filling in
//! three placeholders: the fragment includes and global settings, the module
//! sources, and extra link libraries.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::builder::util::{define_flags, detect_tool_version, parse_cmake_version};
use crate::core::{BuildType, LibrarySet, LibraryUnit};
use crate::util::fs::{ensure_dir, update_file};
use crate::util::process::{find_cmake, find_ninja, Executor, ProcessBuilder};

/// Placeholder replaced by fragment includes and global compile settings.
pub const INSTRUCTIONS_PLACEHOLDER: &str = "#%__Rosetta_cmake_instructions__%#";

/// Placeholder replaced by the module's source list.
pub const SOURCES_PLACEHOLDER: &str = "#%__PyRosetta_sources__%#";

/// Placeholder replaced by extra link libraries (none: units are object libraries).
pub const LIBRARIES_PLACEHOLDER: &str = "#%__Rosetta_libraries__%#";

/// Template file looked up in the bindings directory.
pub const TEMPLATE_NAME: &str = "cmake.template";

/// Used when the bindings directory has no `cmake.template`.
pub const DEFAULT_TEMPLATE: &str = r#"cmake_minimum_required(VERSION 3.5)
project(PyRosetta CXX C)

set(CMAKE_CXX_STANDARD 11)
set(CMAKE_CXX_STANDARD_REQUIRED ON)

if(NOT PYROSETTA_PYTHON_VERSION)
  set(PYROSETTA_PYTHON_VERSION 3)
endif()
find_package(PythonLibs ${PYROSETTA_PYTHON_VERSION} REQUIRED)
include_directories(SYSTEM ${PYTHON_INCLUDE_DIRS})

#%__Rosetta_cmake_instructions__%#

add_library(rosetta MODULE
#%__PyRosetta_sources__%#
)

set_target_properties(rosetta PROPERTIES PREFIX "" SUFFIX ".so")
target_link_libraries(rosetta #%__Rosetta_libraries__%# ${PYTHON_LIBRARIES})
"#;

/// Render the `<name>.cmake` fragment of one unit.
pub fn render_fragment(unit: &LibraryUnit) -> String {
    let sources = unit
        .resolved_sources()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let mut out = format!(
        "add_library({name} OBJECT\n{sources})\n\n\
         set_property(TARGET {name} PROPERTY POSITION_INDEPENDENT_CODE ON)\n",
        name = unit.name,
        sources = sources,
    );

    if !unit.defines.is_empty() {
        out.push_str(&format!(
            "target_compile_options({} PRIVATE {})\n",
            unit.name,
            define_flags(&unit.defines).join(" ")
        ));
    }

    out
}

/// Write one fragment per unit into `dir`, in set order.
///
/// Returns the unit names in emission order. Unchanged fragments are not rewritten.
pub fn emit_fragments(set: &LibrarySet, dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(set.len());
    for unit in set.units() {
        let path = dir.join(format!("{}.cmake", unit.name));
        update_file(&path, &render_fragment(unit))
            .with_context(|| format!("failed to emit build fragment for `{}`", unit.name))?;
        names.push(unit.name.clone());
    }
    tracing::debug!("Emitted {} build fragments", names.len());
    Ok(names)
}

/// Global settings of the top-level project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectSettings {
    pub system_include_dirs: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
}

/// Fragment includes followed by global include dirs and defines.
pub fn render_instructions(units: &[String], settings: &ProjectSettings) -> String {
    let mut out = String::new();
    for name in units {
        out.push_str(&format!("include({}.cmake)\n", name));
    }

    out.push_str(&format!(
        "\ninclude_directories(SYSTEM {})\n",
        join_paths(&settings.system_include_dirs)
    ));
    out.push_str(&format!(
        "include_directories({})\n",
        join_paths(&settings.include_dirs)
    ));
    out.push_str(&format!(
        "add_definitions({})\n",
        define_flags(&settings.defines).join(" ")
    ));
    out
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Module sources: the generator's output followed by every unit's objects.
pub fn render_sources(generated: &[String], units: &[String]) -> String {
    generated
        .iter()
        .cloned()
        .chain(units.iter().map(|u| format!("$<TARGET_OBJECTS:{}>", u)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the template placeholders.
pub fn compose_template(template: &str, instructions: &str, sources: &str) -> String {
    template
        .replace(INSTRUCTIONS_PLACEHOLDER, instructions)
        .replace(SOURCES_PLACEHOLDER, sources)
        .replace(LIBRARIES_PLACEHOLDER, "")
}

/// Read `cmake.template` from the bindings directory, or fall back to the built-in one.
pub fn load_template(bindings_dir: &Path) -> Result<String> {
    let path = bindings_dir.join(TEMPLATE_NAME);
    if path.is_file() {
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read CMake template: {}", path.display()))
    } else {
        tracing::debug!("No {} found, using built-in template", path.display());
        Ok(DEFAULT_TEMPLATE.to_string())
    }
}

/// Emit all fragments and the top-level `CMakeLists.txt` into `dir`.
pub fn emit_project(
    dir: &Path,
    set: &LibrarySet,
    settings: &ProjectSettings,
    generated_sources: &[String],
    template: &str,
) -> Result<PathBuf> {
    let units = emit_fragments(set, dir)?;

    let contents = compose_template(
        template,
        &render_instructions(&units, settings),
        &render_sources(generated_sources, &units),
    );

    let path = dir.join("CMakeLists.txt");
    update_file(&path, &contents)?;
    Ok(path)
}

/// Locations of CMake and Ninja.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTools {
    pub cmake: PathBuf,
    pub ninja: PathBuf,
}

impl BuildTools {
    pub fn new(cmake: impl Into<PathBuf>, ninja: impl Into<PathBuf>) -> Self {
        BuildTools {
            cmake: cmake.into(),
            ninja: ninja.into(),
        }
    }

    /// Find CMake and Ninja on PATH.
    pub fn locate() -> Result<Self> {
        let Some(cmake) = find_cmake() else {
            bail!(
                "CMake not found\n\
                 \n\
                 CMake is required to build the bindings.\n\
                 Install CMake and ensure it's in your PATH."
            );
        };
        let Some(ninja) = find_ninja() else {
            bail!("Ninja not found; install ninja and ensure it's in your PATH");
        };
        Ok(BuildTools { cmake, ninja })
    }

    /// Fail unless CMake is at least `min`.
    pub fn require_cmake_version(&self, min: &semver::Version) -> Result<semver::Version> {
        let version = detect_tool_version(&self.cmake, parse_cmake_version)?;
        if version < *min {
            bail!(
                "CMake {} is too old; version {} or newer is required",
                version,
                min
            );
        }
        tracing::debug!("Using CMake {}", version);
        Ok(version)
    }
}

/// CMake + Ninja driver.
#[derive(Debug, Clone)]
pub struct CMakeBuilder {
    tools: BuildTools,
    source_dir: PathBuf,
    build_dir: PathBuf,
    build_type: BuildType,
    cmake_args: Vec<String>,
    jobs: usize,
}

impl CMakeBuilder {
    /// Create a new CMake builder configuring `source_dir` into `build_dir`.
    pub fn new(
        tools: &BuildTools,
        source_dir: PathBuf,
        build_dir: PathBuf,
        build_type: BuildType,
    ) -> Self {
        CMakeBuilder {
            tools: tools.clone(),
            source_dir,
            build_dir,
            build_type,
            cmake_args: Vec::new(),
            jobs: 1,
        }
    }

    /// Add CMake arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cmake_args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Set the number of parallel Ninja jobs (`0` lets Ninja decide).
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Configure and build.
    pub fn build(&self, executor: &Executor) -> Result<()> {
        // Ensure build directory exists
        ensure_dir(&self.build_dir)?;

        self.configure(executor)?;
        self.compile(executor)
    }

    /// The configure command, run from the build directory.
    pub fn configure_command(&self) -> ProcessBuilder {
        let source = crate::util::fs::relative_path(&self.build_dir, &self.source_dir);

        ProcessBuilder::new(&self.tools.cmake)
            .args(["-G", "Ninja"])
            .arg(format!("-DCMAKE_BUILD_TYPE={}", self.build_type))
            .args(&self.cmake_args)
            .arg(source)
            .cwd(&self.build_dir)
    }

    /// The build command, run from the build directory.
    pub fn compile_command(&self) -> ProcessBuilder {
        ProcessBuilder::new(&self.tools.ninja)
            .arg(format!("-j{}", self.jobs))
            .cwd(&self.build_dir)
    }

    /// Run CMake configuration.
    fn configure(&self, executor: &Executor) -> Result<()> {
        executor
            .execute("Configuring CMake project...", &self.configure_command())
            .context("CMake configuration failed")?;
        Ok(())
    }

    /// Run the Ninja build.
    fn compile(&self, executor: &Executor) -> Result<()> {
        executor
            .execute("Building...", &self.compile_command())
            .context("build failed")?;
        Ok(())
    }
}
