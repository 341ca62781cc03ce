//! Built-in defaults for the PyRosetta binding profile.
//!
//! Every list here can be overridden from `bindery.toml`.

/// Name of the binding project; the build root lives under `build/<name>`.
pub const BINDING_NAME: &str = "PyRosetta";

/// Bindings directory relative to the source root.
pub const BINDINGS_DIR: &str = "src/python/PyRosetta";

/// Root module passed to the generator; also names its output manifest.
pub const ROOT_MODULE: &str = "rosetta";

/// Generator policy file, relative to the bindings directory.
pub const GENERATOR_CONFIG: &str = "rosetta.config";

/// Language standard flag passed through to the generator's clang front end.
pub const CXX_STANDARD: &str = "c++11";

/// Compiler used when none is configured.
pub const COMPILER: &str = "clang";

/// Library groups in link order; a group may only depend on earlier ones.
pub const TIER_GROUPS: &[&str] = &["ObjexxFCL", "utility", "numeric", "basic", "core", "protocols"];

/// Leaf group whose libraries are ordered by their second name component.
pub const SHARDED_GROUP: &str = "protocols";

/// Descriptors under `src/` that are applications, not libraries.
pub const EXCLUDED_LIBRARIES: &[&str] = &["apps", "pilot_apps", "devel"];

/// Top-level directories under `src/` scanned for bindable headers.
pub const HEADER_ROOTS: &[&str] = &["ObjexxFCL", "utility", "numeric", "basic", "core", "protocols"];

/// Directories (relative to the source root) whose headers are never bound.
pub const BANNED_DIRS: &[&str] = &["src/utility/pointer", "src/protocols/jd3"];

/// Individual headers (relative to `src/`) that are never bound.
pub const BANNED_HEADERS: &[&str] = &[
    "utility/py/PyHelper.hh",
    "utility/keys/KeyCount.hh",
    "utility/keys/KeyLookup.functors.hh",
    "core/scoring/fiber_diffraction/FiberDiffractionKernelGpu.hh",
];

/// Glob patterns for generated option files that must not be bound.
pub const GENERATED_PATTERNS: &[&str] = &["basic/options/keys/OptionKeys.cc.gen*"];

/// System include directories, relative to the source root.
pub const SYSTEM_INCLUDE_DIRS: &[&str] = &[
    "external",
    "external/include",
    "external/boost_1_55_0",
    "external/dbio",
    "external/dbio/sqlite3",
    "external/libxml2/include",
];

/// Preprocessor defines applied to the whole binding build.
pub const DEFINES: &[&str] = &[
    "PYROSETTA",
    "BOOST_ERROR_CODE_HEADER_ONLY",
    "BOOST_SYSTEM_NO_DEPRECATED",
    "BOOST_MATH_NO_LONG_DOUBLE_MATH_FUNCTIONS",
    "CXX11",
    "PTR_STD",
];

/// Commands run in the source root before headers are scanned.
pub const PREPARE_COMMANDS: &[&str] = &[
    "./version.py",
    "./update_options.sh",
    "./update_ResidueType_enum_files.sh",
];

/// libc++ headers shipped with Xcode, needed by the generator on macOS.
pub const MACOS_LIBCXX_INCLUDE: &str = "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/bin/../include/c++/v1";

/// Generator tool sources and LLVM checkout.
pub const GENERATOR_NAME: &str = "binder";
pub const LLVM_RELEASE: &str = "release_38";
pub const LLVM_DIR: &str = "llvm-3.8";
pub const LLVM_URL: &str = "http://llvm.org/git/llvm.git";
pub const CLANG_URL: &str = "http://llvm.org/git/clang.git";
pub const CLANG_EXTRA_URL: &str = "http://llvm.org/git/clang-tools-extra.git";

/// pybind11 fork and pinned revision.
pub const PYBIND11_URL: &str = "https://github.com/RosettaCommons/pybind11.git";
pub const PYBIND11_REVISION: &str = "PyRosetta";

/// Oldest CMake able to configure the generated project.
pub const MIN_CMAKE_VERSION: &str = "3.5.0";
