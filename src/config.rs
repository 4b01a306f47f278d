//! YAML configuration loading and normalization.
//!
//! A config file holds one `common_config` block and a list of `io_configs`, one per generation unit:
//!
//! ```yaml
//! common_config:
//!   compiler: null
//!   cxx_flags: ["-std=c++17"]
//!   include_directories: ["${CFG_DIR}/include"]
//! io_configs:
//!   - inputs: ["sample.h"]
//!     output: "sample_binding.cc.inc"
//!     decl_fn_name: "DeclFn"
//! ```
//!
//! ## Notes
//! - `${CFG_DIR}` expands to the directory of the config file (only when loading from a file).
//! - Inputs that are not already `"quoted"` or `<bracketed>` get quoted. Absolute quoted inputs below an absolute
//!   `-I` directory are rewritten relative to it, so the generated `#include` lines stay portable.
//! - System include directories are discovered from a C++ compiler (`<cxx> -E -x c++ - -v`). Discovery failure is
//!   a warning, not an error.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("file_or_content can not be empty")]
    #[diagnostic(code(bindweave::config::empty))]
    Empty,

    #[error("No IOConfig is specified")]
    #[diagnostic(code(bindweave::config::no_io_config), help("add at least one entry under `io_configs`"))]
    NoIoConfig,

    #[error("Inputs and output can not be empty")]
    #[diagnostic(code(bindweave::config::empty_unit))]
    EmptyUnit { index: usize },

    #[error("invalid YAML configuration")]
    #[diagnostic(code(bindweave::config::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to read config `{}`", .path.display())]
    #[diagnostic(code(bindweave::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Settings shared by every unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    /// Compiler used for system include discovery.
    pub compiler: Option<String>,
    pub cxx_flags: Vec<String>,
    pub include_directories: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIoConfig {
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    output: String,
    #[serde(default = "default_decl_fn_name")]
    decl_fn_name: String,
    #[serde(default)]
    root_module_namespace: String,
    #[serde(default)]
    extra_cxx_flags: Vec<String>,
    #[serde(default = "default_true")]
    gen_docstring: bool,
    #[serde(default)]
    strict_visibility_mode: bool,
}

fn default_decl_fn_name() -> String {
    "DeclFn".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    common_config: Option<CommonConfig>,
    io_configs: Option<Vec<RawIoConfig>>,
}

/// One normalized generation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitConfig {
    /// Include spellings, each `"quoted"` or `<bracketed>`.
    pub inputs: Vec<String>,
    pub output: PathBuf,
    pub decl_fn_name: String,
    /// `a::b` restricts emission to that namespace; empty emits everything.
    pub root_module_namespace: String,
    pub gen_docstring: bool,
    pub strict_visibility_mode: bool,
    /// Complete compiler flags for this unit.
    pub cxx_flags: Vec<String>,
}

impl UnitConfig {
    /// A unit with default options, for programmatic use.
    pub fn new(inputs: Vec<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs: normalize_inputs(inputs, &[]),
            output: output.into(),
            decl_fn_name: default_decl_fn_name(),
            root_module_namespace: String::new(),
            gen_docstring: true,
            strict_visibility_mode: false,
            cxx_flags: Vec::new(),
        }
    }
}

/// How system include directories are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeDiscovery {
    /// Ask a C++ compiler.
    Compiler,
    /// Skip discovery (tests, or when flags are complete already).
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub common: CommonConfig,
    pub units: Vec<UnitConfig>,
}

impl Config {
    /// Load a config file, expanding `${CFG_DIR}`.
    pub fn load(path: &Path, discovery: IncludeDiscovery) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = absolute(path.parent().unwrap_or_else(|| Path::new(".")));
        let content = content.replace("${CFG_DIR}", &dir.to_string_lossy());
        Self::parse(&content, discovery)
    }

    /// Parse config text.
    pub fn parse(content: &str, discovery: IncludeDiscovery) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty);
        }
        let raw: Option<RawConfig> = serde_yaml::from_str(content)?;
        let raw = raw.unwrap_or_default();
        let common = raw.common_config.unwrap_or_default();
        let io_configs = raw.io_configs.unwrap_or_default();
        if io_configs.is_empty() {
            return Err(ConfigError::NoIoConfig);
        }

        let system_includes = match discovery {
            IncludeDiscovery::Compiler => discover_system_includes(common.compiler.as_deref()),
            IncludeDiscovery::Disabled => Vec::new(),
        };
        let mut common_flags = split_flags(&common.cxx_flags);
        common_flags.extend(common.include_directories.iter().map(|dir| format!("-I{dir}")));
        common_flags.extend(system_includes.iter().map(|dir| format!("-I{dir}")));

        let units = io_configs
            .into_iter()
            .enumerate()
            .map(|(index, io)| {
                if io.inputs.is_empty() || io.output.is_empty() {
                    return Err(ConfigError::EmptyUnit { index });
                }
                let mut cxx_flags = common_flags.clone();
                cxx_flags.extend(split_flags(&io.extra_cxx_flags));
                Ok(UnitConfig {
                    inputs: normalize_inputs(io.inputs, &cxx_flags),
                    output: PathBuf::from(io.output),
                    decl_fn_name: io.decl_fn_name,
                    root_module_namespace: io.root_module_namespace,
                    gen_docstring: io.gen_docstring,
                    strict_visibility_mode: io.strict_visibility_mode,
                    cxx_flags,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { common, units })
    }
}

fn split_flags(flags: &[String]) -> Vec<String> {
    flags
        .iter()
        .flat_map(|flag| flag.split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Quote bare inputs and shorten absolute ones below absolute `-I` directories.
pub fn normalize_inputs(inputs: Vec<String>, cxx_flags: &[String]) -> Vec<String> {
    let prefixes: Vec<PathBuf> = cxx_flags
        .iter()
        .filter_map(|flag| flag.strip_prefix("-I"))
        .map(Path::new)
        .filter(|dir| dir.is_absolute())
        .map(absolute)
        .collect();

    inputs
        .into_iter()
        .map(|input| {
            if input.starts_with('<') {
                return input;
            }
            let bare = input
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(&input)
                .to_string();
            let path = Path::new(&bare);
            if path.is_absolute() {
                let path = absolute(path);
                if let Some(rel) = prefixes.iter().find_map(|p| path.strip_prefix(p).ok()) {
                    return format!("\"{}\"", rel.to_string_lossy());
                }
                return format!("\"{}\"", path.to_string_lossy());
            }
            format!("\"{bare}\"")
        })
        .collect()
}

/// Lexically normalize a path (no filesystem access beyond the current directory).
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// System include directories reported by the first compiler that answers.
pub fn discover_system_includes(compiler: Option<&str>) -> Vec<String> {
    let env_cxx = std::env::var("CXX").ok();
    let candidates = compiler
        .into_iter()
        .map(str::to_string)
        .chain(env_cxx)
        .chain(["c++", "g++", "clang++"].map(str::to_string));
    for candidate in candidates {
        let output = Command::new(&candidate)
            .args(["-E", "-x", "c++", "-", "-v"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();
        let Ok(output) = output else {
            tracing::debug!(compiler = %candidate, "compiler not available");
            continue;
        };
        let dirs = parse_search_list(&String::from_utf8_lossy(&output.stderr));
        if !dirs.is_empty() {
            tracing::debug!(compiler = %candidate, count = dirs.len(), "discovered system include directories");
            return dirs;
        }
    }
    tracing::warn!("could not discover system include directories from any C++ compiler");
    Vec::new()
}

/// Extract the `#include <...>` search list from verbose preprocessor output.
pub fn parse_search_list(stderr: &str) -> Vec<String> {
    let lines: Vec<&str> = stderr.lines().map(str::trim).collect();
    let start = lines.iter().position(|l| *l == "#include <...> search starts here:");
    let end = lines.iter().position(|l| *l == "End of search list.");
    match (start, end) {
        (Some(start), Some(end)) if start < end => lines[start + 1..end]
            .iter()
            .map(|l| l.replace("(framework directory)", "").trim().to_string())
            .filter(|l| !l.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
