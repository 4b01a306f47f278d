//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::Path;

use bindweave_ast::{Frontend, SnapshotFrontend};

use crate::config::{Config, IncludeDiscovery};
use crate::driver::{RunOptions, run_config};

use super::{CliError, CliResult, ExitCode};

/// Load a config file, reporting problems as diagnostics.
fn load_config(path: &Path) -> CliResult<Config> {
    Config::load(path, IncludeDiscovery::Compiler).map_err(CliError::diagnostic)
}

/// Pick the front end: a snapshot when given, libclang otherwise.
fn frontend(ast_snapshot: Option<&Path>) -> CliResult<Box<dyn Frontend>> {
    if let Some(path) = ast_snapshot {
        let snapshot = SnapshotFrontend::from_path(path).map_err(CliError::diagnostic)?;
        return Ok(Box::new(snapshot));
    }
    default_frontend()
}

#[cfg(feature = "libclang")]
fn default_frontend() -> CliResult<Box<dyn Frontend>> {
    Ok(Box::new(bindweave_ast::ClangFrontend::new()))
}

#[cfg(not(feature = "libclang"))]
fn default_frontend() -> CliResult<Box<dyn Frontend>> {
    Err(CliError::failure(
        "Error: built without the `libclang` feature; pass --ast-snapshot <JSON>",
    ))
}

/// Generate every configured unit.
pub fn generate(config_path: &Path, ast_snapshot: Option<&Path>, format: bool) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let mut frontend = frontend(ast_snapshot)?;
    let report = run_config(&config, frontend.as_mut(), RunOptions { format });

    for path in &report.written {
        println!("✓ {}", path.display());
    }
    if report.is_success() {
        return Ok(ExitCode::SUCCESS);
    }

    let mut msg = String::new();
    let failed = report.failed.len();
    for (path, err) in report.failed {
        msg.push_str(&format!("✗ {}\n", path.display()));
        msg.push_str(&CliError::diagnostic(err).message);
        msg.push('\n');
    }
    msg.push_str(&format!("{failed} unit(s) failed"));
    Err(CliError::failure(msg))
}

/// Print the normalized units of a config file.
pub fn check_config(config_path: &Path) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let yaml = serde_yaml::to_string(&config.units)
        .map_err(|e| CliError::failure(format!("Error rendering config: {e}")))?;
    print!("{yaml}");
    println!("✓ {} unit(s) configured", config.units.len());
    Ok(ExitCode::SUCCESS)
}
