//! Generation driver: runs every configured unit end to end.
//!
//! Per unit: parse, build the entity tree (with the instantiation pre-pass), emit, write the output and optionally
//! run `clang-format -i` on it. A failing unit is logged and recorded in the [`RunReport`]; the remaining units
//! still run.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use bindweave_ast::Frontend;

use crate::config::{Config, UnitConfig};
use crate::context::GenContext;
use crate::emit::emit_unit;
use crate::errors::{GenerationError, GenerationResult};
use crate::gen_unit::GenerationUnit;
use crate::tree::build_tree;

/// Options that are not part of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Run `clang-format -i` on every written file.
    pub format: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { format: true }
    }
}

/// Outcome of one [`run_config`] call.
#[derive(Debug, Default)]
pub struct RunReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, GenerationError)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Build the tree of a loaded unit and emit it, in memory.
pub fn generate_source(
    unit: &mut GenerationUnit,
    ctx: &mut GenContext,
    frontend: &mut dyn Frontend,
) -> GenerationResult<String> {
    let tree = build_tree(unit, ctx, frontend)?;
    emit_unit(&tree, unit, ctx)
}

/// Load, generate and write one unit. Returns the written path.
#[tracing::instrument(skip_all, fields(output = %config.output.display()))]
pub fn generate_unit(
    config: UnitConfig,
    ctx: &mut GenContext,
    frontend: &mut dyn Frontend,
    options: RunOptions,
) -> GenerationResult<PathBuf> {
    ctx.reset();
    let output = config.output.clone();
    let mut unit = GenerationUnit::load(config, frontend)?;
    let source = generate_source(&mut unit, ctx, frontend)?;
    write_output(&output, &source)?;
    if options.format {
        run_clang_format(&output);
    }
    tracing::info!(path = %output.display(), "generated bindings");
    Ok(output)
}

/// Run every unit of `config`, continuing past failures.
pub fn run_config(config: &Config, frontend: &mut dyn Frontend, options: RunOptions) -> RunReport {
    let mut ctx = GenContext::new();
    let mut report = RunReport::default();
    for unit in &config.units {
        let output = unit.output.clone();
        match generate_unit(unit.clone(), &mut ctx, frontend, options) {
            Ok(path) => report.written.push(path),
            Err(err) => {
                tracing::error!(output = %output.display(), error = %err, "generation failed");
                report.failed.push((output, err));
            }
        }
    }
    report
}

fn write_output(path: &Path, source: &str) -> GenerationResult<()> {
    let io_err = |source| GenerationError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, source).map_err(io_err)
}

/// Best effort: a missing or failing `clang-format` only warns.
fn run_clang_format(path: &Path) {
    let status = Command::new("clang-format")
        .arg("-i")
        .arg(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => tracing::debug!(path = %path.display(), "formatted"),
        Ok(status) => tracing::warn!(path = %path.display(), %status, "clang-format failed"),
        Err(err) => tracing::warn!(error = %err, "clang-format not available, output left unformatted"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindweave_ast::{CursorKind, Node, ParseError, ParseRequest, TranslationUnit, Type, UnitBuilder};

    fn unit_ast() -> TranslationUnit {
        let mut b = UnitBuilder::new(crate::gen_unit::DRIVER_FILE);
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "geo").at("geo.h", 1));
        b.add(
            ns,
            Node::new(CursorKind::FunctionDecl, "area")
                .returns(Type::builtin("double"))
                .with_type(Type::function(Type::builtin("double"), vec![]))
                .at("geo.h", 2),
        );
        b.finish()
    }

    #[test]
    fn writes_output_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested/out.cc.inc");
        let tu = unit_ast();
        let mut frontend = move |_: &ParseRequest| Ok::<_, ParseError>(tu.clone());
        let config = Config {
            common: Default::default(),
            units: vec![UnitConfig::new(vec!["geo.h".into()], &output)],
        };
        let report = run_config(&config, &mut frontend, RunOptions { format: false });
        assert!(report.is_success());
        assert_eq!(report.written, vec![output.clone()]);
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("#include \"geo.h\""));
        assert!(text.contains("handle.def(\"area\", static_cast<double (*)()>(&geo::area));"));
    }

    #[test]
    fn failing_unit_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.cc");
        let bad = dir.path().join("bad.cc");
        let tu = unit_ast();
        let mut frontend = move |request: &ParseRequest| {
            if request.contents.contains("broken.h") {
                Err(ParseError::Diagnostics {
                    file: request.file_name.clone(),
                    diagnostics: vec!["broken.h:1:1: error: unknown type name".to_string()],
                })
            } else {
                Ok(tu.clone())
            }
        };
        let config = Config {
            common: Default::default(),
            units: vec![
                UnitConfig::new(vec!["broken.h".into()], &bad),
                UnitConfig::new(vec!["geo.h".into()], &good),
            ],
        };
        let report = run_config(&config, &mut frontend, RunOptions { format: false });
        assert_eq!(report.written, vec![good.clone()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, bad);
        assert!(!bad.exists());
    }
}
