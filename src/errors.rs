//! Errors that abort one generation unit.
//!
//! ## Notes
//! - Only fatal conditions live here. Recoverable problems (multiple inheritance, unbindable members, operator
//!   overloads, name collisions) are logged with `tracing` and leave disable guards in the output.
//! - A fatal error aborts its own unit only; the driver keeps processing the remaining units.

use std::path::PathBuf;

use bindweave_ast::ParseError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GenerationError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error("dependency cycle among {}", .entities.join(", "))]
    #[diagnostic(
        code(bindweave::emit::dependency_cycle),
        help("none of these entities has all of its dependencies generated")
    )]
    DependencyCycle { entities: Vec<String> },

    #[error("unsupported template argument `{argument}` in `{entity}`")]
    #[diagnostic(
        code(bindweave::emit::template_argument),
        help("only type and integral template arguments can be bound")
    )]
    UnsupportedTemplateArgument { entity: String, argument: String },

    #[error("root module namespace `{0}` not found")]
    #[diagnostic(code(bindweave::emit::root_namespace))]
    MissingRootNamespace(String),

    #[error("failed to write `{}`", .path.display())]
    #[diagnostic(code(bindweave::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type GenerationResult<T> = Result<T, GenerationError>;
