//! Front ends that turn a driver file into a [`TranslationUnit`].
//!
//! ## Notes
//! - The driver file is unsaved: it exists only as `ParseRequest::contents` and is made of `#include` lines plus any
//!   appended explicit-instantiation directives.
//! - Front ends return units with generation 0. The caller owning the unit re-tags it, so generations are counted
//!   per generation unit rather than per front end.

use std::fs;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

use crate::unit::TranslationUnit;

/// Input for one parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    /// Name given to the unsaved driver file.
    pub file_name: String,
    pub contents: String,
    pub args: Vec<String>,
}

impl ParseRequest {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
            args,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("failed to parse `{file}`: {} error diagnostic(s)", .diagnostics.len())]
    #[diagnostic(code(bindweave::parse::diagnostics))]
    Diagnostics { file: String, diagnostics: Vec<String> },

    #[error("failed to read AST snapshot `{}`", .path.display())]
    #[diagnostic(code(bindweave::parse::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed AST snapshot")]
    #[diagnostic(code(bindweave::parse::json))]
    Json(#[from] serde_json::Error),

    #[error("invalid AST snapshot: {0}")]
    #[diagnostic(code(bindweave::parse::snapshot))]
    InvalidSnapshot(String),

    #[error("front end unavailable: {0}")]
    #[diagnostic(code(bindweave::parse::unavailable))]
    Unavailable(String),
}

/// Something that can parse a driver file.
pub trait Frontend {
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError>;
}

impl<F> Frontend for F
where
    F: FnMut(&ParseRequest) -> Result<TranslationUnit, ParseError>,
{
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError> {
        self(request)
    }
}

/// Serves a pre-recorded translation unit.
///
/// A snapshot cannot materialize new template instantiations, so a reparse with extra directives returns the
/// recorded unit unchanged (with a warning).
#[derive(Debug, Clone)]
pub struct SnapshotFrontend {
    unit: TranslationUnit,
    first_request: Option<String>,
}

impl SnapshotFrontend {
    pub fn from_unit(unit: TranslationUnit) -> Self {
        Self {
            unit,
            first_request: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        let unit: TranslationUnit = serde_json::from_str(json)?;
        unit.validate()?;
        Ok(Self::from_unit(unit))
    }

    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let json = fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn unit(&self) -> &TranslationUnit {
        &self.unit
    }
}

impl Frontend for SnapshotFrontend {
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError> {
        match &self.first_request {
            None => self.first_request = Some(request.contents.clone()),
            Some(first) if *first != request.contents => {
                tracing::warn!(
                    file = %request.file_name,
                    "AST snapshot cannot be reparsed with new directives, reusing the recorded unit"
                );
            }
            Some(_) => {}
        }
        Ok(self.unit.clone())
    }
}

/// Serialize a unit as a JSON snapshot.
pub fn to_json(unit: &TranslationUnit) -> Result<String, ParseError> {
    Ok(serde_json::to_string_pretty(unit)?)
}
