//! One configured generation job: its options, driver file and parsed translation unit.

use std::path::Path;

use bindweave_ast::{Cursor, Frontend, ParseError, ParseRequest, TranslationUnit};

use crate::config::UnitConfig;

/// Name of the unsaved driver file handed to the front end.
pub const DRIVER_FILE: &str = "bindweave_driver.cpp";

/// A loaded generation unit.
///
/// Owns the translation unit. The only mutation after loading is [`GenerationUnit::reparse_with`], which appends
/// directives to the driver file and replaces the unit with a newer generation.
#[derive(Debug)]
pub struct GenerationUnit {
    config: UnitConfig,
    driver: String,
    tu: TranslationUnit,
    generation: u32,
    created_at: String,
}

impl GenerationUnit {
    /// Parse the unit's inputs.
    #[tracing::instrument(skip_all, fields(output = %config.output.display(), inputs = config.inputs.len()))]
    pub fn load(config: UnitConfig, frontend: &mut dyn Frontend) -> Result<Self, ParseError> {
        let driver = include_directives(&config.inputs).join("\n");
        let request = ParseRequest::new(DRIVER_FILE, driver.clone(), config.cxx_flags.clone());
        let tu = frontend.parse(&request)?.with_generation(1);
        let created_at = chrono::Local::now().format("%m/%d/%Y, %H:%M:%S").to_string();
        Ok(Self {
            config,
            driver,
            tu,
            generation: 1,
            created_at,
        })
    }

    /// Fix the creation timestamp (reproducible output).
    pub fn with_timestamp(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = created_at.into();
        self
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    pub fn tu(&self) -> &TranslationUnit {
        &self.tu
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn gen_docstring(&self) -> bool {
        self.config.gen_docstring
    }

    pub fn strict_visibility(&self) -> bool {
        self.config.strict_visibility_mode
    }

    pub fn include_directives(&self) -> Vec<String> {
        include_directives(&self.config.inputs)
    }

    /// Input paths without their quotes or brackets.
    pub fn input_files(&self) -> impl Iterator<Item = &str> {
        self.config.inputs.iter().map(|input| {
            input
                .strip_prefix(['"', '<'])
                .and_then(|s| s.strip_suffix(['"', '>']))
                .unwrap_or(input)
        })
    }

    /// Whether the cursor is spelled in one of the inputs (or in the driver file itself).
    pub fn is_cursor_in_inputs(&self, cursor: Cursor<'_>) -> bool {
        let Some(file) = cursor.file_name() else {
            return false;
        };
        // whole path components only: `a.h` does not claim `data.h`
        let path = Path::new(file);
        path.ends_with(DRIVER_FILE) || self.input_files().any(|input| path.ends_with(input))
    }

    /// Append `directives` to the driver file and parse again.
    ///
    /// Every [`bindweave_ast::CursorId`] taken before this call belongs to an older generation and no longer
    /// resolves.
    #[tracing::instrument(skip_all, fields(generation = self.generation))]
    pub fn reparse_with(&mut self, directives: &str, frontend: &mut dyn Frontend) -> Result<(), ParseError> {
        let driver = format!("{}\n{}", self.driver, directives);
        let request = ParseRequest::new(DRIVER_FILE, driver.clone(), self.config.cxx_flags.clone());
        let next = self.generation + 1;
        self.tu = frontend.parse(&request)?.with_generation(next);
        self.generation = next;
        self.driver = driver;
        tracing::debug!(generation = next, "reparsed translation unit");
        Ok(())
    }
}

fn include_directives(inputs: &[String]) -> Vec<String> {
    inputs.iter().map(|input| format!("#include {input}")).collect()
}
