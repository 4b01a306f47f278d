#![forbid(unsafe_code)]
//! bindweave: pybind11 binding generator for C++ headers
//!
//! The pipeline for one generation unit:
//!
//! 1. [`gen_unit::GenerationUnit::load`] parses the unit's driver file through a [`bindweave_ast::Frontend`].
//! 2. [`tree::build_tree`] runs the explicit-instantiation pre-pass ([`instantiation`]) and collects every exportable
//!    namespace, class, enum and function into an [`tree::EntityTree`].
//! 3. [`emit::emit_unit`] orders entities by dependency and renders the binding source, using [`classify`] and
//!    [`signature`] for every registration.
//!
//! [`driver`] runs that pipeline for each unit of a [`config::Config`]; [`cli`] wraps the driver.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **True invariants**: If a panic represents a generator bug (logic error), use `.expect("INVARIANT: reason")`
//!   with a clear explanation. Resolving a cursor handle from an older parse generation is such a bug.

pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod driver;
pub mod emit;
pub mod entity;
pub mod errors;
pub mod gen_unit;
pub mod instantiation;
pub mod naming;
pub mod signature;
pub mod tree;
pub mod visibility;

pub use config::{Config, UnitConfig};
pub use context::GenContext;
pub use driver::{RunOptions, RunReport, generate_source, run_config};
pub use emit::emit_unit;
pub use errors::{GenerationError, GenerationResult};
pub use gen_unit::GenerationUnit;
pub use tree::{EntityTree, build_tree};
