//! C++ AST snapshots for the bindweave binding generator.
//!
//! A [`TranslationUnit`] is an arena of [`Node`] records produced by a [`Frontend`]. The generator never talks to
//! a compiler directly: it walks borrowed [`Cursor`] views and stores generation-tagged [`CursorId`] handles.
//!
//! ## Notes
//! - Every parse yields a unit with a fresh generation. Resolving a [`CursorId`] from an older generation is a
//!   logic error and panics, so no handle can silently survive a reparse.
//! - The `libclang` feature adds [`ClangFrontend`]; without it, units come from JSON snapshots
//!   ([`SnapshotFrontend`]) or are built in code with [`UnitBuilder`].
//!
//! ## Examples
//! ```rust
//! use bindweave_ast::{CursorKind, Node, UnitBuilder};
//!
//! let mut b = UnitBuilder::new("sample.h");
//! let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "earth").at("sample.h", 1));
//! let tu = b.finish();
//! assert_eq!(tu.at(ns).qualified_name(), "earth");
//! ```

pub mod builder;
pub mod cursor;
pub mod frontend;
#[cfg(feature = "libclang")]
pub mod libclang;
pub mod types;
pub mod unit;

pub use builder::UnitBuilder;
pub use cursor::{
    Access, CursorKind, DeclFlags, Linkage, Location, Node, NodeIndex, SpecializationKind, TemplateArgument, Visibility,
};
pub use frontend::{Frontend, ParseError, ParseRequest, SnapshotFrontend, to_json};
#[cfg(feature = "libclang")]
pub use libclang::ClangFrontend;
pub use types::{RefQualifier, Type, TypeKind};
pub use unit::{Cursor, CursorId, TranslationUnit};
