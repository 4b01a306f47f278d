//! Explicit-instantiation pre-pass.
//!
//! Class template specializations that the inputs only use implicitly (as a field, parameter, base or return type)
//! are not visited by an AST walk. For each of them the pre-pass writes an `extern template class X<...>;` line;
//! appending those lines to the driver file and parsing again turns them into explicit instantiations the tree
//! builder can bind.
//!
//! ## Notes
//! - Only templates declared in the unit's inputs are considered.
//! - Specializations that are already explicit are left alone.
//! - Directives are sorted by name, so the reparsed driver file does not depend on traversal order.

use std::collections::{BTreeMap, HashSet};

use bindweave_ast::{Cursor, CursorKind, SpecializationKind, Type, TypeKind};

use crate::gen_unit::GenerationUnit;

/// `extern template` lines for every implicit instantiation the inputs rely on.
#[tracing::instrument(skip_all, fields(generation = unit.generation()))]
pub fn collect_directives(unit: &GenerationUnit) -> Vec<String> {
    let tu = unit.tu();
    let mut explicit = HashSet::new();
    let mut inferred: BTreeMap<String, &'static str> = BTreeMap::new();

    for cursor in tu.walk_preorder() {
        if cursor.kind().is_record()
            && cursor
                .specialization_kind()
                .is_some_and(|kind| kind != SpecializationKind::Implicit)
        {
            explicit.insert(specialization_name(cursor));
            continue;
        }
        let usage = match cursor.kind() {
            CursorKind::FieldDecl | CursorKind::ParmDecl | CursorKind::BaseSpecifier => cursor.ty(),
            CursorKind::FunctionDecl | CursorKind::Method => cursor.result_type(),
            _ => None,
        };
        let Some(ty) = usage else { continue };
        if let Some((name, keyword)) = implicit_instantiation(unit, ty) {
            inferred.entry(name).or_insert(keyword);
        }
    }

    let directives: Vec<String> = inferred
        .into_iter()
        .filter(|(name, _)| !explicit.contains(name))
        .map(|(name, keyword)| format!("extern template {keyword} {name};"))
        .collect();
    tracing::debug!(count = directives.len(), "collected instantiation directives");
    directives
}

/// Name and class-key of the specialization `ty` names, when it is an implicit one of a template in the inputs.
fn implicit_instantiation(unit: &GenerationUnit, ty: &Type) -> Option<(String, &'static str)> {
    let inner = ty.innermost();
    if inner.kind != TypeKind::Record || inner.is_dependent() {
        return None;
    }
    let decl = unit.tu().declaration_of(inner)?;
    if decl.specialization_kind() != Some(SpecializationKind::Implicit) {
        return None;
    }
    let template = decl.specialized_template()?;
    if !unit.is_cursor_in_inputs(template) {
        return None;
    }
    let keyword = match template.templated_kind() {
        Some(CursorKind::StructDecl) => "struct",
        _ => "class",
    };
    Some((inner.unqualified_spelling().to_string(), keyword))
}

fn specialization_name(cursor: Cursor<'_>) -> String {
    match cursor.ty() {
        Some(ty) => ty.canonical().unqualified_spelling().to_string(),
        None => {
            let mut parts = cursor.qualified_scopes();
            parts.push(cursor.display_name());
            parts.join("::")
        }
    }
}
