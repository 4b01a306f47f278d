//! Enums.

use bindweave_ast::CursorKind;

use super::{Entity, Members};
use crate::gen_unit::GenerationUnit;
use crate::naming::{DocPlacement, inject_docstring};

pub(super) fn init_expression(entity: &Entity, unit: &GenerationUnit) -> String {
    let code = format!("parent_h.Handle(), \"{}\", pybind11::arithmetic()", entity.name());
    if !unit.gen_docstring() {
        return code;
    }
    inject_docstring(&code, unit.tu().cursor(entity.cursor()).raw_comment(), DocPlacement::Append)
}

/// `value()` per enumerator; unscoped enums also export their values into the enclosing scope.
pub(super) fn members(entity: &Entity, unit: &GenerationUnit) -> Members {
    let tu = unit.tu();
    let cursor = tu.cursor(entity.cursor());
    let body = cursor.definition().unwrap_or(cursor);
    let mut statements: Vec<String> = body
        .children()
        .filter(|c| c.kind() == CursorKind::EnumConstantDecl)
        .map(|c| {
            format!(
                "handle.value(\"{name}\", {owner}::{name});",
                name = c.spelling(),
                owner = entity.reference_name()
            )
        })
        .collect();
    if !body.is_scoped_enum() {
        statements.push("handle.export_values();".to_string());
    }
    Members {
        statements,
        extra: Vec::new(),
    }
}
