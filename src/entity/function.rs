//! Free functions and their overload sets.

use bindweave_ast::CursorId;

use super::{Entity, Members};
use crate::context::GenContext;
use crate::emit::writer::CppWriter;
use crate::gen_unit::GenerationUnit;
use crate::naming::{DocPlacement, disable_guard, inject_docstring};
use crate::signature::{build_callable_expression, fallback_expression};

/// Declarations sharing the entity's exported name, besides the entity's own cursor.
#[derive(Debug, Default)]
pub struct FunctionData {
    overloads: Vec<CursorId>,
}

impl FunctionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overloads(&self) -> &[CursorId] {
        &self.overloads
    }

    pub(crate) fn add_overload(&mut self, cursor: CursorId) {
        self.overloads.push(cursor);
    }

    /// One guarded `handle.def` per declaration, in declaration order.
    pub(super) fn members(&self, entity: &Entity, unit: &GenerationUnit, ctx: &mut GenContext) -> Members {
        let tu = unit.tu();
        let mut w = CppWriter::new();
        let declarations = std::iter::once(entity.cursor()).chain(self.overloads.iter().copied());
        for (index, id) in declarations.enumerate() {
            let cursor = tu.cursor(id);
            let callable = build_callable_expression(ctx, tu, cursor);
            let disabled = callable.is_none();
            let expr = callable.unwrap_or_else(|| fallback_expression(cursor));
            let member = match index {
                0 => entity.name().to_string(),
                n => format!("{}{n}", entity.name()),
            };
            let comment = if unit.gen_docstring() { cursor.raw_comment() } else { None };
            let call = inject_docstring(
                &format!("handle.def(\"{}\", {expr});", entity.name()),
                comment,
                DocPlacement::LastArg,
            );
            w.guarded(&disable_guard(entity.struct_name(), &member), disabled, |w| w.line(&call));
        }
        Members {
            statements: vec![w.finish()],
            extra: Vec::new(),
        }
    }
}
