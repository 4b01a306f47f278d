//! Classes and structs: handle type, methods, constructors and fields.
//!
//! ## Notes
//! - Every method, constructor and field registration lives in its own virtual helper (`AddMethod_<Id>()`,
//!   `AddCtor<N>()`, `AddField_<name>()`) so a hand-written subclass of the generated struct can replace one registration at a time.
//! - Registrations that cannot compile (a `std::unique_ptr` in the signature, an rvalue-qualified method) are still
//!   written, with their disable guard defined right above them.

use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap, HashSet};

use bindweave_ast::{Cursor, CursorId, CursorKind, TranslationUnit, TypeKind};

use super::trampoline::{Trampoline, type_reference};
use super::{Entity, Members};
use crate::classify::{classify, involves_unique_ptr, is_type_deletable};
use crate::context::GenContext;
use crate::emit::writer::CppWriter;
use crate::errors::GenerationResult;
use crate::gen_unit::GenerationUnit;
use crate::naming::{DocPlacement, disable_guard, inject_docstring, raw_string_literal};
use crate::signature::{build_callable_expression, fallback_expression};
use crate::visibility::is_member_exportable;

#[derive(Debug)]
pub struct ClassData {
    base: Option<String>,
    dependencies: BTreeSet<String>,
    trampoline: OnceCell<Option<Trampoline>>,
}

impl ClassData {
    /// `base` is the reference spelling of the first base class when that base is exported.
    pub fn new(base: Option<String>) -> Self {
        Self {
            dependencies: base.iter().cloned().collect(),
            base,
            trampoline: OnceCell::new(),
        }
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &String> {
        self.dependencies.iter()
    }

    pub(super) fn trampoline(&self, tu: &TranslationUnit, cursor: CursorId) -> GenerationResult<Option<&Trampoline>> {
        if let Some(cached) = self.trampoline.get() {
            return Ok(cached.as_ref());
        }
        let detected = Trampoline::detect(tu, tu.cursor(cursor))?;
        Ok(self.trampoline.get_or_init(|| detected).as_ref())
    }

    /// `pybind11::class_<T[, trampoline][, nodelete holder][, base]>`
    pub(super) fn handle_type(
        &self,
        entity: &Entity,
        unit: &GenerationUnit,
        ctx: &mut GenContext,
    ) -> GenerationResult<String> {
        let tu = unit.tu();
        let cursor = tu.cursor(entity.cursor());
        let mut params = vec![entity.reference_name().to_string()];
        if self.trampoline(tu, entity.cursor())?.is_some() {
            params.push(Trampoline::handle_argument(entity.struct_name()));
        }
        if !is_type_deletable(cursor) {
            params.push(format!("std::unique_ptr<{}, pybind11::nodelete>", entity.reference_name()));
        }
        if let Some(base) = &self.base {
            ctx.record_used(base.clone());
            params.push(base.clone());
        }
        Ok(format!("pybind11::class_<{}>", params.join(", ")))
    }

    pub(super) fn members(
        &self,
        entity: &Entity,
        unit: &GenerationUnit,
        ctx: &mut GenContext,
    ) -> GenerationResult<Members> {
        let tu = unit.tu();
        let cursor = tu.cursor(entity.cursor());
        let body = cursor.definition().unwrap_or(cursor);
        let mut members = Members::default();
        add_methods(&mut members, entity, body, unit, ctx);
        add_constructors(&mut members, entity, body, unit, ctx);
        add_fields(&mut members, entity, body, unit, ctx);
        Ok(members)
    }
}

pub(super) fn init_expression(entity: &Entity, unit: &GenerationUnit) -> String {
    let code = format!("parent_h.Handle(), \"{}\", pybind11::dynamic_attr()", entity.name());
    if !unit.gen_docstring() {
        return code;
    }
    let comment = unit.tu().cursor(entity.cursor()).raw_comment();
    inject_docstring(&code, comment, DocPlacement::Append)
}

/// `name`, then `name1`, `name2`, ...
fn numbered(counters: &mut HashMap<String, usize>, base: &str) -> String {
    let count = counters.entry(base.to_string()).or_insert(0);
    let id = match *count {
        0 => base.to_string(),
        n => format!("{base}{n}"),
    };
    *count += 1;
    id
}

fn doc_literal(unit: &GenerationUnit, cursor: Cursor<'_>) -> Option<String> {
    if !unit.gen_docstring() {
        return None;
    }
    cursor.raw_comment().map(raw_string_literal)
}

/// One `virtual const char *<helper>()` member wrapping a guarded registration.
fn registration_helper(helper: &str, guard: &str, disabled: bool, doc: Option<&str>, call: &str) -> String {
    let mut w = CppWriter::new();
    w.block(&format!("virtual const char *{helper}()"), |w| {
        w.linef(format_args!("const char *bw_doc = {};", doc.unwrap_or("nullptr")));
        w.guarded(guard, disabled, |w| w.line(call));
        w.line("return bw_doc;");
    });
    w.finish()
}

fn doc_arg(doc: Option<&str>) -> &'static str {
    if doc.is_some() { ", bw_doc" } else { "" }
}

fn add_methods(
    members: &mut Members,
    entity: &Entity,
    body: Cursor<'_>,
    unit: &GenerationUnit,
    ctx: &mut GenContext,
) {
    let methods: Vec<Cursor<'_>> = body
        .children()
        .filter(|c| c.kind() == CursorKind::Method && is_member_exportable(*c, unit.strict_visibility()))
        .collect();

    let mut static_names = HashSet::new();
    let mut instance_names = HashSet::new();
    for m in &methods {
        if m.is_static_method() {
            static_names.insert(m.spelling());
        } else {
            instance_names.insert(m.spelling());
        }
    }

    let mut counters = HashMap::new();
    let mut warned = HashSet::new();
    for method in methods {
        let name = method.spelling();
        let mut bind_name = name.to_string();
        if method.is_static_method() && instance_names.contains(name) {
            if warned.insert(name) {
                tracing::warn!(
                    class = %entity.reference_name(),
                    method = %name,
                    "static and instance overloads share a name, static ones are bound as `{name}_`"
                );
            }
            bind_name.push('_');
        }
        let id = numbered(&mut counters, name);
        let callable = build_callable_expression(ctx, unit.tu(), method);
        let disabled = callable.is_none();
        if disabled {
            tracing::debug!(method = %method.qualified_name(), "method is not bindable, registration disabled");
        }
        let expr = callable.unwrap_or_else(|| fallback_expression(method));
        let doc = doc_literal(unit, method);
        let def = if method.is_static_method() { "def_static" } else { "def" };
        let call = format!("handle.{def}(\"{bind_name}\", {expr}{});", doc_arg(doc.as_deref()));
        let helper = format!("AddMethod_{id}");
        let guard = disable_guard(entity.struct_name(), &format!("Method_{id}"));
        members.extra.push(registration_helper(&helper, &guard, disabled, doc.as_deref(), &call));
        members.statements.push(format!("{helper}();"));
    }
}

fn add_constructors(
    members: &mut Members,
    entity: &Entity,
    body: Cursor<'_>,
    unit: &GenerationUnit,
    ctx: &mut GenContext,
) {
    let mut count = 0usize;
    for ctor in body.children().filter(|c| c.kind() == CursorKind::Constructor) {
        if !is_member_exportable(ctor, unit.strict_visibility()) {
            continue;
        }
        let param_types: Vec<_> = ctor.arguments().filter_map(|a| a.ty()).collect();
        let unique = involves_unique_ptr(param_types.iter().copied());
        // `pybind11::init<...>` takes native parameter types as is, so a parameter that needs a wrapper or an
        // adapter disables the constructor just like a `std::unique_ptr` one
        let wrapped = !unique && param_types.iter().any(|ty| !classify(ctx, unit.tu(), ty).is_identity());
        let params: Vec<String> = param_types.iter().map(|ty| type_reference(ty)).collect();

        let id = count;
        count += 1;
        let doc = doc_literal(unit, ctor);
        let call = format!(
            "handle.def(pybind11::init<{}>(){});",
            params.join(", "),
            doc_arg(doc.as_deref())
        );
        let helper = format!("AddCtor{id}");
        let guard = disable_guard(entity.struct_name(), &format!("Ctor{id}"));
        members
            .extra
            .push(registration_helper(&helper, &guard, unique || wrapped, doc.as_deref(), &call));
        members.statements.push(format!("{helper}();"));
    }
    if count == 0 {
        members
            .statements
            .push(format!("bindweave::TryAddDefaultCtor<{}>(handle);", entity.reference_name()));
    }
}

fn is_writable(field: Cursor<'_>) -> bool {
    let Some(ty) = field.ty() else { return false };
    if ty.is_const {
        return false;
    }
    let canonical = ty.canonical();
    matches!(canonical.kind, TypeKind::Bool | TypeKind::Builtin | TypeKind::Enum)
        || matches!(canonical.spelling.as_str(), "std::string" | "std::basic_string<char>")
}

fn add_fields(members: &mut Members, entity: &Entity, body: Cursor<'_>, unit: &GenerationUnit, ctx: &mut GenContext) {
    for field in body.children().filter(|c| c.kind() == CursorKind::FieldDecl) {
        if !is_member_exportable(field, unit.strict_visibility()) {
            continue;
        }
        let Some(ty) = field.ty() else { continue };
        // unbindable fields stay in the source, compiled out by their guard
        let disabled = involves_unique_ptr([ty]) || !classify(ctx, unit.tu(), ty).is_identity();
        if disabled {
            tracing::debug!(
                field = %field.qualified_name(),
                "field type cannot cross the boundary, registration disabled"
            );
        }
        let name = field.spelling();
        let binder = if is_writable(field) { "def_readwrite" } else { "def_readonly" };
        let doc = doc_literal(unit, field);
        let call = format!(
            "handle.{binder}(\"{name}\", &{owner}::{name}{});",
            doc_arg(doc.as_deref()),
            owner = entity.reference_name()
        );
        let helper = format!("AddField_{name}");
        let guard = disable_guard(entity.struct_name(), &format!("Field_{name}"));
        members.extra.push(registration_helper(&helper, &guard, disabled, doc.as_deref(), &call));
        members.statements.push(format!("{helper}();"));
    }
}
