//! Callable expressions for function and method registrations.
//!
//! ## Notes
//! - Function pointer types are spelled by hand from canonical parameter and result types, so overloads resolve
//!   through `static_cast` without relying on the declared sugar.
//! - When every parameter and the result classify as identity, the registration takes the function pointer itself.
//!   Otherwise it takes a lambda that converts wire arguments to native ones and the native result back.

use bindweave_ast::{Cursor, CursorKind, RefQualifier, TranslationUnit, Type};

use crate::classify::{Classification, classify, involves_unique_ptr};
use crate::context::GenContext;

/// Whether the cursor is a member function called on an object.
pub fn is_instance_method(cursor: Cursor<'_>) -> bool {
    cursor.kind() == CursorKind::Method && !cursor.is_static_method()
}

/// Spelling of the class that owns a method: its canonical type, else its qualified name.
pub fn owner_spelling(cursor: Cursor<'_>) -> String {
    match cursor.semantic_parent() {
        Some(parent) => parent
            .ty()
            .map(|ty| ty.canonical().spelling.clone())
            .unwrap_or_else(|| parent.qualified_name()),
        None => String::new(),
    }
}

/// `&Scope::name`, with explicit template arguments for function template specializations.
pub fn address_expression(cursor: Cursor<'_>) -> String {
    let scope = if cursor.kind() == CursorKind::Method {
        owner_spelling(cursor)
    } else {
        cursor.qualified_scopes().join("::")
    };
    let mut name = cursor.spelling().to_string();
    if cursor.kind() != CursorKind::Method && !cursor.template_args().is_empty() {
        let args: Vec<String> = cursor.template_args().iter().map(|a| a.spelling()).collect();
        name = format!("{name}<{}>", args.join(", "));
    }
    if scope.is_empty() {
        format!("&{name}")
    } else {
        format!("&{scope}::{name}")
    }
}

/// Trailing qualifiers of a method type (`const`, `&`, `&&`, `noexcept`), with a leading space or empty.
pub fn method_qualifiers(cursor: Cursor<'_>) -> String {
    cursor
        .ty()
        .and_then(|ty| ty.spelling.rfind(')').map(|pos| ty.spelling[pos + 1..].trim().to_string()))
        .filter(|q| !q.is_empty())
        .map(|q| format!(" {q}"))
        .unwrap_or_default()
}

fn result_spelling(cursor: Cursor<'_>) -> String {
    cursor
        .result_type()
        .map(|ty| ty.canonical().spelling.clone())
        .unwrap_or_else(|| "void".to_string())
}

fn param_spellings(cursor: Cursor<'_>) -> Vec<String> {
    cursor
        .arguments()
        .map(|arg| arg.ty().map(|ty| ty.canonical().spelling.clone()).unwrap_or_default())
        .collect()
}

/// `R (Class::*)(A, B) const` for instance methods, `R (*)(A, B)` otherwise.
pub fn fn_pointer_type(cursor: Cursor<'_>) -> String {
    let params = param_spellings(cursor).join(", ");
    let result = result_spelling(cursor);
    if is_instance_method(cursor) {
        format!(
            "{result} ({}::*)({params}){}",
            owner_spelling(cursor),
            method_qualifiers(cursor)
        )
    } else {
        format!("{result} (*)({params})")
    }
}

/// The registration expression when no conversion is needed. Also the text kept in disabled registrations.
pub fn fallback_expression(cursor: Cursor<'_>) -> String {
    format!("static_cast<{}>({})", fn_pointer_type(cursor), address_expression(cursor))
}

/// Parameter and result types of a function-like cursor.
pub fn signature_types<'tu>(cursor: Cursor<'tu>) -> Vec<&'tu Type> {
    cursor
        .arguments()
        .filter_map(|arg| arg.ty())
        .chain(cursor.result_type())
        .collect()
}

/// Build the callable for a registration, or `None` when the function cannot be bound.
pub fn build_callable_expression(ctx: &mut GenContext, tu: &TranslationUnit, cursor: Cursor<'_>) -> Option<String> {
    if involves_unique_ptr(signature_types(cursor)) {
        return None;
    }
    if cursor.ty().is_some_and(|ty| ty.ref_qualifier == RefQualifier::RValue) {
        return None;
    }

    // every adapter conversion in the thunk owns its tag
    let params: Vec<Classification> = cursor
        .arguments()
        .filter_map(|arg| arg.ty())
        .map(|ty| classify(ctx, tu, ty).at_call_site(ctx))
        .collect();
    let result = cursor.result_type().map(|ty| classify(ctx, tu, ty).at_call_site(ctx));

    let all_identity = params.iter().all(Classification::is_identity)
        && result.as_ref().is_none_or(Classification::is_identity);
    let pointer = fallback_expression(cursor);
    if all_identity {
        return Some(pointer);
    }

    let mut lambda_params = Vec::new();
    if is_instance_method(cursor) {
        let constness = if cursor.is_const_method() { "const " } else { "" };
        lambda_params.push(format!("{constness}{} & self", owner_spelling(cursor)));
    }
    let mut call_args = Vec::new();
    for (i, param) in params.iter().enumerate() {
        let name = format!("arg{i}");
        if param.is_identity() {
            lambda_params.push(format!("{} {name}", param.native_type));
            call_args.push(format!("std::forward<{}>({name})", param.native_type));
        } else {
            lambda_params.push(format!("{} {name}", param.wire_type));
            call_args.push(param.wire_to_native.apply(&name));
        }
    }
    let call = if is_instance_method(cursor) {
        format!("(self.*fn)({})", call_args.join(", "))
    } else {
        format!("fn({})", call_args.join(", "))
    };
    let body = match &result {
        Some(r) if r.native_type != "void" => format!("return {};", r.native_to_wire.apply(&call)),
        _ => format!("{call};"),
    };
    Some(format!("[fn = {pointer}]({}) {{ {body} }}", lambda_params.join(", ")))
}
