//! Export eligibility of declarations.
//!
//! ## Notes
//! - A declaration is exportable when it is spelled in the unit's inputs, has external linkage, is public, is not
//!   deleted, is not an operator, is not a copy/move constructor, and passes the visibility check.
//! - Visibility: an explicit `default` attribute accepts and an explicit `hidden`/`protected` attribute rejects.
//!   Without an attribute, strict mode accepts only header definitions, inline functions, and members of inline
//!   namespaces; permissive mode accepts. In permissive mode only functions, methods and constructors are checked at
//!   all.
//! - Class template specializations are judged by their primary template's location and visibility.

use bindweave_ast::{Access, Cursor, CursorKind, Linkage, Visibility};

use crate::gen_unit::GenerationUnit;

const HEADER_SUFFIXES: &[&str] = &[".h", ".hh", ".hpp", ".hxx", ".h++", ".inl", ".ipp", ".tcc"];

/// Whether `cursor` should be bound by `unit`.
pub fn is_exportable(unit: &GenerationUnit, cursor: Cursor<'_>) -> bool {
    let subject = declaring_cursor(cursor);
    if !unit.is_cursor_in_inputs(subject) && !unit.is_cursor_in_inputs(cursor) {
        return false;
    }
    if matches!(cursor.linkage(), Linkage::Internal | Linkage::UniqueExternal) {
        return false;
    }
    is_member_exportable(cursor, unit.strict_visibility())
}

/// Eligibility without the input-file and linkage checks (used for members of already-accepted classes).
pub fn is_member_exportable(cursor: Cursor<'_>, strict: bool) -> bool {
    if !is_public(cursor) || cursor.is_deleted() {
        return false;
    }
    if is_operator_overload(cursor) {
        tracing::info!(
            name = %cursor.qualified_name(),
            "operator overloads are not supported, skipped"
        );
        return false;
    }
    if cursor.kind() == CursorKind::Constructor && (cursor.is_copy_constructor() || cursor.is_move_constructor()) {
        return false;
    }
    is_visible(declaring_cursor(cursor), strict)
}

/// Public, or no access specifier at all (namespace-scope declarations).
pub fn is_public(cursor: Cursor<'_>) -> bool {
    matches!(cursor.access(), None | Some(Access::Public))
}

/// Accessible from a subclass.
pub fn is_accessible_from_subclass(cursor: Cursor<'_>) -> bool {
    matches!(cursor.access(), None | Some(Access::Public) | Some(Access::Protected))
}

pub fn is_operator_overload(cursor: Cursor<'_>) -> bool {
    if cursor.kind() == CursorKind::ConversionFunction {
        return true;
    }
    match cursor.spelling().strip_prefix("operator") {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

pub fn is_visible(cursor: Cursor<'_>, strict: bool) -> bool {
    if !strict && !cursor.kind().is_function_like() {
        return true;
    }
    match cursor.visibility() {
        Some(Visibility::Default) => true,
        Some(Visibility::Hidden | Visibility::Protected) => false,
        None if !strict => true,
        // namespaces have no definition of their own to check
        None if cursor.kind() == CursorKind::Namespace => true,
        None => {
            let header_definition = cursor.is_definition() && cursor.file_name().is_some_and(is_header_file);
            header_definition || cursor.is_inline_function() || in_inline_namespace(cursor)
        }
    }
}

/// Header-like file: a known header suffix, or no extension at all (standard library headers).
pub fn is_header_file(path: &str) -> bool {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    HEADER_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) || !name.contains('.')
}

fn in_inline_namespace(cursor: Cursor<'_>) -> bool {
    let mut current = cursor.semantic_parent();
    while let Some(scope) = current {
        if scope.kind() == CursorKind::Namespace && scope.is_inline_namespace() {
            return true;
        }
        current = scope.semantic_parent();
    }
    false
}

/// The cursor whose location and visibility describe `cursor`: the primary template for specializations.
fn declaring_cursor(cursor: Cursor<'_>) -> Cursor<'_> {
    if cursor.kind().is_record() && cursor.is_template_specialization() {
        cursor.specialized_template().unwrap_or(cursor)
    } else {
        cursor
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindweave_ast::{Node, TranslationUnit, UnitBuilder};

    fn unit_of(build: impl FnOnce(&mut UnitBuilder)) -> TranslationUnit {
        let mut b = UnitBuilder::new("drv.cpp");
        build(&mut b);
        b.finish()
    }

    #[test]
    fn operator_names_are_detected() {
        let tu = unit_of(|b| {
            let c = b.add(b.root(), Node::new(CursorKind::StructDecl, "S").definition());
            b.add(c, Node::new(CursorKind::Method, "operator==").public());
            b.add(c, Node::new(CursorKind::Method, "operator()").public());
            b.add(c, Node::new(CursorKind::Method, "operational").public());
            b.add(c, Node::new(CursorKind::ConversionFunction, "operator bool").public());
        });
        let flags: Vec<bool> = tu.at(bindweave_ast::NodeIndex(1)).children().map(is_operator_overload).collect();
        assert_eq!(flags, vec![true, true, false, true]);
    }

    #[test]
    fn explicit_attribute_wins_in_both_modes() {
        let tu = unit_of(|b| {
            b.add(b.root(), Node::new(CursorKind::FunctionDecl, "shown").visibility(Visibility::Default).at("a.cc", 1));
            b.add(b.root(), Node::new(CursorKind::FunctionDecl, "hidden").visibility(Visibility::Hidden).at("a.h", 2));
        });
        let f: Vec<_> = tu.root().children().collect();
        assert!(is_visible(f[0], true) && is_visible(f[0], false));
        assert!(!is_visible(f[1], true) && !is_visible(f[1], false));
    }

    #[test]
    fn strict_mode_requires_inline_or_header_definition() {
        let tu = unit_of(|b| {
            let s = b.add(b.root(), Node::new(CursorKind::ClassDecl, "S").definition().at("a.h", 1));
            b.add(s, Node::new(CursorKind::Method, "declared").public().at("a.h", 2));
            b.add(s, Node::new(CursorKind::Method, "defined").public().definition().at("a.h", 3));
            b.add(b.root(), Node::new(CursorKind::FunctionDecl, "inl").flags(|f| f.inline = true).at("a.h", 4));
            let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "v1").flags(|f| f.inline_namespace = true));
            b.add(ns, Node::new(CursorKind::FunctionDecl, "in_inline_ns").at("a.h", 5));
        });
        let class = tu.at(bindweave_ast::NodeIndex(1));
        let methods: Vec<_> = class.children().collect();
        assert!(!is_visible(methods[0], true));
        assert!(is_visible(methods[0], false));
        assert!(is_visible(methods[1], true));
        assert!(is_visible(class, true));
        let top: Vec<_> = tu.root().children().collect();
        assert!(is_visible(top[1], true));
        assert!(is_visible(top[2].children().next().unwrap(), true));
    }

    #[test]
    fn private_and_special_constructors_are_not_members() {
        let tu = unit_of(|b| {
            let s = b.add(b.root(), Node::new(CursorKind::ClassDecl, "S").definition());
            b.add(s, Node::new(CursorKind::Method, "m").private());
            b.add(s, Node::new(CursorKind::Constructor, "S").public().flags(|f| f.copy_constructor = true));
            b.add(s, Node::new(CursorKind::Constructor, "S").public().flags(|f| f.deleted = true));
            b.add(s, Node::new(CursorKind::Constructor, "S").public());
        });
        let members: Vec<bool> = tu
            .at(bindweave_ast::NodeIndex(1))
            .children()
            .map(|c| is_member_exportable(c, false))
            .collect();
        assert_eq!(members, vec![false, false, false, true]);
    }

    #[test]
    fn header_suffixes() {
        assert!(is_header_file("/x/y/sample.h"));
        assert!(is_header_file("/usr/include/c++/12/vector"));
        assert!(!is_header_file("/x/y/sample.cc"));
    }
}
