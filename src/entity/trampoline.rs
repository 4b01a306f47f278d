//! Virtual-method trampolines.
//!
//! A trampoline is a generated subclass that forwards every overridable virtual method to Python through
//! `PYBIND11_OVERRIDE`/`PYBIND11_OVERRIDE_PURE`. One tier is collected per class along the first-base chain:
//! tier 0 is the bound class, tier 1 its base, and so on. The emitted classes nest the other way round, the deepest
//! tier deriving from the bound class itself:
//!
//! ```text
//! BwTramp_X<> : BwTramp_X1<> : ... : X
//! ```
//!
//! ## Notes
//! - Signatures are deduplicated across all tiers, nearest tier first, so an override in a subclass hides the base's
//!   declaration. `final` and private virtual methods only occupy their signature.
//! - A base that is a template specialization is read from its primary template. Its arguments become
//!   `using T = ...;` and `static constexpr auto N = ...;` declarations inside the tier.

use std::collections::HashSet;

use bindweave_ast::{Cursor, CursorId, CursorKind, SpecializationKind, TemplateArgument, TranslationUnit, Type};

use crate::emit::writer::CppWriter;
use crate::errors::{GenerationError, GenerationResult};
use crate::naming::{mangle, override_guard, substitute_identifiers};
use crate::signature::method_qualifiers;
use crate::visibility::is_accessible_from_subclass;

#[derive(Debug, Clone, Default)]
struct Tier {
    decls: Vec<String>,
    subs: Vec<(String, String)>,
    virtuals: Vec<CursorId>,
    pure_virtuals: Vec<CursorId>,
}

impl Tier {
    fn is_empty(&self) -> bool {
        self.virtuals.is_empty() && self.pure_virtuals.is_empty()
    }
}

/// The overridable virtual methods of a class, grouped by tier.
#[derive(Debug, Clone)]
pub struct Trampoline {
    tiers: Vec<Tier>,
}

/// A class body to scan, with the template declarations that make its member spellings valid.
struct Resolved<'tu> {
    body: Cursor<'tu>,
    decls: Vec<String>,
    subs: Vec<(String, String)>,
}

impl Trampoline {
    /// Collect the trampoline of `class`, or `None` when nothing can be overridden.
    #[tracing::instrument(skip_all, fields(class = %class.display_name()))]
    pub fn detect(tu: &TranslationUnit, class: Cursor<'_>) -> GenerationResult<Option<Self>> {
        if class.is_final() {
            return Ok(None);
        }
        let mut signatures = HashSet::new();
        let mut tiers = Vec::new();
        let mut next = resolve(class).map_err(|argument| GenerationError::UnsupportedTemplateArgument {
            entity: class.display_name().to_string(),
            argument,
        })?;

        while let Some(resolved) = next.take() {
            if tiers.len() > tu.len() {
                break;
            }
            let level = tiers.len();
            let mut tier = Tier {
                decls: resolved.decls,
                subs: resolved.subs,
                ..Tier::default()
            };
            let mut base = None;
            for member in resolved.body.children() {
                match member.kind() {
                    CursorKind::Method if member.is_virtual_method() => {
                        let signature = signature_of(member, &tier.subs);
                        if member.is_final() || !is_accessible_from_subclass(member) {
                            signatures.insert(signature);
                            continue;
                        }
                        if !signatures.insert(signature) {
                            continue;
                        }
                        if member.is_pure_virtual_method() {
                            tier.pure_virtuals.push(member.id());
                        } else {
                            tier.virtuals.push(member.id());
                        }
                    }
                    CursorKind::BaseSpecifier if base.is_none() => base = Some(member),
                    CursorKind::BaseSpecifier => {
                        if level > 0 {
                            tracing::warn!(
                                class = %resolved.body.display_name(),
                                "multiple inheritance not supported, only the first base is scanned for virtuals"
                            );
                        }
                    }
                    _ => {}
                }
            }
            tiers.push(tier);

            let Some(spec) = base else { break };
            let Some(decl) = spec.ty().and_then(|ty| tu.declaration_of(ty)) else {
                break;
            };
            next = match resolve(decl) {
                Ok(resolved) => resolved,
                Err(argument) => {
                    tracing::warn!(
                        base = %decl.display_name(),
                        argument = %argument,
                        "unsupported template argument, virtual methods of this base are not exposed"
                    );
                    None
                }
            };
        }

        while tiers.last().is_some_and(Tier::is_empty) {
            tiers.pop();
        }
        Ok((!tiers.is_empty()).then_some(Self { tiers }))
    }

    /// Number of tiers that are emitted.
    pub fn depth(&self) -> usize {
        self.tiers.len()
    }

    /// Template name of the tier at `level`: `BwTramp_X`, `BwTramp_X1`, ...
    pub fn class_name(struct_name: &str, level: usize) -> String {
        match level {
            0 => format!("BwTramp_{struct_name}"),
            n => format!("BwTramp_{struct_name}{n}"),
        }
    }

    /// The class to name in `pybind11::class_<...>`.
    pub fn handle_argument(struct_name: &str) -> String {
        format!("{}<>", Self::class_name(struct_name, 0))
    }

    /// C++ definitions of every tier, deepest first.
    pub fn definitions(&self, tu: &TranslationUnit, struct_name: &str, reference_name: &str) -> String {
        let mut w = CppWriter::new();
        for (level, tier) in self.tiers.iter().enumerate().rev() {
            let base = if level + 1 < self.tiers.len() {
                format!("{}<>", Self::class_name(struct_name, level + 1))
            } else {
                reference_name.to_string()
            };
            w.line("template <class = void>");
            w.class_block(&format!("class {} : public {base}", Self::class_name(struct_name, level)), |w| {
                w.label("public:");
                w.linef(format_args!("using BwBaseT = {base};"));
                w.line("using BwBaseT::BwBaseT;");
                for decl in &tier.decls {
                    w.line(decl);
                }
                for &id in &tier.virtuals {
                    write_override(w, tu.cursor(id), "PYBIND11_OVERRIDE", reference_name);
                }
                for &id in &tier.pure_virtuals {
                    write_override(w, tu.cursor(id), "PYBIND11_OVERRIDE_PURE", reference_name);
                }
            });
        }
        w.finish()
    }
}

fn write_override(w: &mut CppWriter, method: Cursor<'_>, dispatch: &str, concrete: &str) {
    let ret = method.result_type().map(type_reference).unwrap_or_else(|| "void".to_string());
    let names: Vec<String> = method
        .arguments()
        .enumerate()
        .map(|(i, arg)| match arg.spelling() {
            "" => format!("arg{i}"),
            name => name.to_string(),
        })
        .collect();
    let params: Vec<String> = method
        .arguments()
        .zip(&names)
        .map(|(arg, name)| format!("{} {name}", arg.ty().map(type_reference).unwrap_or_default()))
        .collect();
    let method_type = method.ty().map(|t| t.spelling.as_str()).unwrap_or_default();
    let guard = override_guard(&mangle(&format!("{concrete}{method_type}_{}", method.spelling())));

    w.guarded(&guard, false, |w| {
        w.block(
            &format!(
                "{ret} {}({}){} override",
                method.spelling(),
                params.join(", "),
                method_qualifiers(method)
            ),
            |w| {
                w.linef(format_args!("using BwRetT = {ret};"));
                w.linef(format_args!("using BwConcreteT = {concrete};"));
                let args: String = names.iter().map(|n| format!(", {n}")).collect();
                w.linef(format_args!(
                    "{dispatch}(BwRetT, BwConcreteT, {}{args});",
                    method.spelling()
                ));
            },
        );
    });
}

/// Declared spelling for template-dependent types, canonical spelling otherwise.
pub fn type_reference(ty: &Type) -> String {
    if ty.is_dependent() {
        ty.spelling.clone()
    } else {
        ty.canonical().spelling.clone()
    }
}

fn signature_of(method: Cursor<'_>, subs: &[(String, String)]) -> String {
    let ret = method.result_type().map(type_reference).unwrap_or_else(|| "void".to_string());
    let args: Vec<String> = method
        .arguments()
        .map(|arg| substitute_identifiers(&arg.ty().map(type_reference).unwrap_or_default(), subs))
        .collect();
    format!(
        "{} {}({})",
        substitute_identifiers(&ret, subs),
        method.spelling(),
        args.join(",")
    )
}

/// Find the class body to scan. `Err` carries the spelling of an unsupported template argument.
fn resolve(cursor: Cursor<'_>) -> Result<Option<Resolved<'_>>, String> {
    let instantiated = cursor.is_template_specialization()
        && cursor.specialization_kind() != Some(SpecializationKind::ExplicitSpecialization);
    if !instantiated {
        return Ok(cursor.definition().map(|body| Resolved {
            body,
            decls: Vec::new(),
            subs: Vec::new(),
        }));
    }
    let Some(template) = cursor.specialized_template() else {
        return Ok(None);
    };
    let params = template.children().filter(|c| {
        matches!(
            c.kind(),
            CursorKind::TemplateTypeParameter | CursorKind::NonTypeTemplateParameter | CursorKind::TemplateTemplateParameter
        )
    });
    let mut decls = Vec::new();
    let mut subs = Vec::new();
    for (param, arg) in params.zip(cursor.template_args()) {
        let name = param.spelling().to_string();
        match arg {
            TemplateArgument::Type(ty) => {
                decls.push(format!("using {name} = {};", ty.canonical().spelling));
                subs.push((name, ty.canonical().spelling.clone()));
            }
            TemplateArgument::Integral(value) => {
                decls.push(format!("static constexpr auto {name} = {value};"));
                subs.push((name, value.to_string()));
            }
            TemplateArgument::Other(text) => return Err(text.clone()),
        }
    }
    Ok(template.definition().or(Some(template)).map(|body| Resolved { body, decls, subs }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindweave_ast::{Node, NodeIndex, RefQualifier, UnitBuilder};

    fn virtual_method(b: &mut UnitBuilder, class: NodeIndex, name: &str, param: Type, pure: bool) -> NodeIndex {
        let fn_ty = Type::function(Type::void(), vec![param.clone()]).with_qualifiers(false, RefQualifier::None);
        let m = b.add(
            class,
            Node::new(CursorKind::Method, name)
                .public()
                .with_type(fn_ty)
                .returns(Type::void())
                .flags(|f| {
                    f.virtual_method = true;
                    f.pure_virtual = pure;
                }),
        );
        b.add(m, Node::new(CursorKind::ParmDecl, "v").with_type(param));
        m
    }

    #[test]
    fn final_classes_have_no_trampoline() {
        let mut b = UnitBuilder::new("a.h");
        let class = b.add(
            b.root(),
            Node::new(CursorKind::ClassDecl, "Sealed").definition().flags(|f| f.final_ = true),
        );
        virtual_method(&mut b, class, "Run", Type::builtin("int"), false);
        let tu = b.finish();
        assert!(Trampoline::detect(&tu, tu.at(class)).unwrap().is_none());
    }

    #[test]
    fn overrides_hide_base_declarations_and_tiers_chain() {
        let mut b = UnitBuilder::new("a.h");
        let base = b.add(b.root(), Node::new(CursorKind::ClassDecl, "Base").definition());
        virtual_method(&mut b, base, "Eat", Type::builtin("int"), true);
        virtual_method(&mut b, base, "Sleep", Type::builtin("int"), false);
        let derived = b.add(b.root(), Node::new(CursorKind::ClassDecl, "Derived").definition());
        b.add(
            derived,
            Node::new(CursorKind::BaseSpecifier, "Base").with_type(Type::record("Base", Some(base))),
        );
        virtual_method(&mut b, derived, "Eat", Type::builtin("int"), false);
        let tu = b.finish();

        let tramp = Trampoline::detect(&tu, tu.at(derived)).unwrap().unwrap();
        assert_eq!(tramp.depth(), 2);
        let text = tramp.definitions(&tu, "Derived", "Derived");
        assert_eq!(text.matches("void Eat(int v) override").count(), 1);
        assert!(!text.contains("PYBIND11_OVERRIDE_PURE"));
        assert!(text.contains("PYBIND11_OVERRIDE(BwRetT, BwConcreteT, Sleep, v);"));
        assert!(text.contains("class BwTramp_Derived1 : public Derived {"));
        assert!(text.contains("class BwTramp_Derived : public BwTramp_Derived1<> {"));
        assert!(text.find("BwTramp_Derived1 :").unwrap() < text.find("BwTramp_Derived :").unwrap());
    }

    #[test]
    fn template_bases_declare_their_arguments() {
        let mut b = UnitBuilder::new("a.h");
        let tpl = b.add(b.root(), Node::new(CursorKind::ClassTemplate, "Box").definition());
        b.add(tpl, Node::new(CursorKind::TemplateTypeParameter, "T"));
        b.add(tpl, Node::new(CursorKind::NonTypeTemplateParameter, "N"));
        virtual_method(&mut b, tpl, "Put", Type::template_param("T"), false);
        let spec = b.add(
            b.root(),
            Node::new(CursorKind::ClassDecl, "Box").display("Box<int, 3>").specialization_of(
                tpl,
                SpecializationKind::Implicit,
                vec![TemplateArgument::Type(Type::builtin("int")), TemplateArgument::Integral(3)],
            ),
        );
        let derived = b.add(b.root(), Node::new(CursorKind::ClassDecl, "IntBox").definition());
        b.add(
            derived,
            Node::new(CursorKind::BaseSpecifier, "Box<int, 3>").with_type(Type::record("Box<int, 3>", Some(spec))),
        );
        virtual_method(&mut b, derived, "Put", Type::builtin("int"), false);
        let tu = b.finish();

        // `Put(int)` overrides `Put(T)` with T = int, so only tier 0 remains
        let tramp = Trampoline::detect(&tu, tu.at(derived)).unwrap().unwrap();
        assert_eq!(tramp.depth(), 1);

        let tramp = Trampoline::detect(&tu, tu.at(spec)).unwrap().unwrap();
        let text = tramp.definitions(&tu, "Box_int_3", "Box<int, 3>");
        assert!(text.contains("using T = int;"));
        assert!(text.contains("static constexpr auto N = 3;"));
        assert!(text.contains("void Put(T v) override"));
    }

    #[test]
    fn unsupported_arguments_are_fatal_on_the_bound_class() {
        let mut b = UnitBuilder::new("a.h");
        let tpl = b.add(b.root(), Node::new(CursorKind::ClassTemplate, "Fn").definition());
        b.add(tpl, Node::new(CursorKind::NonTypeTemplateParameter, "P"));
        let spec = b.add(
            b.root(),
            Node::new(CursorKind::ClassDecl, "Fn").display("Fn<&g>").specialization_of(
                tpl,
                SpecializationKind::Implicit,
                vec![TemplateArgument::Other("&g".to_string())],
            ),
        );
        let tu = b.finish();
        let err = Trampoline::detect(&tu, tu.at(spec)).unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedTemplateArgument { .. }));
    }
}
