//! Boundary representation of C++ types.
//!
//! [`classify`] decides how a value of a declared type crosses into the host language:
//!
//! - unchanged (`Cast::Identity`), the common case;
//! - as an opaque `bindweave::WrappedPtr<P>` handle for pointers pybind11 cannot own or see through (pointer to
//!   pointer, pointer to `void`, pointer to an incomplete or non-deletable class);
//! - as a `std::function` for plain function pointers, through a `bindweave::FnPtrAdapter` thunk.
//!
//! ## Notes
//! - Results are memoized on the [`GenContext`] by canonical spelling, so a type classified twice produces the same
//!   strings and one registry entry.
//! - Function-pointer adapters come back without a tag. Every conversion site binds its own tag through
//!   [`Classification::at_call_site`], since the adapter keeps one callable slot per tag.
//! - Types from `std::` are never recorded as used: pybind11's own casters cover them.

use bindweave_ast::{Access, Cursor, CursorKind, TranslationUnit, Type, TypeKind};

use crate::context::GenContext;

/// A conversion applied to an expression at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cast {
    Identity,
    /// Call the named function on the expression.
    Call(String),
    /// Call `entry` of a `bindweave::FnPtrAdapter`. The tag is bound per conversion site.
    Adapter {
        native: String,
        wire_signature: String,
        entry: &'static str,
        tag: Option<u32>,
    },
}

impl Cast {
    pub fn apply(&self, expr: &str) -> String {
        match self {
            Cast::Identity => expr.to_string(),
            Cast::Call(function) => format!("{function}({expr})"),
            Cast::Adapter {
                native,
                wire_signature,
                entry,
                tag,
            } => {
                let tag = tag.expect("INVARIANT: adapter casts are bound to a call site before rendering");
                format!(
                    "bindweave::FnPtrAdapter<bindweave::AdapterTag<{tag}>, {native}, {wire_signature}>::{entry}({expr})"
                )
            }
        }
    }

    fn with_tag(self, token: u32) -> Self {
        match self {
            Cast::Adapter {
                native,
                wire_signature,
                entry,
                ..
            } => Cast::Adapter {
                native,
                wire_signature,
                entry,
                tag: Some(token),
            },
            other => other,
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Cast::Identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Type seen by pybind11.
    pub wire_type: String,
    /// Canonical native type.
    pub native_type: String,
    pub native_to_wire: Cast,
    pub wire_to_native: Cast,
}

impl Classification {
    fn identity(native: &str) -> Self {
        Self {
            wire_type: native.to_string(),
            native_type: native.to_string(),
            native_to_wire: Cast::Identity,
            wire_to_native: Cast::Identity,
        }
    }

    fn wrapped_pointer(native: &str, pointee: &str) -> Self {
        Self {
            wire_type: format!("bindweave::WrappedPtr<{pointee}>"),
            native_type: native.to_string(),
            native_to_wire: Cast::Call(format!("bindweave::WrapP<{pointee}>")),
            wire_to_native: Cast::Call(format!("bindweave::UnwrapP<{pointee}>")),
        }
    }

    pub fn is_identity(&self) -> bool {
        self.native_to_wire.is_identity() && self.wire_to_native.is_identity()
    }

    /// Whether the casts go through a function-pointer adapter.
    pub fn needs_adapter_tag(&self) -> bool {
        matches!(self.wire_to_native, Cast::Adapter { .. })
    }

    /// Bind a fresh adapter tag for one conversion site. Other classifications are returned unchanged.
    pub fn at_call_site(self, ctx: &mut GenContext) -> Self {
        if !self.needs_adapter_tag() {
            return self;
        }
        let token = ctx.next_adapter_token();
        Self {
            native_to_wire: self.native_to_wire.with_tag(token),
            wire_to_native: self.wire_to_native.with_tag(token),
            ..self
        }
    }
}

/// Classify `ty`, recording used and wrapped types on `ctx`.
pub fn classify(ctx: &mut GenContext, tu: &TranslationUnit, ty: &Type) -> Classification {
    let canonical = ty.canonical();
    if let Some(hit) = ctx.cached_classification(&canonical.spelling) {
        return hit.clone();
    }
    let classification = classify_uncached(ctx, tu, canonical);
    ctx.cache_classification(canonical.spelling.clone(), classification.clone());
    classification
}

fn classify_uncached(ctx: &mut GenContext, tu: &TranslationUnit, canonical: &Type) -> Classification {
    if is_std_function(canonical) {
        if let Some(signature) = canonical.template_args.first() {
            for part in signature.canonical().result().into_iter().chain(signature.canonical().params.iter()) {
                classify(ctx, tu, part);
            }
        }
        return Classification::identity(&canonical.spelling);
    }

    if let Some(pointee) = canonical.pointee().filter(|_| canonical.is_pointer()) {
        let pointee = pointee.canonical();
        match pointee.kind {
            TypeKind::Pointer | TypeKind::Void => return wrap(ctx, canonical, pointee),
            TypeKind::FunctionProto => return function_pointer(ctx, tu, canonical, pointee),
            TypeKind::Record => {
                let definition = tu.declaration_of(pointee).and_then(|decl| decl.definition());
                match definition {
                    None => return wrap(ctx, canonical, pointee),
                    Some(def) if !is_type_deletable(def) => return wrap(ctx, canonical, pointee),
                    Some(_) => {}
                }
            }
            _ => {}
        }
    }

    record_used_type(ctx, canonical);
    Classification::identity(&canonical.spelling)
}

fn wrap(ctx: &mut GenContext, native: &Type, pointee: &Type) -> Classification {
    ctx.record_wrapped(pointee.spelling.clone());
    Classification::wrapped_pointer(&native.spelling, &pointee.spelling)
}

fn function_pointer(ctx: &mut GenContext, tu: &TranslationUnit, native: &Type, signature: &Type) -> Classification {
    let result = signature
        .result()
        .map(|r| classify(ctx, tu, r).wire_type)
        .unwrap_or_else(|| "void".to_string());
    let params: Vec<String> = signature
        .params
        .iter()
        .map(|p| classify(ctx, tu, p).wire_type)
        .collect();
    let wire_signature = format!("{result} ({})", params.join(", "));
    let adapter = |entry| Cast::Adapter {
        native: native.spelling.clone(),
        wire_signature: wire_signature.clone(),
        entry,
        tag: None,
    };
    Classification {
        wire_type: format!("std::function<{wire_signature}>"),
        native_type: native.spelling.clone(),
        native_to_wire: adapter("ToWire"),
        wire_to_native: adapter("ToNative"),
    }
}

fn is_std_function(ty: &Type) -> bool {
    ty.unqualified_spelling().starts_with("std::function<")
}

fn record_used_type(ctx: &mut GenContext, ty: &Type) {
    let inner = ty.innermost();
    if !matches!(inner.kind, TypeKind::Record | TypeKind::Enum) {
        return;
    }
    let spelling = inner.unqualified_spelling();
    if !spelling.starts_with("std::") {
        ctx.record_used(spelling);
    }
}

/// Whether pybind11 may delete instances of the class declared by `cursor`.
///
/// False when the class or any class along its first-base chain has a deleted destructor or `operator delete`,
/// when the class's own are not public, or when a base's are private.
pub fn is_type_deletable(cursor: Cursor<'_>) -> bool {
    let mut current = cursor.definition().unwrap_or(cursor);
    let mut own = true;
    // bounded by the arena size, so a malformed base loop cannot spin
    for _ in 0..cursor.tu().len() {
        for member in current.children() {
            let deleter = member.kind() == CursorKind::Destructor
                || (member.kind() == CursorKind::Method && member.spelling() == "operator delete");
            if !deleter {
                continue;
            }
            if member.is_deleted() {
                return false;
            }
            let blocked = match member.access() {
                None | Some(Access::Public) => false,
                Some(Access::Protected) => own,
                Some(Access::Private) => true,
            };
            if blocked {
                return false;
            }
        }
        let base = current
            .children()
            .find(|c| c.kind() == CursorKind::BaseSpecifier)
            .and_then(|spec| spec.ty())
            .and_then(|ty| current.tu().declaration_of(ty))
            .and_then(|decl| decl.definition());
        match base {
            Some(next) => current = next,
            None => return true,
        }
        own = false;
    }
    true
}

/// Whether any of `types` mentions `std::unique_ptr`.
pub fn involves_unique_ptr<'a>(types: impl IntoIterator<Item = &'a Type>) -> bool {
    types
        .into_iter()
        .any(|ty| ty.spelling.contains("unique_ptr<") || ty.canonical().spelling.contains("unique_ptr<"))
}
