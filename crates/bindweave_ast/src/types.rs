//! Structural type records.
//!
//! A [`Type`] carries its own spelling plus the pieces the generator inspects (pointee, function signature,
//! template arguments, declaration). Spellings follow libclang conventions (`int *`, `const std::string &`,
//! `int (*)(int, void *)`), so text built here matches what a libclang-backed front end reports.

use serde::{Deserialize, Serialize};

use crate::cursor::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Void,
    Bool,
    /// Any other builtin arithmetic or character type.
    Builtin,
    Pointer,
    LValueReference,
    RValueReference,
    Record,
    Enum,
    FunctionProto,
    FunctionNoProto,
    Typedef,
    Elaborated,
    ConstantArray,
    IncompleteArray,
    MemberPointer,
    /// A template type parameter such as `T`.
    TemplateTypeParm,
    /// Any other type that depends on a template parameter.
    Dependent,
    Auto,
    Unexposed,
    Other,
}

/// Ref-qualifier of a member function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefQualifier {
    #[default]
    None,
    LValue,
    RValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub spelling: String,
    #[serde(default)]
    pub is_const: bool,
    /// Canonical form; `None` means this type is already canonical.
    #[serde(default)]
    pub canonical: Option<Box<Type>>,
    /// Pointee of pointers and references.
    #[serde(default)]
    pub pointee: Option<Box<Type>>,
    /// Result type of function types.
    #[serde(default)]
    pub result: Option<Box<Type>>,
    /// Parameter types of function types.
    #[serde(default)]
    pub params: Vec<Type>,
    /// Type arguments of template specializations (`std::function<Sig>` carries `Sig`).
    #[serde(default)]
    pub template_args: Vec<Type>,
    #[serde(default)]
    pub declaration: Option<NodeIndex>,
    #[serde(default)]
    pub ref_qualifier: RefQualifier,
}

impl Type {
    pub fn new(kind: TypeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            is_const: false,
            canonical: None,
            pointee: None,
            result: None,
            params: Vec::new(),
            template_args: Vec::new(),
            declaration: None,
            ref_qualifier: RefQualifier::None,
        }
    }

    pub fn void() -> Self {
        Self::new(TypeKind::Void, "void")
    }

    pub fn builtin(spelling: impl Into<String>) -> Self {
        let spelling = spelling.into();
        let kind = match spelling.as_str() {
            "void" => TypeKind::Void,
            "bool" => TypeKind::Bool,
            _ => TypeKind::Builtin,
        };
        Self::new(kind, spelling)
    }

    pub fn record(spelling: impl Into<String>, declaration: Option<NodeIndex>) -> Self {
        let mut ty = Self::new(TypeKind::Record, spelling);
        ty.declaration = declaration;
        ty
    }

    pub fn enumeration(spelling: impl Into<String>, declaration: Option<NodeIndex>) -> Self {
        let mut ty = Self::new(TypeKind::Enum, spelling);
        ty.declaration = declaration;
        ty
    }

    pub fn template_param(name: impl Into<String>) -> Self {
        Self::new(TypeKind::TemplateTypeParm, name)
    }

    /// A sugared name (typedef, alias, or an elaborated spelling) over `canonical`.
    pub fn alias(spelling: impl Into<String>, canonical: Type) -> Self {
        let mut ty = Self::new(TypeKind::Typedef, spelling);
        ty.declaration = canonical.declaration;
        ty.is_const = canonical.is_const;
        ty.canonical = Some(Box::new(canonical));
        ty
    }

    pub fn with_template_args(mut self, args: Vec<Type>) -> Self {
        self.template_args = args;
        self
    }

    pub fn const_qualified(mut self) -> Self {
        if !self.is_const {
            self.is_const = true;
            self.spelling = const_spelling(&self.spelling, self.kind);
            if let Some(canonical) = self.canonical.take() {
                self.canonical = Some(Box::new(canonical.const_qualified()));
            }
        }
        self
    }

    pub fn pointer(pointee: Type) -> Self {
        let spelling = match (&pointee.kind, &pointee.result) {
            (TypeKind::FunctionProto, Some(result)) => {
                format!("{} (*)({})", result.spelling, join_spellings(&pointee.params))
            }
            _ => format!("{} *", pointee.spelling),
        };
        Self::indirection(TypeKind::Pointer, spelling, pointee, Type::pointer)
    }

    pub fn lvalue_ref(pointee: Type) -> Self {
        let spelling = format!("{} &", pointee.spelling);
        Self::indirection(TypeKind::LValueReference, spelling, pointee, Type::lvalue_ref)
    }

    pub fn rvalue_ref(pointee: Type) -> Self {
        let spelling = format!("{} &&", pointee.spelling);
        Self::indirection(TypeKind::RValueReference, spelling, pointee, Type::rvalue_ref)
    }

    fn indirection(kind: TypeKind, spelling: String, pointee: Type, rebuild: fn(Type) -> Type) -> Self {
        let canonical = pointee
            .canonical
            .as_deref()
            .map(|c| Box::new(rebuild(c.clone())));
        let mut ty = Self::new(kind, spelling);
        ty.canonical = canonical;
        ty.pointee = Some(Box::new(pointee));
        ty
    }

    /// A function prototype `result (params...)`.
    pub fn function(result: Type, params: Vec<Type>) -> Self {
        let spelling = format!("{} ({})", result.spelling, join_spellings(&params));
        let needs_canonical = result.canonical.is_some() || params.iter().any(|p| p.canonical.is_some());
        let canonical = needs_canonical.then(|| {
            Box::new(Type::function(
                result.canonical().clone(),
                params.iter().map(|p| p.canonical().clone()).collect(),
            ))
        });
        let mut ty = Self::new(TypeKind::FunctionProto, spelling);
        ty.canonical = canonical;
        ty.result = Some(Box::new(result));
        ty.params = params;
        ty
    }

    /// Append member-function qualifiers (`const`, `&`, `&&`, `noexcept`) to a function type's spelling.
    pub fn with_qualifiers(mut self, is_const: bool, ref_qualifier: RefQualifier) -> Self {
        let mut suffix = String::new();
        if is_const {
            suffix.push_str(" const");
        }
        match ref_qualifier {
            RefQualifier::None => {}
            RefQualifier::LValue => suffix.push_str(" &"),
            RefQualifier::RValue => suffix.push_str(" &&"),
        }
        self.spelling.push_str(&suffix);
        self.ref_qualifier = ref_qualifier;
        if let Some(canonical) = self.canonical.take() {
            self.canonical = Some(Box::new(canonical.with_qualifiers(is_const, ref_qualifier)));
        }
        self
    }

    /// The canonical form of this type.
    pub fn canonical(&self) -> &Type {
        self.canonical.as_deref().unwrap_or(self)
    }

    pub fn pointee(&self) -> Option<&Type> {
        self.pointee.as_deref()
    }

    pub fn result(&self) -> Option<&Type> {
        self.result.as_deref()
    }

    pub fn is_pointer(&self) -> bool {
        self.kind == TypeKind::Pointer
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, TypeKind::LValueReference | TypeKind::RValueReference)
    }

    /// Whether the type (or anything it is built from) names a template parameter.
    pub fn is_dependent(&self) -> bool {
        matches!(self.kind, TypeKind::TemplateTypeParm | TypeKind::Dependent)
            || self.pointee().is_some_and(Type::is_dependent)
            || self.result().is_some_and(Type::is_dependent)
            || self.params.iter().any(Type::is_dependent)
            || self.template_args.iter().any(Type::is_dependent)
    }

    /// Strip references and pointers (canonically) down to the named type.
    pub fn innermost(&self) -> &Type {
        let mut current = self.canonical();
        while let Some(next) = current.pointee() {
            current = next.canonical();
        }
        current
    }

    /// The spelling with a leading `const ` removed.
    pub fn unqualified_spelling(&self) -> &str {
        self.spelling.strip_prefix("const ").unwrap_or(&self.spelling)
    }
}

fn join_spellings(types: &[Type]) -> String {
    types.iter().map(|t| t.spelling.as_str()).collect::<Vec<_>>().join(", ")
}

fn const_spelling(spelling: &str, kind: TypeKind) -> String {
    match kind {
        // `int *const`: the pointer itself is const.
        TypeKind::Pointer => format!("{spelling}const"),
        _ => format!("const {spelling}"),
    }
}
