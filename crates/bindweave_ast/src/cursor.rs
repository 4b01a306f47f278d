//! Declaration records stored in a translation unit arena.
//!
//! [`Node`] mirrors the subset of libclang cursor attributes the generator consumes. Links between nodes are plain
//! [`NodeIndex`] values so a unit can be serialized as a flat JSON array.

use serde::{Deserialize, Serialize};

use crate::types::Type;

/// Index of a node inside its translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Cursor kinds the generator distinguishes. Everything else maps to [`CursorKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    TranslationUnit,
    Namespace,
    ClassDecl,
    StructDecl,
    UnionDecl,
    ClassTemplate,
    ClassTemplatePartialSpecialization,
    EnumDecl,
    EnumConstantDecl,
    FunctionDecl,
    FunctionTemplate,
    Method,
    Constructor,
    Destructor,
    ConversionFunction,
    FieldDecl,
    VarDecl,
    ParmDecl,
    BaseSpecifier,
    TemplateTypeParameter,
    NonTypeTemplateParameter,
    TemplateTemplateParameter,
    TemplateRef,
    TypeRef,
    TypedefDecl,
    TypeAliasDecl,
    /// `extern "C" { ... }` blocks.
    LinkageSpec,
    UnexposedDecl,
    Other,
}

impl CursorKind {
    /// Class or struct declarations (unions are not bound).
    pub fn is_record(self) -> bool {
        matches!(self, CursorKind::ClassDecl | CursorKind::StructDecl)
    }

    /// Kinds whose visibility is always checked, even outside strict mode.
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            CursorKind::FunctionDecl | CursorKind::Method | CursorKind::Constructor | CursorKind::Destructor
        )
    }

    /// Scopes that are lexical only: their members belong to the enclosing scope.
    pub fn is_transparent_scope(self) -> bool {
        matches!(self, CursorKind::LinkageSpec | CursorKind::UnexposedDecl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    NoLinkage,
    Internal,
    UniqueExternal,
    #[default]
    External,
}

/// Explicit `__attribute__((visibility(...)))` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Default,
    Hidden,
    Protected,
}

/// How a class template specialization came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializationKind {
    Implicit,
    ExplicitSpecialization,
    ExplicitInstantiationDeclaration,
    ExplicitInstantiationDefinition,
}

impl SpecializationKind {
    pub fn is_explicit_instantiation(self) -> bool {
        matches!(
            self,
            SpecializationKind::ExplicitInstantiationDeclaration | SpecializationKind::ExplicitInstantiationDefinition
        )
    }
}

/// A template argument of a specialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateArgument {
    Type(Type),
    Integral(i64),
    /// Non-type, non-integral arguments (pointers, nullptr, templates, packs...), kept as spelled.
    Other(String),
}

impl TemplateArgument {
    /// Source spelling of the argument as it would appear between template brackets.
    pub fn spelling(&self) -> String {
        match self {
            TemplateArgument::Type(ty) => ty.canonical().spelling.clone(),
            TemplateArgument::Integral(value) => value.to_string(),
            TemplateArgument::Other(text) => text.clone(),
        }
    }
}

/// Boolean cursor attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclFlags {
    pub definition: bool,
    pub deleted: bool,
    pub static_method: bool,
    pub virtual_method: bool,
    pub pure_virtual: bool,
    pub const_method: bool,
    pub inline: bool,
    pub inline_namespace: bool,
    /// `final` on a class or a virtual method.
    pub final_: bool,
    pub copy_constructor: bool,
    pub move_constructor: bool,
    /// `enum class`.
    pub scoped_enum: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

/// One AST declaration or reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: CursorKind,
    pub spelling: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub flags: DeclFlags,
    /// Declared type (for functions and methods: the function type, qualifiers included).
    #[serde(default)]
    pub ty: Option<Type>,
    #[serde(default)]
    pub result_type: Option<Type>,
    #[serde(default)]
    pub enum_value: Option<i64>,
    #[serde(default)]
    pub raw_comment: Option<String>,
    #[serde(default)]
    pub semantic_parent: Option<NodeIndex>,
    #[serde(default)]
    pub children: Vec<NodeIndex>,
    /// Definition of a forward-declared entity, when one is visible.
    #[serde(default)]
    pub definition: Option<NodeIndex>,
    /// Primary template of a specialization.
    #[serde(default)]
    pub specialized_template: Option<NodeIndex>,
    #[serde(default)]
    pub specialization: Option<SpecializationKind>,
    #[serde(default)]
    pub template_args: Vec<TemplateArgument>,
    /// Target of a `TypeRef`/`TemplateRef`.
    #[serde(default)]
    pub referenced: Option<NodeIndex>,
    /// For class templates: whether they were declared with `class` or `struct`.
    #[serde(default)]
    pub templated_kind: Option<CursorKind>,
}

impl Node {
    pub fn new(kind: CursorKind, spelling: impl Into<String>) -> Self {
        let spelling = spelling.into();
        Self {
            kind,
            display_name: spelling.clone(),
            spelling,
            location: None,
            access: None,
            linkage: Linkage::External,
            visibility: None,
            flags: DeclFlags::default(),
            ty: None,
            result_type: None,
            enum_value: None,
            raw_comment: None,
            semantic_parent: None,
            children: Vec::new(),
            definition: None,
            specialized_template: None,
            specialization: None,
            template_args: Vec::new(),
            referenced: None,
            templated_kind: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.location = Some(Location {
            file: file.into(),
            line,
        });
        self
    }

    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    pub fn public(self) -> Self {
        self.access(Access::Public)
    }

    pub fn private(self) -> Self {
        self.access(Access::Private)
    }

    pub fn linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.result_type = Some(ty);
        self
    }

    pub fn value(mut self, value: i64) -> Self {
        self.enum_value = Some(value);
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.raw_comment = Some(comment.into());
        self
    }

    pub fn flags(mut self, update: impl FnOnce(&mut DeclFlags)) -> Self {
        update(&mut self.flags);
        self
    }

    pub fn definition(self) -> Self {
        self.flags(|f| f.definition = true)
    }

    pub fn semantic_parent(mut self, parent: NodeIndex) -> Self {
        self.semantic_parent = Some(parent);
        self
    }

    pub fn referencing(mut self, target: NodeIndex) -> Self {
        self.referenced = Some(target);
        self
    }

    /// Mark the node as a specialization of `template` with the given arguments.
    pub fn specialization_of(
        mut self,
        template: NodeIndex,
        kind: SpecializationKind,
        args: Vec<TemplateArgument>,
    ) -> Self {
        self.specialized_template = Some(template);
        self.specialization = Some(kind);
        self.template_args = args;
        self
    }
}
