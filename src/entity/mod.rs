//! Bindable entities: namespaces, classes, enums and free functions.
//!
//! An [`Entity`] is one node of the tree the builder assembles from the AST. Entities are stored in an arena owned
//! by [`crate::tree::EntityTree`] and refer to each other by [`EntityId`]; the parent link is non-owning and
//! dependency edges are plain names.
//!
//! ## Notes
//! - Each variant describes itself for emission: the pybind11 handle type, the expression constructing the handle
//!   from its parent scope, and the statements registering its members.
//! - Member bindings (methods, constructors, fields, enum values, overloads) are derived during emission, never
//!   while the tree is being built.

mod class;
mod enumeration;
mod function;
pub mod trampoline;

use std::collections::{BTreeSet, HashMap};

use bindweave_ast::{CursorId, TranslationUnit};

use crate::context::GenContext;
use crate::errors::GenerationResult;
use crate::gen_unit::GenerationUnit;

pub use class::ClassData;
pub use function::FunctionData;
use trampoline::Trampoline;

/// Index of an entity in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) usize);

impl EntityId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub enum EntityKind {
    Namespace,
    Class(ClassData),
    Enum,
    Function(FunctionData),
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Namespace => "namespace",
            EntityKind::Class(_) => "class",
            EntityKind::Enum => "enum",
            EntityKind::Function(_) => "function",
        }
    }
}

/// Statements for the `Update()` body plus helper members for the binding struct.
#[derive(Debug, Default)]
pub struct Members {
    pub statements: Vec<String>,
    pub extra: Vec<String>,
}

#[derive(Debug)]
pub struct Entity {
    cursor: CursorId,
    name: String,
    qualified_name: String,
    reference_name: String,
    struct_name: String,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    child_index: HashMap<String, EntityId>,
    kind: EntityKind,
}

impl Entity {
    pub(crate) fn new(
        cursor: CursorId,
        name: String,
        qualified_name: String,
        reference_name: String,
        struct_name: String,
        kind: EntityKind,
    ) -> Self {
        Self {
            cursor,
            name,
            qualified_name,
            reference_name,
            struct_name,
            parent: None,
            children: Vec::new(),
            child_index: HashMap::new(),
            kind,
        }
    }

    pub fn cursor(&self) -> CursorId {
        self.cursor
    }

    /// Exported (host-side) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// How generated code names the C++ entity: the canonical type for classes and enums, the qualified name
    /// otherwise.
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// Identifier-safe, unit-unique suffix of the generated `Bind_`/`Entity_` structs.
    pub fn struct_name(&self) -> &str {
        &self.struct_name
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<EntityId> {
        self.child_index.get(name).copied()
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    pub(crate) fn set_parent(&mut self, parent: EntityId) {
        self.parent = Some(parent);
    }

    pub(crate) fn push_child(&mut self, name: String, id: EntityId) {
        self.child_index.insert(name, id);
        self.children.push(id);
    }

    /// Whether emitting this entity defines a type other entities can depend on.
    pub fn exports_type(&self) -> bool {
        matches!(self.kind, EntityKind::Class(_) | EntityKind::Enum)
    }

    /// Names of types that must be registered before this entity.
    pub fn dependencies(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match &self.kind {
            EntityKind::Class(data) => Box::new(data.dependencies().map(String::as_str)),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// The trampoline of a class, computed once.
    pub fn trampoline(&self, tu: &TranslationUnit) -> GenerationResult<Option<&Trampoline>> {
        match &self.kind {
            EntityKind::Class(data) => data.trampoline(tu, self.cursor),
            _ => Ok(None),
        }
    }

    /// Default pybind11 type held by the binding struct.
    pub fn handle_type(&self, unit: &GenerationUnit, ctx: &mut GenContext) -> GenerationResult<String> {
        Ok(match &self.kind {
            EntityKind::Namespace | EntityKind::Function(_) => "pybind11::module_".to_string(),
            EntityKind::Enum => format!("pybind11::enum_<{}>", self.reference_name),
            EntityKind::Class(data) => data.handle_type(self, unit, ctx)?,
        })
    }

    /// Expression list constructing the handle from `parent_h`, an `bindweave::EntityScope`.
    pub fn init_expression(&self, unit: &GenerationUnit) -> String {
        match &self.kind {
            EntityKind::Namespace => format!("parent_h.Module().def_submodule(\"{}\")", self.name),
            EntityKind::Function(_) => "parent_h.Module()".to_string(),
            EntityKind::Enum => enumeration::init_expression(self, unit),
            EntityKind::Class(_) => class::init_expression(self, unit),
        }
    }

    /// Registration statements and helper members.
    pub fn members(&self, unit: &GenerationUnit, ctx: &mut GenContext) -> GenerationResult<Members> {
        Ok(match &self.kind {
            EntityKind::Namespace => Members::default(),
            EntityKind::Enum => enumeration::members(self, unit),
            EntityKind::Function(data) => data.members(self, unit, ctx),
            EntityKind::Class(data) => data.members(self, unit, ctx)?,
        })
    }

    /// Trampoline definitions to emit before the binding struct.
    pub fn prelude_code(&self, unit: &GenerationUnit) -> GenerationResult<Option<String>> {
        let tu = unit.tu();
        Ok(self
            .trampoline(tu)?
            .map(|t| t.definitions(tu, &self.struct_name, &self.reference_name)))
    }
}

/// Dependency names of an entity and its subtree, minus the names its own subtree defines.
pub(crate) fn external_dependencies(entities: &[Entity], root: EntityId) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    let mut defined = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let entity = &entities[id.0];
        deps.extend(entity.dependencies().map(str::to_string));
        if entity.exports_type() {
            defined.insert(entity.reference_name.clone());
        }
        stack.extend(entity.children.iter().rev().copied());
    }
    deps.retain(|d| !defined.contains(d));
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindweave_ast::{CursorKind, Node, UnitBuilder};

    fn entity(tu: &TranslationUnit, name: &str, kind: EntityKind) -> Entity {
        Entity::new(
            tu.root().id(),
            name.to_string(),
            name.to_string(),
            name.to_string(),
            name.to_string(),
            kind,
        )
    }

    #[test]
    fn subtree_dependencies_drop_internal_names() {
        let mut b = UnitBuilder::new("a.h");
        b.add(b.root(), Node::new(CursorKind::Namespace, "n"));
        let tu = b.finish();
        let mut ns = entity(&tu, "n", EntityKind::Namespace);
        let base = entity(&tu, "Base", EntityKind::Class(ClassData::new(None)));
        let derived = entity(&tu, "Derived", EntityKind::Class(ClassData::new(Some("Base".to_string()))));
        let other = entity(&tu, "Other", EntityKind::Class(ClassData::new(Some("Outside".to_string()))));
        ns.push_child("Derived".to_string(), EntityId(1));
        ns.push_child("Base".to_string(), EntityId(2));
        ns.push_child("Other".to_string(), EntityId(3));
        let entities = vec![ns, derived, base, other];
        let deps = external_dependencies(&entities, EntityId(0));
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec!["Outside".to_string()]);
        assert_eq!(entities[0].child("Base"), Some(EntityId(2)));
    }
}
