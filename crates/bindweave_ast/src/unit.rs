//! Translation unit arena and cursor views.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::{
    Access, CursorKind, Linkage, Location, Node, NodeIndex, SpecializationKind, TemplateArgument, Visibility,
};
use crate::frontend::ParseError;
use crate::types::Type;

/// A parsed translation unit: node 0 is the translation unit itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Parse generation; assigned by whoever owns the unit, never serialized.
    #[serde(skip)]
    generation: u32,
    main_file: String,
    nodes: Vec<Node>,
}

/// A cursor handle that can outlive a borrow of its unit but not a reparse of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId {
    generation: u32,
    index: NodeIndex,
}

impl CursorId {
    pub fn generation(self) -> u32 {
        self.generation
    }

    pub fn index(self) -> NodeIndex {
        self.index
    }
}

impl TranslationUnit {
    pub(crate) fn from_nodes(main_file: String, nodes: Vec<Node>) -> Self {
        Self {
            generation: 0,
            main_file,
            nodes,
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Re-tag the unit; every [`CursorId`] taken from the old generation becomes unresolvable.
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Name of the file the unit was parsed from (the driver file).
    pub fn main_file(&self) -> &str {
        &self.main_file
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Cursor<'_> {
        self.at(NodeIndex(0))
    }

    /// View a node by index. Panics on an out-of-range index.
    pub fn at(&self, index: NodeIndex) -> Cursor<'_> {
        assert!(index.as_usize() < self.nodes.len(), "node index {} out of range", index.0);
        Cursor { tu: self, index }
    }

    /// Resolve a handle. Panics when the handle belongs to another parse generation.
    pub fn cursor(&self, id: CursorId) -> Cursor<'_> {
        assert_eq!(
            id.generation, self.generation,
            "INVARIANT: cursor handle from generation {} used after reparse (current generation {})",
            id.generation, self.generation
        );
        self.at(id.index)
    }

    /// Resolve a handle, returning `None` for stale or out-of-range handles.
    pub fn try_cursor(&self, id: CursorId) -> Option<Cursor<'_>> {
        (id.generation == self.generation && id.index.as_usize() < self.nodes.len()).then_some(Cursor {
            tu: self,
            index: id.index,
        })
    }

    /// The declaration named by a type, looking through sugar to the canonical type.
    pub fn declaration_of(&self, ty: &Type) -> Option<Cursor<'_>> {
        ty.canonical()
            .declaration
            .or(ty.declaration)
            .filter(|index| index.as_usize() < self.nodes.len())
            .map(|index| self.at(index))
    }

    /// All nodes reachable from the root in pre-order, using an explicit stack.
    pub fn walk_preorder(&self) -> impl Iterator<Item = Cursor<'_>> + '_ {
        let mut stack = vec![NodeIndex(0)];
        std::iter::from_fn(move || {
            let index = stack.pop()?;
            let node = &self.nodes[index.as_usize()];
            stack.extend(node.children.iter().rev().copied());
            Some(Cursor { tu: self, index })
        })
    }

    /// Check that every link points inside the arena and that node 0 is the translation unit.
    pub fn validate(&self) -> Result<(), ParseError> {
        match self.nodes.first() {
            Some(node) if node.kind == CursorKind::TranslationUnit => {}
            _ => {
                return Err(ParseError::InvalidSnapshot(
                    "node 0 must be the translation unit".to_string(),
                ));
            }
        }
        let len = self.nodes.len();
        let in_range = |index: &NodeIndex| index.as_usize() < len;
        for (i, node) in self.nodes.iter().enumerate() {
            let links = node
                .children
                .iter()
                .chain(node.semantic_parent.iter())
                .chain(node.definition.iter())
                .chain(node.specialized_template.iter())
                .chain(node.referenced.iter());
            if let Some(bad) = links.filter(|index| !in_range(index)).next() {
                return Err(ParseError::InvalidSnapshot(format!(
                    "node {i} (`{}`) links to missing node {}",
                    node.spelling, bad.0
                )));
            }
        }
        Ok(())
    }
}

/// A borrowed view of one node.
#[derive(Clone, Copy)]
pub struct Cursor<'tu> {
    tu: &'tu TranslationUnit,
    index: NodeIndex,
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tu, other.tu) && self.index == other.index
    }
}

impl Eq for Cursor<'_> {}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({:?} `{}` #{})", self.kind(), self.display_name(), self.index.0)
    }
}

impl<'tu> Cursor<'tu> {
    pub fn tu(&self) -> &'tu TranslationUnit {
        self.tu
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn id(&self) -> CursorId {
        CursorId {
            generation: self.tu.generation,
            index: self.index,
        }
    }

    pub fn node(&self) -> &'tu Node {
        &self.tu.nodes[self.index.as_usize()]
    }

    fn link(&self, index: Option<NodeIndex>) -> Option<Cursor<'tu>> {
        index.map(|index| self.tu.at(index))
    }

    pub fn kind(&self) -> CursorKind {
        self.node().kind
    }

    pub fn spelling(&self) -> &'tu str {
        &self.node().spelling
    }

    pub fn display_name(&self) -> &'tu str {
        let node = self.node();
        if node.display_name.is_empty() {
            &node.spelling
        } else {
            &node.display_name
        }
    }

    pub fn location(&self) -> Option<&'tu Location> {
        self.node().location.as_ref()
    }

    pub fn file_name(&self) -> Option<&'tu str> {
        self.location().map(|l| l.file.as_str())
    }

    pub fn access(&self) -> Option<Access> {
        self.node().access
    }

    pub fn linkage(&self) -> Linkage {
        self.node().linkage
    }

    pub fn visibility(&self) -> Option<Visibility> {
        self.node().visibility
    }

    pub fn is_definition(&self) -> bool {
        self.node().flags.definition
    }

    pub fn is_deleted(&self) -> bool {
        self.node().flags.deleted
    }

    pub fn is_static_method(&self) -> bool {
        self.node().flags.static_method
    }

    pub fn is_virtual_method(&self) -> bool {
        let flags = self.node().flags;
        flags.virtual_method || flags.pure_virtual
    }

    pub fn is_pure_virtual_method(&self) -> bool {
        self.node().flags.pure_virtual
    }

    pub fn is_const_method(&self) -> bool {
        self.node().flags.const_method
    }

    pub fn is_inline_function(&self) -> bool {
        self.node().flags.inline
    }

    pub fn is_inline_namespace(&self) -> bool {
        self.node().flags.inline_namespace
    }

    pub fn is_final(&self) -> bool {
        self.node().flags.final_
    }

    pub fn is_copy_constructor(&self) -> bool {
        self.node().flags.copy_constructor
    }

    pub fn is_move_constructor(&self) -> bool {
        self.node().flags.move_constructor
    }

    pub fn is_scoped_enum(&self) -> bool {
        self.node().flags.scoped_enum
    }

    pub fn ty(&self) -> Option<&'tu Type> {
        self.node().ty.as_ref()
    }

    pub fn result_type(&self) -> Option<&'tu Type> {
        self.node().result_type.as_ref()
    }

    pub fn enum_value(&self) -> Option<i64> {
        self.node().enum_value
    }

    pub fn raw_comment(&self) -> Option<&'tu str> {
        self.node().raw_comment.as_deref()
    }

    pub fn semantic_parent(&self) -> Option<Cursor<'tu>> {
        self.link(self.node().semantic_parent)
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = Cursor<'tu>> + 'tu {
        let tu = self.tu;
        self.node().children.iter().map(move |&index| tu.at(index))
    }

    /// Parameter declarations of a function-like cursor.
    pub fn arguments(&self) -> impl Iterator<Item = Cursor<'tu>> + 'tu {
        self.children().filter(|c| c.kind() == CursorKind::ParmDecl)
    }

    /// The definition of this entity: itself when it is one.
    pub fn definition(&self) -> Option<Cursor<'tu>> {
        if self.is_definition() {
            Some(*self)
        } else {
            self.link(self.node().definition)
        }
    }

    pub fn specialized_template(&self) -> Option<Cursor<'tu>> {
        self.link(self.node().specialized_template)
    }

    pub fn specialization_kind(&self) -> Option<SpecializationKind> {
        self.node().specialization
    }

    pub fn template_args(&self) -> &'tu [TemplateArgument] {
        &self.node().template_args
    }

    pub fn referenced(&self) -> Option<Cursor<'tu>> {
        self.link(self.node().referenced)
    }

    pub fn templated_kind(&self) -> Option<CursorKind> {
        self.node().templated_kind
    }

    /// A concrete specialization of a class or function template.
    pub fn is_template_specialization(&self) -> bool {
        self.node().specialized_template.is_some() && !self.node().template_args.is_empty()
    }

    /// Names of the enclosing semantic scopes, outermost first. `extern "C"` blocks are transparent.
    pub fn qualified_scopes(&self) -> Vec<&'tu str> {
        let mut scopes = Vec::new();
        let mut current = self.semantic_parent();
        while let Some(scope) = current {
            match scope.kind() {
                CursorKind::TranslationUnit => break,
                kind if kind.is_transparent_scope() => {}
                _ => scopes.push(scope.spelling()),
            }
            current = scope.semantic_parent();
        }
        scopes.reverse();
        scopes
    }

    /// Fully qualified name, e.g. `earth::creatures::Home`.
    pub fn qualified_name(&self) -> String {
        let mut parts = self.qualified_scopes();
        parts.push(self.spelling());
        parts.join("::")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::UnitBuilder;

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut b = UnitBuilder::new("a.h");
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "a"));
        let tu = b.finish().with_generation(1);
        let id = tu.at(ns).id();
        let reparsed = tu.clone().with_generation(2);
        assert!(reparsed.try_cursor(id).is_none());
        assert_eq!(tu.cursor(id).spelling(), "a");
    }

    #[test]
    #[should_panic(expected = "used after reparse")]
    fn resolving_stale_handle_panics() {
        let tu = UnitBuilder::new("a.h").finish().with_generation(1);
        let id = tu.root().id();
        let reparsed = tu.with_generation(2);
        let _ = reparsed.cursor(id);
    }

    #[test]
    fn qualified_name_skips_linkage_specs() {
        let mut b = UnitBuilder::new("a.h");
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "outer"));
        let spec = b.add(ns, Node::new(CursorKind::LinkageSpec, ""));
        let func = b.add(spec, Node::new(CursorKind::FunctionDecl, "c_api"));
        let tu = b.finish();
        assert_eq!(tu.at(func).qualified_name(), "outer::c_api");
    }

    #[test]
    fn walk_preorder_visits_in_source_order() {
        let mut b = UnitBuilder::new("a.h");
        let a = b.add(b.root(), Node::new(CursorKind::Namespace, "a"));
        b.add(a, Node::new(CursorKind::FunctionDecl, "f"));
        b.add(b.root(), Node::new(CursorKind::Namespace, "b"));
        let tu = b.finish();
        let names: Vec<_> = tu.walk_preorder().map(|c| c.spelling().to_string()).collect();
        assert_eq!(names, vec!["a.h", "a", "f", "b"]);
    }

    #[test]
    fn validate_rejects_dangling_links() {
        let mut b = UnitBuilder::new("a.h");
        b.add(b.root(), Node::new(CursorKind::Namespace, "a").referencing(NodeIndex(42)));
        assert!(b.finish().validate().is_err());
    }
}
