//! Programmatic construction of translation units.

use crate::cursor::{CursorKind, Node, NodeIndex};
use crate::unit::TranslationUnit;

/// Builds a [`TranslationUnit`] node by node.
///
/// `add` appends a node as a lexical child of `parent` and, unless the node already names one, makes `parent` its
/// semantic parent too.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    main_file: String,
    nodes: Vec<Node>,
}

impl UnitBuilder {
    pub fn new(main_file: impl Into<String>) -> Self {
        let main_file = main_file.into();
        let root = Node::new(CursorKind::TranslationUnit, main_file.clone());
        Self {
            main_file,
            nodes: vec![root],
        }
    }

    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    /// Index the next added node will receive.
    pub fn next_index(&self) -> NodeIndex {
        NodeIndex(self.nodes.len() as u32)
    }

    pub fn add(&mut self, parent: NodeIndex, mut node: Node) -> NodeIndex {
        let index = self.next_index();
        if node.semantic_parent.is_none() {
            node.semantic_parent = Some(parent);
        }
        self.nodes.push(node);
        self.nodes[parent.as_usize()].children.push(index);
        index
    }

    /// Add a node that has a semantic parent but no lexical position (implicit instantiations).
    pub fn add_detached(&mut self, semantic_parent: NodeIndex, mut node: Node) -> NodeIndex {
        let index = self.next_index();
        node.semantic_parent = Some(semantic_parent);
        self.nodes.push(node);
        index
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.as_usize()]
    }

    /// Point a forward declaration at its definition.
    pub fn link_definition(&mut self, declaration: NodeIndex, definition: NodeIndex) {
        self.node_mut(declaration).definition = Some(definition);
    }

    pub fn finish(self) -> TranslationUnit {
        TranslationUnit::from_nodes(self.main_file, self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_links_both_directions() {
        let mut b = UnitBuilder::new("a.h");
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ns"));
        let class = b.add(ns, Node::new(CursorKind::ClassDecl, "C").definition());
        let tu = b.finish();
        let cursor = tu.at(class);
        assert_eq!(cursor.semantic_parent().map(|p| p.index()), Some(ns));
        assert_eq!(tu.at(ns).children().count(), 1);
        assert!(tu.validate().is_ok());
    }

    #[test]
    fn detached_nodes_are_not_walked() {
        let mut b = UnitBuilder::new("a.h");
        let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ns"));
        let spec = b.add_detached(ns, Node::new(CursorKind::StructDecl, "R"));
        let tu = b.finish();
        assert!(tu.walk_preorder().all(|c| c.index() != spec));
        assert_eq!(tu.at(spec).qualified_name(), "ns::R");
    }
}
