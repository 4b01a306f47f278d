//! Entity tree construction.
//!
//! [`build_tree`] runs the explicit-instantiation pre-pass (reparsing when it produced directives), then walks the
//! translation unit once with an explicit work stack and attaches every exportable namespace, class, enum and free
//! function under its semantic scope.
//!
//! ## Notes
//! - `extern "C"` blocks and unexposed declarations are transparent: their members join the enclosing scope.
//! - A declaration whose enclosing scope was not exported is skipped together with everything inside it.
//! - Name collisions: namespaces merge, functions become overloads, anything else keeps the first declaration.

use std::collections::HashMap;

use bindweave_ast::{Cursor, CursorKind, Frontend, NodeIndex};

use crate::context::GenContext;
use crate::entity::{ClassData, Entity, EntityId, EntityKind, FunctionData};
use crate::errors::GenerationResult;
use crate::gen_unit::GenerationUnit;
use crate::instantiation::collect_directives;
use crate::naming::{mangle, python_name};
use crate::signature::fallback_expression;
use crate::visibility::is_exportable;

/// Arena of entities plus the name-keyed top level.
#[derive(Debug, Default)]
pub struct EntityTree {
    entities: Vec<Entity>,
    roots: Vec<EntityId>,
    root_index: HashMap<String, EntityId>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Top-level entities in insertion order.
    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    /// Children of `parent`, or the top level for `None`.
    pub fn children_of(&self, parent: Option<EntityId>) -> &[EntityId] {
        match parent {
            Some(id) => self.get(id).children(),
            None => &self.roots,
        }
    }

    /// The entity called `name` directly under `parent`.
    pub fn lookup(&self, parent: Option<EntityId>, name: &str) -> Option<EntityId> {
        match parent {
            Some(id) => self.get(id).child(name),
            None => self.root_index.get(name).copied(),
        }
    }

    /// Resolve an `a::b::c` path from the top level.
    pub fn find(&self, path: &str) -> Option<EntityId> {
        let mut current = None;
        for part in path.split("::") {
            current = Some(self.lookup(current, part)?);
        }
        current
    }

    /// Every entity, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId(i), e))
    }

    fn insert(&mut self, parent: Option<EntityId>, mut entity: Entity) -> EntityId {
        let id = EntityId(self.entities.len());
        let name = entity.name().to_string();
        match parent {
            Some(p) => {
                entity.set_parent(p);
                self.entities.push(entity);
                self.entities[p.0].push_child(name, id);
            }
            None => {
                self.entities.push(entity);
                self.root_index.insert(name, id);
                self.roots.push(id);
            }
        }
        id
    }

    fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        &mut self.entities[id.0]
    }
}

/// Build the entity tree of `unit`, injecting explicit instantiations first.
#[tracing::instrument(skip_all, fields(output = %unit.config().output.display()))]
pub fn build_tree(
    unit: &mut GenerationUnit,
    ctx: &mut GenContext,
    frontend: &mut dyn Frontend,
) -> GenerationResult<EntityTree> {
    let directives = collect_directives(unit);
    if !directives.is_empty() {
        tracing::info!(count = directives.len(), "reparsing with explicit instantiations");
        unit.reparse_with(&directives.join("\n"), frontend)?;
        ctx.reset_identifiers();
    }
    let tree = populate(unit, ctx);
    tracing::debug!(entities = tree.len(), "built entity tree");
    Ok(tree)
}

/// The AST walk proper, on an already prepared unit.
pub fn populate(unit: &GenerationUnit, ctx: &mut GenContext) -> EntityTree {
    let tu = unit.tu();
    let mut tree = EntityTree::new();
    // cursor → entity it opens; the translation unit opens the top level
    let mut scopes: HashMap<NodeIndex, Option<EntityId>> = HashMap::new();
    scopes.insert(tu.root().index(), None);

    let mut stack: Vec<Cursor<'_>> = tu.root().children().rev().collect();
    while let Some(cursor) = stack.pop() {
        let kind = cursor.kind();
        if kind.is_transparent_scope() {
            stack.extend(cursor.children().rev());
            continue;
        }
        let Some(parent) = enclosing_scope(cursor, &scopes) else {
            continue;
        };
        match kind {
            CursorKind::Namespace => {
                if cursor.spelling().is_empty() || !is_exportable(unit, cursor) {
                    continue;
                }
                let id = match tree.lookup(parent, cursor.spelling()) {
                    Some(existing) if matches!(tree.get(existing).kind(), EntityKind::Namespace) => existing,
                    Some(existing) => {
                        warn_collision(&tree, existing, cursor);
                        continue;
                    }
                    None => {
                        let entity = new_entity(
                            cursor,
                            cursor.spelling().to_string(),
                            cursor.qualified_name(),
                            ctx,
                            EntityKind::Namespace,
                        );
                        tree.insert(parent, entity)
                    }
                };
                scopes.insert(cursor.index(), Some(id));
                stack.extend(cursor.children().rev());
            }
            CursorKind::EnumDecl => {
                if cursor.spelling().is_empty() || !cursor.is_definition() || !is_exportable(unit, cursor) {
                    continue;
                }
                let entity = new_entity(
                    cursor,
                    cursor.spelling().to_string(),
                    type_reference_name(cursor),
                    ctx,
                    EntityKind::Enum,
                );
                insert_unique(&mut tree, parent, entity, cursor);
            }
            k if k.is_record() => {
                let explicit = cursor
                    .specialization_kind()
                    .is_some_and(|s| s.is_explicit_instantiation());
                if cursor.spelling().is_empty() || !(cursor.is_definition() || explicit) {
                    continue;
                }
                let body = cursor.definition().unwrap_or(cursor);
                if let Some(Some(existing)) = scopes.get(&body.index()).copied() {
                    // the same specialization reached twice (definition and explicit instantiation)
                    scopes.insert(cursor.index(), Some(existing));
                    continue;
                }
                if !is_exportable(unit, cursor) {
                    continue;
                }
                let data = ClassData::new(first_exported_base(unit, body));
                let entity = new_entity(
                    cursor,
                    python_name(cursor.display_name()),
                    type_reference_name(cursor),
                    ctx,
                    EntityKind::Class(data),
                );
                if let Some(id) = insert_unique(&mut tree, parent, entity, cursor) {
                    scopes.insert(cursor.index(), Some(id));
                    scopes.insert(body.index(), Some(id));
                    stack.extend(body.children().rev());
                }
            }
            CursorKind::FunctionDecl => {
                if !is_exportable(unit, cursor) {
                    continue;
                }
                match tree.lookup(parent, cursor.spelling()) {
                    Some(existing) => add_overload(&mut tree, existing, cursor),
                    None => {
                        let entity = new_entity(
                            cursor,
                            cursor.spelling().to_string(),
                            cursor.qualified_name(),
                            ctx,
                            EntityKind::Function(FunctionData::new()),
                        );
                        tree.insert(parent, entity);
                    }
                }
            }
            _ => {}
        }
    }
    tree
}

/// The entity a declaration belongs to: `Some(None)` for the top level, `None` when its scope is not exported.
fn enclosing_scope(cursor: Cursor<'_>, scopes: &HashMap<NodeIndex, Option<EntityId>>) -> Option<Option<EntityId>> {
    let mut parent = cursor.semantic_parent();
    while let Some(p) = parent.filter(|p| p.kind().is_transparent_scope()) {
        parent = p.semantic_parent();
    }
    match parent {
        None => Some(None),
        Some(p) => scopes.get(&p.index()).copied(),
    }
}

fn new_entity(
    cursor: Cursor<'_>,
    name: String,
    reference_name: String,
    ctx: &mut GenContext,
    kind: EntityKind,
) -> Entity {
    let struct_name = ctx.unique_identifier(&mangle(&reference_name));
    Entity::new(cursor.id(), name, cursor.qualified_name(), reference_name, struct_name, kind)
}

/// Canonical type spelling of a class or enum declaration.
fn type_reference_name(cursor: Cursor<'_>) -> String {
    match cursor.ty() {
        Some(ty) => ty.canonical().spelling.clone(),
        None => {
            let mut parts = cursor.qualified_scopes();
            parts.push(cursor.display_name());
            parts.join("::")
        }
    }
}

fn insert_unique(tree: &mut EntityTree, parent: Option<EntityId>, entity: Entity, cursor: Cursor<'_>) -> Option<EntityId> {
    match tree.lookup(parent, entity.name()) {
        Some(existing) => {
            warn_collision(tree, existing, cursor);
            None
        }
        None => Some(tree.insert(parent, entity)),
    }
}

fn add_overload(tree: &mut EntityTree, existing: EntityId, cursor: Cursor<'_>) {
    let tu = cursor.tu();
    let entity = tree.get(existing);
    let EntityKind::Function(data) = entity.kind() else {
        warn_collision(tree, existing, cursor);
        return;
    };
    // a redeclaration is not an overload
    let expr = fallback_expression(cursor);
    let known = std::iter::once(entity.cursor())
        .chain(data.overloads().iter().copied())
        .any(|id| fallback_expression(tu.cursor(id)) == expr);
    if known {
        return;
    }
    if let EntityKind::Function(data) = tree.entity_mut(existing).kind_mut() {
        data.add_overload(cursor.id());
    }
}

fn warn_collision(tree: &EntityTree, existing: EntityId, cursor: Cursor<'_>) {
    let first = tree.get(existing);
    tracing::warn!(
        name = %first.qualified_name(),
        kept = first.kind().label(),
        ignored = ?cursor.kind(),
        "name collision, keeping the first declaration"
    );
}

/// Reference spelling of the first base when it is exported, warning about any further bases.
fn first_exported_base(unit: &GenerationUnit, body: Cursor<'_>) -> Option<String> {
    let mut bases = body.children().filter(|c| c.kind() == CursorKind::BaseSpecifier);
    let first = bases.next()?;
    if bases.next().is_some() {
        tracing::warn!(
            class = %body.qualified_name(),
            "multiple inheritance not supported, only the first base is bound"
        );
    }
    let ty = first.ty()?;
    let decl = unit.tu().declaration_of(ty)?;
    is_exportable(unit, decl).then(|| ty.canonical().spelling.clone())
}
