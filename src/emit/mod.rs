//! Code emission: turns an entity tree into one C++ binding source file.
//!
//! Siblings are emitted in dependency order. At each level the candidates are sorted by name and the first one
//! whose unresolved dependencies are all satisfied is emitted next, together with its whole subtree. A dependency
//! is satisfied when its entity has been generated already, or when this unit does not export it at all (it is
//! then the binding author's job to register it elsewhere).
//!
//! ## Notes
//! - The emission registries on [`GenContext`] are reset first, so emitting the same tree twice gives the same
//!   text.
//! - Every struct is named after the entity's unique struct name; every local variable of the factory function is
//!   numbered in emission order.

mod templates;
pub mod writer;

use std::collections::BTreeSet;

use crate::context::GenContext;
use crate::entity::{EntityId, EntityKind, external_dependencies};
use crate::errors::{GenerationError, GenerationResult};
use crate::gen_unit::GenerationUnit;
use crate::naming::mangle;
use crate::tree::EntityTree;

pub use templates::{EntityStruct, RUNTIME_HEADER, SourceFile};
pub use writer::CppWriter;

/// Emit the binding source of `unit`.
#[tracing::instrument(skip_all, fields(output = %unit.config().output.display(), entities = tree.len()))]
pub fn emit_unit(tree: &EntityTree, unit: &GenerationUnit, ctx: &mut GenContext) -> GenerationResult<String> {
    ctx.reset_emission();

    let top_level = emitted_roots(tree, &unit.config().root_module_namespace)?;
    let mut emission = Emission {
        tree,
        unit,
        exported: exported_names(tree, &top_level),
        generated: BTreeSet::new(),
        declarations: Vec::new(),
        create_statements: Vec::new(),
        entity_vars: Vec::new(),
    };
    emission.emit_level(&top_level, None, ctx)?;

    for unbound in ctx.unbound_used_types() {
        tracing::warn!(ty = unbound, "type is used but neither exported nor wrapped by this unit");
    }

    let wrapped_pointer_statements: Vec<String> = ctx
        .wrapped_types()
        .iter()
        .map(|pointee| {
            format!(
                "bindweave::FastBindWrappedPtr<{pointee}>(m, \"WrappedPtr_{}\");",
                mangle(pointee)
            )
        })
        .collect();

    let include_directives = unit.include_directives();
    let source = SourceFile {
        created_at: unit.created_at(),
        include_directives: &include_directives,
        declarations: &emission.declarations,
        decl_fn_name: &unit.config().decl_fn_name,
        create_statements: &emission.create_statements,
        wrapped_pointer_statements: &wrapped_pointer_statements,
        entity_vars: &emission.entity_vars,
    }
    .render();
    tracing::debug!(
        declarations = emission.declarations.len(),
        wrapped = wrapped_pointer_statements.len(),
        "emitted unit"
    );
    Ok(source)
}

/// Top-level entities to emit: everything, or the children of the configured root namespace.
fn emitted_roots(tree: &EntityTree, root_namespace: &str) -> GenerationResult<Vec<EntityId>> {
    if root_namespace.is_empty() {
        return Ok(tree.roots().to_vec());
    }
    let missing = || GenerationError::MissingRootNamespace(root_namespace.to_string());
    let id = tree.find(root_namespace).ok_or_else(missing)?;
    match tree.get(id).kind() {
        EntityKind::Namespace => Ok(tree.get(id).children().to_vec()),
        _ => Err(missing()),
    }
}

/// Reference names of every class and enum in the emitted subtrees.
fn exported_names(tree: &EntityTree, top_level: &[EntityId]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut stack = top_level.to_vec();
    while let Some(id) = stack.pop() {
        let entity = tree.get(id);
        if entity.exports_type() {
            names.insert(entity.reference_name().to_string());
        }
        stack.extend_from_slice(entity.children());
    }
    names
}

struct Emission<'a> {
    tree: &'a EntityTree,
    unit: &'a GenerationUnit,
    exported: BTreeSet<String>,
    generated: BTreeSet<String>,
    declarations: Vec<String>,
    create_statements: Vec<String>,
    entity_vars: Vec<String>,
}

impl Emission<'_> {
    fn emit_level(&mut self, ids: &[EntityId], parent_var: Option<&str>, ctx: &mut GenContext) -> GenerationResult<()> {
        let mut pending: Vec<(EntityId, BTreeSet<String>)> = ids
            .iter()
            .map(|&id| (id, external_dependencies(self.tree.entities(), id)))
            .collect();
        pending.sort_by(|(a, _), (b, _)| {
            let (a, b) = (self.tree.get(*a), self.tree.get(*b));
            (a.name(), a.struct_name()).cmp(&(b.name(), b.struct_name()))
        });

        while !pending.is_empty() {
            let ready = pending.iter().position(|(_, deps)| {
                deps.iter()
                    .all(|dep| !self.exported.contains(dep) || self.generated.contains(dep))
            });
            let Some(index) = ready else {
                let entities = pending
                    .iter()
                    .map(|(id, _)| self.tree.get(*id).qualified_name().to_string())
                    .collect();
                return Err(GenerationError::DependencyCycle { entities });
            };
            let (id, _) = pending.remove(index);
            self.emit_entity(id, parent_var, ctx)?;
        }
        Ok(())
    }

    fn emit_entity(&mut self, id: EntityId, parent_var: Option<&str>, ctx: &mut GenContext) -> GenerationResult<()> {
        let entity = self.tree.get(id);
        tracing::debug!(entity = entity.qualified_name(), kind = entity.kind().label(), "emitting");

        let handle_type = entity.handle_type(self.unit, ctx)?;
        let members = entity.members(self.unit, ctx)?;
        let prelude = entity.prelude_code(self.unit)?;
        let declaration = EntityStruct {
            struct_name: entity.struct_name(),
            handle_type: &handle_type,
            init_expression: &entity.init_expression(self.unit),
            statements: &members.statements,
            extra: &members.extra,
            prelude: prelude.as_deref(),
        }
        .render();
        self.declarations.push(declaration);

        let var = format!("v{}", self.entity_vars.len());
        let scope = match parent_var {
            Some(parent) => format!("{parent}->AsScope()"),
            None => "bindweave::EntityScope(m)".to_string(),
        };
        self.create_statements.push(format!(
            "auto {var} = bindweave::CreateEntity<Entity_{}>(registry, {scope});",
            entity.struct_name()
        ));
        self.entity_vars.push(var.clone());

        // created before its children, so nested entities may depend on it
        if entity.exports_type() {
            ctx.record_exported(entity.reference_name());
            self.generated.insert(entity.reference_name().to_string());
        }
        self.emit_level(entity.children(), Some(&var), ctx)
    }
}
