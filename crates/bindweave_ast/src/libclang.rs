//! libclang-backed front end.
//!
//! Parses the driver file with libclang and flattens the cursor graph into a [`TranslationUnit`]. Entities from system
//! headers are recorded (so types and scopes still resolve) but their members are not expanded.

use std::collections::HashMap;
use std::collections::VecDeque;

use clang::{Accessibility, Clang, Entity, EntityKind, Index, Unsaved};

use crate::cursor::{
    Access, CursorKind, DeclFlags, Linkage, Location, Node, NodeIndex, SpecializationKind, TemplateArgument, Visibility,
};
use crate::frontend::{Frontend, ParseError, ParseRequest};
use crate::types::{RefQualifier, Type, TypeKind};
use crate::unit::TranslationUnit;

/// Parses through libclang. Comments are always kept (`-fparse-all-comments`).
#[derive(Debug, Default)]
pub struct ClangFrontend {
    _private: (),
}

impl ClangFrontend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Frontend for ClangFrontend {
    #[tracing::instrument(skip_all, fields(file = %request.file_name, args = request.args.len()))]
    fn parse(&mut self, request: &ParseRequest) -> Result<TranslationUnit, ParseError> {
        let clang = Clang::new().map_err(ParseError::Unavailable)?;
        let index = Index::new(&clang, false, false);
        let mut args = vec!["-x".to_string(), "c++".to_string(), "-fparse-all-comments".to_string()];
        args.extend(request.args.iter().cloned());
        let unsaved = [Unsaved::new(&request.file_name, &request.contents)];
        let tu = index
            .parser(&request.file_name)
            .arguments(&args)
            .unsaved(&unsaved)
            .skip_function_bodies(true)
            .parse()
            .map_err(|e| ParseError::Diagnostics {
                file: request.file_name.clone(),
                diagnostics: vec![e.to_string()],
            })?;

        let errors: Vec<String> = tu
            .get_diagnostics()
            .iter()
            .filter(|d| matches!(d.get_severity(), clang::diagnostic::Severity::Error | clang::diagnostic::Severity::Fatal))
            .map(|d| d.to_string())
            .collect();
        if !errors.is_empty() {
            for diagnostic in &errors {
                tracing::error!("{diagnostic}");
            }
            return Err(ParseError::Diagnostics {
                file: request.file_name.clone(),
                diagnostics: errors,
            });
        }

        let unit = Converter::new(&request.file_name).convert(tu.get_entity());
        tracing::debug!(nodes = unit.len(), "converted translation unit");
        Ok(unit)
    }
}

struct Converter<'tu> {
    main_file: String,
    ids: HashMap<Entity<'tu>, NodeIndex>,
    entities: Vec<Entity<'tu>>,
    nodes: Vec<Node>,
    pending: VecDeque<NodeIndex>,
}

impl<'tu> Converter<'tu> {
    fn new(main_file: &str) -> Self {
        Self {
            main_file: main_file.to_string(),
            ids: HashMap::new(),
            entities: Vec::new(),
            nodes: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    fn convert(mut self, root: Entity<'tu>) -> TranslationUnit {
        self.intern(root);
        while let Some(index) = self.pending.pop_front() {
            self.fill(index);
        }
        TranslationUnit::from_nodes(self.main_file, self.nodes)
    }

    fn intern(&mut self, entity: Entity<'tu>) -> NodeIndex {
        if let Some(&index) = self.ids.get(&entity) {
            return index;
        }
        let index = NodeIndex(self.nodes.len() as u32);
        self.ids.insert(entity, index);
        self.entities.push(entity);
        self.nodes.push(Node::new(map_kind(entity.get_kind()), entity.get_name().unwrap_or_default()));
        self.pending.push_back(index);
        index
    }

    fn fill(&mut self, index: NodeIndex) {
        let entity = self.entities[index.as_usize()];
        let kind = map_kind(entity.get_kind());
        let location = entity.get_location();
        let in_system_header = location.is_some_and(|l| l.is_in_system_header());

        let mut node = Node::new(kind, entity.get_name().unwrap_or_default());
        node.display_name = entity.get_display_name().unwrap_or_default();
        node.location = location.and_then(|l| {
            let spelled = l.get_spelling_location();
            spelled.file.map(|f| Location {
                file: f.get_path().to_string_lossy().into_owned(),
                line: spelled.line,
            })
        });
        node.access = entity.get_accessibility().map(|a| match a {
            Accessibility::Public => Access::Public,
            Accessibility::Protected => Access::Protected,
            Accessibility::Private => Access::Private,
        });
        node.linkage = match entity.get_linkage() {
            Some(clang::Linkage::Internal) => Linkage::Internal,
            Some(clang::Linkage::UniqueExternal) => Linkage::UniqueExternal,
            Some(clang::Linkage::Automatic) => Linkage::NoLinkage,
            _ => Linkage::External,
        };
        node.visibility = entity.get_visibility().map(|v| match v {
            clang::Visibility::Default => Visibility::Default,
            clang::Visibility::Hidden => Visibility::Hidden,
            clang::Visibility::Protected => Visibility::Protected,
        });
        node.flags = self.flags(entity, kind);
        node.ty = entity.get_type().map(|t| self.convert_type(t));
        node.result_type = entity.get_result_type().map(|t| self.convert_type(t));
        node.enum_value = entity.get_enum_constant_value().map(|(signed, _)| signed);
        node.raw_comment = entity.get_comment();
        node.semantic_parent = entity.get_semantic_parent().map(|p| self.intern(p));
        node.definition = entity
            .get_definition()
            .filter(|d| *d != entity)
            .map(|d| self.intern(d));
        node.templated_kind = entity.get_template_kind().map(map_kind);
        node.referenced = match kind {
            CursorKind::TypeRef | CursorKind::TemplateRef => entity.get_reference().map(|r| self.intern(r)),
            _ => None,
        };
        if let Some(template) = entity.get_template() {
            node.specialized_template = Some(self.intern(template));
            node.template_args = entity
                .get_template_arguments()
                .unwrap_or_default()
                .into_iter()
                .map(|arg| self.convert_template_arg(arg))
                .collect();
            node.specialization = Some(specialization_kind(entity));
        }

        let expand = !in_system_header || kind == CursorKind::TranslationUnit;
        if expand {
            node.children = entity.get_children().into_iter().map(|c| self.intern(c)).collect();
        }
        self.nodes[index.as_usize()] = node;
    }

    fn flags(&self, entity: Entity<'tu>, kind: CursorKind) -> DeclFlags {
        let tokens = match kind {
            k if k.is_function_like() || k == CursorKind::Namespace => leading_tokens(entity),
            _ => Vec::new(),
        };
        DeclFlags {
            definition: entity.is_definition(),
            deleted: tokens.windows(2).any(|w| w[0] == "=" && w[1] == "delete"),
            static_method: entity.is_static_method(),
            virtual_method: entity.is_virtual_method(),
            pure_virtual: entity.is_pure_virtual_method(),
            const_method: entity.is_const_method(),
            inline: kind == CursorKind::FunctionDecl && entity.is_inline_function(),
            inline_namespace: kind == CursorKind::Namespace && tokens.first().is_some_and(|t| t == "inline"),
            final_: entity.get_children().iter().any(|c| c.get_kind() == EntityKind::FinalAttr),
            copy_constructor: entity.is_copy_constructor(),
            move_constructor: entity.is_move_constructor(),
            scoped_enum: kind == CursorKind::EnumDecl && entity.is_scoped(),
        }
    }

    fn convert_type(&mut self, ty: clang::Type<'tu>) -> Type {
        let mut out = Type::new(map_type_kind(ty.get_kind()), ty.get_display_name());
        out.is_const = ty.is_const_qualified();
        out.declaration = ty.get_declaration().map(|d| self.intern(d));
        if ty.get_declaration().is_some_and(|d| d.get_kind() == EntityKind::TemplateTypeParameter) {
            out.kind = TypeKind::TemplateTypeParm;
        }
        out.pointee = ty.get_pointee_type().map(|p| Box::new(self.convert_type(p)));
        out.result = ty.get_result_type().map(|r| Box::new(self.convert_type(r)));
        out.params = ty
            .get_argument_types()
            .unwrap_or_default()
            .into_iter()
            .map(|p| self.convert_type(p))
            .collect();
        out.template_args = ty
            .get_template_argument_types()
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|a| self.convert_type(a))
            .collect();
        out.ref_qualifier = match ty.get_ref_qualifier() {
            Some(clang::RefQualifier::LValue) => RefQualifier::LValue,
            Some(clang::RefQualifier::RValue) => RefQualifier::RValue,
            None => RefQualifier::None,
        };
        let canonical = ty.get_canonical_type();
        if canonical != ty {
            out.canonical = Some(Box::new(self.convert_type(canonical)));
        }
        out
    }

    fn convert_template_arg(&mut self, arg: clang::TemplateArgument<'tu>) -> TemplateArgument {
        match arg {
            clang::TemplateArgument::Type(ty) => TemplateArgument::Type(self.convert_type(ty)),
            clang::TemplateArgument::Integral(signed, _) => TemplateArgument::Integral(signed),
            clang::TemplateArgument::Nullptr => TemplateArgument::Other("nullptr".to_string()),
            _ => TemplateArgument::Other("<non-type>".to_string()),
        }
    }
}

fn leading_tokens(entity: Entity<'_>) -> Vec<String> {
    entity
        .get_range()
        .map(|range| range.tokenize().into_iter().map(|t| t.get_spelling()).collect())
        .unwrap_or_default()
}

fn specialization_kind(entity: Entity<'_>) -> SpecializationKind {
    let tokens = leading_tokens(entity);
    match tokens.first().map(String::as_str) {
        Some("extern") => SpecializationKind::ExplicitInstantiationDeclaration,
        Some("template") if tokens.get(1).map(String::as_str) == Some("<") => SpecializationKind::ExplicitSpecialization,
        Some("template") => SpecializationKind::ExplicitInstantiationDefinition,
        _ => SpecializationKind::Implicit,
    }
}

fn map_kind(kind: EntityKind) -> CursorKind {
    match kind {
        EntityKind::TranslationUnit => CursorKind::TranslationUnit,
        EntityKind::Namespace => CursorKind::Namespace,
        EntityKind::ClassDecl => CursorKind::ClassDecl,
        EntityKind::StructDecl => CursorKind::StructDecl,
        EntityKind::UnionDecl => CursorKind::UnionDecl,
        EntityKind::ClassTemplate => CursorKind::ClassTemplate,
        EntityKind::ClassTemplatePartialSpecialization => CursorKind::ClassTemplatePartialSpecialization,
        EntityKind::EnumDecl => CursorKind::EnumDecl,
        EntityKind::EnumConstantDecl => CursorKind::EnumConstantDecl,
        EntityKind::FunctionDecl => CursorKind::FunctionDecl,
        EntityKind::FunctionTemplate => CursorKind::FunctionTemplate,
        EntityKind::Method => CursorKind::Method,
        EntityKind::Constructor => CursorKind::Constructor,
        EntityKind::Destructor => CursorKind::Destructor,
        EntityKind::ConversionFunction => CursorKind::ConversionFunction,
        EntityKind::FieldDecl => CursorKind::FieldDecl,
        EntityKind::VarDecl => CursorKind::VarDecl,
        EntityKind::ParmDecl => CursorKind::ParmDecl,
        EntityKind::BaseSpecifier => CursorKind::BaseSpecifier,
        EntityKind::TemplateTypeParameter => CursorKind::TemplateTypeParameter,
        EntityKind::NonTypeTemplateParameter => CursorKind::NonTypeTemplateParameter,
        EntityKind::TemplateTemplateParameter => CursorKind::TemplateTemplateParameter,
        EntityKind::TemplateRef => CursorKind::TemplateRef,
        EntityKind::TypeRef => CursorKind::TypeRef,
        EntityKind::TypedefDecl => CursorKind::TypedefDecl,
        EntityKind::TypeAliasDecl => CursorKind::TypeAliasDecl,
        EntityKind::LinkageSpec => CursorKind::LinkageSpec,
        EntityKind::UnexposedDecl => CursorKind::UnexposedDecl,
        _ => CursorKind::Other,
    }
}

fn map_type_kind(kind: clang::TypeKind) -> TypeKind {
    use clang::TypeKind as K;
    match kind {
        K::Void => TypeKind::Void,
        K::Bool => TypeKind::Bool,
        K::Pointer => TypeKind::Pointer,
        K::LValueReference => TypeKind::LValueReference,
        K::RValueReference => TypeKind::RValueReference,
        K::Record => TypeKind::Record,
        K::Enum => TypeKind::Enum,
        K::FunctionPrototype => TypeKind::FunctionProto,
        K::FunctionNoPrototype => TypeKind::FunctionNoProto,
        K::Typedef => TypeKind::Typedef,
        K::Elaborated => TypeKind::Elaborated,
        K::ConstantArray => TypeKind::ConstantArray,
        K::IncompleteArray => TypeKind::IncompleteArray,
        K::MemberPointer => TypeKind::MemberPointer,
        K::Dependent => TypeKind::Dependent,
        K::Auto => TypeKind::Auto,
        K::Unexposed => TypeKind::Unexposed,
        K::CharS
        | K::CharU
        | K::SChar
        | K::UChar
        | K::WChar
        | K::Char16
        | K::Char32
        | K::Short
        | K::UShort
        | K::Int
        | K::UInt
        | K::Long
        | K::ULong
        | K::LongLong
        | K::ULongLong
        | K::Float
        | K::Double
        | K::LongDouble => TypeKind::Builtin,
        _ => TypeKind::Other,
    }
}
