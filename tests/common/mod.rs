//! Shared fixtures for integration tests.
//!
//! The translation units here stand in for what the libclang front end would produce for small headers. The main
//! fixture mirrors this header:
//!
//! ```cpp
//! // creatures.h
//! namespace earth::creatures {
//! enum class Kind { Cat, Dog };
//! /// A living thing.
//! class Animal {
//!  public:
//!   Animal();
//!   virtual void Eat(int food) = 0;
//!   virtual int Sleep(float hours);
//!   int age;
//!  private:
//!   void Forget();
//!   int secret_;
//! };
//! class Cat final : public Animal { public: void Eat(int food) override; };
//! class Home { public: Home(int size); void Host(Animal *guest); };
//! class SweetHome : public Home { public: float Warmth() const; };
//! class Ghost { public: static Ghost *Summon(); private: ~Ghost(); };
//! class Buffer { public: Buffer(int size); Buffer(std::unique_ptr<int> data); };
//! class Den : public Lair {};
//! class Lair {};
//! void Greet(int times);
//! void Greet(float volume);
//! void Greet(int times);
//! }
//! // other.h
//! void Foreign();
//! ```

#![allow(dead_code)]

use bindweave::config::UnitConfig;
use bindweave::context::GenContext;
use bindweave::gen_unit::{DRIVER_FILE, GenerationUnit};
use bindweave_ast::{
    Access, CursorKind, DeclFlags, Node, NodeIndex, ParseError, ParseRequest, RefQualifier, SpecializationKind,
    TemplateArgument, TranslationUnit, Type, UnitBuilder,
};

pub const HEADER: &str = "creatures.h";
pub const TIMESTAMP: &str = "01/01/2025, 00:00:00";

/// Add a class definition with its record type set.
pub fn class(b: &mut UnitBuilder, parent: NodeIndex, name: &str, qualified: &str, file: &str) -> NodeIndex {
    let id = b.add(parent, Node::new(CursorKind::ClassDecl, name).definition().at(file, 1));
    b.node_mut(id).ty = Some(Type::record(qualified, Some(id)));
    id
}

/// Add a public method with named parameters.
pub fn method(
    b: &mut UnitBuilder,
    class: NodeIndex,
    name: &str,
    result: Type,
    params: &[(&str, Type)],
    flags: impl FnOnce(&mut DeclFlags),
) -> NodeIndex {
    let mut decl_flags = DeclFlags::default();
    flags(&mut decl_flags);
    let param_types: Vec<Type> = params.iter().map(|(_, ty)| ty.clone()).collect();
    let fn_ty = Type::function(result.clone(), param_types).with_qualifiers(decl_flags.const_method, RefQualifier::None);
    let mut node = Node::new(CursorKind::Method, name).public().with_type(fn_ty).returns(result);
    node.flags = decl_flags;
    let id = b.add(class, node);
    for (param, ty) in params {
        b.add(id, Node::new(CursorKind::ParmDecl, *param).with_type(ty.clone()));
    }
    id
}

pub fn constructor(b: &mut UnitBuilder, class: NodeIndex, name: &str, params: &[(&str, Type)]) -> NodeIndex {
    let param_types: Vec<Type> = params.iter().map(|(_, ty)| ty.clone()).collect();
    let id = b.add(
        class,
        Node::new(CursorKind::Constructor, name)
            .public()
            .with_type(Type::function(Type::void(), param_types)),
    );
    for (param, ty) in params {
        b.add(id, Node::new(CursorKind::ParmDecl, *param).with_type(ty.clone()));
    }
    id
}

pub fn function(b: &mut UnitBuilder, parent: NodeIndex, name: &str, params: &[(&str, Type)], file: &str) -> NodeIndex {
    let param_types: Vec<Type> = params.iter().map(|(_, ty)| ty.clone()).collect();
    let id = b.add(
        parent,
        Node::new(CursorKind::FunctionDecl, name)
            .with_type(Type::function(Type::void(), param_types))
            .returns(Type::void())
            .at(file, 1),
    );
    for (param, ty) in params {
        b.add(id, Node::new(CursorKind::ParmDecl, *param).with_type(ty.clone()));
    }
    id
}

fn base(b: &mut UnitBuilder, class: NodeIndex, qualified: &str, target: NodeIndex) {
    b.add(
        class,
        Node::new(CursorKind::BaseSpecifier, qualified)
            .public()
            .with_type(Type::record(qualified, Some(target))),
    );
}

/// The `earth::creatures` translation unit.
pub fn creatures() -> TranslationUnit {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let earth = b.add(b.root(), Node::new(CursorKind::Namespace, "earth").at(HEADER, 1));
    let ns = b.add(earth, Node::new(CursorKind::Namespace, "creatures").at(HEADER, 1));

    let kind = b.add(
        ns,
        Node::new(CursorKind::EnumDecl, "Kind")
            .definition()
            .flags(|f| f.scoped_enum = true)
            .at(HEADER, 2),
    );
    b.node_mut(kind).ty = Some(Type::enumeration("earth::creatures::Kind", Some(kind)));
    b.add(kind, Node::new(CursorKind::EnumConstantDecl, "Cat").value(0));
    b.add(kind, Node::new(CursorKind::EnumConstantDecl, "Dog").value(1));

    let animal = class(&mut b, ns, "Animal", "earth::creatures::Animal", HEADER);
    b.node_mut(animal).raw_comment = Some("/// A living thing.".to_string());
    constructor(&mut b, animal, "Animal", &[]);
    method(&mut b, animal, "Eat", Type::void(), &[("food", Type::builtin("int"))], |f| {
        f.virtual_method = true;
        f.pure_virtual = true;
    });
    method(&mut b, animal, "Sleep", Type::builtin("int"), &[("hours", Type::builtin("float"))], |f| {
        f.virtual_method = true;
    });
    b.add(animal, Node::new(CursorKind::FieldDecl, "age").public().with_type(Type::builtin("int")));
    let forget = method(&mut b, animal, "Forget", Type::void(), &[], |_| {});
    b.node_mut(forget).access = Some(Access::Private);
    b.add(animal, Node::new(CursorKind::FieldDecl, "secret_").private().with_type(Type::builtin("int")));

    let cat = class(&mut b, ns, "Cat", "earth::creatures::Cat", HEADER);
    b.node_mut(cat).flags.final_ = true;
    base(&mut b, cat, "earth::creatures::Animal", animal);
    method(&mut b, cat, "Eat", Type::void(), &[("food", Type::builtin("int"))], |f| {
        f.virtual_method = true;
    });

    let home = class(&mut b, ns, "Home", "earth::creatures::Home", HEADER);
    constructor(&mut b, home, "Home", &[("size", Type::builtin("int"))]);
    let animal_ty = Type::record("earth::creatures::Animal", Some(animal));
    method(&mut b, home, "Host", Type::void(), &[("guest", Type::pointer(animal_ty))], |_| {});

    let sweet = class(&mut b, ns, "SweetHome", "earth::creatures::SweetHome", HEADER);
    base(&mut b, sweet, "earth::creatures::Home", home);
    method(&mut b, sweet, "Warmth", Type::builtin("float"), &[], |f| f.const_method = true);

    let ghost = class(&mut b, ns, "Ghost", "earth::creatures::Ghost", HEADER);
    let ghost_ptr = Type::pointer(Type::record("earth::creatures::Ghost", Some(ghost)));
    method(&mut b, ghost, "Summon", ghost_ptr, &[], |f| f.static_method = true);
    b.add(ghost, Node::new(CursorKind::Destructor, "~Ghost").private());

    let buffer = class(&mut b, ns, "Buffer", "earth::creatures::Buffer", HEADER);
    constructor(&mut b, buffer, "Buffer", &[("size", Type::builtin("int"))]);
    constructor(
        &mut b,
        buffer,
        "Buffer",
        &[("data", Type::record("std::unique_ptr<int>", None))],
    );

    let den = class(&mut b, ns, "Den", "earth::creatures::Den", HEADER);
    let lair = class(&mut b, ns, "Lair", "earth::creatures::Lair", HEADER);
    base(&mut b, den, "earth::creatures::Lair", lair);

    function(&mut b, ns, "Greet", &[("times", Type::builtin("int"))], HEADER);
    function(&mut b, ns, "Greet", &[("volume", Type::builtin("float"))], HEADER);
    function(&mut b, ns, "Greet", &[("times", Type::builtin("int"))], HEADER);

    let root = b.root();
    function(&mut b, root, "Foreign", &[], "other.h");
    b.finish()
}

/// `template <class T> struct Box { T value; }; class Shelf { public: Box<int> box; };`
///
/// The first parse only sees `Box<int>` implicitly; after the `extern template` directive is injected, the reparse
/// contains an explicit instantiation with a body.
pub fn shelf(instantiated: bool) -> TranslationUnit {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let tpl = b.add(b.root(), Node::new(CursorKind::ClassTemplate, "Box").definition().at("shelf.h", 1));
    b.node_mut(tpl).templated_kind = Some(CursorKind::StructDecl);
    b.add(tpl, Node::new(CursorKind::TemplateTypeParameter, "T"));
    b.add(tpl, Node::new(CursorKind::FieldDecl, "value").with_type(Type::template_param("T")));

    let args = vec![TemplateArgument::Type(Type::builtin("int"))];
    let spec = if instantiated {
        let spec = b.add(
            b.root(),
            Node::new(CursorKind::StructDecl, "Box")
                .display("Box<int>")
                .at(DRIVER_FILE, 2)
                .specialization_of(tpl, SpecializationKind::ExplicitInstantiationDeclaration, args),
        );
        b.add(spec, Node::new(CursorKind::FieldDecl, "value").with_type(Type::builtin("int")));
        spec
    } else {
        b.add_detached(
            b.root(),
            Node::new(CursorKind::StructDecl, "Box")
                .display("Box<int>")
                .specialization_of(tpl, SpecializationKind::Implicit, args),
        )
    };
    b.node_mut(spec).ty = Some(Type::record("Box<int>", Some(spec)));

    let root = b.root();
    let shelf = class(&mut b, root, "Shelf", "Shelf", "shelf.h");
    b.add(
        shelf,
        Node::new(CursorKind::FieldDecl, "box").public().with_type(Type::record("Box<int>", Some(spec))),
    );
    b.finish()
}

/// A front end that serves the shelf unit, instantiated once the directive is in the driver file.
pub fn shelf_frontend() -> impl FnMut(&ParseRequest) -> Result<TranslationUnit, ParseError> {
    |request: &ParseRequest| Ok(shelf(request.contents.contains("extern template struct Box<int>;")))
}

/// A front end that always returns `tu`.
pub fn fixed_frontend(tu: TranslationUnit) -> impl FnMut(&ParseRequest) -> Result<TranslationUnit, ParseError> {
    move |_: &ParseRequest| Ok(tu.clone())
}

/// Load a unit with a fixed timestamp.
pub fn load(config: UnitConfig, tu: TranslationUnit) -> GenerationUnit {
    let mut frontend = fixed_frontend(tu);
    GenerationUnit::load(config, &mut frontend)
        .expect("fixture parses")
        .with_timestamp(TIMESTAMP)
}

pub fn creatures_config() -> UnitConfig {
    UnitConfig::new(vec![HEADER.to_string()], "creatures_binding.cc.inc")
}

/// Run the whole in-memory pipeline over the creatures unit.
pub fn generate_creatures(config: UnitConfig) -> String {
    let tu = creatures();
    let mut unit = load(config, tu.clone());
    let mut ctx = GenContext::new();
    let mut frontend = fixed_frontend(tu);
    bindweave::generate_source(&mut unit, &mut ctx, &mut frontend).expect("creatures generate")
}
