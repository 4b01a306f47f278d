//! End-to-end generation tests
//!
//! Each test runs the in-memory pipeline (load, tree, emit) over a fixture translation unit and checks the
//! generated binding source.

mod common;

use bindweave::classify::is_type_deletable;
use bindweave::context::GenContext;
use bindweave::entity::EntityKind;
use bindweave::errors::GenerationError;
use bindweave::gen_unit::{DRIVER_FILE, GenerationUnit};
use bindweave::tree::build_tree;
use bindweave::{UnitConfig, emit_unit, generate_source};
use bindweave_ast::{CursorKind, Node, Type, UnitBuilder};

use common::*;

fn position(text: &str, needle: &str) -> usize {
    text.find(needle).unwrap_or_else(|| panic!("`{needle}` not found in output"))
}

// =============================================================================
// creatures scenario
// =============================================================================

#[test]
fn creatures_file_layout() {
    let text = generate_creatures(creatures_config());

    assert!(text.starts_with("// GENERATED AT 01/01/2025, 00:00:00\n"));
    assert!(text.contains("#include \"creatures.h\"\n"));
    assert!(text.contains("#ifndef BINDWEAVE_RUNTIME_H"));
    assert!(text.contains("namespace {\n"));
    assert!(text.contains(
        "[[nodiscard]] bindweave::CallUpdateGuard DeclFn(pybind11::module_ &m, const bindweave::CustomBindingRegistry &registry) {"
    ));
    assert!(text.contains("  auto v0 = bindweave::CreateEntity<Entity_earth>(registry, bindweave::EntityScope(m));\n"));
    assert!(text.contains("  auto v1 = bindweave::CreateEntity<Entity_earth_creatures>(registry, v0->AsScope());\n"));
    assert!(text.contains("handle{parent_h.Module().def_submodule(\"creatures\")}"));
    assert!(text.ends_with("} // anonymous namespace\n"));
}

#[test]
fn creatures_members() {
    let text = generate_creatures(creatures_config());

    // enum class: values, no export into the parent scope
    assert!(text.contains("handle.value(\"Cat\", earth::creatures::Kind::Cat);"));
    assert!(text.contains("handle.value(\"Dog\", earth::creatures::Kind::Dog);"));
    assert!(!text.contains("export_values"));

    assert!(text.contains("parent_h.Handle(), \"Animal\", pybind11::dynamic_attr(), R\"bw(/// A living thing.)bw\""));
    assert!(text.contains("handle.def_readwrite(\"age\", &earth::creatures::Animal::age);"));
    assert!(text.contains("handle.def(pybind11::init<int>());"));
    assert!(text.contains(
        "handle.def(\"Warmth\", static_cast<float (earth::creatures::SweetHome::*)() const>(&earth::creatures::SweetHome::Warmth));"
    ));
    assert!(text.contains("pybind11::class_<earth::creatures::SweetHome, earth::creatures::Home>"));
    assert!(text.contains("bindweave::TryAddDefaultCtor<earth::creatures::Lair>(handle);"));
}

#[test]
fn private_and_foreign_declarations_are_never_bound() {
    let text = generate_creatures(creatures_config());
    assert!(!text.contains("secret_"));
    assert!(!text.contains("Forget"));
    assert!(!text.contains("Foreign"));
}

#[test]
fn generation_is_deterministic() {
    let first = generate_creatures(creatures_config());
    let second = generate_creatures(creatures_config());
    assert_eq!(first, second);
}

#[test]
fn emitting_the_same_tree_twice_is_identical() {
    let tu = creatures();
    let mut unit = load(creatures_config(), tu.clone());
    let mut ctx = GenContext::new();
    let mut frontend = fixed_frontend(tu);
    let tree = build_tree(&mut unit, &mut ctx, &mut frontend).unwrap();
    let first = emit_unit(&tree, &unit, &mut ctx).unwrap();
    let second = emit_unit(&tree, &unit, &mut ctx).unwrap();
    assert_eq!(first, second);
}

// =============================================================================
// Overloads and ordering
// =============================================================================

#[test]
fn overloads_share_one_function_entity() {
    let tu = creatures();
    let mut unit = load(creatures_config(), tu.clone());
    let mut ctx = GenContext::new();
    let mut frontend = fixed_frontend(tu);
    let tree = build_tree(&mut unit, &mut ctx, &mut frontend).unwrap();

    let greet = tree.find("earth::creatures::Greet").unwrap();
    let EntityKind::Function(data) = tree.get(greet).kind() else {
        panic!("Greet should be a function entity");
    };
    // the repeated `Greet(int)` is a redeclaration, not an overload
    assert_eq!(data.overloads().len(), 1);

    let text = emit_unit(&tree, &unit, &mut ctx).unwrap();
    assert_eq!(text.matches("handle.def(\"Greet\"").count(), 2);
    assert!(text.contains("#ifndef BINDWEAVE_DISABLE_earth_creatures_Greet_Greet\n"));
    assert!(text.contains("#ifndef BINDWEAVE_DISABLE_earth_creatures_Greet_Greet1\n"));
}

#[test]
fn bases_are_created_before_derived_classes() {
    let text = generate_creatures(creatures_config());
    let create = |name: &str| position(&text, &format!("bindweave::CreateEntity<Entity_earth_creatures_{name}>"));
    assert!(create("Lair") < create("Den"));
    assert!(create("Home") < create("SweetHome"));
    assert!(create("Animal") < create("Cat"));
    // independent siblings keep name order
    assert!(create("Buffer") < create("Ghost"));
}

#[test]
fn cyclic_bases_are_a_fatal_error() {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let root = b.root();
    let a = class(&mut b, root, "A", "A", "loop.h");
    let c = class(&mut b, root, "B", "B", "loop.h");
    b.add(a, Node::new(CursorKind::BaseSpecifier, "B").with_type(Type::record("B", Some(c))));
    b.add(c, Node::new(CursorKind::BaseSpecifier, "A").with_type(Type::record("A", Some(a))));
    let tu = b.finish();

    let mut unit = load(UnitConfig::new(vec!["loop.h".into()], "loop.cc"), tu.clone());
    let mut ctx = GenContext::new();
    let err = generate_source(&mut unit, &mut ctx, &mut fixed_frontend(tu)).unwrap_err();
    match err {
        GenerationError::DependencyCycle { entities } => assert_eq!(entities, vec!["A", "B"]),
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
}

// =============================================================================
// Classes needing special handling
// =============================================================================

#[test]
fn final_classes_get_no_trampoline() {
    let text = generate_creatures(creatures_config());
    assert!(text.contains("pybind11::class_<earth::creatures::Animal, BwTramp_earth_creatures_Animal<>>"));
    assert!(text.contains("PYBIND11_OVERRIDE_PURE(BwRetT, BwConcreteT, Eat, food);"));
    assert!(text.contains("PYBIND11_OVERRIDE(BwRetT, BwConcreteT, Sleep, hours);"));
    assert!(!text.contains("BwTramp_earth_creatures_Cat"));
}

#[test]
fn private_destructor_uses_a_nodelete_holder() {
    let tu = creatures();
    let mut unit = load(creatures_config(), tu.clone());
    let mut ctx = GenContext::new();
    let mut frontend = fixed_frontend(tu);
    let tree = build_tree(&mut unit, &mut ctx, &mut frontend).unwrap();
    let ghost = tree.get(tree.find("earth::creatures::Ghost").unwrap());
    assert!(!is_type_deletable(unit.tu().cursor(ghost.cursor())));

    let text = emit_unit(&tree, &unit, &mut ctx).unwrap();
    assert!(text.contains(
        "pybind11::class_<earth::creatures::Ghost, std::unique_ptr<earth::creatures::Ghost, pybind11::nodelete>>"
    ));
}

#[test]
fn pointers_to_undeletable_classes_are_wrapped_once() {
    let text = generate_creatures(creatures_config());
    assert!(text.contains("handle.def_static(\"Summon\", [fn = "));
    assert!(text.contains("return bindweave::WrapP<earth::creatures::Ghost>(fn());"));
    assert_eq!(
        text.matches("bindweave::FastBindWrappedPtr<earth::creatures::Ghost>(m, \"WrappedPtr_earth_creatures_Ghost\");")
            .count(),
        1
    );
}

#[test]
fn unique_ptr_constructor_is_disabled() {
    let text = generate_creatures(creatures_config());
    assert!(text.contains("#define BINDWEAVE_DISABLE_earth_creatures_Buffer_Ctor1\n"));
    assert!(!text.contains("#define BINDWEAVE_DISABLE_earth_creatures_Buffer_Ctor0"));
    assert!(text.contains("handle.def(pybind11::init<std::unique_ptr<int>>());"));
    assert_eq!(text.matches("#define BINDWEAVE_DISABLE_earth_creatures_Buffer_").count(), 1);
}

// =============================================================================
// Configuration-driven behavior
// =============================================================================

#[test]
fn strict_visibility_drops_undefined_functions() {
    let permissive = generate_creatures(creatures_config());
    let mut strict_config = creatures_config();
    strict_config.strict_visibility_mode = true;
    let strict = generate_creatures(strict_config);

    assert!(permissive.contains("handle.def(\"Greet\""));
    assert!(!strict.contains("handle.def(\"Greet\""));
    // class definitions in headers stay visible
    assert!(strict.contains("Entity_earth_creatures_Animal"));
}

#[test]
fn docstrings_can_be_turned_off() {
    let mut config = creatures_config();
    config.gen_docstring = false;
    let text = generate_creatures(config);
    assert!(!text.contains("A living thing."));
}

#[test]
fn root_namespace_selects_the_subtree() {
    let mut config = creatures_config();
    config.root_module_namespace = "earth::creatures".to_string();
    config.decl_fn_name = "DeclCreatures".to_string();
    let text = generate_creatures(config);
    assert!(!text.contains("Entity_earth>"));
    assert!(!text.contains("def_submodule"));
    assert!(text.contains("bindweave::CallUpdateGuard DeclCreatures(pybind11::module_ &m"));
    assert!(text.contains(
        "auto v0 = bindweave::CreateEntity<Entity_earth_creatures_Animal>(registry, bindweave::EntityScope(m));"
    ));
}

#[test]
fn missing_root_namespace_is_fatal() {
    for root in ["earth::oceans", "earth::creatures::Animal"] {
        let mut config = creatures_config();
        config.root_module_namespace = root.to_string();
        let tu = creatures();
        let mut unit = load(config, tu.clone());
        let mut ctx = GenContext::new();
        let err = generate_source(&mut unit, &mut ctx, &mut fixed_frontend(tu)).unwrap_err();
        assert!(matches!(err, GenerationError::MissingRootNamespace(ref name) if name == root));
    }
}

// =============================================================================
// Instantiation pre-pass
// =============================================================================

#[test]
fn implicit_instantiations_are_bound_after_reparse() {
    let mut frontend = shelf_frontend();
    let config = UnitConfig::new(vec!["shelf.h".into()], "shelf.cc");
    let mut unit = GenerationUnit::load(config, &mut frontend).unwrap().with_timestamp(TIMESTAMP);
    let mut ctx = GenContext::new();
    let text = generate_source(&mut unit, &mut ctx, &mut frontend).unwrap();

    assert_eq!(unit.generation(), 2);
    assert!(unit.driver().ends_with("extern template struct Box<int>;"));
    assert!(text.contains("bindweave::CreateEntity<Entity_Box_int>"));
    assert!(text.contains("handle.def_readwrite(\"value\", &Box<int>::value);"));
    assert!(text.contains("handle.def_readonly(\"box\", &Shelf::box);"));
    assert!(position(&text, "CreateEntity<Entity_Box_int>") < position(&text, "CreateEntity<Entity_Shelf>"));
}

#[test]
fn used_types_from_outside_the_unit_are_reported() {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let root = b.root();
    let outside = class(&mut b, root, "Engine", "Engine", "engine.h");
    let f = function(&mut b, root, "Start", &[], "car.h");
    b.node_mut(f).result_type = Some(Type::record("Engine", Some(outside)));
    b.node_mut(f).ty = Some(Type::function(Type::record("Engine", Some(outside)), vec![]));
    let tu = b.finish();

    let mut unit = load(UnitConfig::new(vec!["car.h".into()], "car.cc"), tu.clone());
    let mut ctx = GenContext::new();
    let text = generate_source(&mut unit, &mut ctx, &mut fixed_frontend(tu)).unwrap();
    assert!(text.contains("handle.def(\"Start\", static_cast<Engine (*)()>(&Start));"));
    assert_eq!(ctx.unbound_used_types().collect::<Vec<_>>(), vec!["Engine"]);
}

// =============================================================================
// Member registrations
// =============================================================================

#[test]
fn unbindable_fields_stay_in_the_source_behind_their_guard() {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let root = b.root();
    let holder = class(&mut b, root, "Holder", "Holder", "holder.h");
    b.add(
        holder,
        Node::new(CursorKind::FieldDecl, "data")
            .public()
            .with_type(Type::record("std::unique_ptr<int>", None)),
    );
    b.add(holder, Node::new(CursorKind::FieldDecl, "count").public().with_type(Type::builtin("int")));
    let tu = b.finish();

    let mut unit = load(UnitConfig::new(vec!["holder.h".into()], "holder.cc"), tu.clone());
    let mut ctx = GenContext::new();
    let text = generate_source(&mut unit, &mut ctx, &mut fixed_frontend(tu)).unwrap();

    assert!(text.contains("#define BINDWEAVE_DISABLE_Holder_Field_data\n"));
    assert!(text.contains("handle.def_readonly(\"data\", &Holder::data);"));
    assert!(text.contains("#ifndef BINDWEAVE_DISABLE_Holder_Field_count\n"));
    assert!(!text.contains("#define BINDWEAVE_DISABLE_Holder_Field_count"));
    assert!(text.contains("handle.def_readwrite(\"count\", &Holder::count);"));
    assert!(text.contains("AddField_data();") && text.contains("AddField_count();"));
}

#[test]
fn static_overloads_of_instance_methods_are_renamed() {
    let mut b = UnitBuilder::new(DRIVER_FILE);
    let root = b.root();
    let widget = class(&mut b, root, "Widget", "Widget", "widget.h");
    method(&mut b, widget, "Foo", Type::void(), &[], |_| {});
    method(&mut b, widget, "Foo", Type::void(), &[("n", Type::builtin("int"))], |f| f.static_method = true);
    let tu = b.finish();

    let mut unit = load(UnitConfig::new(vec!["widget.h".into()], "widget.cc"), tu.clone());
    let mut ctx = GenContext::new();
    let text = generate_source(&mut unit, &mut ctx, &mut fixed_frontend(tu)).unwrap();

    assert!(text.contains("handle.def(\"Foo\", static_cast<void (Widget::*)()>(&Widget::Foo));"));
    assert!(text.contains("handle.def_static(\"Foo_\", static_cast<void (*)(int)>(&Widget::Foo));"));
    assert!(text.contains("virtual const char *AddMethod_Foo()"));
    assert!(text.contains("virtual const char *AddMethod_Foo1()"));
    assert!(text.contains("BINDWEAVE_DISABLE_Widget_Method_Foo1"));
}
