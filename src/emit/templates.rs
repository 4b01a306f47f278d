//! Text of the generated binding structs and of the output file.

use super::writer::CppWriter;

/// Runtime support header, embedded into every generated file.
pub const RUNTIME_HEADER: &str = include_str!("../../include/bindweave/bindweave.h");

/// Everything one `Bind_<Struct>` template is made of.
#[derive(Debug)]
pub struct EntityStruct<'a> {
    pub struct_name: &'a str,
    pub handle_type: &'a str,
    pub init_expression: &'a str,
    pub statements: &'a [String],
    pub extra: &'a [String],
    /// Code that must precede the struct (trampolines).
    pub prelude: Option<&'a str>,
}

impl EntityStruct<'_> {
    pub fn render(&self) -> String {
        let name = self.struct_name;
        let mut w = CppWriter::new();
        if let Some(prelude) = self.prelude {
            w.lines(prelude);
        }
        w.linef(format_args!("template <class Pybind11T = {}>", self.handle_type));
        w.class_block(&format!("struct Bind_{name} : public bindweave::EntityBase"), |w| {
            w.line("using HandleT = Pybind11T;");
            w.blank_line();
            w.linef(format_args!(
                "explicit Bind_{name}(bindweave::EntityScope parent_h) : handle{{{}}} {{}}",
                self.init_expression
            ));
            w.linef(format_args!("Bind_{name}(const Bind_{name} &) = delete;"));
            w.linef(format_args!("Bind_{name}(Bind_{name} &&) = delete;"));
            w.blank_line();
            w.block("void Update() override", |w| {
                for statement in self.statements {
                    w.lines(statement);
                }
            });
            w.blank_line();
            w.block("bindweave::EntityScope AsScope() override", |w| {
                w.line("return bindweave::EntityScope(handle);");
            });
            w.blank_line();
            w.linef(format_args!("static const char *Key() {{ return \"{name}\"; }}"));
            for extra in self.extra {
                w.blank_line();
                w.lines(extra);
            }
            w.blank_line();
            w.line("HandleT handle;");
        });
        w.linef(format_args!("using Entity_{name} = Bind_{name}<>;"));
        w.finish()
    }
}

/// Everything the output file is made of.
#[derive(Debug)]
pub struct SourceFile<'a> {
    pub created_at: &'a str,
    pub include_directives: &'a [String],
    pub declarations: &'a [String],
    pub decl_fn_name: &'a str,
    pub create_statements: &'a [String],
    pub wrapped_pointer_statements: &'a [String],
    pub entity_vars: &'a [String],
}

impl SourceFile<'_> {
    pub fn render(&self) -> String {
        let mut w = CppWriter::new();
        w.linef(format_args!("// GENERATED AT {}", self.created_at));
        w.line("// Do not edit: regenerate with bindweave.");
        w.blank_line();
        for include in self.include_directives {
            w.line(include);
        }
        w.blank_line();
        w.lines(RUNTIME_HEADER);
        w.blank_line();
        w.line("namespace {");
        w.blank_line();
        for declaration in self.declarations {
            w.lines(declaration);
            w.blank_line();
        }
        w.line("// Create every entity and return a guard that runs all Update() calls,");
        w.line("// either when it is called or when it is destroyed.");
        w.block(
            &format!(
                "[[nodiscard]] bindweave::CallUpdateGuard {}(pybind11::module_ &m, const bindweave::CustomBindingRegistry &registry)",
                self.decl_fn_name
            ),
            |w| {
                for statement in self.create_statements {
                    w.line(statement);
                }
                for statement in self.wrapped_pointer_statements {
                    w.line(statement);
                }
                w.linef(format_args!(
                    "std::vector<std::shared_ptr<bindweave::EntityBase>> entities{{{}}};",
                    self.entity_vars.join(", ")
                ));
                w.line("return bindweave::CallUpdateGuard([entities]() {");
                w.indent();
                w.block("for (auto &entity : entities)", |w| w.line("entity->Update();"));
                w.dedent();
                w.line("});");
            },
        );
        w.blank_line();
        w.line("} // anonymous namespace");
        w.finish()
    }
}
