use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use weft::{CompileError, Compiler, DataBindings, Node, Object, Options, PassKind, Template};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/templates")
}

fn compiler() -> Compiler {
    Compiler::new(Options::all_passes(fixtures()))
}

fn render(template: &Template, data: IndexMap<String, Object>) -> String {
    let compiled = template.compile_native::<DataBindings>().unwrap();
    compiled.render(&mut DataBindings::new(data)).unwrap()
}

fn assert_no_includes(node: &Node) {
    match node {
        Node::Include { .. } => panic!("include survived the include-resolution pass"),
        Node::Statements(children) => children.iter().for_each(assert_no_includes),
        Node::If {
            then_body, else_body, ..
        } => {
            assert_no_includes(then_body);
            if let Some(else_body) = else_body {
                assert_no_includes(else_body);
            }
        }
        Node::For { body, else_body, .. } => {
            assert_no_includes(body);
            if let Some(else_body) = else_body {
                assert_no_includes(else_body);
            }
        }
        Node::Raw(_) | Node::Print(_) => {}
    }
}

#[test]
fn include_with_bindings() {
    let template = compiler().compile_file(fixtures().join("outer_bindings.tmpl")).unwrap();
    assert_no_includes(template.ast());

    let mut data = IndexMap::new();
    data.insert("user".to_owned(), Object::from("world"));
    assert_eq!(render(&template, data), "pre hello world post");
}

#[test]
fn include_with_missing_binding_fails() {
    let err = compiler()
        .compile_file(fixtures().join("missing_binding.tmpl"))
        .unwrap_err();
    let CompileError::MissingVariable { variable, include } = err else {
        panic!("expected a missing variable error, got {err:?}");
    };
    assert_eq!(variable, "name");
    assert!(include.ends_with("inner.tmpl"), "unexpected include name: {include}");
}

#[test]
fn include_with_scope_rewrites_free_variables() {
    let template = compiler().compile_file(fixtures().join("outer_scope.tmpl")).unwrap();

    // The inner template's reads become attribute reads on the scope.
    let dump = template.dump();
    assert!(
        dump.contains("{GET_ATTRIBUTE variable={VARIABLE name=\"u\"} attributeName=\"name\"}"),
        "scope rewrite missing from dump:\n{dump}"
    );

    let mut user = IndexMap::new();
    user.insert("name".to_owned(), Object::from("A"));
    user.insert("age".to_owned(), Object::Int(3));
    let mut data = IndexMap::new();
    data.insert("u".to_owned(), Object::Map(user));
    assert_eq!(render(&template, data), "A-3");
}

#[test]
fn nested_includes_resolve_depth_first() {
    let template = compiler().compile_file(fixtures().join("a.tmpl")).unwrap();
    assert_no_includes(template.ast());

    let mut data = IndexMap::new();
    data.insert("x".to_owned(), Object::Int(7));
    assert_eq!(render(&template, data), "A[B(c=7)]");
}

#[test]
fn cyclic_include_is_detected() {
    let err = compiler().compile_file(fixtures().join("self.tmpl")).unwrap_err();
    assert!(matches!(err, CompileError::CyclicInclude { .. }), "got {err:?}");
}

#[test]
fn missing_include_file_is_an_io_error() {
    let err = compiler().compile_str(r#"{% include "no_such_file.tmpl" %}"#).unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }), "got {err:?}");
}

#[test]
fn absolute_include_names_bypass_the_base_path() {
    let inner = fixtures().join("inner.tmpl");
    let source = format!(r#"{{% include "{}" with {{ name: 'x' }} %}}"#, inner.display());

    let compiler = Compiler::new(Options::all_passes("/definitely/not/here"));
    let template = compiler.compile_str(&source).unwrap();
    assert_eq!(render(&template, IndexMap::new()), "hello x");
}

#[test]
fn backends_reject_unresolved_includes() {
    let options = Options {
        base_path: fixtures(),
        passes: vec![PassKind::ConstantFolding],
        undefined_check: false,
    };
    let template = Compiler::new(options)
        .compile_file(fixtures().join("outer_bindings.tmpl"))
        .unwrap();

    assert!(matches!(template.to_javascript(), Err(CompileError::Unsupported { .. })));
    assert!(matches!(
        template.compile_native::<DataBindings>(),
        Err(CompileError::Unsupported { .. })
    ));
}
