use pretty_assertions::assert_eq;
use weft::{CompileError, Compiler, Options};

fn emit(source: &str) -> String {
    Compiler::new(Options::all_passes("."))
        .compile_str(source)
        .unwrap()
        .to_javascript()
        .unwrap()
}

fn emit_with_undefined_check(source: &str) -> String {
    let options = Options {
        undefined_check: true,
        ..Options::all_passes(".")
    };
    Compiler::new(options)
        .compile_str(source)
        .unwrap()
        .to_javascript()
        .unwrap()
}

#[test]
fn renderer_shell_and_interpolation() {
    let expected = "function(helpers, data) {\n\
                    \tdata = data || {};\n\
                    \tvar buffer = '';\n\
                    \n\
                    \tbuffer += 'abc';\n\
                    \tbuffer += data['x'];\n\
                    \tbuffer += 'def';\n\
                    \n\
                    \treturn buffer;\n\
                    }\n";
    assert_eq!(emit("abc{{ x }}def"), expected);
}

#[test]
fn undefined_check_appends_the_fallback() {
    let emitted = emit_with_undefined_check("{{ x }}");
    assert!(emitted.contains("buffer += data['x'] || '';"), "got:\n{emitted}");

    let emitted = emit("{{ x }}");
    assert!(emitted.contains("buffer += data['x'];"), "got:\n{emitted}");
}

#[test]
fn if_chains_emit_else_if_ladders() {
    let emitted = emit("{% if x == 1 %}A{% elif x == 2 %}B{% else %}C{% endif %}");
    assert!(emitted.contains("\tif (data['x'] == 1) {\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t\tbuffer += 'A';\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t} else if (data['x'] == 2) {\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t} else {\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t\tbuffer += 'C';\n"), "got:\n{emitted}");
}

#[test]
fn loops_guard_iterate_and_track_emptiness() {
    let emitted = emit("{% for k, v in m %}[{{k}}={{v}}]{% else %}empty{% endfor %}");
    assert!(emitted.contains("\tvar iterable_1 = data['m'];\n"), "got:\n{emitted}");
    assert!(emitted.contains("\tvar is_empty_1 = true;\n"), "got:\n{emitted}");
    assert!(emitted.contains("\tfor (var key_1 in iterable_1) {\n"), "got:\n{emitted}");
    assert!(
        emitted.contains("\t\tif (!iterable_1.hasOwnProperty(key_1)) continue;\n"),
        "got:\n{emitted}"
    );
    assert!(emitted.contains("\t\tvar value_1 = iterable_1[key_1];\n"), "got:\n{emitted}");
    // The binders shadow data lookups inside the body.
    assert!(emitted.contains("\t\tbuffer += key_1;\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t\tbuffer += value_1;\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t\tis_empty_1 = false;\n"), "got:\n{emitted}");
    assert!(emitted.contains("\tif (is_empty_1) {\n"), "got:\n{emitted}");
    assert!(emitted.contains("\t\tbuffer += 'empty';\n"), "got:\n{emitted}");
}

#[test]
fn loop_binders_stop_shadowing_after_the_loop() {
    let emitted = emit("{% for k in xs %}{{ k }}{% endfor %}{{ k }}");
    assert!(emitted.contains("buffer += value_1;"), "got:\n{emitted}");
    assert!(emitted.contains("buffer += data['k'];"), "got:\n{emitted}");
}

#[test]
fn helpers_and_attributes() {
    let emitted = emit("{{ fmt(u.name, 2) }}");
    assert!(
        emitted.contains("buffer += helpers['fmt'](data['u']['name'], 2);"),
        "got:\n{emitted}"
    );
}

#[test]
fn nested_arithmetic_is_parenthesized() {
    let emitted = emit("{{ (1 + x) * 2 }}");
    assert!(emitted.contains("buffer += (1 + x) * 2;") || emitted.contains("buffer += (1 + data['x']) * 2;"), "got:\n{emitted}");

    let emitted = emit("{{ x - (y - 1) }}");
    assert!(
        emitted.contains("buffer += data['x'] - (data['y'] - 1);"),
        "got:\n{emitted}"
    );
}

#[test]
fn string_literals_are_escaped() {
    let emitted = emit("{{ greet('it\\'s\\n') }}");
    assert!(emitted.contains(r"helpers['greet']('it\'s\n')"), "got:\n{emitted}");
}

#[test]
fn raw_text_is_escaped() {
    let emitted = emit("a'b\nc");
    assert!(emitted.contains(r"buffer += 'a\'b\nc';"), "got:\n{emitted}");
}

#[test]
fn unresolved_includes_are_rejected() {
    let template = Compiler::new(Options::no_passes("."))
        .compile_str(r#"{% include "x.tmpl" %}"#)
        .unwrap();
    assert!(matches!(template.to_javascript(), Err(CompileError::Unsupported { .. })));
}

#[test]
fn booleans_and_floats_emit_canonical_literals() {
    // Folding is off so the literals reach the backend.
    let template = Compiler::new(Options::no_passes("."))
        .compile_str("{{ x == true }}{{ x == 2.5 }}{{ x == 3.0 }}")
        .unwrap();
    let emitted = template.to_javascript().unwrap();
    assert!(emitted.contains("data['x'] == true"), "got:\n{emitted}");
    assert!(emitted.contains("data['x'] == 2.5"), "got:\n{emitted}");
    assert!(emitted.contains("data['x'] == 3"), "got:\n{emitted}");
}
