use pretty_assertions::assert_eq;
use weft::{
    CoalesceRawBlocksPass, CompileError, Compiler, FoldConstantsPass, LiteralPrintToRawPass, Node, Options, PassKind,
    PassManager, parse_str,
};

fn optimize(source: &str) -> Result<Node, CompileError> {
    let compiler = Compiler::new(Options::all_passes("."));
    compiler.compile_str(source).map(|template| template.ast().clone())
}

fn fold_only() -> PassManager {
    let mut manager = PassManager::new();
    manager.add_expression_pass(FoldConstantsPass);
    manager
}

fn full_pipeline() -> PassManager {
    let mut manager = PassManager::new();
    manager.add_expression_pass(FoldConstantsPass);
    manager.add_node_pass(LiteralPrintToRawPass);
    manager.add_node_pass(CoalesceRawBlocksPass);
    manager
}

/// Checks the post-traversal structural invariants: no block nests another
/// block, no block has exactly one child, and (when `coalesced`) no two
/// adjacent raws survive.
fn assert_well_formed(node: &Node, coalesced: bool) {
    match node {
        Node::Statements(children) => {
            assert_ne!(children.len(), 1, "single-child block survived: {node:?}");
            for pair in children.windows(2) {
                if coalesced {
                    assert!(
                        !(matches!(pair[0], Node::Raw(_)) && matches!(pair[1], Node::Raw(_))),
                        "adjacent raw blocks survived coalescing"
                    );
                }
            }
            for child in children {
                assert!(
                    !matches!(child, Node::Statements(_)),
                    "nested statements block survived flattening"
                );
                assert_well_formed(child, coalesced);
            }
        }
        Node::If {
            then_body, else_body, ..
        } => {
            assert_well_formed(then_body, coalesced);
            if let Some(else_body) = else_body {
                assert_well_formed(else_body, coalesced);
            }
        }
        Node::For { body, else_body, .. } => {
            assert_well_formed(body, coalesced);
            if let Some(else_body) = else_body {
                assert_well_formed(else_body, coalesced);
            }
        }
        Node::Raw(_) | Node::Print(_) | Node::Include { .. } => {}
    }
}

#[test]
fn literal_fold_and_coalesce() {
    let ast = optimize("abc{{ 1 + 2 * 3 }}def").unwrap();
    assert_eq!(ast, Node::Raw("abc7def".to_owned()));
}

#[test]
fn integer_division_by_zero_aborts_the_pipeline() {
    let err = optimize("{{ 10 / 0 }}").unwrap_err();
    assert!(matches!(err, CompileError::DivisionByZero { operation: "division" }));

    let err = optimize("{{ 10 % 0 }}").unwrap_err();
    assert!(matches!(err, CompileError::DivisionByZero { operation: "modulo" }));
}

#[test]
fn double_division_by_zero_folds_to_infinity() {
    assert_eq!(optimize("{{ 1.0 / 0 }}").unwrap(), Node::Raw("inf".to_owned()));
}

#[test]
fn double_modulo_is_left_to_the_runtime() {
    let ast = fold_only().run(parse_str("{{ 5.5 % 2 }}").unwrap()).unwrap();
    assert!(
        matches!(ast, Node::Print(weft::Expression::Binary { op: weft::BinaryOp::Mod, .. })),
        "double modulo must stay unfolded, got {ast:?}"
    );
}

#[test]
fn integer_arithmetic_wraps() {
    let ast = optimize("{{ 9223372036854775807 + 1 }}").unwrap();
    assert_eq!(ast, Node::Raw(i64::MIN.to_string()));
}

#[test]
fn integer_division_truncates_toward_zero() {
    assert_eq!(optimize("{{ (0 - 7) / 2 }}").unwrap(), Node::Raw("-3".to_owned()));
    assert_eq!(optimize("{{ (0 - 7) % 2 }}").unwrap(), Node::Raw("-1".to_owned()));
}

#[test]
fn unary_folds() {
    assert_eq!(optimize("{{ -(2 + 3) }}").unwrap(), Node::Raw("-5".to_owned()));
    assert_eq!(optimize("{{ !true }}").unwrap(), Node::Raw("false".to_owned()));
    assert_eq!(optimize("{{ +4.5 }}").unwrap(), Node::Raw("4.5".to_owned()));
}

#[test]
fn comparison_folds() {
    assert_eq!(optimize("{{ 1 == 1.0 }}").unwrap(), Node::Raw("true".to_owned()));
    assert_eq!(optimize("{{ 'a' == 'b' }}").unwrap(), Node::Raw("false".to_owned()));
    assert_eq!(optimize("{{ 'a' != 'b' }}").unwrap(), Node::Raw("true".to_owned()));
    assert_eq!(optimize("{{ 1 < 2 }}").unwrap(), Node::Raw("true".to_owned()));
    assert_eq!(optimize("{{ 2.5 >= 3 }}").unwrap(), Node::Raw("false".to_owned()));
    assert_eq!(optimize("{{ true && false }}").unwrap(), Node::Raw("false".to_owned()));
    assert_eq!(optimize("{{ true || false }}").unwrap(), Node::Raw("true".to_owned()));
}

#[test]
fn cross_type_comparisons_stay_unfolded() {
    let ast = fold_only().run(parse_str("{{ 1 == 'a' }}").unwrap()).unwrap();
    assert!(matches!(ast, Node::Print(weft::Expression::Comparison { .. })));
}

#[test]
fn non_literal_expressions_stay_put_but_children_fold() {
    let ast = fold_only().run(parse_str("{{ x + (1 + 2) }}").unwrap()).unwrap();
    let Node::Print(weft::Expression::Binary { right, .. }) = ast else {
        panic!("expected an unfolded addition");
    };
    assert_eq!(*right, weft::Expression::Literal(weft::Literal::Int(3)));
}

#[test]
fn pipeline_is_idempotent() {
    let sources = [
        "abc{{ 1 + 2 }}def{% if x == 1 %}A{% else %}B{% endif %}",
        "{% for k, v in m %}{{ k }}{{ v }}{% else %}none{% endfor %}tail",
        "{{ 'a' }}{{ 'b' }}{{ x }}{{ 'c' }}",
    ];
    for source in sources {
        let once = full_pipeline().run(parse_str(source).unwrap()).unwrap();
        let twice = full_pipeline().run(once.clone()).unwrap();
        assert_eq!(once, twice, "pipeline not idempotent for {source:?}");
    }
}

#[test]
fn rewritten_trees_are_structurally_flat() {
    let source = "a{% if x == 1 %}{% if y == 2 %}b{% endif %}{% endif %}c{{ 1 }}{{ 2 }}d";
    let ast = full_pipeline().run(parse_str(source).unwrap()).unwrap();
    assert_well_formed(&ast, true);
}

#[test]
fn coalescing_merges_maximal_runs_and_keeps_order() {
    let source = "a{{ 'b' }}c{{ x }}d{{ 'e' }}f";
    let ast = full_pipeline().run(parse_str(source).unwrap()).unwrap();
    assert_eq!(
        ast,
        Node::Statements(vec![
            Node::Raw("abc".to_owned()),
            Node::Print(weft::Expression::Variable("x".to_owned())),
            Node::Raw("def".to_owned()),
        ])
    );
}

#[test]
fn tracing_reports_pass_boundaries_in_order() {
    struct Recording(Vec<String>);

    impl weft::PassTracer for Recording {
        fn pass_start(&mut self, name: &str) {
            self.0.push(format!("start {name}"));
        }

        fn pass_end(&mut self, name: &str) {
            self.0.push(format!("end {name}"));
        }
    }

    let mut tracer = Recording(Vec::new());
    Compiler::new(Options::all_passes("."))
        .compile_str_traced("x", &mut tracer)
        .unwrap();

    let expected: Vec<String> = PassKind::ALL
        .iter()
        .flat_map(|kind| [format!("start {kind}"), format!("end {kind}")])
        .collect();
    assert_eq!(tracer.0, expected);
}

#[test]
fn pass_names_round_trip() {
    for kind in PassKind::ALL {
        let name = kind.to_string();
        assert_eq!(name.parse::<PassKind>().unwrap(), kind);
    }
    assert_eq!(
        "literal-print-to-raw-conversion-pass".parse::<PassKind>().unwrap(),
        PassKind::LiteralPrintToRaw
    );
    assert!("no-such-pass".parse::<PassKind>().is_err());
}
