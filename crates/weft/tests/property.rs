//! Property tests over randomly shaped ASTs.
//!
//! A seeded generator produces trees whose expressions stay well typed for
//! the seven fixed binding environments below; every prefix of the
//! pass pipeline must then preserve the natively rendered output, keep the
//! structural invariants and be idempotent.

use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use weft::{
    Backend, BinaryOp, CmpOp, CoalesceRawBlocksPass, DataBindings, Expression, FoldConstantsPass, Literal,
    LiteralPrintToRawPass, NativeBackend, Node, Object, PassManager, UnaryOp,
};

const SAMPLES: u64 = 120;
const MAX_DEPTH: u32 = 3;

/// Numeric variables available in every environment.
const NUMERIC_VARS: [&str; 3] = ["a", "b", "c"];
/// Iterable variables available in every environment.
const ITERABLE_VARS: [&str; 2] = ["m", "xs"];

struct Shapes {
    rng: ChaCha8Rng,
}

impl Shapes {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn numeric_var(&mut self) -> Expression {
        let name = NUMERIC_VARS[self.rng.gen_range(0..NUMERIC_VARS.len())];
        Expression::Variable(name.to_owned())
    }

    fn numeric(&mut self, depth: u32) -> Expression {
        if depth == 0 || self.rng.gen_range(0..3) == 0 {
            return match self.rng.gen_range(0..3) {
                0 => Expression::Literal(Literal::Int(self.rng.gen_range(-9..10))),
                1 => Expression::Literal(Literal::Float(f64::from(self.rng.gen_range(-40..40)) / 4.0)),
                _ => self.numeric_var(),
            };
        }
        // Division and modulo are excluded so folding can never hit a zero
        // divisor the unfolded render would also hit.
        let ops = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul];
        match self.rng.gen_range(0..4) {
            0 => Expression::Unary {
                operand: Box::new(self.numeric(depth - 1)),
                op: UnaryOp::Minus,
            },
            _ => Expression::Binary {
                left: Box::new(self.numeric(depth - 1)),
                right: Box::new(self.numeric(depth - 1)),
                op: ops[self.rng.gen_range(0..ops.len())],
            },
        }
    }

    fn boolean(&mut self, depth: u32) -> Expression {
        if depth == 0 || self.rng.gen_range(0..3) == 0 {
            return Expression::Literal(Literal::Bool(self.rng.gen_range(0..2) == 0));
        }
        match self.rng.gen_range(0..3) {
            0 => {
                let cmp_ops = [CmpOp::Eq, CmpOp::Ne, CmpOp::Lt, CmpOp::Le, CmpOp::Gt, CmpOp::Ge];
                Expression::Comparison {
                    left: Box::new(self.numeric(depth - 1)),
                    right: Box::new(self.numeric(depth - 1)),
                    op: cmp_ops[self.rng.gen_range(0..cmp_ops.len())],
                }
            }
            1 => Expression::Comparison {
                left: Box::new(self.boolean(depth - 1)),
                right: Box::new(self.boolean(depth - 1)),
                op: if self.rng.gen_range(0..2) == 0 { CmpOp::And } else { CmpOp::Or },
            },
            _ => Expression::Unary {
                operand: Box::new(self.boolean(depth - 1)),
                op: UnaryOp::Not,
            },
        }
    }

    fn printable(&mut self, depth: u32) -> Expression {
        match self.rng.gen_range(0..4) {
            0 => Expression::Literal(Literal::Str(self.raw_text())),
            1 => self.boolean(depth),
            _ => self.numeric(depth),
        }
    }

    fn raw_text(&mut self) -> String {
        let alphabet = ['x', 'y', ' ', '1', '!'];
        let len = self.rng.gen_range(0..4);
        (0..len).map(|_| alphabet[self.rng.gen_range(0..alphabet.len())]).collect()
    }

    fn node(&mut self, depth: u32) -> Node {
        if depth == 0 {
            return Node::Raw(self.raw_text());
        }
        match self.rng.gen_range(0..6) {
            0 | 1 => Node::Raw(self.raw_text()),
            2 => Node::Print(self.printable(depth - 1)),
            3 => Node::If {
                condition: self.boolean(depth - 1),
                then_body: Box::new(self.statements(depth - 1)),
                else_body: if self.rng.gen_range(0..2) == 0 {
                    Some(Box::new(self.statements(depth - 1)))
                } else {
                    None
                },
            },
            4 => {
                let iterable = ITERABLE_VARS[self.rng.gen_range(0..ITERABLE_VARS.len())];
                let mut body = vec![Node::Print(Expression::Variable("item".to_owned()))];
                if let Node::Statements(rest) = self.statements(depth - 1) {
                    body.extend(rest);
                }
                Node::For {
                    key: None,
                    value: Some("item".to_owned()),
                    iterable: Expression::Variable(iterable.to_owned()),
                    body: Box::new(Node::Statements(body)),
                    else_body: if self.rng.gen_range(0..2) == 0 {
                        Some(Box::new(self.statements(depth - 1)))
                    } else {
                        None
                    },
                }
            }
            _ => self.statements(depth - 1),
        }
    }

    fn statements(&mut self, depth: u32) -> Node {
        let count = self.rng.gen_range(0..4);
        Node::Statements((0..count).map(|_| self.node(depth)).collect())
    }

    fn template(&mut self) -> Node {
        let count = self.rng.gen_range(1..5);
        Node::Statements((0..count).map(|_| self.node(MAX_DEPTH)).collect())
    }
}

fn environments() -> Vec<IndexMap<String, Object>> {
    let entry = |name: &str, value: Object| (name.to_owned(), value);
    let map = |entries: &[(&str, i64)]| {
        Object::Map(
            entries
                .iter()
                .map(|(k, v)| ((*k).to_owned(), Object::Int(*v)))
                .collect(),
        )
    };

    vec![
        IndexMap::from_iter([
            entry("a", Object::Int(1)),
            entry("b", Object::Int(2)),
            entry("c", Object::Int(3)),
            entry("m", Object::Map(IndexMap::new())),
            entry("xs", Object::List(vec![])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Int(0)),
            entry("b", Object::Int(-5)),
            entry("c", Object::Int(100)),
            entry("m", map(&[("k1", 1)])),
            entry("xs", Object::List(vec![Object::Int(1), Object::Int(2), Object::Int(3)])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Float(2.5)),
            entry("b", Object::Int(1)),
            entry("c", Object::Int(0)),
            entry("m", map(&[("x", 1), ("y", 2)])),
            entry("xs", Object::List(vec![Object::from("s")])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Float(-0.25)),
            entry("b", Object::Float(4.0)),
            entry("c", Object::Int(7)),
            entry("m", map(&[("only", -1)])),
            entry("xs", Object::List(vec![Object::Float(0.5)])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Int(i64::from(i32::MAX))),
            entry("b", Object::Int(-1)),
            entry("c", Object::Int(2)),
            entry("m", Object::Map(IndexMap::new())),
            entry("xs", Object::List(vec![Object::from("p"), Object::from("q")])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Int(9)),
            entry("b", Object::Int(9)),
            entry("c", Object::Int(9)),
            entry("m", map(&[("z", 0)])),
            entry("xs", Object::List(vec![])),
        ]),
        IndexMap::from_iter([
            entry("a", Object::Float(1.5)),
            entry("b", Object::Float(-1.5)),
            entry("c", Object::Int(4)),
            entry("m", map(&[("m1", 5), ("m2", 6), ("m3", 7)])),
            entry("xs", Object::List(vec![Object::Int(0)])),
        ]),
    ]
}

fn render_all(ast: &Node, environments: &[IndexMap<String, Object>]) -> Vec<String> {
    let compiled = NativeBackend::<DataBindings>::new().lower(ast).unwrap();
    environments
        .iter()
        .map(|env| {
            let mut bindings = DataBindings::new(env.clone());
            compiled.render(&mut bindings).expect("generated templates never fail")
        })
        .collect()
}

/// Pass subsets to exercise: every prefix of the canonical pipeline plus a
/// couple of sparse combinations.
fn pipelines() -> Vec<Vec<&'static str>> {
    vec![
        vec![],
        vec!["fold"],
        vec!["fold", "literal"],
        vec!["fold", "literal", "coalesce"],
        vec!["literal"],
        vec!["coalesce"],
        vec!["literal", "coalesce"],
    ]
}

fn build_manager(names: &[&str]) -> PassManager {
    let mut manager = PassManager::new();
    for name in names {
        match *name {
            "fold" => manager.add_expression_pass(FoldConstantsPass),
            "literal" => manager.add_node_pass(LiteralPrintToRawPass),
            "coalesce" => manager.add_node_pass(CoalesceRawBlocksPass),
            other => panic!("unknown pass {other}"),
        }
    }
    manager
}

fn assert_well_formed(node: &Node) {
    match node {
        Node::Statements(children) => {
            assert_ne!(children.len(), 1, "single-child block survived");
            for child in children {
                assert!(!matches!(child, Node::Statements(_)), "nested block survived");
                assert_well_formed(child);
            }
        }
        Node::If {
            then_body, else_body, ..
        } => {
            assert_well_formed(then_body);
            if let Some(else_body) = else_body {
                assert_well_formed(else_body);
            }
        }
        Node::For { body, else_body, .. } => {
            assert_well_formed(body);
            if let Some(else_body) = else_body {
                assert_well_formed(else_body);
            }
        }
        Node::Raw(_) | Node::Print(_) | Node::Include { .. } => {}
    }
}

#[test]
fn pass_prefixes_preserve_the_rendered_output() {
    let environments = environments();
    for seed in 0..SAMPLES {
        let ast = Shapes::new(seed).template();
        let baseline = render_all(&ast, &environments);

        for pipeline in pipelines() {
            let rewritten = build_manager(&pipeline).run(ast.clone()).unwrap();
            if !pipeline.is_empty() {
                assert_well_formed(&rewritten);
            }
            let rendered = render_all(&rewritten, &environments);
            assert_eq!(rendered, baseline, "seed {seed}, pipeline {pipeline:?}");
        }
    }
}

#[test]
fn the_full_pipeline_is_idempotent_on_random_trees() {
    for seed in 0..SAMPLES {
        let ast = Shapes::new(seed).template();
        let once = build_manager(&["fold", "literal", "coalesce"]).run(ast).unwrap();
        let twice = build_manager(&["fold", "literal", "coalesce"]).run(once.clone()).unwrap();
        assert_eq!(once, twice, "seed {seed}");
    }
}

#[test]
fn cloned_expressions_are_independent_of_rewrites() {
    for seed in 0..20 {
        let mut shapes = Shapes::new(seed);
        let expr = shapes.numeric(MAX_DEPTH);
        let copy = expr.clone();

        let ast = build_manager(&["fold"])
            .run(Node::Statements(vec![Node::Print(expr.clone()), Node::Raw(String::new())]))
            .unwrap();

        // Whatever folding did to the tree, the clone is untouched.
        assert_eq!(copy, expr, "seed {seed}");
        drop(ast);
    }
}
