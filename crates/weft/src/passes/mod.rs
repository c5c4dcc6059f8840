//! The rewrite pass pipeline.
//!
//! A [`PassManager`] holds an ordered list of passes, each either a
//! statement-level [`NodeRewriter`] or an expression-level [`ExprRewriter`].
//! Expression passes are wrapped into a statement-level pass that applies
//! the rewriter at every slot in the statement tree that carries an
//! expression: `Print`, `If` conditions, `For` iterables, include scopes and
//! include variable mappings.
//!
//! `run` takes ownership of the AST, executes the passes in registration
//! order and returns the rewritten tree. Exactly one live AST exists between
//! passes; if a pass fails, the in-flight tree is dropped and the error
//! propagates.

mod coalesce_raw;
mod fold_constants;
mod literal_print;
mod resolve_includes;

pub use coalesce_raw::CoalesceRawBlocksPass;
pub use fold_constants::FoldConstantsPass;
pub use literal_print::LiteralPrintToRawPass;
pub use resolve_includes::ResolveIncludesPass;

use crate::{
    error::CompileError,
    expressions::Node,
    tracer::{NoopTracer, PassTracer},
    walk::{ExprRewriter, NodeRewriter, walk_expression, walk_node},
};

/// The passes a driver can toggle, in their canonical pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum PassKind {
    #[strum(serialize = "resolve-includes-pass")]
    ResolveIncludes,
    #[strum(serialize = "constant-folding-pass")]
    ConstantFolding,
    #[strum(serialize = "literal-print-to-raw-conversion-pass")]
    LiteralPrintToRaw,
    #[strum(serialize = "raw-block-coalescing-pass")]
    RawBlockCoalescing,
}

impl PassKind {
    /// All passes in canonical pipeline order.
    pub const ALL: [Self; 4] = [
        Self::ResolveIncludes,
        Self::ConstantFolding,
        Self::LiteralPrintToRaw,
        Self::RawBlockCoalescing,
    ];
}

enum Pass {
    Node(Box<dyn NodeRewriter>),
    Expression(Box<dyn ExprRewriter>),
}

impl Pass {
    fn name(&self) -> &'static str {
        match self {
            Self::Node(pass) => pass.name(),
            Self::Expression(pass) => pass.name(),
        }
    }
}

/// Applies a wrapped expression rewriter to every expression slot of the
/// statement tree.
struct ExpressionPassAdapter<'a> {
    inner: &'a mut dyn ExprRewriter,
}

impl NodeRewriter for ExpressionPassAdapter<'_> {
    fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
        Ok(match node {
            Node::Print(expr) => Node::Print(walk_expression(&mut *self.inner, expr)?),
            Node::If {
                condition,
                then_body,
                else_body,
            } => Node::If {
                condition: walk_expression(&mut *self.inner, condition)?,
                then_body,
                else_body,
            },
            Node::For {
                key,
                value,
                iterable,
                body,
                else_body,
            } => Node::For {
                key,
                value,
                iterable: walk_expression(&mut *self.inner, iterable)?,
                body,
                else_body,
            },
            Node::Include { name, scope, bindings } => Node::Include {
                name,
                scope: match scope {
                    Some(scope) => Some(walk_expression(&mut *self.inner, scope)?),
                    None => None,
                },
                bindings: bindings
                    .into_iter()
                    .map(|(key, expr)| Ok((key, walk_expression(&mut *self.inner, expr)?)))
                    .collect::<Result<_, CompileError>>()?,
            },
            other @ (Node::Statements(_) | Node::Raw(_)) => other,
        })
    }
}

/// An ordered pipeline of rewrite passes with ownership handoff.
#[derive(Default)]
pub struct PassManager {
    passes: Vec<Pass>,
}

impl PassManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node_pass(&mut self, pass: impl NodeRewriter + 'static) {
        self.passes.push(Pass::Node(Box::new(pass)));
    }

    pub fn add_expression_pass(&mut self, pass: impl ExprRewriter + 'static) {
        self.passes.push(Pass::Expression(Box::new(pass)));
    }

    pub fn remove_all_passes(&mut self) {
        self.passes.clear();
    }

    /// Runs the registered passes over `ast` in registration order.
    ///
    /// Takes ownership of the AST and returns the rewritten (possibly
    /// entirely different) tree.
    ///
    /// # Errors
    /// Propagates the first pass failure; the in-flight AST is dropped.
    pub fn run(&mut self, ast: Node) -> Result<Node, CompileError> {
        self.run_traced(ast, &mut NoopTracer)
    }

    /// Like [`run`](Self::run), reporting pass boundaries to `tracer`.
    pub fn run_traced(&mut self, mut ast: Node, tracer: &mut impl PassTracer) -> Result<Node, CompileError> {
        for pass in &mut self.passes {
            tracer.pass_start(pass.name());
            ast = match pass {
                Pass::Node(pass) => walk_node(&mut **pass, ast)?,
                Pass::Expression(pass) => {
                    let mut adapter = ExpressionPassAdapter { inner: &mut **pass };
                    walk_node(&mut adapter, ast)?
                }
            };
            tracer.pass_end(pass.name());
        }
        Ok(ast)
    }
}
