//! Promotes interpolations of literals to inert raw text.
//!
//! `Print(literal)` becomes `Raw(text)` using the literal's canonical
//! textual form, so the raw-coalescing pass can then merge it with adjacent
//! text. Runs after constant folding, which is what produces most of the
//! literal interpolations in the first place.

use crate::{
    error::CompileError,
    expressions::{Expression, Node},
    walk::NodeRewriter,
};

#[derive(Debug, Default)]
pub struct LiteralPrintToRawPass;

impl NodeRewriter for LiteralPrintToRawPass {
    fn name(&self) -> &'static str {
        "literal-print-to-raw-conversion-pass"
    }

    fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
        match node {
            Node::Print(Expression::Literal(literal)) => Ok(Node::Raw(literal.canonical_text())),
            other => Ok(other),
        }
    }
}
