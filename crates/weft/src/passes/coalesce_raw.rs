//! Merges adjacent raw blocks.
//!
//! Within every `Statements` sequence, maximal contiguous runs of `Raw`
//! children collapse into a single `Raw` holding the concatenated text, in
//! order. Non-raw siblings keep their exact positions.

use crate::{error::CompileError, expressions::Node, walk::NodeRewriter};

#[derive(Debug, Default)]
pub struct CoalesceRawBlocksPass;

impl NodeRewriter for CoalesceRawBlocksPass {
    fn name(&self) -> &'static str {
        "raw-block-coalescing-pass"
    }

    fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
        match node {
            Node::Statements(children) => {
                let mut merged: Vec<Node> = Vec::with_capacity(children.len());
                for child in children {
                    match (merged.last_mut(), child) {
                        (Some(Node::Raw(text)), Node::Raw(next)) => text.push_str(&next),
                        (_, child) => merged.push(child),
                    }
                }
                Ok(Node::Statements(merged))
            }
            other => Ok(other),
        }
    }
}
