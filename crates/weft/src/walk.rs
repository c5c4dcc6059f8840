//! Bottom-up rewriting walkers for the statement and expression trees.
//!
//! Both walkers follow the same discipline: the rewrite hook runs on a node
//! first, and if it hands back a node of a *different* kind the traversal
//! re-enters on the replacement (so a pass replacing `Print(literal)` with a
//! `Raw` sees the `Raw` visited like any parsed node). Otherwise the walker
//! descends into the children, replacing each child with whatever its own
//! walk produced.
//!
//! [`walk_node`] additionally keeps `Statements` blocks in normal form:
//! after descending, a child that is itself a `Statements` is spliced into
//! its parent in place, and a block left with exactly one child is replaced
//! by that child. Tree height therefore stays proportional to semantic
//! nesting, not to how the parser happened to group things.
//!
//! Hooks own the subtree they are handed and transfer ownership back through
//! their return value; a hook that fails simply drops it.
//!
//! Rewrites that splice in caller-supplied subtrees (the include-resolution
//! variable substitutions) do their own recursion instead of hooking
//! variables here: the freshly inserted expressions must not be rewritten
//! again, which is exactly what the re-entry rule would do to them.

use crate::{
    error::CompileError,
    expressions::{Expression, Node},
};

/// A statement-level rewrite hook.
pub trait NodeRewriter {
    /// Name used by pass tracing; concrete passes override it.
    fn name(&self) -> &'static str {
        "unnamed-pass"
    }

    /// Takes ownership of `node` and returns the (possibly replaced) node.
    fn rewrite(&mut self, node: Node) -> Result<Node, CompileError>;
}

/// An expression-level rewrite hook.
pub trait ExprRewriter {
    fn name(&self) -> &'static str {
        "unnamed-pass"
    }

    fn rewrite(&mut self, expr: Expression) -> Result<Expression, CompileError>;
}

/// Applies `rewriter` over the statement tree rooted at `node`.
pub fn walk_node<R>(rewriter: &mut R, node: Node) -> Result<Node, CompileError>
where
    R: NodeRewriter + ?Sized,
{
    let kind = node.kind();
    let node = rewriter.rewrite(node)?;
    if node.kind() != kind {
        return walk_node(rewriter, node);
    }

    match node {
        Node::Statements(children) => {
            let mut flattened = Vec::with_capacity(children.len());
            for child in children {
                match walk_node(rewriter, child)? {
                    // A block child merges into its parent in place.
                    Node::Statements(nested) => flattened.extend(nested),
                    other => flattened.push(other),
                }
            }
            if flattened.len() == 1 {
                Ok(flattened.pop().expect("length checked above"))
            } else {
                Ok(Node::Statements(flattened))
            }
        }
        Node::If {
            condition,
            then_body,
            else_body,
        } => Ok(Node::If {
            condition,
            then_body: Box::new(walk_node(rewriter, *then_body)?),
            else_body: walk_opt_body(rewriter, else_body)?,
        }),
        Node::For {
            key,
            value,
            iterable,
            body,
            else_body,
        } => Ok(Node::For {
            key,
            value,
            iterable,
            body: Box::new(walk_node(rewriter, *body)?),
            else_body: walk_opt_body(rewriter, else_body)?,
        }),
        leaf @ (Node::Raw(_) | Node::Print(_) | Node::Include { .. }) => Ok(leaf),
    }
}

fn walk_opt_body<R>(rewriter: &mut R, body: Option<Box<Node>>) -> Result<Option<Box<Node>>, CompileError>
where
    R: NodeRewriter + ?Sized,
{
    match body {
        Some(body) => Ok(Some(Box::new(walk_node(rewriter, *body)?))),
        None => Ok(None),
    }
}

/// Applies `rewriter` over the expression tree rooted at `expr`.
pub fn walk_expression<R>(rewriter: &mut R, expr: Expression) -> Result<Expression, CompileError>
where
    R: ExprRewriter + ?Sized,
{
    let kind = expr.kind();
    let expr = rewriter.rewrite(expr)?;
    if expr.kind() != kind {
        return walk_expression(rewriter, expr);
    }

    match expr {
        Expression::GetAttribute { object, name } => Ok(Expression::GetAttribute {
            object: Box::new(walk_expression(rewriter, *object)?),
            name,
        }),
        Expression::MethodCall { name, args } => Ok(Expression::MethodCall {
            name,
            args: args
                .into_iter()
                .map(|arg| walk_expression(rewriter, arg))
                .collect::<Result<_, _>>()?,
        }),
        Expression::Binary { left, right, op } => Ok(Expression::Binary {
            left: Box::new(walk_expression(rewriter, *left)?),
            right: Box::new(walk_expression(rewriter, *right)?),
            op,
        }),
        Expression::Unary { operand, op } => Ok(Expression::Unary {
            operand: Box::new(walk_expression(rewriter, *operand)?),
            op,
        }),
        Expression::Comparison { left, right, op } => Ok(Expression::Comparison {
            left: Box::new(walk_expression(rewriter, *left)?),
            right: Box::new(walk_expression(rewriter, *right)?),
            op,
        }),
        leaf @ (Expression::Variable(_) | Expression::Literal(_)) => Ok(leaf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expressions::Literal;

    struct Identity;

    impl NodeRewriter for Identity {
        fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
            Ok(node)
        }
    }

    fn raw(text: &str) -> Node {
        Node::Raw(text.to_owned())
    }

    #[test]
    fn nested_statements_are_spliced() {
        let tree = Node::Statements(vec![
            raw("a"),
            Node::Statements(vec![raw("b"), raw("c")]),
            raw("d"),
        ]);
        let walked = walk_node(&mut Identity, tree).unwrap();
        assert_eq!(walked, Node::Statements(vec![raw("a"), raw("b"), raw("c"), raw("d")]));
    }

    #[test]
    fn single_child_block_folds_to_the_child() {
        let tree = Node::Statements(vec![Node::Statements(vec![raw("only")])]);
        assert_eq!(walk_node(&mut Identity, tree).unwrap(), raw("only"));
    }

    #[test]
    fn empty_child_block_disappears() {
        let tree = Node::Statements(vec![raw("a"), Node::Statements(vec![]), raw("b")]);
        let walked = walk_node(&mut Identity, tree).unwrap();
        assert_eq!(walked, Node::Statements(vec![raw("a"), raw("b")]));
    }

    /// Replaces every `Print` of an integer with a `Raw` marker; the
    /// replacement must be handed back to the hook.
    struct PrintToMarker {
        markers_seen: usize,
    }

    impl NodeRewriter for PrintToMarker {
        fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
            match node {
                Node::Print(Expression::Literal(Literal::Int(_))) => Ok(raw("marker")),
                Node::Raw(text) if text == "marker" => {
                    self.markers_seen += 1;
                    Ok(Node::Raw(text))
                }
                other => Ok(other),
            }
        }
    }

    #[test]
    fn replacement_of_a_different_kind_is_revisited() {
        let tree = Node::Statements(vec![
            Node::Print(Expression::Literal(Literal::Int(1))),
            raw("x"),
        ]);
        let mut pass = PrintToMarker { markers_seen: 0 };
        let walked = walk_node(&mut pass, tree).unwrap();
        assert_eq!(walked, Node::Statements(vec![raw("marker"), raw("x")]));
        assert_eq!(pass.markers_seen, 1);
    }

    #[test]
    fn failing_hook_propagates() {
        struct Fail;
        impl NodeRewriter for Fail {
            fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
                match node {
                    Node::Raw(_) => Err(CompileError::unsupported("no raw allowed")),
                    other => Ok(other),
                }
            }
        }
        let tree = Node::Statements(vec![raw("boom")]);
        assert!(walk_node(&mut Fail, tree).is_err());
    }
}
