//! Recursively embeds included templates.
//!
//! Every `Include` node is replaced by the referenced template's AST:
//! the file is resolved against the configured base path (absolute names
//! bypass it), parsed with the regular parser, recursively include-resolved
//! so nested includes disappear depth-first, and finally rewritten so the
//! embedded tree reads its data from the including template:
//!
//! - with a scope expression, every free `Variable(n)` becomes
//!   `GetAttribute(scope, n)`, deep-cloning the scope at each use site;
//! - otherwise every free `Variable(n)` is replaced by the clone of the
//!   mapped expression, and an unmapped variable aborts compilation.
//!
//! The variable substitutions recurse manually instead of going through the
//! generic expression walker: the substituted expressions come from the
//! including template and must not themselves be rewritten.
//!
//! A template currently being included keeps its canonical path in a
//! visited set; re-entering one of those paths is a cyclic include and
//! fails instead of recursing forever.

use std::path::{Path, PathBuf};

use ahash::AHashSet;

use crate::{
    error::CompileError,
    expressions::{Expression, Node, VariableMapping},
    parse,
    walk::{NodeRewriter, walk_node},
};

pub struct ResolveIncludesPass {
    base_path: PathBuf,
    /// Canonical paths currently on the inclusion stack.
    active: AHashSet<PathBuf>,
}

impl ResolveIncludesPass {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            active: AHashSet::new(),
        }
    }

    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn resolve(
        &mut self,
        name: &str,
        scope: Option<Expression>,
        bindings: &VariableMapping,
    ) -> Result<Node, CompileError> {
        let path = self.resolve_path(name);
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !self.active.insert(canonical.clone()) {
            return Err(CompileError::cyclic_include(path));
        }
        let resolved = self.resolve_guarded(&path, scope, bindings);
        self.active.remove(&canonical);
        resolved
    }

    fn resolve_guarded(
        &mut self,
        path: &Path,
        scope: Option<Expression>,
        bindings: &VariableMapping,
    ) -> Result<Node, CompileError> {
        let included = parse::parse_file(path)?;
        // The included template may contain include blocks itself.
        let included = walk_node(self, included)?;

        match scope {
            Some(scope) => rewrite_expressions(included, &mut |expr| Ok(prepend_scope(expr, &scope))),
            None => {
                let include_name = path.display().to_string();
                rewrite_expressions(included, &mut |expr| substitute_variables(expr, bindings, &include_name))
            }
        }
    }
}

impl NodeRewriter for ResolveIncludesPass {
    fn name(&self) -> &'static str {
        "resolve-includes-pass"
    }

    fn rewrite(&mut self, node: Node) -> Result<Node, CompileError> {
        match node {
            Node::Include { name, scope, bindings } => self.resolve(&name, scope, &bindings),
            other => Ok(other),
        }
    }
}

/// Applies `rewrite` to every expression slot of the statement tree.
fn rewrite_expressions(
    node: Node,
    rewrite: &mut dyn FnMut(Expression) -> Result<Expression, CompileError>,
) -> Result<Node, CompileError> {
    Ok(match node {
        Node::Statements(children) => Node::Statements(
            children
                .into_iter()
                .map(|child| rewrite_expressions(child, &mut *rewrite))
                .collect::<Result<_, _>>()?,
        ),
        Node::Print(expr) => Node::Print(rewrite(expr)?),
        Node::If {
            condition,
            then_body,
            else_body,
        } => Node::If {
            condition: rewrite(condition)?,
            then_body: Box::new(rewrite_expressions(*then_body, rewrite)?),
            else_body: match else_body {
                Some(body) => Some(Box::new(rewrite_expressions(*body, rewrite)?)),
                None => None,
            },
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
            iterable: rewrite(iterable)?,
            body: Box::new(rewrite_expressions(*body, rewrite)?),
            else_body: match else_body {
                Some(body) => Some(Box::new(rewrite_expressions(*body, rewrite)?)),
                None => None,
            },
        },
        Node::Include { name, scope, bindings } => Node::Include {
            name,
            scope: match scope {
                Some(scope) => Some(rewrite(scope)?),
                None => None,
            },
            bindings: bindings
                .into_iter()
                .map(|(key, expr)| Ok((key, rewrite(expr)?)))
                .collect::<Result<_, CompileError>>()?,
        },
        raw @ Node::Raw(_) => raw,
    })
}

/// Rewrites every variable read into an attribute read on `scope`.
///
/// The scope expression is deep-cloned at each use site; subtrees are never
/// shared.
fn prepend_scope(expr: Expression, scope: &Expression) -> Expression {
    match expr {
        Expression::Variable(name) => Expression::GetAttribute {
            object: Box::new(scope.clone()),
            name,
        },
        Expression::GetAttribute { object, name } => Expression::GetAttribute {
            object: Box::new(prepend_scope(*object, scope)),
            name,
        },
        Expression::MethodCall { name, args } => Expression::MethodCall {
            name,
            args: args.into_iter().map(|arg| prepend_scope(arg, scope)).collect(),
        },
        Expression::Binary { left, right, op } => Expression::Binary {
            left: Box::new(prepend_scope(*left, scope)),
            right: Box::new(prepend_scope(*right, scope)),
            op,
        },
        Expression::Unary { operand, op } => Expression::Unary {
            operand: Box::new(prepend_scope(*operand, scope)),
            op,
        },
        Expression::Comparison { left, right, op } => Expression::Comparison {
            left: Box::new(prepend_scope(*left, scope)),
            right: Box::new(prepend_scope(*right, scope)),
            op,
        },
        literal @ Expression::Literal(_) => literal,
    }
}

/// Replaces every variable read by the clone of its mapped expression.
fn substitute_variables(
    expr: Expression,
    bindings: &VariableMapping,
    include_name: &str,
) -> Result<Expression, CompileError> {
    Ok(match expr {
        Expression::Variable(name) => match bindings.get(&name) {
            Some(replacement) => replacement.clone(),
            None => return Err(CompileError::missing_variable(name, include_name)),
        },
        Expression::GetAttribute { object, name } => Expression::GetAttribute {
            object: Box::new(substitute_variables(*object, bindings, include_name)?),
            name,
        },
        Expression::MethodCall { name, args } => Expression::MethodCall {
            name,
            args: args
                .into_iter()
                .map(|arg| substitute_variables(arg, bindings, include_name))
                .collect::<Result<_, _>>()?,
        },
        Expression::Binary { left, right, op } => Expression::Binary {
            left: Box::new(substitute_variables(*left, bindings, include_name)?),
            right: Box::new(substitute_variables(*right, bindings, include_name)?),
            op,
        },
        Expression::Unary { operand, op } => Expression::Unary {
            operand: Box::new(substitute_variables(*operand, bindings, include_name)?),
            op,
        },
        Expression::Comparison { left, right, op } => Expression::Comparison {
            left: Box::new(substitute_variables(*left, bindings, include_name)?),
            right: Box::new(substitute_variables(*right, bindings, include_name)?),
            op,
        },
        literal @ Expression::Literal(_) => literal,
    })
}
