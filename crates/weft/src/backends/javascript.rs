//! Source-to-source backend: emits a self-contained JavaScript renderer.
//!
//! The emitted artifact is a single anonymous function
//!
//! ```text
//! function(helpers, data) {
//!     data = data || {};
//!     var buffer = '';
//!     ...
//!     return buffer;
//! }
//! ```
//!
//! Variable reads become `data['name']` lookups and helper calls become
//! `helpers['name'](...)`; for-loop binders shadow those lookups through a
//! compile-time map onto the generated loop variables. Loops iterate with
//! `for (var key in iterable)` guarded by `hasOwnProperty`, tracking an
//! `is_empty_N` flag when an else arm exists.
//!
//! This backend cannot lower `Include` nodes: the include-resolution pass
//! must run before it.

use ahash::AHashMap;

use crate::{
    backends::{Backend, CodeEmitter},
    error::CompileError,
    expressions::{CmpOp, Expression, Literal, Node, float_text},
};

/// Operator precedence levels used to parenthesize emitted expressions.
mod prec {
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
    pub const EQUALITY: u8 = 3;
    pub const RELATIONAL: u8 = 4;
    pub const ADDITIVE: u8 = 5;
    pub const MULTIPLICATIVE: u8 = 6;
    pub const UNARY: u8 = 7;
    pub const POSTFIX: u8 = 8;
    pub const PRIMARY: u8 = 9;
}

#[derive(Debug, Default)]
pub struct JavascriptBackend {
    undefined_check: bool,
}

impl JavascriptBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When enabled, interpolations substitute an empty string for
    /// undefined lookup results (`buffer += expr || '';`).
    #[must_use]
    pub fn with_undefined_check(mut self, undefined_check: bool) -> Self {
        self.undefined_check = undefined_check;
        self
    }
}

impl Backend for JavascriptBackend {
    type Output = String;

    fn lower(&mut self, ast: &Node) -> Result<String, CompileError> {
        let mut emitter = JsEmitter {
            undefined_check: self.undefined_check,
            for_counter: 0,
            shadows: AHashMap::new(),
        };
        let mut em = CodeEmitter::new();

        em.line("function(helpers, data) {")
            .indent()
            .line("data = data || {};")
            .line("var buffer = '';")
            .blank_line();

        emitter.node(ast, &mut em)?;

        em.blank_line().line("return buffer;").outdent().line("}");
        Ok(em.finish())
    }
}

struct JsEmitter {
    undefined_check: bool,
    for_counter: usize,
    /// Maps template variable names to the generated loop variables that
    /// currently shadow them.
    shadows: AHashMap<String, String>,
}

impl JsEmitter {
    fn node(&mut self, node: &Node, em: &mut CodeEmitter) -> Result<(), CompileError> {
        match node {
            Node::Statements(children) => {
                for child in children {
                    self.node(child, em)?;
                }
                Ok(())
            }
            Node::Raw(text) => {
                em.start_line().push("buffer += '").push(&escape(text)).push("';").end_line();
                Ok(())
            }
            Node::Print(expr) => {
                em.start_line().push("buffer += ");
                self.expression(expr, prec::OR, em);
                if self.undefined_check {
                    em.push(" || ''");
                }
                em.push(";").end_line();
                Ok(())
            }
            Node::If { .. } => self.if_block(node, false, em),
            Node::For { .. } => self.for_block(node, em),
            Node::Include { .. } => Err(CompileError::unsupported(
                "the JavaScript backend cannot lower include blocks; run the include-resolution pass first",
            )),
        }
    }

    fn if_block(&mut self, node: &Node, is_elseif: bool, em: &mut CodeEmitter) -> Result<(), CompileError> {
        let Node::If {
            condition,
            then_body,
            else_body,
        } = node
        else {
            unreachable!("if_block is only called on if nodes");
        };

        if !is_elseif {
            em.blank_line();
        }
        em.start_line();
        if is_elseif {
            em.push("} else ");
        }
        em.push("if (");
        self.expression(condition, prec::OR, em);
        em.push(") {").end_line();

        em.indent();
        self.node(then_body, em)?;
        em.outdent();

        match else_body.as_deref() {
            Some(else_if @ Node::If { .. }) => self.if_block(else_if, true, em)?,
            Some(else_body) => {
                em.line("} else {");
                em.indent();
                self.node(else_body, em)?;
                em.outdent();
                em.line("}").blank_line();
            }
            None => {
                em.line("}").blank_line();
            }
        }
        Ok(())
    }

    fn for_block(&mut self, node: &Node, em: &mut CodeEmitter) -> Result<(), CompileError> {
        let Node::For {
            key,
            value,
            iterable,
            body,
            else_body,
        } = node
        else {
            unreachable!("for_block is only called on for nodes");
        };

        self.for_counter += 1;
        let n = self.for_counter;
        let iterable_id = format!("iterable_{n}");
        let is_empty_id = format!("is_empty_{n}");
        let key_id = format!("key_{n}");
        let value_id = format!("value_{n}");

        em.blank_line();
        em.start_line().push("var ").push(&iterable_id).push(" = ");
        self.expression(iterable, prec::OR, em);
        em.push(";").end_line();

        if else_body.is_some() {
            em.start_line().push("var ").push(&is_empty_id).push(" = true;").end_line();
        }

        em.start_line()
            .push("for (var ")
            .push(&key_id)
            .push(" in ")
            .push(&iterable_id)
            .push(") {")
            .end_line();
        em.indent();

        em.start_line()
            .push("if (!")
            .push(&iterable_id)
            .push(".hasOwnProperty(")
            .push(&key_id)
            .push(")) continue;")
            .end_line();

        if value.is_some() {
            em.start_line()
                .push("var ")
                .push(&value_id)
                .push(" = ")
                .push(&iterable_id)
                .push("[")
                .push(&key_id)
                .push("];")
                .end_line();
        }
        em.blank_line();

        // Shadow the binder names for the duration of the body.
        let saved_key = key
            .as_ref()
            .map(|name| (name.clone(), self.shadows.insert(name.clone(), key_id)));
        let saved_value = value
            .as_ref()
            .map(|name| (name.clone(), self.shadows.insert(name.clone(), value_id)));

        self.node(body, em)?;

        for saved in [saved_key, saved_value].into_iter().flatten() {
            match saved {
                (name, Some(previous)) => {
                    self.shadows.insert(name, previous);
                }
                (name, None) => {
                    self.shadows.remove(&name);
                }
            }
        }

        if else_body.is_some() {
            em.start_line().push(&is_empty_id).push(" = false;").end_line();
        }
        em.outdent();
        em.line("}").blank_line();

        if let Some(else_body) = else_body {
            em.start_line().push("if (").push(&is_empty_id).push(") {").end_line();
            em.indent();
            self.node(else_body, em)?;
            em.outdent();
            em.line("}").blank_line();
        }
        Ok(())
    }

    /// Writes `expr`, parenthesized whenever its precedence is looser than
    /// the context requires.
    fn expression(&mut self, expr: &Expression, min_prec: u8, em: &mut CodeEmitter) {
        let own = precedence(expr);
        if own < min_prec {
            em.push("(");
            self.expression(expr, prec::OR, em);
            em.push(")");
            return;
        }

        match expr {
            Expression::Variable(name) => match self.shadows.get(name) {
                Some(shadow) => {
                    em.push(shadow);
                }
                None => {
                    em.push("data['").push(&escape(name)).push("']");
                }
            },
            Expression::GetAttribute { object, name } => {
                self.expression(object, prec::POSTFIX, em);
                em.push("['").push(&escape(name)).push("']");
            }
            Expression::MethodCall { name, args } => {
                em.push("helpers['").push(&escape(name)).push("'](");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        em.push(", ");
                    }
                    self.expression(arg, prec::OR, em);
                }
                em.push(")");
            }
            Expression::Literal(literal) => {
                let text = match literal {
                    Literal::Int(v) => v.to_string(),
                    Literal::Float(v) => float_text(*v),
                    Literal::Bool(v) => v.to_string(),
                    Literal::Str(v) => format!("'{}'", escape(v)),
                };
                em.push(&text);
            }
            Expression::Binary { left, right, op } => {
                self.expression(left, own, em);
                em.push(&format!(" {} ", op.symbol()));
                self.expression(right, own + 1, em);
            }
            Expression::Unary { operand, op } => {
                em.push(&op.symbol().to_string());
                self.expression(operand, prec::POSTFIX, em);
            }
            Expression::Comparison { left, right, op } => {
                self.expression(left, own, em);
                em.push(&format!(" {} ", op.symbol()));
                self.expression(right, own + 1, em);
            }
        }
    }
}

fn precedence(expr: &Expression) -> u8 {
    match expr {
        Expression::Comparison { op, .. } => match op {
            CmpOp::Or => prec::OR,
            CmpOp::And => prec::AND,
            CmpOp::Eq | CmpOp::Ne => prec::EQUALITY,
            CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => prec::RELATIONAL,
        },
        Expression::Binary { op, .. } => match op {
            crate::expressions::BinaryOp::Add | crate::expressions::BinaryOp::Sub => prec::ADDITIVE,
            _ => prec::MULTIPLICATIVE,
        },
        Expression::Unary { .. } => prec::UNARY,
        Expression::GetAttribute { .. } | Expression::MethodCall { .. } => prec::POSTFIX,
        Expression::Variable(_) | Expression::Literal(_) => prec::PRIMARY,
    }
}

/// Escapes text for a single-quoted JavaScript string literal.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // IE < 9 treats "\v" as "v", so use "\x0B" instead.
            '\x0b' => out.push_str("\\x0B"),
            c if (c > '\0' && c < ' ') || c == '\x7f' => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
