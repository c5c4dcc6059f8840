//! Deterministic textual dump of an AST, for debugging and golden tests.
//!
//! Statements print one tagged bracket per line with tab indentation,
//! wrapped in `[SOF]`/`[EOF]`; expressions print inline in curly-brace
//! form. Include variable mappings are emitted in sorted-by-key order so
//! dumps are reproducible regardless of hash iteration order.

use std::fmt::Write as _;

use crate::expressions::{Expression, Literal, Node, float_text};

/// Renders the dump of the tree rooted at `node`.
#[must_use]
pub fn dump(node: &Node) -> String {
    let mut printer = Printer {
        out: String::new(),
        indentation: 0,
    };
    printer.line("[SOF]");
    printer.indentation += 1;
    printer.node(node);
    printer.indentation -= 1;
    printer.line("[EOF]");
    printer.out
}

struct Printer {
    out: String,
    indentation: usize,
}

impl Printer {
    fn start_line(&mut self) {
        for _ in 0..self.indentation {
            self.out.push('\t');
        }
    }

    fn line(&mut self, text: &str) {
        self.start_line();
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Statements(children) => {
                self.line("[STATEMENTS]");
                self.indentation += 1;
                for child in children {
                    self.node(child);
                }
                self.indentation -= 1;
                self.line("[END_STATEMENTS]");
            }
            Node::Raw(text) => {
                self.start_line();
                self.out.push_str("[RAW] \"");
                let escaped = escape(text);
                self.out.push_str(&escaped);
                self.out.push_str("\"\n");
            }
            Node::Print(expr) => {
                self.start_line();
                self.out.push_str("[PRINT_BLOCK ");
                self.expression(expr);
                self.out.push_str("]\n");
            }
            Node::If {
                condition,
                then_body,
                else_body,
            } => {
                self.start_line();
                self.out.push_str("[IF_BLOCK ");
                self.expression(condition);
                self.out.push_str("]\n");

                self.indentation += 1;
                self.node(then_body);
                self.indentation -= 1;

                if let Some(else_body) = else_body {
                    self.line("[ELSE_BLOCK]");
                    self.indentation += 1;
                    self.node(else_body);
                    self.indentation -= 1;
                }
                self.line("[ENDIF_BLOCK]");
            }
            Node::For {
                key,
                value,
                iterable,
                body,
                else_body,
            } => {
                self.start_line();
                self.out.push_str("[FOR_BLOCK ");
                if let Some(key) = key {
                    let _ = write!(self.out, "keyVariable={{VARIABLE name=\"{key}\"}} ");
                }
                if let Some(value) = value {
                    let _ = write!(self.out, "valueVariable={{VARIABLE name=\"{value}\"}} ");
                }
                self.out.push_str("iterable=");
                self.expression(iterable);
                self.out.push_str("]\n");

                self.indentation += 1;
                self.node(body);
                self.indentation -= 1;

                if let Some(else_body) = else_body {
                    self.line("[ELSEFOR_BLOCK]");
                    self.indentation += 1;
                    self.node(else_body);
                    self.indentation -= 1;
                }
                self.line("[ENDFOR_BLOCK]");
            }
            Node::Include { name, scope, bindings } => {
                self.start_line();
                let _ = write!(self.out, "[INCLUDE_BLOCK includeName=\"{name}\"");
                if let Some(scope) = scope {
                    self.out.push_str(" scope=");
                    self.expression(scope);
                }
                if !bindings.is_empty() {
                    let mut sorted: Vec<_> = bindings.iter().collect();
                    sorted.sort_by_key(|(key, _)| key.as_str());

                    self.out.push_str(" variableMapping={");
                    for (i, (key, expr)) in sorted.into_iter().enumerate() {
                        if i > 0 {
                            self.out.push_str(", ");
                        }
                        let _ = write!(self.out, "\"{key}\" => ");
                        self.expression(expr);
                    }
                    self.out.push('}');
                }
                self.out.push_str("]\n");
            }
        }
    }

    fn expression(&mut self, expr: &Expression) {
        match expr {
            Expression::Variable(name) => {
                let _ = write!(self.out, "{{VARIABLE name=\"{name}\"}}");
            }
            Expression::GetAttribute { object, name } => {
                self.out.push_str("{GET_ATTRIBUTE variable=");
                self.expression(object);
                let _ = write!(self.out, " attributeName=\"{name}\"}}");
            }
            Expression::MethodCall { name, args } => {
                let _ = write!(self.out, "{{METHOD_CALL name=\"{name}\", args=[");
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expression(arg);
                }
                self.out.push_str("]}");
            }
            Expression::Literal(literal) => match literal {
                Literal::Int(v) => {
                    let _ = write!(self.out, "{{INT value={v}}}");
                }
                Literal::Float(v) => {
                    let _ = write!(self.out, "{{DOUBLE value={}}}", float_text(*v));
                }
                Literal::Bool(v) => {
                    let _ = write!(self.out, "{{BOOL value={v}}}");
                }
                Literal::Str(v) => {
                    let _ = write!(self.out, "{{STRING value=\"{}\"}}", escape(v));
                }
            },
            Expression::Binary { left, right, op } => {
                self.out.push_str("{BINOP left=");
                self.expression(left);
                self.out.push_str(" right=");
                self.expression(right);
                let _ = write!(self.out, " op='{}'}}", op.symbol());
            }
            Expression::Unary { operand, op } => {
                self.out.push_str("{UNOP expr=");
                self.expression(operand);
                let _ = write!(self.out, " op='{}'}}", op.symbol());
            }
            Expression::Comparison { left, right, op } => {
                self.out.push_str("{CMP left=");
                self.expression(left);
                self.out.push_str(" right=");
                self.expression(right);
                let _ = write!(self.out, " op=\"{}\"}}", op.symbol());
            }
        }
    }
}

/// Escapes control characters C-style, with `\xNN` for the ones that have
/// no mnemonic escape.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c > '\0' && c < ' ') || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
