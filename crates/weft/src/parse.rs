//! Template lexer and recursive-descent parser.
//!
//! The surface syntax is a streaming mix of raw text and control tags:
//! `{{ expr }}` interpolation, `{% if %}`/`{% elif %}`/`{% else %}`/
//! `{% endif %}` conditionals, `{% for k, v in expr %}` loops with an
//! optional `{% else %}` arm, and `{% include "name" %}` with an optional
//! `with expr` scope or `with { name: expr, ... }` variable mapping.
//!
//! Parse state (position, line number, nesting depth) lives in the parser
//! value itself and errors are returned through [`CompileError::Syntax`],
//! so independent compilations can parse concurrently.

use std::{fs, path::Path};

use crate::{
    error::CompileError,
    expressions::{BinaryOp, CmpOp, Expression, Literal, Node, UnaryOp, VariableMapping},
};

/// Maximum nesting depth for blocks and parenthesized expressions.
///
/// Prevents stack overflow on pathological inputs like a kilobyte of `(`.
const MAX_NESTING_DEPTH: u16 = 200;

/// Parses template source into an AST rooted at a `Statements` block.
pub fn parse_str(source: &str) -> Result<Node, CompileError> {
    let mut parser = Parser::new(source);
    let (nodes, end) = parser.parse_nodes()?;
    match end {
        BlockEnd::Eof => Ok(Node::Statements(nodes)),
        BlockEnd::Elif { .. } => Err(parser.err_here("'{% elif %}' outside of an if block")),
        BlockEnd::Else => Err(parser.err_here("'{% else %}' outside of a block")),
        BlockEnd::Endif => Err(parser.err_here("'{% endif %}' without matching '{% if %}'")),
        BlockEnd::Endfor => Err(parser.err_here("'{% endfor %}' without matching '{% for %}'")),
    }
}

/// Reads and parses a template file.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Node, CompileError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    parse_str(&source)
}

/// How a statement sequence ended: either end of input or a terminator tag
/// belonging to the enclosing block.
enum BlockEnd {
    Eof,
    Elif { condition: Expression },
    Else,
    Endif,
    Endfor,
}

struct Parser<'src> {
    src: &'src str,
    pos: usize,
    line: u32,
    depth: u16,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            depth: 0,
        }
    }

    fn rest(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Advances by `n` bytes, keeping the line counter in sync.
    fn advance(&mut self, n: usize) {
        let consumed = &self.src[self.pos..self.pos + n];
        self.line += u32::try_from(consumed.matches('\n').count()).unwrap_or(u32::MAX);
        self.pos += n;
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.advance(c.len_utf8());
        Some(c)
    }

    fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.advance(s.len());
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn err_here(&self, message: impl Into<std::borrow::Cow<'static, str>>) -> CompileError {
        CompileError::syntax(message, self.line)
    }

    fn enter(&mut self) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.err_here("template nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parses statements until end of input or a terminator tag.
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, BlockEnd), CompileError> {
        let mut nodes = Vec::new();
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Ok((nodes, BlockEnd::Eof));
            }

            let next_tag = match (rest.find("{{"), rest.find("{%")) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (tag, None) | (None, tag) => tag,
            };
            let Some(tag_at) = next_tag else {
                nodes.push(Node::Raw(rest.to_owned()));
                self.advance(rest.len());
                return Ok((nodes, BlockEnd::Eof));
            };

            if tag_at > 0 {
                nodes.push(Node::Raw(rest[..tag_at].to_owned()));
                self.advance(tag_at);
            }

            if self.eat_str("{{") {
                let expr = self.parse_expression()?;
                self.skip_ws();
                if !self.eat_str("}}") {
                    return Err(self.err_here("expected '}}' to close interpolation"));
                }
                nodes.push(Node::Print(expr));
                continue;
            }

            debug_assert!(self.rest().starts_with("{%"));
            self.advance(2);
            self.skip_ws();
            let keyword = self.parse_ident()?;
            match keyword.as_str() {
                "if" => {
                    let condition = self.parse_expression()?;
                    self.expect_tag_end()?;
                    self.enter()?;
                    let node = self.parse_if_chain(condition)?;
                    self.leave();
                    nodes.push(node);
                }
                "elif" => {
                    let condition = self.parse_expression()?;
                    self.expect_tag_end()?;
                    return Ok((nodes, BlockEnd::Elif { condition }));
                }
                "else" => {
                    self.expect_tag_end()?;
                    return Ok((nodes, BlockEnd::Else));
                }
                "endif" => {
                    self.expect_tag_end()?;
                    return Ok((nodes, BlockEnd::Endif));
                }
                "for" => {
                    self.enter()?;
                    let node = self.parse_for()?;
                    self.leave();
                    nodes.push(node);
                }
                "endfor" => {
                    self.expect_tag_end()?;
                    return Ok((nodes, BlockEnd::Endfor));
                }
                "include" => nodes.push(self.parse_include()?),
                other => {
                    return Err(CompileError::syntax(format!("unknown block tag '{other}'"), self.line));
                }
            }
        }
    }

    /// Parses the body of an `if` whose condition has been consumed,
    /// folding `elif` arms into nested `If` nodes in the else slot.
    fn parse_if_chain(&mut self, condition: Expression) -> Result<Node, CompileError> {
        let (then_nodes, end) = self.parse_nodes()?;
        let then_body = Box::new(Node::Statements(then_nodes));
        let else_body = match end {
            BlockEnd::Elif { condition } => Some(Box::new(self.parse_if_chain(condition)?)),
            BlockEnd::Else => {
                let (else_nodes, end) = self.parse_nodes()?;
                match end {
                    BlockEnd::Endif => Some(Box::new(Node::Statements(else_nodes))),
                    _ => return Err(self.err_here("expected '{% endif %}'")),
                }
            }
            BlockEnd::Endif => None,
            BlockEnd::Eof => return Err(self.err_here("'{% if %}' without matching '{% endif %}'")),
            BlockEnd::Endfor => return Err(self.err_here("unexpected '{% endfor %}' inside if block")),
        };
        Ok(Node::If {
            condition,
            then_body,
            else_body,
        })
    }

    /// Parses a `for` tag after the keyword: binders, `in`, iterable, body
    /// and optional else arm.
    ///
    /// A single binder name binds the value variable; `k, v` binds key and
    /// value. Binders are plain identifiers, never expressions.
    fn parse_for(&mut self) -> Result<Node, CompileError> {
        self.skip_ws();
        let first = self.parse_ident()?;
        self.skip_ws();
        let (key, value) = if self.eat_str(",") {
            self.skip_ws();
            let second = self.parse_ident()?;
            (Some(first), Some(second))
        } else {
            (None, Some(first))
        };
        self.skip_ws();
        if self.parse_ident()? != "in" {
            return Err(self.err_here("expected 'in' in for block"));
        }
        let iterable = self.parse_expression()?;
        self.expect_tag_end()?;

        let (body_nodes, end) = self.parse_nodes()?;
        let body = Box::new(Node::Statements(body_nodes));
        let else_body = match end {
            BlockEnd::Else => {
                let (else_nodes, end) = self.parse_nodes()?;
                match end {
                    BlockEnd::Endfor => Some(Box::new(Node::Statements(else_nodes))),
                    _ => return Err(self.err_here("expected '{% endfor %}'")),
                }
            }
            BlockEnd::Endfor => None,
            BlockEnd::Eof => return Err(self.err_here("'{% for %}' without matching '{% endfor %}'")),
            BlockEnd::Elif { .. } => return Err(self.err_here("unexpected '{% elif %}' inside for block")),
            BlockEnd::Endif => return Err(self.err_here("unexpected '{% endif %}' inside for block")),
        };
        Ok(Node::For {
            key,
            value,
            iterable,
            body,
            else_body,
        })
    }

    /// Parses an `include` tag after the keyword.
    fn parse_include(&mut self) -> Result<Node, CompileError> {
        self.skip_ws();
        let name = match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_string_literal(quote)?,
            _ => return Err(self.err_here("expected quoted template name after 'include'")),
        };

        let mut scope = None;
        let mut bindings = VariableMapping::default();
        self.skip_ws();
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            if self.parse_ident()? != "with" {
                return Err(self.err_here("expected 'with' or '%}' after include name"));
            }
            self.skip_ws();
            if self.eat_str("{") {
                loop {
                    self.skip_ws();
                    if self.eat_str("}") {
                        break;
                    }
                    let key = self.parse_ident()?;
                    self.skip_ws();
                    if !self.eat_str(":") {
                        return Err(self.err_here("expected ':' in include variable mapping"));
                    }
                    let expr = self.parse_expression()?;
                    bindings.insert(key, expr);
                    self.skip_ws();
                    if self.eat_str(",") {
                        continue;
                    }
                    if self.eat_str("}") {
                        break;
                    }
                    return Err(self.err_here("expected ',' or '}' in include variable mapping"));
                }
            } else {
                scope = Some(self.parse_expression()?);
            }
        }
        self.expect_tag_end()?;
        Ok(Node::Include { name, scope, bindings })
    }

    fn expect_tag_end(&mut self) -> Result<(), CompileError> {
        self.skip_ws();
        if self.eat_str("%}") {
            Ok(())
        } else {
            Err(self.err_here("expected '%}' to close block tag"))
        }
    }

    // --- expressions -----------------------------------------------------
    //
    // Precedence, loosest first: || < && < == != < relational < + - <
    // * / % < unary < postfix attribute access < primary.

    fn parse_expression(&mut self) -> Result<Expression, CompileError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_ws();
            if self.eat_str("||") {
                let right = self.parse_and()?;
                left = comparison(left, right, CmpOp::Or);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_equality()?;
        loop {
            self.skip_ws();
            if self.eat_str("&&") {
                let right = self.parse_equality()?;
                left = comparison(left, right, CmpOp::And);
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_equality(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_relational()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("==") {
                CmpOp::Eq
            } else if self.eat_str("!=") {
                CmpOp::Ne
            } else {
                return Ok(left);
            };
            let right = self.parse_relational()?;
            left = comparison(left, right, op);
        }
    }

    fn parse_relational(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_additive()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("<=") {
                CmpOp::Le
            } else if self.eat_str(">=") {
                CmpOp::Ge
            } else if self.eat_str("<") {
                CmpOp::Lt
            } else if self.eat_str(">") {
                CmpOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.parse_additive()?;
            left = comparison(left, right, op);
        }
    }

    fn parse_additive(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("+") {
                BinaryOp::Add
            } else if self.eat_str("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_multiplicative()?;
            left = binary(left, right, op);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, CompileError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_ws();
            let op = if self.eat_str("*") {
                BinaryOp::Mul
            } else if self.eat_str("/") {
                BinaryOp::Div
            } else if self.peek() == Some('%') && !self.rest().starts_with("%}") {
                self.advance(1);
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = binary(left, right, op);
        }
    }

    fn parse_unary(&mut self) -> Result<Expression, CompileError> {
        self.skip_ws();
        let op = match self.peek() {
            Some('+') => UnaryOp::Plus,
            Some('-') => UnaryOp::Minus,
            Some('!') if !self.rest().starts_with("!=") => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance(1);
        self.enter()?;
        let operand = self.parse_unary()?;
        self.leave();
        Ok(Expression::Unary {
            operand: Box::new(operand),
            op,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expression, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_ws();
            if self.eat_str(".") {
                let name = self.parse_ident()?;
                expr = Expression::GetAttribute {
                    object: Box::new(expr),
                    name,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expression, CompileError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(quote @ ('"' | '\'')) => Ok(Expression::Literal(Literal::Str(self.parse_string_literal(quote)?))),
            Some('(') => {
                self.advance(1);
                let expr = self.parse_expression()?;
                self.skip_ws();
                if !self.eat_str(")") {
                    return Err(self.err_here("expected ')'"));
                }
                Ok(expr)
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.parse_ident()?;
                match name.as_str() {
                    "true" => Ok(Expression::Literal(Literal::Bool(true))),
                    "false" => Ok(Expression::Literal(Literal::Bool(false))),
                    _ => {
                        self.skip_ws();
                        if self.eat_str("(") {
                            let args = self.parse_call_args()?;
                            Ok(Expression::MethodCall { name, args })
                        } else {
                            Ok(Expression::Variable(name))
                        }
                    }
                }
            }
            _ => Err(self.err_here("expected expression")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expression>, CompileError> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.eat_str(")") {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            self.skip_ws();
            if self.eat_str(",") {
                continue;
            }
            if self.eat_str(")") {
                return Ok(args);
            }
            return Err(self.err_here("expected ',' or ')' in helper arguments"));
        }
    }

    fn parse_ident(&mut self) -> Result<String, CompileError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|&(i, c)| {
                if i == 0 {
                    !(c.is_ascii_alphabetic() || c == '_')
                } else {
                    !(c.is_ascii_alphanumeric() || c == '_')
                }
            })
            .map_or(rest.len(), |(i, _)| i);
        if end == 0 {
            return Err(self.err_here("expected identifier"));
        }
        let ident = rest[..end].to_owned();
        self.advance(end);
        Ok(ident)
    }

    /// Parses an integer or double literal. A decimal point or exponent
    /// makes the literal a double; everything else is a 64-bit integer.
    fn parse_number(&mut self) -> Result<Expression, CompileError> {
        let rest = self.rest();
        let mut end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let mut is_float = false;

        let after_int = &rest[end..];
        if after_int.starts_with('.') && after_int[1..].starts_with(|c: char| c.is_ascii_digit()) {
            is_float = true;
            end += 1;
            end += rest[end..].find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len() - end);
        }
        let after_frac = &rest[end..];
        if after_frac.starts_with(['e', 'E']) {
            let mut exp = 1;
            if after_frac[exp..].starts_with(['+', '-']) {
                exp += 1;
            }
            let digits = after_frac[exp..]
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_frac.len() - exp);
            if digits > 0 {
                is_float = true;
                end += exp + digits;
            }
        }

        let text = &rest[..end];
        let expr = if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| CompileError::syntax(format!("invalid float literal '{text}'"), self.line))?;
            Expression::Literal(Literal::Float(value))
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| CompileError::syntax(format!("integer literal '{text}' out of range"), self.line))?;
            Expression::Literal(Literal::Int(value))
        };
        self.advance(end);
        Ok(expr)
    }

    /// Parses a quoted string literal; the opening quote has not been
    /// consumed yet. Supports the usual C-style escapes.
    fn parse_string_literal(&mut self, quote: char) -> Result<String, CompileError> {
        self.advance(1);
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err_here("unterminated string literal")),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        return Err(CompileError::syntax(format!("unknown escape '\\{other}'"), self.line));
                    }
                    None => return Err(self.err_here("unterminated string literal")),
                },
                Some(c) => value.push(c),
            }
        }
    }
}

fn binary(left: Expression, right: Expression, op: BinaryOp) -> Expression {
    Expression::Binary {
        left: Box::new(left),
        right: Box::new(right),
        op,
    }
}

fn comparison(left: Expression, right: Expression, op: CmpOp) -> Expression {
    Expression::Comparison {
        left: Box::new(left),
        right: Box::new(right),
        op,
    }
}
