//! Constant folding: evaluates expressions whose inputs are literals.
//!
//! Folding is conservative and only handles operations whose compile-time
//! result is guaranteed to match the runtime one:
//!
//! - binary arithmetic on numeric literals (double result if either side is
//!   a double, wrapping two's-complement integer arithmetic otherwise);
//!   integer division or modulo by a zero literal aborts the pipeline;
//!   modulo with a double operand is deliberately left to the runtime;
//! - unary `+`/`-` on numeric literals and `!` on boolean literals;
//! - equality on numeric (widened to double when mixed), boolean and string
//!   literal pairs; relational operators on numeric literals; `&&`/`||` on
//!   boolean literals.
//!
//! Anything else is returned unchanged after its children have been folded,
//! which makes the pass idempotent.

use crate::{
    error::CompileError,
    expressions::{BinaryOp, CmpOp, Expression, Literal, UnaryOp},
    walk::{ExprRewriter, walk_expression},
};

#[derive(Debug, Default)]
pub struct FoldConstantsPass;

/// A numeric literal operand, extracted for folding.
#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

impl Numeric {
    fn of(expr: &Expression) -> Option<Self> {
        match expr {
            Expression::Literal(Literal::Int(v)) => Some(Self::Int(*v)),
            Expression::Literal(Literal::Float(v)) => Some(Self::Float(*v)),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl ExprRewriter for FoldConstantsPass {
    fn name(&self) -> &'static str {
        "constant-folding-pass"
    }

    fn rewrite(&mut self, expr: Expression) -> Result<Expression, CompileError> {
        match expr {
            Expression::Binary { left, right, op } => self.fold_binary(*left, *right, op),
            Expression::Unary { operand, op } => self.fold_unary(*operand, op),
            Expression::Comparison { left, right, op } => self.fold_comparison(*left, *right, op),
            other => Ok(other),
        }
    }
}

impl FoldConstantsPass {
    /// Folds a child subtree unless it is already in the wanted literal
    /// form.
    fn fold_child(
        &mut self,
        child: Expression,
        already_folded: impl Fn(&Expression) -> bool,
    ) -> Result<Expression, CompileError> {
        if already_folded(&child) {
            Ok(child)
        } else {
            walk_expression(self, child)
        }
    }

    fn fold_binary(&mut self, left: Expression, right: Expression, op: BinaryOp) -> Result<Expression, CompileError> {
        let left = self.fold_child(left, |expr| Numeric::of(expr).is_some())?;
        let right = self.fold_child(right, |expr| Numeric::of(expr).is_some())?;

        let (Some(l), Some(r)) = (Numeric::of(&left), Numeric::of(&right)) else {
            return Ok(rebuild_binary(left, right, op));
        };

        if let (Numeric::Int(l), Numeric::Int(r)) = (l, r) {
            let value = match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        return Err(CompileError::division_by_zero("division"));
                    }
                    l.wrapping_div(r)
                }
                BinaryOp::Mod => {
                    if r == 0 {
                        return Err(CompileError::division_by_zero("modulo"));
                    }
                    l.wrapping_rem(r)
                }
            };
            return Ok(Expression::Literal(Literal::Int(value)));
        }

        // At least one double operand: fold in IEEE 754 binary64, except for
        // modulo, whose double semantics are the runtime's business.
        let value = match op {
            BinaryOp::Add => l.as_f64() + r.as_f64(),
            BinaryOp::Sub => l.as_f64() - r.as_f64(),
            BinaryOp::Mul => l.as_f64() * r.as_f64(),
            BinaryOp::Div => l.as_f64() / r.as_f64(),
            BinaryOp::Mod => return Ok(rebuild_binary(left, right, op)),
        };
        Ok(Expression::Literal(Literal::Float(value)))
    }

    fn fold_unary(&mut self, operand: Expression, op: UnaryOp) -> Result<Expression, CompileError> {
        let operand = match op {
            UnaryOp::Plus | UnaryOp::Minus => self.fold_child(operand, |expr| Numeric::of(expr).is_some())?,
            UnaryOp::Not => self.fold_child(operand, |expr| {
                matches!(expr, Expression::Literal(Literal::Bool(_)))
            })?,
        };
        let folded = match op {
            UnaryOp::Plus => match Numeric::of(&operand) {
                Some(_) => operand,
                None => rebuild_unary(operand, op),
            },
            UnaryOp::Minus => match Numeric::of(&operand) {
                Some(Numeric::Int(v)) => Expression::Literal(Literal::Int(v.wrapping_neg())),
                Some(Numeric::Float(v)) => Expression::Literal(Literal::Float(-v)),
                None => rebuild_unary(operand, op),
            },
            UnaryOp::Not => match operand {
                Expression::Literal(Literal::Bool(v)) => Expression::Literal(Literal::Bool(!v)),
                other => rebuild_unary(other, op),
            },
        };
        Ok(folded)
    }

    fn fold_comparison(&mut self, left: Expression, right: Expression, op: CmpOp) -> Result<Expression, CompileError> {
        let is_literal = |expr: &Expression| matches!(expr, Expression::Literal(_));
        let left = self.fold_child(left, is_literal)?;
        let right = self.fold_child(right, is_literal)?;

        let folded = match op {
            CmpOp::Eq | CmpOp::Ne => {
                let equal = match (Numeric::of(&left), Numeric::of(&right)) {
                    (Some(Numeric::Int(a)), Some(Numeric::Int(b))) => Some(a == b),
                    // Mixed numeric comparison widens to double.
                    (Some(l), Some(r)) => Some(l.as_f64() == r.as_f64()),
                    _ => match (&left, &right) {
                        (Expression::Literal(Literal::Bool(a)), Expression::Literal(Literal::Bool(b))) => Some(a == b),
                        (Expression::Literal(Literal::Str(a)), Expression::Literal(Literal::Str(b))) => Some(a == b),
                        // Other type combinations are the runtime's call.
                        _ => None,
                    },
                };
                equal.map(|equal| if op == CmpOp::Eq { equal } else { !equal })
            }
            CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
                match (Numeric::of(&left), Numeric::of(&right)) {
                    (Some(l), Some(r)) => {
                        let value = match (l, r) {
                            (Numeric::Int(a), Numeric::Int(b)) => match op {
                                CmpOp::Gt => a > b,
                                CmpOp::Ge => a >= b,
                                CmpOp::Lt => a < b,
                                CmpOp::Le => a <= b,
                                _ => unreachable!("checked by the outer match"),
                            },
                            _ => {
                                let (a, b) = (l.as_f64(), r.as_f64());
                                match op {
                                    CmpOp::Gt => a > b,
                                    CmpOp::Ge => a >= b,
                                    CmpOp::Lt => a < b,
                                    CmpOp::Le => a <= b,
                                    _ => unreachable!("checked by the outer match"),
                                }
                            }
                        };
                        Some(value)
                    }
                    _ => None,
                }
            }
            CmpOp::And | CmpOp::Or => match (&left, &right) {
                (Expression::Literal(Literal::Bool(a)), Expression::Literal(Literal::Bool(b))) => {
                    Some(if op == CmpOp::And { *a && *b } else { *a || *b })
                }
                _ => None,
            },
        };

        Ok(match folded {
            Some(value) => Expression::Literal(Literal::Bool(value)),
            None => Expression::Comparison {
                left: Box::new(left),
                right: Box::new(right),
                op,
            },
        })
    }
}

fn rebuild_binary(left: Expression, right: Expression, op: BinaryOp) -> Expression {
    Expression::Binary {
        left: Box::new(left),
        right: Box::new(right),
        op,
    }
}

fn rebuild_unary(operand: Expression, op: UnaryOp) -> Expression {
    Expression::Unary {
        operand: Box::new(operand),
        op,
    }
}
