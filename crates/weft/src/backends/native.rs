//! In-memory code generator: compiles an AST into a callable renderer.
//!
//! The backend lowers each node into a boxed closure over a render context,
//! composing the host's [`Bindings`] primitives with natively computed
//! operations on compile-time-typed values. The result is a
//! [`CompiledTemplate`], callable any number of times against different
//! binding instances.
//!
//! Lowering decisions are driven by the statically derived value types:
//! an operation whose operands are all compile-time typed is compiled to
//! native arithmetic (wrapping two's-complement integers, IEEE 754
//! doubles), while any variant operand routes the whole operation through
//! the host. Operand type combinations that could never succeed — ordering
//! a string against an integer, arithmetic on a boolean — are rejected at
//! compile time instead of being miscompiled.
//!
//! Loop binders shadow outer bindings through compile-time slot allocation:
//! each `for` body reads its binders from a dedicated slot of the context's
//! locals frame, so nested loops reusing a name never collide and the outer
//! meaning is restored simply by leaving the slot behind. Key values are
//! owned by the loop; value items are whatever the host's iterator yields.
//! Values go out of scope by being dropped, and a fresh reference to a
//! variant is its `Clone`.
//!
//! `Include` nodes cannot be lowered; the include-resolution pass runs
//! before this backend.

use std::marker::PhantomData;

use ahash::AHashMap;

use crate::{
    backends::Backend,
    bindings::{Arguments, Bindings, Operand},
    error::{CompileError, RenderError},
    expressions::{BinaryOp, CmpOp, Expression, Literal, Node, UnaryOp, ValueType, float_text},
};

/// Mutable state threaded through a render: the host bindings, the output
/// buffer and the loop-binder locals frame.
struct RenderCtx<'b, B: Bindings> {
    bindings: &'b mut B,
    out: String,
    locals: Vec<Option<B::Value>>,
}

type Thunk<B> = Box<dyn Fn(&mut RenderCtx<'_, B>) -> Result<(), RenderError>>;
type Eval<B> = Box<dyn Fn(&mut RenderCtx<'_, B>) -> Result<Operand<<B as Bindings>::Value>, RenderError>>;

/// A natively compiled template renderer.
pub struct CompiledTemplate<B: Bindings> {
    root: Thunk<B>,
    local_count: usize,
}

impl<B: Bindings> CompiledTemplate<B> {
    /// Renders the template against `bindings`, returning the output text.
    ///
    /// # Errors
    /// Fails on undefined lookups, helper errors, runtime type mismatches
    /// and division by zero.
    pub fn render(&self, bindings: &mut B) -> Result<String, RenderError> {
        let mut ctx = RenderCtx {
            bindings,
            out: String::new(),
            locals: vec![None; self.local_count],
        };
        (self.root)(&mut ctx)?;
        Ok(ctx.out)
    }
}

/// Compiles `ast` into a renderer for the binding surface `B`.
///
/// # Errors
/// Fails on `Include` nodes (run the include-resolution pass first) and on
/// operand type combinations that could never evaluate.
pub fn compile<B: Bindings + 'static>(ast: &Node) -> Result<CompiledTemplate<B>, CompileError> {
    let mut codegen = Codegen {
        shadows: AHashMap::new(),
        local_count: 0,
        _bindings: PhantomData,
    };
    let root = codegen.node(ast)?;
    Ok(CompiledTemplate {
        root,
        local_count: codegen.local_count,
    })
}

/// The native code generator, [`compile`] behind the [`Backend`] contract.
pub struct NativeBackend<B: Bindings> {
    _bindings: PhantomData<fn(B)>,
}

impl<B: Bindings> Default for NativeBackend<B> {
    fn default() -> Self {
        Self { _bindings: PhantomData }
    }
}

impl<B: Bindings> NativeBackend<B> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Bindings + 'static> Backend for NativeBackend<B> {
    type Output = CompiledTemplate<B>;

    fn lower(&mut self, ast: &Node) -> Result<CompiledTemplate<B>, CompileError> {
        compile(ast)
    }
}

struct Codegen<B: Bindings> {
    /// Binder names currently shadowed by a loop, mapped to their slot.
    shadows: AHashMap<String, usize>,
    local_count: usize,
    _bindings: PhantomData<fn(B)>,
}

impl<B: Bindings + 'static> Codegen<B> {
    fn node(&mut self, node: &Node) -> Result<Thunk<B>, CompileError> {
        match node {
            Node::Statements(children) => {
                let thunks: Vec<Thunk<B>> = children.iter().map(|child| self.node(child)).collect::<Result<_, _>>()?;
                Ok(Box::new(move |ctx| {
                    for thunk in &thunks {
                        thunk(ctx)?;
                    }
                    Ok(())
                }))
            }
            Node::Raw(text) => {
                let text = text.clone();
                Ok(Box::new(move |ctx| {
                    ctx.out.push_str(&text);
                    Ok(())
                }))
            }
            Node::Print(expr) => {
                let eval = self.expression(expr)?;
                Ok(Box::new(move |ctx| {
                    match eval(ctx)? {
                        Operand::Int(v) => ctx.out.push_str(&v.to_string()),
                        Operand::Float(v) => ctx.out.push_str(&float_text(v)),
                        Operand::Bool(v) => ctx.out.push_str(if v { "true" } else { "false" }),
                        Operand::Str(v) => ctx.out.push_str(&v),
                        Operand::Variant(value) => {
                            let RenderCtx { bindings, out, .. } = ctx;
                            bindings.write_value(&value, out)?;
                        }
                    }
                    Ok(())
                }))
            }
            Node::If {
                condition,
                then_body,
                else_body,
            } => {
                match condition.value_type() {
                    ValueType::Boolean | ValueType::Variant => {}
                    other => {
                        return Err(CompileError::unsupported(format!(
                            "if condition must be boolean or runtime-typed, not {other:?}"
                        )));
                    }
                }
                let cond = self.expression(condition)?;
                let then_thunk = self.node(then_body)?;
                let else_thunk = match else_body.as_deref() {
                    Some(body) => Some(self.node(body)?),
                    None => None,
                };
                Ok(Box::new(move |ctx| {
                    let truthy = match cond(ctx)? {
                        Operand::Bool(v) => v,
                        Operand::Variant(v) => ctx.bindings.truthy(&v)?,
                        _ => return Err(RenderError::type_error("condition did not evaluate to a boolean")),
                    };
                    match (truthy, &else_thunk) {
                        (true, _) => then_thunk(ctx),
                        (false, Some(else_thunk)) => else_thunk(ctx),
                        (false, None) => Ok(()),
                    }
                }))
            }
            Node::For {
                key,
                value,
                iterable,
                body,
                else_body,
            } => self.for_loop(key.as_deref(), value.as_deref(), iterable, body, else_body.as_deref()),
            Node::Include { .. } => Err(CompileError::unsupported(
                "the native backend cannot lower include blocks; run the include-resolution pass first",
            )),
        }
    }

    fn for_loop(
        &mut self,
        key: Option<&str>,
        value: Option<&str>,
        iterable: &Expression,
        body: &Node,
        else_body: Option<&Node>,
    ) -> Result<Thunk<B>, CompileError> {
        if iterable.value_type() != ValueType::Variant {
            return Err(CompileError::unsupported("loop iterable must be runtime-typed"));
        }
        let iter_eval = self.expression(iterable)?;

        // Binders shadow outer meanings for the body only; the else arm is
        // compiled after the shadows are gone.
        let key_binding = key.map(|name| (name.to_owned(), self.bind_local(name)));
        let value_binding = value.map(|name| (name.to_owned(), self.bind_local(name)));
        let body_thunk = self.node(body);
        for (name, (_, previous)) in [&value_binding, &key_binding].into_iter().flatten() {
            self.unbind_local(name, *previous);
        }
        let body_thunk = body_thunk?;

        let else_thunk = match else_body {
            Some(body) => Some(self.node(body)?),
            None => None,
        };

        let key_slot = key_binding.map(|(_, (slot, _))| slot);
        let value_slot = value_binding.map(|(_, (slot, _))| slot);
        Ok(Box::new(move |ctx| {
            let iterable = match iter_eval(ctx)? {
                Operand::Variant(v) => v,
                _ => return Err(RenderError::type_error("loop iterable did not evaluate to a runtime value")),
            };
            let entries = ctx.bindings.iterate(iterable)?;

            let mut iterated = false;
            for (entry_key, entry_value) in entries {
                iterated = true;
                if let Some(slot) = key_slot {
                    ctx.locals[slot] = Some(entry_key);
                }
                if let Some(slot) = value_slot {
                    ctx.locals[slot] = Some(entry_value);
                }
                body_thunk(ctx)?;
            }
            for slot in [key_slot, value_slot].into_iter().flatten() {
                ctx.locals[slot] = None;
            }

            match (iterated, &else_thunk) {
                (false, Some(else_thunk)) => else_thunk(ctx),
                _ => Ok(()),
            }
        }))
    }

    fn bind_local(&mut self, name: &str) -> (usize, Option<usize>) {
        let slot = self.local_count;
        self.local_count += 1;
        let previous = self.shadows.insert(name.to_owned(), slot);
        (slot, previous)
    }

    fn unbind_local(&mut self, name: &str, previous: Option<usize>) {
        match previous {
            Some(previous) => {
                self.shadows.insert(name.to_owned(), previous);
            }
            None => {
                self.shadows.remove(name);
            }
        }
    }

    fn expression(&mut self, expr: &Expression) -> Result<Eval<B>, CompileError> {
        match expr {
            Expression::Literal(literal) => {
                let literal = literal.clone();
                Ok(Box::new(move |_ctx| {
                    Ok(match &literal {
                        Literal::Int(v) => Operand::Int(*v),
                        Literal::Float(v) => Operand::Float(*v),
                        Literal::Bool(v) => Operand::Bool(*v),
                        Literal::Str(v) => Operand::Str(v.clone()),
                    })
                }))
            }
            Expression::Variable(name) => match self.shadows.get(name) {
                Some(&slot) => Ok(Box::new(move |ctx| match &ctx.locals[slot] {
                    Some(value) => Ok(Operand::Variant(value.clone())),
                    None => Err(RenderError::type_error("loop binder read outside an iteration")),
                })),
                None => {
                    let name = name.clone();
                    Ok(Box::new(move |ctx| Ok(Operand::Variant(ctx.bindings.lookup(&name)?))))
                }
            },
            Expression::GetAttribute { object, name } => {
                if object.value_type() != ValueType::Variant {
                    return Err(CompileError::unsupported(
                        "attribute access requires a runtime-typed value",
                    ));
                }
                let object_eval = self.expression(object)?;
                let name = name.clone();
                Ok(Box::new(move |ctx| {
                    let Operand::Variant(object) = object_eval(ctx)? else {
                        return Err(RenderError::type_error("attribute target did not evaluate to a runtime value"));
                    };
                    Ok(Operand::Variant(ctx.bindings.get_attribute(&object, &name)?))
                }))
            }
            Expression::MethodCall { name, args } => {
                let evals: Vec<Eval<B>> = args.iter().map(|arg| self.expression(arg)).collect::<Result<_, _>>()?;
                let name = name.clone();
                Ok(Box::new(move |ctx| {
                    let mut values = Arguments::new();
                    for eval in &evals {
                        values.push(eval(ctx)?);
                    }
                    Ok(Operand::Variant(ctx.bindings.call_helper(&name, values)?))
                }))
            }
            Expression::Binary { left, right, op } => self.binary(left, right, *op),
            Expression::Unary { operand, op } => self.unary(operand, *op),
            Expression::Comparison { left, right, op } => self.comparison(left, right, *op),
        }
    }

    fn binary(&mut self, left: &Expression, right: &Expression, op: BinaryOp) -> Result<Eval<B>, CompileError> {
        let types = (left.value_type(), right.value_type());
        let variant = types.0 == ValueType::Variant || types.1 == ValueType::Variant;
        if !variant {
            for side in [types.0, types.1] {
                if !matches!(side, ValueType::Integer | ValueType::Double) {
                    return Err(CompileError::unsupported(format!(
                        "cannot apply '{}' to a compile-time {side:?} value",
                        op.symbol()
                    )));
                }
            }
        }

        let left = self.expression(left)?;
        let right = self.expression(right)?;
        if variant {
            Ok(Box::new(move |ctx| {
                let l = left(ctx)?;
                let r = right(ctx)?;
                Ok(Operand::Variant(ctx.bindings.binary(op, l, r)?))
            }))
        } else {
            Ok(Box::new(move |ctx| static_binary(op, left(ctx)?, right(ctx)?)))
        }
    }

    fn unary(&mut self, operand: &Expression, op: UnaryOp) -> Result<Eval<B>, CompileError> {
        let operand_type = operand.value_type();
        let supported = match op {
            UnaryOp::Not => matches!(operand_type, ValueType::Boolean | ValueType::Variant),
            UnaryOp::Plus | UnaryOp::Minus => matches!(
                operand_type,
                ValueType::Integer | ValueType::Double | ValueType::Variant
            ),
        };
        if !supported {
            return Err(CompileError::unsupported(format!(
                "cannot apply unary '{}' to a compile-time {operand_type:?} value",
                op.symbol()
            )));
        }

        let operand = self.expression(operand)?;
        if operand_type == ValueType::Variant {
            Ok(Box::new(move |ctx| {
                let Operand::Variant(value) = operand(ctx)? else {
                    return Err(RenderError::type_error("operand did not evaluate to a runtime value"));
                };
                Ok(Operand::Variant(ctx.bindings.unary(op, value)?))
            }))
        } else {
            Ok(Box::new(move |ctx| {
                Ok(match (op, operand(ctx)?) {
                    (UnaryOp::Not, Operand::Bool(v)) => Operand::Bool(!v),
                    (UnaryOp::Plus, v @ (Operand::Int(_) | Operand::Float(_))) => v,
                    (UnaryOp::Minus, Operand::Int(v)) => Operand::Int(v.wrapping_neg()),
                    (UnaryOp::Minus, Operand::Float(v)) => Operand::Float(-v),
                    _ => return Err(RenderError::type_error("operand had an unexpected runtime type")),
                })
            }))
        }
    }

    fn comparison(&mut self, left: &Expression, right: &Expression, op: CmpOp) -> Result<Eval<B>, CompileError> {
        let types = (left.value_type(), right.value_type());
        let variant = types.0 == ValueType::Variant || types.1 == ValueType::Variant;
        if !variant {
            let numeric = |t| matches!(t, ValueType::Integer | ValueType::Double);
            let compatible = match op {
                CmpOp::And | CmpOp::Or => types == (ValueType::Boolean, ValueType::Boolean),
                CmpOp::Eq | CmpOp::Ne => {
                    types == (ValueType::Boolean, ValueType::Boolean)
                        || types == (ValueType::String, ValueType::String)
                        || (numeric(types.0) && numeric(types.1))
                }
                CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => numeric(types.0) && numeric(types.1),
            };
            if !compatible {
                return Err(CompileError::unsupported(format!(
                    "cannot apply '{}' to compile-time {:?} and {:?} values",
                    op.symbol(),
                    types.0,
                    types.1
                )));
            }
        }

        let left = self.expression(left)?;
        let right = self.expression(right)?;
        if variant {
            Ok(Box::new(move |ctx| {
                let l = left(ctx)?;
                let r = right(ctx)?;
                Ok(Operand::Bool(ctx.bindings.compare(op, l, r)?))
            }))
        } else {
            Ok(Box::new(move |ctx| static_compare(op, left(ctx)?, right(ctx)?)))
        }
    }
}

fn scalar_f64<V>(operand: &Operand<V>) -> Result<f64, RenderError> {
    match operand {
        Operand::Int(v) => Ok(*v as f64),
        Operand::Float(v) => Ok(*v),
        _ => Err(RenderError::type_error("expected a numeric value")),
    }
}

fn static_binary<V>(op: BinaryOp, left: Operand<V>, right: Operand<V>) -> Result<Operand<V>, RenderError> {
    if let (Operand::Int(a), Operand::Int(b)) = (&left, &right) {
        let (a, b) = (*a, *b);
        let value = match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div => {
                if b == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            BinaryOp::Mod => {
                if b == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                a.wrapping_rem(b)
            }
        };
        return Ok(Operand::Int(value));
    }

    let a = scalar_f64(&left)?;
    let b = scalar_f64(&right)?;
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
    };
    Ok(Operand::Float(value))
}

fn static_compare<V>(op: CmpOp, left: Operand<V>, right: Operand<V>) -> Result<Operand<V>, RenderError> {
    let value = match op {
        CmpOp::And | CmpOp::Or => match (&left, &right) {
            (Operand::Bool(a), Operand::Bool(b)) => {
                if op == CmpOp::And {
                    *a && *b
                } else {
                    *a || *b
                }
            }
            _ => return Err(RenderError::type_error("expected boolean values")),
        },
        CmpOp::Eq | CmpOp::Ne => {
            let equal = match (&left, &right) {
                (Operand::Int(a), Operand::Int(b)) => a == b,
                (Operand::Bool(a), Operand::Bool(b)) => a == b,
                (Operand::Str(a), Operand::Str(b)) => a == b,
                _ => scalar_f64(&left)? == scalar_f64(&right)?,
            };
            if op == CmpOp::Eq { equal } else { !equal }
        }
        CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
            let compared = match (&left, &right) {
                (Operand::Int(a), Operand::Int(b)) => match op {
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    _ => unreachable!("checked by the outer match"),
                },
                _ => {
                    let (a, b) = (scalar_f64(&left)?, scalar_f64(&right)?);
                    match op {
                        CmpOp::Gt => a > b,
                        CmpOp::Ge => a >= b,
                        CmpOp::Lt => a < b,
                        CmpOp::Le => a <= b,
                        _ => unreachable!("checked by the outer match"),
                    }
                }
            };
            compared
        }
    };
    Ok(Operand::Bool(value))
}
