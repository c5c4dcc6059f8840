//! The binding surface the native backend compiles against.
//!
//! [`Bindings`] is the contract an embedding host satisfies: variable
//! lookup, attribute access, helper invocation, dynamic arithmetic and
//! comparison over the host's variant value type, truthiness, the for-loop
//! iteration protocol and textual output. The compiled renderer composes
//! these primitives; everything whose type is known at compile time is
//! computed natively and never reaches the host.
//!
//! Reference management is expressed through ownership: taking a fresh
//! reference to a value is `Clone`, and a value going out of scope is
//! `Drop`. Loop values are handed to the body as the iterator's items, so
//! the host decides what "borrowed from the container" means by what its
//! iterator yields.
//!
//! [`DataBindings`] is the bundled host: variant values are [`Object`]s
//! from an insertion-ordered map, and helpers are registered closures.

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    error::RenderError,
    expressions::{BinaryOp, CmpOp, UnaryOp},
    object::{Object, ObjectIter},
};

/// An evaluated operand handed to the host: either a compile-time-typed
/// scalar or one of the host's variant values.
#[derive(Debug, Clone)]
pub enum Operand<V> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Variant(V),
}

/// Helper argument buffer; most calls take only a few arguments.
pub type Arguments<V> = SmallVec<[Operand<V>; 4]>;

/// Host-provided runtime primitives for natively compiled templates.
pub trait Bindings {
    /// The host's runtime-typed value.
    type Value: Clone;
    /// Loop iteration state; dropping it is the loop cleanup.
    type Iter: Iterator<Item = (Self::Value, Self::Value)>;

    /// Fetches a named binding from the renderer's input.
    fn lookup(&mut self, name: &str) -> Result<Self::Value, RenderError>;

    /// Accesses a field or key of a value.
    fn get_attribute(&mut self, value: &Self::Value, name: &str) -> Result<Self::Value, RenderError>;

    /// Invokes a host helper with evaluated arguments.
    fn call_helper(&mut self, name: &str, args: Arguments<Self::Value>) -> Result<Self::Value, RenderError>;

    /// Decides the truthiness of a variant `if` condition.
    fn truthy(&mut self, value: &Self::Value) -> Result<bool, RenderError>;

    /// Starts iteration over a mapping or sequence. Non-iterable values
    /// must produce an empty iteration, which routes control to the loop's
    /// else arm.
    fn iterate(&mut self, value: Self::Value) -> Result<Self::Iter, RenderError>;

    /// Dynamic-type-aware arithmetic; at least one operand is a variant.
    fn binary(
        &mut self,
        op: BinaryOp,
        left: Operand<Self::Value>,
        right: Operand<Self::Value>,
    ) -> Result<Self::Value, RenderError>;

    /// Dynamic-type-aware unary operation on a variant.
    fn unary(&mut self, op: UnaryOp, value: Self::Value) -> Result<Self::Value, RenderError>;

    /// Dynamic-type-aware comparison; at least one operand is a variant.
    fn compare(
        &mut self,
        op: CmpOp,
        left: Operand<Self::Value>,
        right: Operand<Self::Value>,
    ) -> Result<bool, RenderError>;

    /// Appends the textual form of a variant to the output sink.
    fn write_value(&mut self, value: &Self::Value, out: &mut String) -> Result<(), RenderError>;
}

/// A registered host helper.
pub type Helper = Box<dyn FnMut(&[Object]) -> Result<Object, RenderError>>;

/// The bundled [`Bindings`] host: renders against an insertion-ordered data
/// map of [`Object`] values plus a registry of helper closures.
#[derive(Default)]
pub struct DataBindings {
    data: IndexMap<String, Object>,
    helpers: AHashMap<String, Helper>,
    undefined_to_empty: bool,
}

impl DataBindings {
    #[must_use]
    pub fn new(data: IndexMap<String, Object>) -> Self {
        Self {
            data,
            helpers: AHashMap::new(),
            undefined_to_empty: false,
        }
    }

    /// Registers a helper callable from templates as `name(...)`.
    #[must_use]
    pub fn with_helper(
        mut self,
        name: impl Into<String>,
        helper: impl FnMut(&[Object]) -> Result<Object, RenderError> + 'static,
    ) -> Self {
        self.helpers.insert(name.into(), Box::new(helper));
        self
    }

    /// When enabled, lookups of missing variables and attributes produce an
    /// empty string instead of failing, mirroring the JavaScript backend's
    /// undefined check.
    #[must_use]
    pub fn with_undefined_to_empty(mut self, enabled: bool) -> Self {
        self.undefined_to_empty = enabled;
        self
    }

    fn missing(&self, name: &str) -> Result<Object, RenderError> {
        if self.undefined_to_empty {
            Ok(Object::Str(String::new()))
        } else {
            Err(RenderError::undefined(name))
        }
    }
}

impl From<Operand<Object>> for Object {
    fn from(operand: Operand<Object>) -> Self {
        match operand {
            Operand::Int(v) => Self::Int(v),
            Operand::Float(v) => Self::Float(v),
            Operand::Bool(v) => Self::Bool(v),
            Operand::Str(v) => Self::Str(v),
            Operand::Variant(v) => v,
        }
    }
}

/// A pair of objects unified for numeric operation.
enum NumericPair {
    Int(i64, i64),
    Float(f64, f64),
}

fn as_numeric_pair(left: &Object, right: &Object) -> Option<NumericPair> {
    match (left, right) {
        (Object::Int(a), Object::Int(b)) => Some(NumericPair::Int(*a, *b)),
        (Object::Int(a), Object::Float(b)) => Some(NumericPair::Float(*a as f64, *b)),
        (Object::Float(a), Object::Int(b)) => Some(NumericPair::Float(*a, *b as f64)),
        (Object::Float(a), Object::Float(b)) => Some(NumericPair::Float(*a, *b)),
        _ => None,
    }
}

impl Bindings for DataBindings {
    type Value = Object;
    type Iter = ObjectIter;

    fn lookup(&mut self, name: &str) -> Result<Object, RenderError> {
        match self.data.get(name) {
            Some(value) => Ok(value.clone()),
            None => self.missing(name),
        }
    }

    fn get_attribute(&mut self, value: &Object, name: &str) -> Result<Object, RenderError> {
        match value {
            Object::Map(map) => match map.get(name) {
                Some(value) => Ok(value.clone()),
                None => self.missing(name),
            },
            other => Err(RenderError::type_error(format!(
                "cannot read attribute '{name}' of a value of type {}",
                other.type_name()
            ))),
        }
    }

    fn call_helper(&mut self, name: &str, args: Arguments<Object>) -> Result<Object, RenderError> {
        let args: Vec<Object> = args.into_iter().map(Object::from).collect();
        match self.helpers.get_mut(name) {
            Some(helper) => helper(&args),
            None => Err(RenderError::unknown_helper(name)),
        }
    }

    fn truthy(&mut self, value: &Object) -> Result<bool, RenderError> {
        Ok(value.truthy())
    }

    fn iterate(&mut self, value: Object) -> Result<ObjectIter, RenderError> {
        Ok(value.into_entries())
    }

    fn binary(&mut self, op: BinaryOp, left: Operand<Object>, right: Operand<Object>) -> Result<Object, RenderError> {
        let left = Object::from(left);
        let right = Object::from(right);

        // String concatenation is the one non-numeric arithmetic form.
        if op == BinaryOp::Add
            && let (Object::Str(a), Object::Str(b)) = (&left, &right)
        {
            return Ok(Object::Str(format!("{a}{b}")));
        }

        let Some(pair) = as_numeric_pair(&left, &right) else {
            return Err(RenderError::type_error(format!(
                "cannot apply '{}' to values of type {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            )));
        };

        let result = match pair {
            NumericPair::Int(a, b) => match op {
                BinaryOp::Add => Object::Int(a.wrapping_add(b)),
                BinaryOp::Sub => Object::Int(a.wrapping_sub(b)),
                BinaryOp::Mul => Object::Int(a.wrapping_mul(b)),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(RenderError::DivisionByZero);
                    }
                    Object::Int(a.wrapping_div(b))
                }
                BinaryOp::Mod => {
                    if b == 0 {
                        return Err(RenderError::DivisionByZero);
                    }
                    Object::Int(a.wrapping_rem(b))
                }
            },
            NumericPair::Float(a, b) => match op {
                BinaryOp::Add => Object::Float(a + b),
                BinaryOp::Sub => Object::Float(a - b),
                BinaryOp::Mul => Object::Float(a * b),
                BinaryOp::Div => Object::Float(a / b),
                BinaryOp::Mod => Object::Float(a % b),
            },
        };
        Ok(result)
    }

    fn unary(&mut self, op: UnaryOp, value: Object) -> Result<Object, RenderError> {
        match op {
            UnaryOp::Not => Ok(Object::Bool(!value.truthy())),
            UnaryOp::Plus => match value {
                v @ (Object::Int(_) | Object::Float(_)) => Ok(v),
                other => Err(RenderError::type_error(format!(
                    "cannot apply unary '+' to a value of type {}",
                    other.type_name()
                ))),
            },
            UnaryOp::Minus => match value {
                Object::Int(v) => Ok(Object::Int(v.wrapping_neg())),
                Object::Float(v) => Ok(Object::Float(-v)),
                other => Err(RenderError::type_error(format!(
                    "cannot apply unary '-' to a value of type {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn compare(&mut self, op: CmpOp, left: Operand<Object>, right: Operand<Object>) -> Result<bool, RenderError> {
        let left = Object::from(left);
        let right = Object::from(right);

        match op {
            CmpOp::And => Ok(left.truthy() && right.truthy()),
            CmpOp::Or => Ok(left.truthy() || right.truthy()),
            CmpOp::Eq | CmpOp::Ne => {
                let equal = match as_numeric_pair(&left, &right) {
                    Some(NumericPair::Int(a, b)) => a == b,
                    Some(NumericPair::Float(a, b)) => a == b,
                    // Non-numeric values are equal only within one type.
                    None => left == right,
                };
                Ok(if op == CmpOp::Eq { equal } else { !equal })
            }
            CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le => {
                let Some(pair) = as_numeric_pair(&left, &right) else {
                    return Err(RenderError::type_error(format!(
                        "cannot order values of type {} and {}",
                        left.type_name(),
                        right.type_name()
                    )));
                };
                let ordering = match pair {
                    NumericPair::Int(a, b) => a.partial_cmp(&b),
                    NumericPair::Float(a, b) => a.partial_cmp(&b),
                };
                let Some(ordering) = ordering else {
                    // NaN never orders.
                    return Ok(false);
                };
                Ok(match op {
                    CmpOp::Gt => ordering.is_gt(),
                    CmpOp::Ge => ordering.is_ge(),
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Le => ordering.is_le(),
                    _ => unreachable!("checked by the outer match"),
                })
            }
        }
    }

    fn write_value(&mut self, value: &Object, out: &mut String) -> Result<(), RenderError> {
        value.write_text(out)
    }
}
