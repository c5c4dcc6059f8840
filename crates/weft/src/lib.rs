#![doc = include_str!("../../../README.md")]

mod backends;
mod bindings;
mod compile;
mod error;
mod expressions;
mod object;
mod parse;
mod passes;
mod printer;
mod tracer;
mod walk;

pub use crate::{
    backends::{
        Backend, CodeEmitter,
        javascript::JavascriptBackend,
        native::{CompiledTemplate, NativeBackend},
    },
    bindings::{Arguments, Bindings, DataBindings, Helper, Operand},
    compile::{Compiler, Options, Template},
    error::{CompileError, RenderError},
    expressions::{
        BinaryOp, CmpOp, ExprKind, Expression, Literal, Node, NodeKind, UnaryOp, ValueType, VariableMapping,
        float_text,
    },
    object::{Object, ObjectIter},
    parse::{parse_file, parse_str},
    passes::{
        CoalesceRawBlocksPass, FoldConstantsPass, LiteralPrintToRawPass, PassKind, PassManager, ResolveIncludesPass,
    },
    printer::dump,
    tracer::{NoopTracer, PassTracer, StderrTracer},
    walk::{ExprRewriter, NodeRewriter, walk_expression, walk_node},
};
