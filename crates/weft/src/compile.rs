//! Public interface for compiling templates.
//!
//! [`Compiler`] bundles the parser and the configured pass pipeline;
//! [`Template`] wraps the rewritten AST and exposes the backends.

use std::path::{Path, PathBuf};

use crate::{
    backends::{
        Backend,
        javascript::JavascriptBackend,
        native::{CompiledTemplate, compile as compile_native},
    },
    bindings::Bindings,
    error::CompileError,
    expressions::Node,
    parse,
    passes::{
        CoalesceRawBlocksPass, FoldConstantsPass, LiteralPrintToRawPass, PassKind, PassManager, ResolveIncludesPass,
    },
    printer,
    tracer::PassTracer,
};

/// Compilation options: the include base path and the passes to run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Base path that relative include names resolve against.
    pub base_path: PathBuf,
    /// Passes to run, in order. [`Options::all_passes`] uses the canonical
    /// pipeline; an empty list parses only.
    pub passes: Vec<PassKind>,
    /// Forwarded to the JavaScript backend: emitted interpolations
    /// substitute an empty string for undefined values.
    pub undefined_check: bool,
}

impl Options {
    /// The full canonical pipeline with the given include base path.
    pub fn all_passes(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            passes: PassKind::ALL.to_vec(),
            undefined_check: false,
        }
    }

    /// Parse-only options: no passes at all.
    pub fn no_passes(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            passes: Vec::new(),
            undefined_check: false,
        }
    }
}

/// Parses templates and runs the configured pass pipeline over them.
///
/// # Example
/// ```
/// use weft::{Compiler, Options};
///
/// let compiler = Compiler::new(Options::all_passes("."));
/// let template = compiler.compile_str("abc{{ 1 + 2 * 3 }}def").unwrap();
/// assert_eq!(template.dump(), "[SOF]\n\t[RAW] \"abc7def\"\n[EOF]\n");
/// ```
#[derive(Debug)]
pub struct Compiler {
    options: Options,
}

impl Compiler {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Parses `source` and runs the configured passes.
    ///
    /// # Errors
    /// Returns the parse error or the first pass failure.
    pub fn compile_str(&self, source: &str) -> Result<Template, CompileError> {
        self.run_pipeline(parse::parse_str(source)?)
    }

    /// Reads, parses and compiles the template file at `path`.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<Template, CompileError> {
        self.run_pipeline(parse::parse_file(path)?)
    }

    /// Like [`compile_str`](Self::compile_str), reporting pass boundaries
    /// to `tracer`.
    pub fn compile_str_traced(&self, source: &str, tracer: &mut impl PassTracer) -> Result<Template, CompileError> {
        let ast = self.pipeline().run_traced(parse::parse_str(source)?, tracer)?;
        Ok(self.template(ast))
    }

    fn run_pipeline(&self, ast: Node) -> Result<Template, CompileError> {
        let ast = self.pipeline().run(ast)?;
        Ok(self.template(ast))
    }

    fn template(&self, ast: Node) -> Template {
        Template {
            ast,
            undefined_check: self.options.undefined_check,
        }
    }

    fn pipeline(&self) -> PassManager {
        let mut manager = PassManager::new();
        for kind in &self.options.passes {
            match kind {
                PassKind::ResolveIncludes => {
                    manager.add_node_pass(ResolveIncludesPass::new(self.options.base_path.clone()));
                }
                PassKind::ConstantFolding => manager.add_expression_pass(FoldConstantsPass),
                PassKind::LiteralPrintToRaw => manager.add_node_pass(LiteralPrintToRawPass),
                PassKind::RawBlockCoalescing => manager.add_node_pass(CoalesceRawBlocksPass),
            }
        }
        manager
    }
}

/// A parsed and rewritten template, ready for lowering.
///
/// Both backends require includes to have been resolved: compile with a
/// pipeline containing [`PassKind::ResolveIncludes`] (the default) or they
/// fail on the first `Include` node.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    ast: Node,
    undefined_check: bool,
}

impl Template {
    #[must_use]
    pub fn ast(&self) -> &Node {
        &self.ast
    }

    /// Deterministic textual dump of the AST.
    #[must_use]
    pub fn dump(&self) -> String {
        printer::dump(&self.ast)
    }

    /// Emits the self-contained JavaScript renderer.
    ///
    /// # Errors
    /// Fails if the tree still contains include blocks.
    pub fn to_javascript(&self) -> Result<String, CompileError> {
        JavascriptBackend::new()
            .with_undefined_check(self.undefined_check)
            .lower(&self.ast)
    }

    /// Compiles the template into a callable native renderer for the
    /// binding surface `B`.
    ///
    /// # Errors
    /// Fails if the tree still contains include blocks or statically
    /// mismatched operand types.
    pub fn compile_native<B: Bindings + 'static>(&self) -> Result<CompiledTemplate<B>, CompileError> {
        compile_native(&self.ast)
    }
}
