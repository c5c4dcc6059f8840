//! Pass pipeline tracing hooks.
//!
//! [`PassTracer`] is a trait with default no-op hooks, so the production
//! default [`NoopTracer`] costs nothing: the pass manager carries the tracer
//! as a type parameter and the compiler inlines the empty calls away.
//! [`StderrTracer`] gives a human-readable log of the pipeline for
//! debugging.

/// Hooks invoked by the pass manager around each pass.
pub trait PassTracer {
    /// Called before a pass takes ownership of the AST.
    fn pass_start(&mut self, _name: &str) {}

    /// Called after a pass handed the rewritten AST back.
    fn pass_end(&mut self, _name: &str) {}
}

/// Zero-cost no-op tracer, the default for [`PassManager::run`].
///
/// [`PassManager::run`]: crate::PassManager::run
#[derive(Debug, Default)]
pub struct NoopTracer;

impl PassTracer for NoopTracer {}

/// Logs pass boundaries to stderr.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl PassTracer for StderrTracer {
    fn pass_start(&mut self, name: &str) {
        eprintln!("pass {name}: start");
    }

    fn pass_end(&mut self, name: &str) {
        eprintln!("pass {name}: done");
    }
}
