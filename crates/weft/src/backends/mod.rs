//! Backend lowering contract and shared emission helpers.
//!
//! A backend consumes a fully lowered AST and produces a backend-specific
//! product: the JavaScript backend emits renderer source text, the native
//! backend builds a callable renderer in memory. Backends must handle every
//! statement and expression variant; an `Include` reaching a backend is an
//! error — the include-resolution pass is expected to have eliminated them.

pub mod javascript;
pub mod native;

use crate::{error::CompileError, expressions::Node};

/// A consumer of a fully lowered AST.
pub trait Backend {
    type Output;

    /// Lowers the tree rooted at `ast` into the backend's product.
    fn lower(&mut self, ast: &Node) -> Result<Self::Output, CompileError>;
}

/// Line-and-indentation writer used by source-emitting backends.
///
/// Tracks the current indentation level and prefixes every started line
/// with one tab per level.
#[derive(Debug, Default)]
pub struct CodeEmitter {
    out: String,
    indentation: usize,
}

impl CodeEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&mut self) -> &mut Self {
        self.indentation += 1;
        self
    }

    pub fn outdent(&mut self) -> &mut Self {
        self.indentation -= 1;
        self
    }

    pub fn start_line(&mut self) -> &mut Self {
        for _ in 0..self.indentation {
            self.out.push('\t');
        }
        self
    }

    pub fn end_line(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn line(&mut self, text: &str) -> &mut Self {
        self.start_line();
        self.out.push_str(text);
        self.end_line()
    }

    pub fn blank_line(&mut self) -> &mut Self {
        self.out.push('\n');
        self
    }

    pub fn push(&mut self, text: &str) -> &mut Self {
        self.out.push_str(text);
        self
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}
