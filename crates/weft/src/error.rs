use std::{borrow::Cow, fmt, io, path::PathBuf};

/// Errors raised while parsing a template or running the pass pipeline.
///
/// Every variant renders as a single line prefixed with its kind, which is
/// what the drivers put on stderr before exiting with code 1.
#[derive(Debug)]
pub enum CompileError {
    /// From the parser; carries the 1-based source line.
    Syntax {
        message: Cow<'static, str>,
        line: u32,
    },
    /// From include resolution: a free variable of the included template has
    /// no entry in the include's variable mapping.
    MissingVariable {
        variable: String,
        include: String,
    },
    /// From constant folding: integer division or modulo by a zero literal.
    DivisionByZero {
        /// Either `"division"` or `"modulo"`.
        operation: &'static str,
    },
    /// From include resolution: the named template is already on the
    /// inclusion stack.
    CyclicInclude {
        path: PathBuf,
    },
    /// File open/read failure during include resolution or driver loading.
    Io {
        path: PathBuf,
        source: io::Error,
    },
    /// A backend was handed a construct it cannot lower.
    Unsupported {
        message: Cow<'static, str>,
    },
}

impl CompileError {
    pub(crate) fn syntax(message: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
        }
    }

    pub(crate) fn missing_variable(variable: impl Into<String>, include: impl Into<String>) -> Self {
        Self::MissingVariable {
            variable: variable.into(),
            include: include.into(),
        }
    }

    pub(crate) fn division_by_zero(operation: &'static str) -> Self {
        Self::DivisionByZero { operation }
    }

    pub(crate) fn cyclic_include(path: impl Into<PathBuf>) -> Self {
        Self::CyclicInclude { path: path.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message, line } => write!(f, "syntax error at line {line}: {message}"),
            Self::MissingVariable { variable, include } => write!(
                f,
                "missing variable reference: no value found for variable '{variable}', referenced in '{include}'"
            ),
            Self::DivisionByZero { operation } => write!(f, "division by zero: constant {operation} by zero"),
            Self::CyclicInclude { path } => {
                write!(f, "cyclic include: '{}' is already being included", path.display())
            }
            Self::Io { path, source } => write!(f, "io error: couldn't open '{}': {source}", path.display()),
            Self::Unsupported { message } => write!(f, "unsupported operation: {message}"),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Errors raised while rendering a natively compiled template.
#[derive(Debug)]
pub enum RenderError {
    /// A variable lookup produced no value.
    Undefined {
        name: String,
    },
    /// A helper call named a helper the host never registered.
    UnknownHelper {
        name: String,
    },
    /// Integer division or modulo by zero at render time.
    DivisionByZero,
    /// An operation was applied to values of unsuitable runtime types.
    Type {
        message: Cow<'static, str>,
    },
}

impl RenderError {
    pub(crate) fn undefined(name: impl Into<String>) -> Self {
        Self::Undefined { name: name.into() }
    }

    pub(crate) fn unknown_helper(name: impl Into<String>) -> Self {
        Self::UnknownHelper { name: name.into() }
    }

    pub fn type_error(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined { name } => write!(f, "undefined value: no value found for variable '{name}'"),
            Self::UnknownHelper { name } => write!(f, "unknown helper: '{name}' is not registered"),
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::Type { message } => write!(f, "type error: {message}"),
        }
    }
}

impl std::error::Error for RenderError {}
