//! Structured error types for the script runtime
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: unexpected character `{ch}`")]
    UnexpectedChar { ch: char, line: u32 },

    #[error("line {line}: unterminated string literal")]
    UnterminatedString { line: u32 },

    #[error("line {line}: unknown escape `\\{ch}` in string literal")]
    UnknownEscape { ch: char, line: u32 },

    #[error("line {line}: malformed number `{text}`")]
    MalformedNumber { text: String, line: u32 },

    #[error("line {line}: expected {expected}, found {found}")]
    Unexpected { expected: String, found: String, line: u32 },

    #[error("unexpected end of input (expected {expected})")]
    UnexpectedEof { expected: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("function `{function}`: duplicate parameter `{name}`")]
    DuplicateParameter { function: String, name: String },

    #[error("function `{function}`: `{name}` is declared twice")]
    DuplicateBinding { function: String, name: String },

    #[error("function `{function}`: unknown variable `{name}`")]
    UnknownVariable { function: String, name: String },
}

/// Failures while evaluating script code.
///
/// These are recoverable: a guard statement converts them into an error
/// report and lets the surrounding function continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("variable `{0}` was read before it was assigned")]
    Unassigned(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("integer overflow in `{0}`")]
    IntegerOverflow(&'static str),

    #[error("no function named `{0}`")]
    UnknownFunction(String),

    #[error("`{name}` takes {expected} arguments but {given} were supplied")]
    ArityMismatch { name: String, expected: usize, given: usize },

    #[error("call depth exceeded {0} frames")]
    DepthExceeded(usize),
}

/// Failures while loading a module into a [`ScriptHost`].
///
/// [`ScriptHost`]: crate::host::ScriptHost
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("module `{0}` is already loaded")]
    DuplicateModule(String),

    #[error("module `{module}`: duplicate item `{item}`")]
    DuplicateItem { module: String, item: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CallError {
    #[error("no module named `{0}`")]
    NoSuchModule(String),

    #[error("no function `{function}` in module `{module}`")]
    NoSuchFunction { module: String, function: String },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_display() {
        let err = RuntimeError::Unassigned("count".to_string());
        assert_eq!(err.to_string(), "variable `count` was read before it was assigned");
    }

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::UnknownVariable {
            function: "Counter.update".to_string(),
            name: "total".to_string(),
        };
        assert!(err.to_string().contains("Counter.update"));
        assert!(err.to_string().contains("`total`"));
    }
}
