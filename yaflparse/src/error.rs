//! Error type for the parser crate, in the shape of the teacher's
//! `vasm::error::Error` (`vasm/src/error.rs`): a thin wrapper that folds
//! the pest grammar error and the core's accumulated diagnostics
//! (spec.md §7) into one enum the CLI can match on.

use yaflvm::diagnostics::{CodegenError, Diagnostic, RuntimeError};

pub type PestError = pest::error::Error<crate::parser::Rule>;

/// Everything that can stop `compile` from producing a runnable program
/// (spec.md §4.4 step 3: "if parsing reported any error, abort before
/// execution").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input did not match the grammar at all.
    Syntax(String),
    /// One or more recoverable compile-time diagnostics were reported
    /// (spec.md §7, kinds 1–2); parsing continued, but execution must
    /// not start.
    Semantic(Vec<Diagnostic>),
    /// A fatal compile-time error (spec.md §7, kind 3): the code segment
    /// filled up mid-parse.
    Codegen(CodegenError),
    /// A fatal run-time error (spec.md §7, kinds 4–5), surfaced from
    /// [`crate::compile_and_run`] after a successful compile.
    Runtime(RuntimeError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Syntax(message) => write!(f, "{}", message),
            Error::Semantic(diagnostics) => {
                for (i, diagnostic) in diagnostics.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}", diagnostic)?;
                }
                Ok(())
            }
            Error::Codegen(err) => write!(f, "{}", err),
            Error::Runtime(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<PestError> for Error {
    fn from(err: PestError) -> Error {
        Error::Syntax(err.to_string())
    }
}

impl From<CodegenError> for Error {
    fn from(err: CodegenError) -> Error {
        Error::Codegen(err)
    }
}

impl From<RuntimeError> for Error {
    fn from(err: RuntimeError) -> Error {
        Error::Runtime(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
