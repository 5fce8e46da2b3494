//! Structured compile-time and run-time errors.
//!
//! Replaces the reference interpreter's `printf`-driven diagnostics
//! (`original_source/src/symbol-table.h`, `data-code-generator.h`) with
//! typed errors, per spec.md §9 ("Printf-driven diagnostics → structured
//! errors"). Compile-time errors are *recoverable*: the generator records
//! them and keeps emitting so multiple errors surface in one pass
//! (spec.md §7). Run-time errors are fatal by construction: the VM
//! returns one and stops.

use thiserror::Error;

/// A recoverable compile-time error (spec.md §7, kinds 1–2).
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("identifier `{0}` is already defined")]
    DuplicateIdentifier(String),

    #[error("identifier `{0}` is not defined")]
    UndefinedIdentifier(String),
}

/// A fatal compile-time error (spec.md §7, kind 3). Unlike [`Diagnostic`],
/// this aborts code generation immediately rather than accumulating.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodegenError {
    #[error("code segment overflow: exceeded {0} instructions")]
    CodeSegmentOverflow(usize),
}

/// A fatal run-time error (spec.md §7, kinds 4–5).
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("arithmetic error: zero division")]
    ZeroDivision,

    #[error("stack overflow: exceeded {0} slots")]
    StackOverflow(usize),

    #[error("malformed input: could not parse an integer from stdin")]
    MalformedInput,

    #[error("end of input while reading an integer")]
    EndOfInput,
}
