//! Parser for the toy imperative language the `yaflvm` core's symbol
//! table, code generator and virtual machine implement (spec.md §1: "the
//! concrete lexical analyzer and parser are external"). Built with
//! [pest], in the same shape the teacher's `vasm` crate uses for its own
//! assembly language: a `.pest` grammar, direct pair-walking that emits
//! into the code generator as it goes, and a `pest::error::Error`-based
//! error type (`vasm/src/error.rs`).
//!
//! [pest]: https://docs.rs/pest

mod compiler;
mod error;
mod parser;

use std::io::{BufRead, Write};

use log::info;
use pest::Parser;

use yaflvm::constants::{CODE_SIZE, STCK_SIZE};
use yaflvm::opcode::Instruction;
use yaflvm::VirtualMachine;

pub use compiler::CompileOutcome;
pub use error::{Error, Result};
pub use parser::Rule;

/// Overrides spec.md §5's `CODE_SIZE`/`STCK_SIZE` bounds. `yaflc`'s
/// `-c`/`--code-size` and `-s`/`--stack-size` flags build one of these;
/// everything else uses [`Limits::default`].
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub code_size: usize,
    pub stack_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            code_size: CODE_SIZE,
            stack_size: STCK_SIZE,
        }
    }
}

/// Parses and lowers `source` to a bytecode program (spec.md §4.4 steps
/// 1–3), without running it. Fails with [`Error::Syntax`] if the grammar
/// rejects the input, [`Error::Codegen`] if the code segment overflows,
/// or [`Error::Semantic`] if any recoverable diagnostic (undefined or
/// duplicate identifier) was reported during the walk.
pub fn compile(source: &str) -> Result<Vec<Instruction>> {
    compile_with_limits(source, Limits::default())
}

/// Same as [`compile`], with an explicit [`Limits`] override.
pub fn compile_with_limits(source: &str, limits: Limits) -> Result<Vec<Instruction>> {
    let pair = parser::LangParser::parse(Rule::program, source)?
        .next()
        .expect("`program` rule always produces exactly one pair");

    let outcome = compiler::Compiler::with_code_size(limits.code_size).compile_program(pair)?;

    if !outcome.diagnostics.is_empty() {
        return Err(Error::Semantic(outcome.diagnostics));
    }

    info!("compiled {} instructions", outcome.code.len());
    Ok(outcome.code)
}

/// The full pipeline (spec.md §4.4): compile `source`, and if compilation
/// reported no error, run it to completion over `input`/`output`.
pub fn compile_and_run(
    source: &str,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<()> {
    compile_and_run_with_limits(source, input, output, Limits::default())
}

/// Same as [`compile_and_run`], with an explicit [`Limits`] override.
pub fn compile_and_run_with_limits(
    source: &str,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
    limits: Limits,
) -> Result<()> {
    let code = compile_with_limits(source, limits)?;
    let mut vm = VirtualMachine::with_stack_size(code, limits.stack_size);
    vm.run(input, output).map_err(Error::Runtime)?;
    Ok(())
}

/// Same as [`compile_and_run`], but wires up process stdin/stdout,
/// what `yaflc` calls.
pub fn compile_and_run_stdio(source: &str) -> Result<()> {
    compile_and_run_stdio_with_limits(source, Limits::default())
}

/// Same as [`compile_and_run_stdio`], with an explicit [`Limits`]
/// override.
pub fn compile_and_run_stdio_with_limits(source: &str, limits: Limits) -> Result<()> {
    let code = compile_with_limits(source, limits)?;
    let mut vm = VirtualMachine::with_stack_size(code, limits.stack_size);
    vm.run_stdio().map_err(Error::Runtime)?;
    Ok(())
}

// Re-exported so callers matching on run-time failures don't need a
// direct `yaflvm` dependency just for this one type.
pub use yaflvm::diagnostics::Diagnostic;
