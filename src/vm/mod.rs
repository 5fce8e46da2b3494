//! Virtual machine (V), spec.md §4.3.
//!
//! Splits the public [`VirtualMachine`] (construction, the run loop,
//! I/O wiring) from [`core::Core`] (register file + single-instruction
//! `tick`), the way the teacher splits `processor::Processor` from
//! `processor::core::Core` (`src/processor.rs` / `src/processor/core.rs`).

mod core;

use std::io::{self, BufRead, Write};

use log::trace;

use crate::diagnostics::RuntimeError;
use crate::opcode::Instruction;

use self::core::{Core, TickResult};

/// Runs an emitted code segment to completion (spec.md §4.3,
/// §4.4 step 4).
pub struct VirtualMachine {
    core: Core,
}

impl VirtualMachine {
    /// Builds a machine over `code`, with registers at their spec.md §3
    /// initial state (`pc = top = ar = 0`).
    pub fn new(code: Vec<Instruction>) -> VirtualMachine {
        VirtualMachine {
            core: Core::new(code),
        }
    }

    /// Same as [`Self::new`], but with a caller-chosen value-stack bound
    /// instead of spec.md §5's default `STCK_SIZE` (`yaflc`'s
    /// `--stack-size` flag).
    pub fn with_stack_size(code: Vec<Instruction>, stack_size: usize) -> VirtualMachine {
        VirtualMachine {
            core: Core::with_stack_size(code, stack_size),
        }
    }

    /// Runs the fetch-decode-execute loop to `HALT` or a fatal run-time
    /// error, reading `INPUT_INT` from `input` and writing `OUTPUT_INT`
    /// (and the `Input: ` prompt) to `output`.
    pub fn run(&mut self, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<(), RuntimeError> {
        loop {
            match self.core.tick(input, output) {
                TickResult::Running => continue,
                TickResult::Halted => return Ok(()),
                TickResult::Fatal(err) => return Err(err),
            }
        }
    }

    /// Convenience wrapper over [`run`](Self::run) for non-interactive
    /// callers (`yaflc`, tests): uses process stdin/stdout.
    pub fn run_stdio(&mut self) -> Result<(), RuntimeError> {
        let stdin = io::stdin();
        let mut locked_in = stdin.lock();
        let stdout = io::stdout();
        let mut locked_out = stdout.lock();
        let result = self.run(&mut locked_in, &mut locked_out);
        trace!("vm halted: {:?}", result);
        result
    }

    /// A single data/stack slot, for tests that assert on final machine
    /// state rather than captured output.
    pub fn stack_value(&self, index: i64) -> i32 {
        self.core.stack_value(index)
    }
}
