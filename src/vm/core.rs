//! Fetch-decode-execute loop, split out from [`super::VirtualMachine`] the
//! way the teacher splits `Processor` (public API) from `Core` (register
//! file + `tick`) in `src/processor/mod.rs` / `src/processor/core.rs`.

use std::io::{BufRead, Write};
use std::num::Wrapping;

use log::trace;

use crate::constants::STCK_SIZE;
use crate::diagnostics::RuntimeError;
use crate::opcode::{Instruction, Opcode};

pub enum TickResult {
    Running,
    Halted,
    Fatal(RuntimeError),
}

/// The VM register file (spec.md §3, "VM register file") plus the value
/// stack it indexes into.
pub struct Core {
    code: Vec<Instruction>,
    stack: Vec<i32>,
    stack_size: usize,
    pc: usize,
    top: i64,
    ar: i64,
}

impl Core {
    pub fn new(code: Vec<Instruction>) -> Core {
        Core::with_stack_size(code, STCK_SIZE)
    }

    /// Same as [`Self::new`], but with a caller-chosen bound instead of
    /// spec.md §5's default `STCK_SIZE`. `yaflc`'s `--stack-size` flag
    /// uses this.
    pub fn with_stack_size(code: Vec<Instruction>, stack_size: usize) -> Core {
        Core {
            code,
            stack: vec![0; stack_size],
            stack_size,
            pc: 0,
            top: 0,
            ar: 0,
        }
    }

    pub fn stack_value(&self, index: i64) -> i32 {
        self.stack[index as usize]
    }

    fn check_bounds(&self, index: i64) -> Result<usize, RuntimeError> {
        if index < 0 || index as usize >= self.stack.len() {
            Err(RuntimeError::StackOverflow(self.stack_size))
        } else {
            Ok(index as usize)
        }
    }

    fn push(&mut self, value: i32) -> Result<(), RuntimeError> {
        self.top += 1;
        let idx = self.check_bounds(self.top)?;
        self.stack[idx] = value;
        Ok(())
    }

    fn pop(&mut self) -> Result<i32, RuntimeError> {
        let idx = self.check_bounds(self.top)?;
        self.top -= 1;
        Ok(self.stack[idx])
    }

    fn peek(&self, offset_from_top: i64) -> Result<i32, RuntimeError> {
        let idx = self.check_bounds(self.top - offset_from_top)?;
        Ok(self.stack[idx])
    }

    fn set_below_top(&mut self, value: i32) -> Result<(), RuntimeError> {
        let idx = self.check_bounds(self.top - 1)?;
        self.stack[idx] = value;
        Ok(())
    }

    fn binary<F>(&mut self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(Wrapping<i32>, Wrapping<i32>) -> Wrapping<i32>,
    {
        let rhs = self.pop()?;
        let lhs = self.peek(0)?;
        self.set_below_top(f(Wrapping(lhs), Wrapping(rhs)).0)
    }

    fn compare<F>(&mut self, f: F) -> Result<(), RuntimeError>
    where
        F: FnOnce(i32, i32) -> bool,
    {
        let rhs = self.pop()?;
        let lhs = self.peek(0)?;
        self.set_below_top(if f(lhs, rhs) { 1 } else { 0 })
    }

    pub fn tick(&mut self, input: &mut dyn BufRead, output: &mut dyn Write) -> TickResult {
        if self.pc >= self.code.len() {
            return TickResult::Halted;
        }

        let ir = self.code[self.pc];
        self.pc += 1;

        trace!(
            "pc={:>4} ir={:?} arg={:<6} ar={} top={}",
            self.pc - 1,
            ir.op.0,
            ir.arg,
            self.ar,
            self.top
        );

        let result = self.execute(ir, input, output);
        match result {
            Ok(Some(())) => TickResult::Halted,
            Ok(None) => TickResult::Running,
            Err(err) => TickResult::Fatal(err),
        }
    }

    /// Executes one instruction. Returns `Ok(Some(()))` on `HALT`,
    /// `Ok(None)` to continue, `Err` on a fatal run-time error.
    fn execute(
        &mut self,
        ir: Instruction,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<Option<()>, RuntimeError> {
        let arg = ir.arg;

        match ir.op.0 {
            Opcode::Halt => return Ok(Some(())),

            Opcode::Data => self.top += arg as i64,

            Opcode::LdInt => self.push(arg)?,

            Opcode::LdVar => {
                let idx = self.check_bounds(self.ar + arg as i64)?;
                let value = self.stack[idx];
                self.push(value)?;
            }

            Opcode::Store => {
                let value = self.pop()?;
                let idx = self.check_bounds(arg as i64)?;
                self.stack[idx] = value;
            }

            Opcode::InputInt => {
                write!(output, "Input: ").ok();
                output.flush().ok();
                let value = read_int(input)?;
                let idx = self.check_bounds(self.ar + arg as i64)?;
                self.stack[idx] = value;
            }

            Opcode::OutputInt => {
                let value = self.pop()?;
                writeln!(output, "Output: {}", value).ok();
            }

            Opcode::Goto => self.pc = arg as usize,

            Opcode::JmpFalse => {
                let value = self.pop()?;
                if value == 0 {
                    self.pc = arg as usize;
                }
            }

            Opcode::Or => self.compare(|a, b| a != 0 || b != 0)?,
            Opcode::And => self.compare(|a, b| a != 0 && b != 0)?,
            Opcode::Not => {
                let idx = self.check_bounds(self.top)?;
                self.stack[idx] = if self.stack[idx] == 0 { 1 } else { 0 };
            }
            Opcode::UMinus => {
                let idx = self.check_bounds(self.top)?;
                self.stack[idx] = (Wrapping(0i32) - Wrapping(self.stack[idx])).0;
            }

            Opcode::Lt => self.compare(|a, b| a < b)?,
            Opcode::Le => self.compare(|a, b| a <= b)?,
            Opcode::Eq => self.compare(|a, b| a == b)?,
            Opcode::Ne => self.compare(|a, b| a != b)?,
            Opcode::Gt => self.compare(|a, b| a > b)?,
            Opcode::Ge => self.compare(|a, b| a >= b)?,

            Opcode::BinAnd => self.binary(|a, b| a & b)?,
            Opcode::BinOr => self.binary(|a, b| a | b)?,
            Opcode::BinXor => self.binary(|a, b| a ^ b)?,
            Opcode::BinShl => self.binary(|a, b| Wrapping(a.0.wrapping_shl(shift_count(b.0))))?,
            Opcode::BinShr => self.binary(|a, b| Wrapping(a.0.wrapping_shr(shift_count(b.0))))?,

            Opcode::Add => self.binary(|a, b| a + b)?,
            Opcode::Sub => self.binary(|a, b| a - b)?,
            Opcode::Mul => self.binary(|a, b| a * b)?,

            Opcode::Div => {
                let rhs = self.pop()?;
                let lhs = self.peek(0)?;
                if rhs == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                self.set_below_top((Wrapping(lhs) / Wrapping(rhs)).0)?;
            }

            Opcode::Mod => {
                let rhs = self.pop()?;
                let lhs = self.peek(0)?;
                if rhs == 0 {
                    return Err(RuntimeError::ZeroDivision);
                }
                self.set_below_top((Wrapping(lhs) % Wrapping(rhs)).0)?;
            }

            Opcode::Pwr => {
                let rhs = self.pop()?;
                let lhs = self.peek(0)?;
                let result = (lhs as f64).powf(rhs as f64).trunc();
                self.set_below_top(result as i32)?;
            }
        }

        Ok(None)
    }
}

/// Masks a shift count to `0..32` before shifting a 32-bit value,
/// resolving the open question in spec.md §9 for out-of-range shift
/// counts.
fn shift_count(count: i32) -> u32 {
    (count as u32) & crate::constants::SHIFT_MASK
}

/// Reads a single whitespace-delimited signed decimal integer, resolving
/// the open question in spec.md §9 for malformed `INPUT_INT` input by
/// treating it as a fatal run-time error.
fn read_int(input: &mut dyn BufRead) -> Result<i32, RuntimeError> {
    let mut token = String::new();
    loop {
        let mut byte = [0u8; 1];
        match input.read(&mut byte) {
            Ok(0) if token.is_empty() => return Err(RuntimeError::EndOfInput),
            Ok(0) => break,
            Ok(_) => {
                let ch = byte[0] as char;
                if ch.is_whitespace() {
                    if token.is_empty() {
                        continue;
                    }
                    break;
                }
                token.push(ch);
            }
            Err(_) => return Err(RuntimeError::EndOfInput),
        }
    }
    token.parse().map_err(|_| RuntimeError::MalformedInput)
}
