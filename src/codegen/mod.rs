//! Code generator (G), spec.md §4.2.
//!
//! Appends instructions to a bounded code segment, allocates data offsets
//! via the symbol table, and exposes the backpatching primitives the
//! `if`/`while` constructs need. Mirrors the reference interpreter's
//! `data-code-generator.h`, generalized from its module-level globals
//! into an owned value per spec.md §9 ("Static global arrays → owned
//! buffers").

use log::{debug, trace};

use crate::constants::CODE_SIZE;
use crate::diagnostics::{CodegenError, Diagnostic};
use crate::opcode::{Instruction, Opcode};
use crate::symtab::SymbolTable;

/// An opaque handle to a code slot reserved by [`CodeGenerator::reserve`]
/// but not yet filled in. Per spec.md §9 ("Backpatch handles"), its
/// `Drop` impl asserts it was consumed by [`CodeGenerator::backpatch`],
/// catching codegen bugs statically in debug builds. Stack-discipline
/// safe: nothing about it assumes LIFO patch order, so nested `if`/`while`
/// constructs may hold several at once.
#[derive(Debug)]
pub struct PendingJump {
    addr: usize,
    patched: bool,
}

impl PendingJump {
    /// The reserved code index, for callers that need to compute a
    /// relative target before patching (none currently do, all jumps in
    /// this language are absolute, but the index is still useful for
    /// diagnostics).
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Abandons this handle without writing a patch, suppressing the
    /// drop-time assertion. For callers unwinding past an unpatched
    /// jump on a genuine fatal error (e.g. a nested `emit`/`reserve`
    /// hitting `CodegenError::CodeSegmentOverflow`), where the reserved
    /// slot will never be read again because compilation is aborting.
    pub fn defuse(mut self) {
        self.patched = true;
    }
}

impl Drop for PendingJump {
    fn drop(&mut self) {
        debug_assert!(
            self.patched,
            "PendingJump at code[{}] was dropped without being backpatched",
            self.addr
        );
    }
}

/// Appends instructions to a bounded code segment and tracks the data
/// segment's final size via the symbol table (spec.md §2, "~35% of
/// core").
pub struct CodeGenerator {
    code: Vec<Instruction>,
    code_size: usize,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        CodeGenerator::new()
    }
}

impl CodeGenerator {
    pub fn new() -> CodeGenerator {
        CodeGenerator::with_code_size(CODE_SIZE)
    }

    /// Same as [`Self::new`], but with a caller-chosen bound instead of
    /// spec.md §5's default `CODE_SIZE`. `yaflc`'s `--code-size` flag
    /// uses this.
    pub fn with_code_size(code_size: usize) -> CodeGenerator {
        CodeGenerator {
            code: Vec::with_capacity(code_size),
            code_size,
        }
    }

    /// Current write cursor. Also usable directly as a jump target for
    /// backwards branches (loop tops), spec.md's `current_label()`.
    pub fn current_label(&self) -> u32 {
        self.code.len() as u32
    }

    /// Writes `(op, arg)` at the cursor and advances it.
    pub fn emit(&mut self, op: Opcode, arg: i32) -> Result<(), CodegenError> {
        if self.code.len() >= self.code_size {
            return Err(CodegenError::CodeSegmentOverflow(self.code_size));
        }
        trace!("emit[{}] = {:?} {}", self.code.len(), op, arg);
        self.code.push(Instruction::new(op, arg));
        Ok(())
    }

    /// Reserves one slot for a later [`backpatch`](Self::backpatch).
    pub fn reserve(&mut self) -> Result<PendingJump, CodegenError> {
        if self.code.len() >= self.code_size {
            return Err(CodegenError::CodeSegmentOverflow(self.code_size));
        }
        let addr = self.code.len();
        self.code.push(Instruction::default());
        Ok(PendingJump {
            addr,
            patched: false,
        })
    }

    /// Overwrites the slot held by `jump` with `(op, arg)`. Consumes the
    /// handle, satisfying its drop-time assertion.
    pub fn backpatch(&mut self, mut jump: PendingJump, op: Opcode, arg: i32) {
        debug!("backpatch[{}] = {:?} {}", jump.addr, op, arg);
        self.code[jump.addr] = Instruction::new(op, arg);
        jump.patched = true;
    }

    /// Looks `name` up in `symtab`; on success emits `(op, offset)`. Used
    /// for `Store`, `LdVar`, `InputInt`, which all take a data offset as
    /// their argument (spec.md §4.2, "context_emit").
    pub fn context_emit(
        &mut self,
        symtab: &SymbolTable,
        op: Opcode,
        name: &str,
    ) -> Result<(), ContextEmitError> {
        let symbol = symtab.lookup(name).map_err(ContextEmitError::Diagnostic)?;
        self.emit(op, symbol.offset as i32)
            .map_err(ContextEmitError::Codegen)
    }

    /// Emits the program prologue: `DATA n`, where `n` is the symbol
    /// table's final variable count. Called once, after declarations and
    /// before the first statement (spec.md §4.2, "Program
    /// prologue/epilogue").
    pub fn emit_prologue(&mut self, symtab: &SymbolTable) -> Result<(), CodegenError> {
        self.emit(Opcode::Data, symtab.len() as i32)
    }

    /// Emits the program epilogue: `HALT`. Called once, after the final
    /// statement.
    pub fn emit_epilogue(&mut self) -> Result<(), CodegenError> {
        self.emit(Opcode::Halt, 0)
    }

    /// The emitted code segment, ready for [`crate::vm::VirtualMachine`].
    pub fn into_code(self) -> Vec<Instruction> {
        self.code
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    /// Renders the code segment as `idx: mnemonic arg` lines, mirroring
    /// the reference interpreter's `print_code()` debug dump
    /// (`original_source/src/data-code-generator.h`).
    pub fn disassemble(&self) -> String {
        render(&self.code)
    }
}

/// Renders an already-emitted code segment as `idx: mnemonic arg` lines.
/// Used by [`CodeGenerator::disassemble`] and by callers (`yaflc`'s
/// `--disassemble` flag) that only have the finished `Vec<Instruction>`,
/// not the generator that produced it.
pub fn render(code: &[Instruction]) -> String {
    let mut out = String::new();
    for (i, instr) in code.iter().enumerate() {
        out.push_str(&format!("{:>4}: {:<14} {}\n", i, instr.op.0.name(), instr.arg));
    }
    out
}

/// Error from [`CodeGenerator::context_emit`]: either the identifier was
/// undefined (recoverable) or the code segment is full (fatal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextEmitError {
    Diagnostic(Diagnostic),
    Codegen(CodegenError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prologue_then_epilogue() {
        let mut gen = CodeGenerator::new();
        let mut symtab = SymbolTable::new();
        symtab.install("x").unwrap();
        symtab.install("y").unwrap();

        gen.emit_prologue(&symtab).unwrap();
        gen.emit_epilogue().unwrap();

        let code = gen.into_code();
        assert_eq!(code[0], Instruction::new(Opcode::Data, 2));
        assert_eq!(code[1], Instruction::new(Opcode::Halt, 0));
    }

    #[test]
    fn if_then_else_backpatch_protocol() {
        // x := 1; if x then output 1; else output 0;
        let mut gen = CodeGenerator::new();
        gen.emit(Opcode::LdVar, 0).unwrap(); // condition
        let to_else = gen.reserve().unwrap();
        gen.emit(Opcode::LdInt, 1).unwrap();
        gen.emit(Opcode::OutputInt, 0).unwrap();
        let to_end = gen.reserve().unwrap();
        let l_else = gen.current_label();
        gen.backpatch(to_else, Opcode::JmpFalse, l_else as i32);
        gen.emit(Opcode::LdInt, 0).unwrap();
        gen.emit(Opcode::OutputInt, 0).unwrap();
        let l_end = gen.current_label();
        gen.backpatch(to_end, Opcode::Goto, l_end as i32);

        let code = gen.into_code();
        assert_eq!(code[1], Instruction::new(Opcode::JmpFalse, 3));
        assert_eq!(code[4], Instruction::new(Opcode::Goto, 7));
        assert_eq!(code.len() as i32, l_end as i32 + 2);
    }

    #[test]
    fn while_do_backpatch_protocol() {
        let mut gen = CodeGenerator::new();
        let l_top = gen.current_label();
        gen.emit(Opcode::LdVar, 0).unwrap(); // condition
        let to_exit = gen.reserve().unwrap();
        gen.emit(Opcode::LdVar, 0).unwrap(); // body
        gen.emit(Opcode::Goto, l_top as i32).unwrap();
        let l_exit = gen.current_label();
        gen.backpatch(to_exit, Opcode::JmpFalse, l_exit as i32);

        let code = gen.into_code();
        assert_eq!(code[3], Instruction::new(Opcode::Goto, 0));
        assert_eq!(code[1], Instruction::new(Opcode::JmpFalse, 4));
    }

    #[test]
    fn context_emit_undefined_identifier() {
        let mut gen = CodeGenerator::new();
        let symtab = SymbolTable::new();
        let err = gen
            .context_emit(&symtab, Opcode::LdVar, "missing")
            .unwrap_err();
        assert_eq!(
            err,
            ContextEmitError::Diagnostic(Diagnostic::UndefinedIdentifier("missing".to_owned()))
        );
    }

    #[test]
    #[should_panic]
    fn unpatched_pending_jump_panics_on_drop() {
        let mut gen = CodeGenerator::new();
        let _jump = gen.reserve().unwrap();
        // dropped without a matching backpatch
    }

    #[test]
    fn code_segment_overflow_is_fatal() {
        let mut gen = CodeGenerator::new();
        for _ in 0..CODE_SIZE {
            gen.emit(Opcode::Halt, 0).unwrap();
        }
        assert_eq!(
            gen.emit(Opcode::Halt, 0).unwrap_err(),
            CodegenError::CodeSegmentOverflow(CODE_SIZE)
        );
    }

    use proptest::prelude::*;

    /// One step of a randomly nested if/while construct, built directly
    /// against the codegen API (spec.md §4.2's two backpatching
    /// protocols) rather than through a parsed program.
    #[derive(Clone, Debug)]
    enum Construct {
        If(Vec<Construct>, Vec<Construct>),
        While(Vec<Construct>),
        Leaf,
    }

    fn construct_strategy() -> impl Strategy<Value = Construct> {
        Just(Construct::Leaf).prop_recursive(4, 64, 3, |inner| {
            prop_oneof![
                3 => Just(Construct::Leaf),
                1 => (
                    proptest::collection::vec(inner.clone(), 0..3),
                    proptest::collection::vec(inner.clone(), 0..3),
                )
                    .prop_map(|(then_body, else_body)| Construct::If(then_body, else_body)),
                1 => proptest::collection::vec(inner, 0..3).prop_map(Construct::While),
            ]
            .boxed()
        })
    }

    fn emit_construct(gen: &mut CodeGenerator, construct: &Construct) {
        match construct {
            Construct::Leaf => {
                gen.emit(Opcode::LdInt, 0).unwrap();
            }
            Construct::If(then_body, else_body) => {
                gen.emit(Opcode::LdInt, 1).unwrap(); // condition
                let to_else = gen.reserve().unwrap();
                for c in then_body {
                    emit_construct(gen, c);
                }
                let to_end = gen.reserve().unwrap();
                let l_else = gen.current_label();
                gen.backpatch(to_else, Opcode::JmpFalse, l_else as i32);
                for c in else_body {
                    emit_construct(gen, c);
                }
                let l_end = gen.current_label();
                gen.backpatch(to_end, Opcode::Goto, l_end as i32);
            }
            Construct::While(body) => {
                let l_top = gen.current_label();
                gen.emit(Opcode::LdInt, 1).unwrap(); // condition
                let to_exit = gen.reserve().unwrap();
                for c in body {
                    emit_construct(gen, c);
                }
                gen.emit(Opcode::Goto, l_top as i32).unwrap();
                let l_exit = gen.current_label();
                gen.backpatch(to_exit, Opcode::JmpFalse, l_exit as i32);
            }
        }
    }

    proptest! {
        /// spec.md §8: "Backpatched targets always point at indices within
        /// `[0, code_offset]`; no `JMP_FALSE`/`GOTO` arg references an
        /// index beyond the final `HALT`."
        #[test]
        fn backpatch_targets_stay_in_range(top in construct_strategy()) {
            let mut gen = CodeGenerator::new();
            emit_construct(&mut gen, &top);
            gen.emit_epilogue().unwrap();
            let code = gen.into_code();

            for instr in &code {
                if matches!(instr.op.0, Opcode::JmpFalse | Opcode::Goto) {
                    prop_assert!(instr.arg >= 0 && (instr.arg as usize) <= code.len());
                }
            }
            prop_assert_eq!(code.last().unwrap().op.0, Opcode::Halt);
        }
    }

    /// Net stack-height change of an emitted instruction sequence, using
    /// `Opcode::arity` for the binary/unary operators and the fixed
    /// effects of the remaining opcodes (spec.md §4.2, "Invariant
    /// (stack effect)").
    fn stack_effect(code: &[Instruction]) -> i32 {
        code.iter()
            .map(|instr| {
                if let Some(arity) = instr.op.0.arity() {
                    1 - arity as i32
                } else {
                    match instr.op.0 {
                        Opcode::LdInt | Opcode::LdVar => 1,
                        Opcode::Store | Opcode::JmpFalse | Opcode::OutputInt => -1,
                        Opcode::Halt | Opcode::Goto | Opcode::Data | Opcode::InputInt => 0,
                        op => unreachable!("opcode {:?} has no registered stack effect", op),
                    }
                }
            })
            .sum()
    }

    /// A randomly nested expression, built directly against the codegen
    /// API the way `Construct` above builds if/while bodies.
    #[derive(Clone, Debug)]
    enum Expr {
        Leaf,
        Unary(Box<Expr>),
        Binary(Box<Expr>, Box<Expr>),
    }

    fn expr_strategy() -> impl Strategy<Value = Expr> {
        Just(Expr::Leaf).prop_recursive(4, 64, 4, |inner| {
            prop_oneof![
                2 => Just(Expr::Leaf),
                1 => inner.clone().prop_map(|e| Expr::Unary(Box::new(e))),
                2 => (inner.clone(), inner).prop_map(|(lhs, rhs)| Expr::Binary(Box::new(lhs), Box::new(rhs))),
            ]
            .boxed()
        })
    }

    fn emit_expr(gen: &mut CodeGenerator, expr: &Expr) {
        match expr {
            Expr::Leaf => {
                gen.emit(Opcode::LdVar, 0).unwrap();
            }
            Expr::Unary(inner) => {
                emit_expr(gen, inner);
                gen.emit(Opcode::UMinus, 0).unwrap();
            }
            Expr::Binary(lhs, rhs) => {
                emit_expr(gen, lhs);
                emit_expr(gen, rhs);
                gen.emit(Opcode::Add, 0).unwrap();
            }
        }
    }

    proptest! {
        /// spec.md §8: "For any well-typed expression, the emitted
        /// instruction sequence has net stack effect +1."
        #[test]
        fn expression_stack_effect_is_one(expr in expr_strategy()) {
            let mut gen = CodeGenerator::new();
            emit_expr(&mut gen, &expr);
            prop_assert_eq!(stack_effect(gen.code()), 1);
        }

        /// spec.md §8: "for any statement, net stack effect 0", here an
        /// assignment statement: expression (+1) followed by `Store` (-1).
        #[test]
        fn assignment_statement_stack_effect_is_zero(expr in expr_strategy()) {
            let mut gen = CodeGenerator::new();
            emit_expr(&mut gen, &expr);
            gen.emit(Opcode::Store, 0).unwrap();
            prop_assert_eq!(stack_effect(gen.code()), 0);
        }
    }
}
