//! Walks a parsed [`Pair<Rule>`] tree and drives [`CodeGenerator`] /
//! [`SymbolTable`], the role spec.md §1 assigns to "the (external)
//! parser": declarations first, then statements, operands before their
//! operator. Modeled on the teacher's `vasm::instructions::process_instruction`
//! (`vasm/src/instructions.rs`): match on `pair.as_rule()`, recurse over
//! `pair.into_inner()`.

use pest::iterators::Pair;

use yaflvm::codegen::CodeGenerator;
use yaflvm::diagnostics::{CodegenError, Diagnostic};
use yaflvm::opcode::{Instruction, Opcode};
use yaflvm::symtab::SymbolTable;

use crate::parser::Rule;

/// Owns the symbol table and code generator for one compilation
/// (spec.md §4.4 step 1: "reset S and G state"), plus the recoverable
/// diagnostics accumulated while walking the tree.
pub struct Compiler {
    symtab: SymbolTable,
    codegen: CodeGenerator,
    diagnostics: Vec<Diagnostic>,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            symtab: SymbolTable::new(),
            codegen: CodeGenerator::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Same as [`Self::new`], but with a caller-chosen code segment
    /// bound (`yaflc`'s `--code-size` flag).
    pub fn with_code_size(code_size: usize) -> Compiler {
        Compiler {
            symtab: SymbolTable::new(),
            codegen: CodeGenerator::with_code_size(code_size),
            diagnostics: Vec::new(),
        }
    }

    /// Compiles a fully parsed `program` pair. Returns the emitted code
    /// segment on success, or the fatal [`CodegenError`] that stopped
    /// codegen early. Recoverable diagnostics (undefined/duplicate
    /// identifier) are available via [`Self::diagnostics`] regardless of
    /// the `Result`: per spec.md §7, compilation does not execute when
    /// any are present, but the caller decides that; this method only
    /// stops early on the fatal kind.
    pub fn compile_program(mut self, program: Pair<Rule>) -> Result<CompileOutcome, CodegenError> {
        let mut pairs = program
            .into_inner()
            .filter(|pair| pair.as_rule() != Rule::EOI)
            .peekable();

        while pairs.peek().map(Pair::as_rule) == Some(Rule::decl) {
            self.compile_decl(pairs.next().unwrap());
        }

        self.codegen.emit_prologue(&self.symtab)?;

        for pair in pairs {
            self.compile_stmt(pair)?;
        }

        self.codegen.emit_epilogue()?;

        Ok(CompileOutcome {
            code: self.codegen.into_code(),
            diagnostics: self.diagnostics,
        })
    }

    fn compile_decl(&mut self, pair: Pair<Rule>) {
        let name = pair.into_inner().next().unwrap().as_str();
        if let Err(diagnostic) = self.symtab.install(name) {
            // Duplicate definition: skip the declaration, keep walking
            // (spec.md §4.1).
            self.diagnostics.push(diagnostic);
        }
    }

    fn compile_stmt(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let inner = pair.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::assign_stmt => self.compile_assign(inner),
            Rule::input_stmt => self.compile_input(inner),
            Rule::output_stmt => self.compile_output(inner),
            Rule::if_stmt => self.compile_if(inner),
            Rule::while_stmt => self.compile_while(inner),
            rule => unreachable!("unexpected statement rule {:?}", rule),
        }
    }

    fn compile_assign(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        let name = pairs.next().unwrap().as_str().to_owned();
        let expr = pairs.next().unwrap();
        self.compile_expr(expr)?;
        self.context_emit(Opcode::Store, &name)
    }

    fn compile_input(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let name = pair.into_inner().next().unwrap().as_str().to_owned();
        self.context_emit(Opcode::InputInt, &name)
    }

    fn compile_output(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let expr = pair.into_inner().next().unwrap();
        self.compile_expr(expr)?;
        self.codegen.emit(Opcode::OutputInt, 0)
    }

    /// `if` condition `then` stmt (`else` stmt)?, spec.md §4.2's
    /// if-then-else backpatching protocol, verbatim. A `to_else`/`to_end`
    /// handle stays live across the nested `compile_stmt` calls below; if
    /// one of those returns a fatal `CodegenError` (the code segment
    /// filled up mid-body), the still-unpatched handle is defused before
    /// the error propagates, rather than left to panic on drop.
    fn compile_if(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        let cond = pairs.next().unwrap();
        let then_stmt = pairs.next().unwrap();
        let else_stmt = pairs.next();

        self.compile_expr(cond)?;
        let to_else = self.codegen.reserve()?;

        if let Err(err) = self.compile_stmt(then_stmt) {
            to_else.defuse();
            return Err(err);
        }

        let to_end = match self.codegen.reserve() {
            Ok(jump) => jump,
            Err(err) => {
                to_else.defuse();
                return Err(err);
            }
        };

        let l_else = self.codegen.current_label();
        self.codegen.backpatch(to_else, Opcode::JmpFalse, l_else as i32);

        if let Some(else_stmt) = else_stmt {
            if let Err(err) = self.compile_stmt(else_stmt) {
                to_end.defuse();
                return Err(err);
            }
        }

        let l_end = self.codegen.current_label();
        self.codegen.backpatch(to_end, Opcode::Goto, l_end as i32);
        Ok(())
    }

    /// `while` condition `do` stmt* `end` `;`, spec.md §4.2's while-do
    /// backpatching protocol, verbatim. `to_exit` stays live across the
    /// body's `compile_stmt` calls and the trailing `emit`, both of which
    /// can fail with a fatal `CodegenError`; on that path the handle is
    /// defused before the error propagates, matching `compile_if` above.
    fn compile_while(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        let cond = pairs.next().unwrap();

        let l_top = self.codegen.current_label();
        self.compile_expr(cond)?;
        let to_exit = self.codegen.reserve()?;

        for body_stmt in pairs {
            if let Err(err) = self.compile_stmt(body_stmt) {
                to_exit.defuse();
                return Err(err);
            }
        }

        if let Err(err) = self.codegen.emit(Opcode::Goto, l_top as i32) {
            to_exit.defuse();
            return Err(err);
        }

        let l_exit = self.codegen.current_label();
        self.codegen.backpatch(to_exit, Opcode::JmpFalse, l_exit as i32);
        Ok(())
    }

    fn context_emit(&mut self, op: Opcode, name: &str) -> Result<(), CodegenError> {
        match self.codegen.context_emit(&self.symtab, op, name) {
            Ok(()) => Ok(()),
            Err(yaflvm::codegen::ContextEmitError::Diagnostic(diagnostic)) => {
                self.diagnostics.push(diagnostic);
                Ok(())
            }
            Err(yaflvm::codegen::ContextEmitError::Codegen(err)) => Err(err),
        }
    }

    /// Lowers `expr` to postfix/RPN form: operands before their operator,
    /// each leaving exactly one value on the stack (spec.md §4.2,
    /// "Expression lowering").
    fn compile_expr(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        // expr = { or_expr }
        self.compile_or(pair.into_inner().next().unwrap())
    }

    fn compile_or(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_and(pairs.next().unwrap())?;
        while pairs.next().is_some() {
            // consumed or_op; right operand follows
            self.compile_and(pairs.next().unwrap())?;
            self.codegen.emit(Opcode::Or, 0)?;
        }
        Ok(())
    }

    fn compile_and(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_not(pairs.next().unwrap())?;
        while pairs.next().is_some() {
            self.compile_not(pairs.next().unwrap())?;
            self.codegen.emit(Opcode::And, 0)?;
        }
        Ok(())
    }

    fn compile_not(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        let first = pairs.next().unwrap();
        if first.as_rule() == Rule::not_op {
            self.compile_not(pairs.next().unwrap())?;
            self.codegen.emit(Opcode::Not, 0)
        } else {
            self.compile_rel(first)
        }
    }

    fn compile_rel(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_bit(pairs.next().unwrap())?;
        if let Some(op) = pairs.next() {
            let rhs = pairs.next().unwrap();
            self.compile_bit(rhs)?;
            let opcode = match op.as_str() {
                "<=" => Opcode::Le,
                "<>" => Opcode::Ne,
                "<" => Opcode::Lt,
                ">=" => Opcode::Ge,
                ">" => Opcode::Gt,
                "=" => Opcode::Eq,
                other => unreachable!("unexpected relational operator {:?}", other),
            };
            self.codegen.emit(opcode, 0)?;
        }
        Ok(())
    }

    fn compile_bit(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_add(pairs.next().unwrap())?;
        while let Some(op) = pairs.next() {
            let rhs = pairs.next().unwrap();
            self.compile_add(rhs)?;
            let opcode = match op.as_str() {
                "<<" => Opcode::BinShl,
                ">>" => Opcode::BinShr,
                "&" => Opcode::BinAnd,
                "|" => Opcode::BinOr,
                "^" => Opcode::BinXor,
                other => unreachable!("unexpected bitwise operator {:?}", other),
            };
            self.codegen.emit(opcode, 0)?;
        }
        Ok(())
    }

    fn compile_add(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_mul(pairs.next().unwrap())?;
        while let Some(op) = pairs.next() {
            let rhs = pairs.next().unwrap();
            self.compile_mul(rhs)?;
            let opcode = match op.as_str() {
                "+" => Opcode::Add,
                "-" => Opcode::Sub,
                other => unreachable!("unexpected additive operator {:?}", other),
            };
            self.codegen.emit(opcode, 0)?;
        }
        Ok(())
    }

    fn compile_mul(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_pow(pairs.next().unwrap())?;
        while let Some(op) = pairs.next() {
            let rhs = pairs.next().unwrap();
            self.compile_pow(rhs)?;
            let opcode = match op.as_str() {
                "*" => Opcode::Mul,
                "/" => Opcode::Div,
                "%" => Opcode::Mod,
                other => unreachable!("unexpected multiplicative operator {:?}", other),
            };
            self.codegen.emit(opcode, 0)?;
        }
        Ok(())
    }

    fn compile_pow(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        self.compile_unary(pairs.next().unwrap())?;
        if let Some(_op) = pairs.next() {
            let rhs = pairs.next().unwrap();
            self.compile_unary(rhs)?;
            self.codegen.emit(Opcode::Pwr, 0)?;
        }
        Ok(())
    }

    fn compile_unary(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let mut pairs = pair.into_inner();
        let first = pairs.next().unwrap();
        if first.as_rule() == Rule::neg_op {
            self.compile_unary(pairs.next().unwrap())?;
            self.codegen.emit(Opcode::UMinus, 0)
        } else {
            self.compile_atom(first)
        }
    }

    fn compile_atom(&mut self, pair: Pair<Rule>) -> Result<(), CodegenError> {
        let inner = pair.into_inner().next().unwrap();
        match inner.as_rule() {
            Rule::number => {
                let value: i32 = inner.as_str().parse().unwrap_or(i32::MAX);
                self.codegen.emit(Opcode::LdInt, value)
            }
            Rule::ident => {
                let name = inner.as_str().to_owned();
                self.context_emit(Opcode::LdVar, &name)
            }
            Rule::expr => self.compile_expr(inner),
            rule => unreachable!("unexpected atom rule {:?}", rule),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

/// Result of a successful (fatal-error-free) codegen pass: the emitted
/// code segment plus any recoverable diagnostics gathered along the way.
pub struct CompileOutcome {
    pub code: Vec<Instruction>,
    pub diagnostics: Vec<Diagnostic>,
}
