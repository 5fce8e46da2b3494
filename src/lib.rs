//! Symbol table, code generator and stack virtual machine for a small
//! imperative toy language (spec.md §1–§2).
//!
//! This crate has no lexer or parser of its own; those are external
//! collaborators (spec.md §1) that drive [`symtab::SymbolTable`] and
//! [`codegen::CodeGenerator`] in grammar order, then hand the finished
//! code segment to [`vm::VirtualMachine`]. See the `yaflparse` crate for
//! the parser that plays that role, and `yaflc` for the command-line
//! front-end that ties everything together (spec.md §4.4).

pub mod codegen;
pub mod constants;
pub mod diagnostics;
pub mod opcode;
pub mod symtab;
pub mod vm;

pub use codegen::CodeGenerator;
pub use opcode::{Instruction, Opcode};
pub use symtab::SymbolTable;
pub use vm::VirtualMachine;
