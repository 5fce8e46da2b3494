use num_derive::{FromPrimitive, ToPrimitive};
use util::InteropGetName;
use util_derive::InteropGetName;

/// The bytecode instruction set (spec.md §6). Ordinal position is the
/// canonical external encoding, do not reorder variants.
#[derive(Clone, Copy, PartialEq, Eq, Debug, ToPrimitive, FromPrimitive, InteropGetName)]
pub enum Opcode {
    /// Terminates the fetch-decode-execute loop.
    Halt,
    /// `s[arg] = s[t--]`.
    Store,
    /// `if s[t--] == 0 { pc = arg }`.
    JmpFalse,
    /// `pc = arg`.
    Goto,
    /// `t += arg`; reserves the data segment at program start.
    Data,
    /// `s[++t] = arg`.
    LdInt,
    /// `s[++t] = s[ar + arg]`.
    LdVar,
    /// Reads a signed decimal integer from stdin into `s[ar + arg]`.
    InputInt,
    /// Writes `s[t--]` to stdout as a signed decimal.
    OutputInt,
    Or,
    And,
    Not,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    BinAnd,
    BinOr,
    BinXor,
    BinShl,
    BinShr,
    Add,
    Sub,
    Mod,
    Mul,
    Div,
    Pwr,
    UMinus,
}

impl Opcode {
    /// Mnemonic used by [`CodeGenerator::disassemble`](crate::codegen::CodeGenerator::disassemble),
    /// derived from the `InteropGetName` table (spec.md §9 design note
    /// mentions tagged-variant dispatch over raw integers; this reuses
    /// the same derive for the reverse direction, opcode -> name).
    pub fn name(self) -> &'static str {
        let bytes = self.interop_name();
        std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap_or("?")
    }

    /// Arity consumed from the stack by this opcode, for the stack-effect
    /// invariant of spec.md §4.2. `None` for opcodes whose stack effect
    /// is not a simple "consume n, produce one" (`Halt`, `Data`, `Store`,
    /// `JmpFalse`, `Goto`, `InputInt`, `OutputInt`, `LdInt`, `LdVar`);
    /// those are handled specially by callers that need this.
    pub fn arity(self) -> Option<u8> {
        use Opcode::*;
        match self {
            Not | UMinus => Some(1),
            Or | And | Lt | Le | Eq | Ne | Gt | Ge | BinAnd | BinOr | BinXor | BinShl | BinShr
            | Add | Sub | Mod | Mul | Div | Pwr => Some(2),
            Halt | Store | JmpFalse | Goto | Data | LdInt | LdVar | InputInt | OutputInt => None,
        }
    }
}

/// A single `(op, arg)` pair (spec.md §3, "Instruction").
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Instruction {
    pub op: OpSlot,
    pub arg: i32,
}

/// `Opcode` wrapped so an `Instruction` can have a cheap, well-defined
/// default (a reserved-but-unpatched slot reads as `Halt, 0` rather
/// than requiring an `Option` at every call site).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct OpSlot(pub Opcode);

impl Default for OpSlot {
    fn default() -> Self {
        OpSlot(Opcode::Halt)
    }
}

impl Instruction {
    pub fn new(op: Opcode, arg: i32) -> Instruction {
        Instruction {
            op: OpSlot(op),
            arg,
        }
    }
}
