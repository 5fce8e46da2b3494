/// Size of the code segment, in instructions. Matches the reference
/// interpreter's `CODE_SIZE` (`original_source/src/virtual-machine.h`).
pub const CODE_SIZE: usize = 999;

/// Size of the run-time value stack, in slots. Matches the reference
/// interpreter's `STCK_SIZE`. The lower `data_offset` slots of this
/// stack double as the data segment (spec.md §3, "Data segment").
pub const STCK_SIZE: usize = 999;

/// Number of opcodes in the external bytecode encoding (spec.md §6).
pub const OPCODE_COUNT: usize = 30;

/// Mask applied to shift counts for `BINSHL`/`BINSHR` before shifting,
/// since Rust panics (debug) or gives an unspecified result (release)
/// on a shift count outside `0..32` for a 32-bit operand. The source
/// language does not specify this case (spec.md §9).
pub const SHIFT_MASK: u32 = 0b1_1111;
