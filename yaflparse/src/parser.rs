use pest_derive::Parser;

/// Pest-generated parser for `grammar.pest`, mirroring how the teacher's
/// `vasm` crate derives its own `VASMParser` from a grammar file (the
/// grammar source itself was not retained in the pack, but the
/// `pest`/`pest_derive` dependency pair and the `Rule`-keyed error type
/// it produces are, see `vasm/src/error.rs`).
#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct LangParser;
