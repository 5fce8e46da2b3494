//! Symbol table (S), spec.md §4.1.
//!
//! The reference interpreter (`original_source/src/symbol-table.h`) is a
//! singly linked list searched front-to-back; per spec.md §9 ("Linked-list
//! symbol table → map") this is a direct port to a hash map keyed by name,
//! since insertion order is not semantically observable. Offsets are
//! still dense, starting at 0, assigned in installation order.

use std::collections::HashMap;

use crate::diagnostics::Diagnostic;

/// A single symbol record (spec.md §3, "Symbol record").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub offset: u32,
}

/// Flat, single-scope symbol table (spec.md §2, "~15% of core").
#[derive(Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    data_offset: u32,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Installs `name` if absent, allocating the next data offset.
    /// Returns the new symbol's offset, or the duplicate-definition
    /// diagnostic if `name` is already installed.
    pub fn install(&mut self, name: &str) -> Result<u32, Diagnostic> {
        if self.symbols.contains_key(name) {
            return Err(Diagnostic::DuplicateIdentifier(name.to_owned()));
        }

        let offset = self.data_location();
        self.symbols.insert(
            name.to_owned(),
            Symbol {
                name: name.to_owned(),
                offset,
            },
        );
        Ok(offset)
    }

    /// Looks up `name`, returning its record or an undefined-identifier
    /// diagnostic.
    pub fn lookup(&self, name: &str) -> Result<&Symbol, Diagnostic> {
        self.symbols
            .get(name)
            .ok_or_else(|| Diagnostic::UndefinedIdentifier(name.to_owned()))
    }

    /// Post-increments the data offset counter. Exposed so the code
    /// generator can emit the final `DATA n` prologue once declarations
    /// are done, independent of any particular `install` call.
    pub fn data_location(&mut self) -> u32 {
        let current = self.data_offset;
        self.data_offset += 1;
        current
    }

    /// Number of symbols installed so far, the `n` in the program's
    /// `DATA n` prologue instruction.
    pub fn len(&self) -> u32 {
        self.data_offset
    }

    pub fn is_empty(&self) -> bool {
        self.data_offset == 0
    }

    /// Releases all records. Idempotent.
    pub fn free_all(&mut self) {
        self.symbols.clear();
        self.data_offset = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn install_allocates_dense_offsets() {
        let mut table = SymbolTable::new();
        assert_eq!(table.install("x").unwrap(), 0);
        assert_eq!(table.install("y").unwrap(), 1);
        assert_eq!(table.install("z").unwrap(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn install_duplicate_fails() {
        let mut table = SymbolTable::new();
        table.install("x").unwrap();
        assert_eq!(
            table.install("x").unwrap_err(),
            Diagnostic::DuplicateIdentifier("x".to_owned())
        );
        // A rejected duplicate does not consume an offset.
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lookup_missing_fails() {
        let table = SymbolTable::new();
        assert_eq!(
            table.lookup("missing").unwrap_err(),
            Diagnostic::UndefinedIdentifier("missing".to_owned())
        );
    }

    #[test]
    fn lookup_found_returns_offset() {
        let mut table = SymbolTable::new();
        table.install("x").unwrap();
        table.install("y").unwrap();
        assert_eq!(table.lookup("y").unwrap().offset, 1);
    }

    #[test]
    fn free_all_resets_offsets() {
        let mut table = SymbolTable::new();
        table.install("x").unwrap();
        table.free_all();
        assert_eq!(table.len(), 0);
        assert_eq!(table.install("x").unwrap(), 0);
    }

    use proptest::collection::hash_set;
    use proptest::prelude::*;

    proptest! {
        /// spec.md §8: "Symbol table offsets form a contiguous prefix
        /// `[0, N)` with no duplicates."
        #[test]
        fn offsets_are_dense_and_unique(names in hash_set("[a-z][a-z0-9_]{0,7}", 1..20)) {
            let mut table = SymbolTable::new();
            let mut offsets: Vec<u32> = names
                .iter()
                .map(|name| table.install(name).unwrap())
                .collect();
            offsets.sort_unstable();

            let expected: Vec<u32> = (0..names.len() as u32).collect();
            prop_assert_eq!(offsets, expected);
            prop_assert_eq!(table.len(), names.len() as u32);
        }

        /// A duplicate `install` never allocates a new offset.
        #[test]
        fn duplicate_install_does_not_consume_an_offset(name in "[a-z][a-z0-9_]{0,7}") {
            let mut table = SymbolTable::new();
            table.install(&name).unwrap();
            let len_before = table.len();
            prop_assert!(table.install(&name).is_err());
            prop_assert_eq!(table.len(), len_before);
        }
    }
}
