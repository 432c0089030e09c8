//! Fresh synthetic names.
//!
//! Every name the back half invents goes through a [`FreshNames`] keyed by
//! the scope that will hold it. Synthetic names always contain a `$`, which
//! source identifiers in this tree never do, so a per-scope counter is
//! enough to keep them apart.

use rustc_hash::FxHashMap;

use cinder_symtab::SymbolId;

/// What a numbered name is for. Each purpose counts independently.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Access method numbers within a top-level class.
    Access,
}

#[derive(Debug, Default)]
pub struct FreshNames {
    numbers: FxHashMap<(SymbolId, Purpose), u32>,
    names: FxHashMap<(SymbolId, String), u32>,
}

impl FreshNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next number for `purpose` in `scope`, starting at 0.
    pub fn next(&mut self, scope: SymbolId, purpose: Purpose) -> u32 {
        let slot = self.numbers.entry((scope, purpose)).or_insert(0);
        let n = *slot;
        *slot += 1;
        n
    }

    /// `base` the first time it is asked for in `scope`, then `base1`,
    /// `base2` and so on.
    pub fn name(&mut self, scope: SymbolId, base: &str) -> String {
        let slot = self.names.entry((scope, base.to_string())).or_insert(0);
        let n = *slot;
        *slot += 1;
        if n == 0 {
            base.to_string()
        } else {
            format!("{}{}", base, n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_count_per_scope_and_purpose() {
        let mut fresh = FreshNames::new();
        let (a, b) = (SymbolId(1), SymbolId(2));
        assert_eq!(fresh.next(a, Purpose::Access), 0);
        assert_eq!(fresh.next(a, Purpose::Access), 1);
        assert_eq!(fresh.next(b, Purpose::Access), 0);
    }

    #[test]
    fn names_are_suffixed_after_first_use() {
        let mut fresh = FreshNames::new();
        let m = SymbolId(7);
        assert_eq!(fresh.name(m, "i$"), "i$");
        assert_eq!(fresh.name(m, "i$"), "i$1");
        assert_eq!(fresh.name(m, "arr$"), "arr$");
        assert_eq!(fresh.name(SymbolId(8), "i$"), "i$");
    }
}
