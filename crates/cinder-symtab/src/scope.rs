//! Ordered, shadowing-aware symbol containers.

use rustc_hash::FxHashMap;

use crate::symbol::SymbolId;

/// A scope: symbols in entry order, indexed by name.
///
/// Lookup by name yields the most recently entered symbol first, so a later
/// entry shadows an earlier one of the same name.
#[derive(Clone, Debug, Default)]
pub struct Scope {
    order: Vec<SymbolId>,
    by_name: FxHashMap<String, Vec<SymbolId>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, name: &str, sym: SymbolId) {
        self.order.push(sym);
        self.by_name.entry(name.to_string()).or_default().push(sym);
    }

    /// Enter unless the symbol is already present.
    pub fn enter_if_absent(&mut self, name: &str, sym: SymbolId) {
        if !self.contains(sym) {
            self.enter(name, sym);
        }
    }

    pub fn remove(&mut self, name: &str, sym: SymbolId) {
        self.order.retain(|s| *s != sym);
        if let Some(entries) = self.by_name.get_mut(name) {
            entries.retain(|s| *s != sym);
        }
    }

    /// All symbols named `name`, innermost (latest) first.
    pub fn lookup<'a>(&'a self, name: &str) -> impl Iterator<Item = SymbolId> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flat_map(|entries| entries.iter().rev().copied())
    }

    pub fn first(&self, name: &str) -> Option<SymbolId> {
        self.lookup(name).next()
    }

    pub fn contains(&self, sym: SymbolId) -> bool {
        self.order.contains(&sym)
    }

    /// All symbols in entry order.
    pub fn iter(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_entries_shadow_earlier() {
        let mut scope = Scope::new();
        scope.enter("x", SymbolId(1));
        scope.enter("y", SymbolId(2));
        scope.enter("x", SymbolId(3));
        let xs: Vec<_> = scope.lookup("x").collect();
        assert_eq!(xs, vec![SymbolId(3), SymbolId(1)]);
        assert_eq!(scope.first("y"), Some(SymbolId(2)));
        assert_eq!(scope.first("z"), None);
    }

    #[test]
    fn iteration_keeps_entry_order() {
        let mut scope = Scope::new();
        scope.enter("b", SymbolId(7));
        scope.enter("a", SymbolId(4));
        scope.enter_if_absent("b", SymbolId(7));
        assert_eq!(scope.iter().collect::<Vec<_>>(), vec![SymbolId(7), SymbolId(4)]);
    }

    #[test]
    fn remove_drops_from_both_indexes() {
        let mut scope = Scope::new();
        scope.enter("m", SymbolId(1));
        scope.enter("m", SymbolId(2));
        scope.remove("m", SymbolId(2));
        assert_eq!(scope.first("m"), Some(SymbolId(1)));
        assert_eq!(scope.len(), 1);
    }
}
