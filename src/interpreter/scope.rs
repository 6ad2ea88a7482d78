//! The identifier scope stack.
//!
//! A stack of name tables. The bottom level is the global scope and is never
//! popped; a new level is pushed for every function activation. Lookup
//! deliberately consults only the innermost and the global level: the
//! language has a two-level visibility model, so names in intermediate
//! activations are not reachable.

use std::collections::HashMap;

#[derive(Debug)]
pub(crate) struct ScopeStack<T> {
    levels: Vec<HashMap<String, T>>,
}

impl<T> ScopeStack<T> {
    pub(crate) fn new() -> Self {
        Self {
            levels: vec![HashMap::new()],
        }
    }

    pub(crate) fn push_level(&mut self) {
        self.levels.push(HashMap::new());
    }

    pub(crate) fn pop_level(&mut self) {
        debug_assert!(self.levels.len() > 1, "global scope must never be popped");
        if self.levels.len() > 1 {
            self.levels.pop();
        }
    }

    /// Add a name to the innermost level. Returns false if the name is
    /// already declared there (shadowing an outer name is fine).
    pub(crate) fn declare(&mut self, name: &str, binding: T) -> bool {
        let innermost = match self.levels.last_mut() {
            Some(level) => level,
            None => return false,
        };
        if innermost.contains_key(name) {
            return false;
        }
        innermost.insert(name.to_string(), binding);
        true
    }

    /// Add or replace a name in the innermost level.
    pub(crate) fn insert(&mut self, name: &str, binding: T) {
        if let Some(innermost) = self.levels.last_mut() {
            innermost.insert(name.to_string(), binding);
        }
    }

    /// Innermost level first, then the global level. Levels in between are
    /// intentionally skipped.
    pub(crate) fn lookup(&self, name: &str) -> Option<&T> {
        if let Some(binding) = self.levels.last().and_then(|level| level.get(name)) {
            return Some(binding);
        }
        if self.levels.len() > 1 {
            return self.levels.first().and_then(|level| level.get(name));
        }
        None
    }

    pub(crate) fn lookup_mut(&mut self, name: &str) -> Option<&mut T> {
        let in_innermost = self
            .levels
            .last()
            .map(|level| level.contains_key(name))
            .unwrap_or(false);
        if in_innermost {
            return self.levels.last_mut().and_then(|level| level.get_mut(name));
        }
        if self.levels.len() > 1 {
            return self
                .levels
                .first_mut()
                .and_then(|level| level.get_mut(name));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_rejects_duplicates_in_same_level_only() {
        let mut scopes: ScopeStack<i32> = ScopeStack::new();
        assert!(scopes.declare("x", 1));
        assert!(!scopes.declare("x", 2));
        scopes.push_level();
        assert!(scopes.declare("x", 3));
    }

    #[test]
    fn lookup_skips_intermediate_levels() {
        let mut scopes: ScopeStack<i32> = ScopeStack::new();
        scopes.declare("global", 1);
        scopes.push_level();
        scopes.declare("middle", 2);
        scopes.push_level();
        scopes.declare("local", 3);

        assert_eq!(scopes.lookup("local"), Some(&3));
        assert_eq!(scopes.lookup("global"), Some(&1));
        assert_eq!(scopes.lookup("middle"), None);
    }

    #[test]
    fn innermost_shadows_global() {
        let mut scopes: ScopeStack<i32> = ScopeStack::new();
        scopes.declare("x", 1);
        scopes.push_level();
        scopes.declare("x", 2);
        assert_eq!(scopes.lookup("x"), Some(&2));
        scopes.pop_level();
        assert_eq!(scopes.lookup("x"), Some(&1));
    }

    #[test]
    fn pop_restores_previous_level() {
        let mut scopes: ScopeStack<i32> = ScopeStack::new();
        scopes.push_level();
        scopes.declare("temp", 1);
        scopes.pop_level();
        assert_eq!(scopes.lookup("temp"), None);
    }
}
