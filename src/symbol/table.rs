use crate::symbol::Symbol;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Default, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct ScopeId(u32);

impl ScopeId {
    /// Scope of the predefined bindings (`true`, `false`, the intrinsics).
    pub const PREDEFINED: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Scope {
    id: ScopeId,
    undo_len: usize,
}

/// Nested lexical scopes mapping names to values of type `T`.
///
/// Every binding remembers the scope it was made in. Leaving a scope rolls
/// back all bindings made since it was entered, so a lookup always sees the
/// innermost live binding, and the predefined scope only when nothing shadows
/// it.
pub struct SymbolTable<T> {
    map: HashMap<Symbol, Vec<(ScopeId, T)>>,
    changes: Vec<Symbol>,
    scopes: Vec<Scope>,
    next_id: u32,
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            changes: vec![],
            scopes: vec![Scope {
                id: ScopeId::PREDEFINED,
                undo_len: 0,
            }],
            next_id: 1,
        }
    }
}

impl<T: Copy> SymbolTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> ScopeId {
        self.scopes.last().map(|s| s.id).unwrap_or(ScopeId::PREDEFINED)
    }

    pub fn enter_scope(&mut self) -> ScopeId {
        let id = ScopeId(self.next_id);
        self.next_id += 1;
        self.scopes.push(Scope {
            id,
            undo_len: self.changes.len(),
        });
        id
    }

    pub fn leave_scope(&mut self) {
        // The predefined scope is never left.
        if self.scopes.len() <= 1 {
            return;
        }
        if let Some(scope) = self.scopes.pop() {
            self.rollback(scope.undo_len);
        }
    }

    /// Binds `key` in the current scope. Fails with the existing value if the
    /// name is already bound in this exact scope.
    pub fn insert(&mut self, key: Symbol, value: T) -> Result<(), T> {
        let scope = self.current();
        let bindings = self.map.entry(key).or_insert_with(Vec::new);
        if let Some(&(s, existing)) = bindings.last() {
            if s == scope {
                return Err(existing);
            }
        }
        bindings.push((scope, value));
        self.changes.push(key);
        Ok(())
    }

    pub fn get(&self, key: Symbol) -> Option<T> {
        self.map
            .get(&key)
            .and_then(|bindings| bindings.last())
            .map(|&(_, v)| v)
    }

    pub fn is_declared_in_current(&self, key: Symbol) -> bool {
        let scope = self.current();
        self.map
            .get(&key)
            .and_then(|bindings| bindings.last())
            .map_or(false, |&(s, _)| s == scope)
    }

    fn rollback(&mut self, undo_len: usize) {
        while self.changes.len() > undo_len {
            if let Some(key) = self.changes.pop() {
                if let Some(bindings) = self.map.get_mut(&key) {
                    bindings.pop();
                    if bindings.is_empty() {
                        self.map.remove(&key);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_shadows_and_disappears() {
        let mut table = SymbolTable::new();
        let x = Symbol::intern("x");
        table.enter_scope();
        table.insert(x, 1).unwrap();
        table.enter_scope();
        assert!(!table.is_declared_in_current(x));
        table.insert(x, 2).unwrap();
        assert_eq!(table.get(x), Some(2));
        table.leave_scope();
        assert_eq!(table.get(x), Some(1));
        table.leave_scope();
        assert_eq!(table.get(x), None);
    }

    #[test]
    fn same_scope_redeclaration_is_rejected() {
        let mut table = SymbolTable::new();
        let x = Symbol::intern("x");
        table.enter_scope();
        table.insert(x, 1).unwrap();
        assert_eq!(table.insert(x, 2), Err(1));
        assert_eq!(table.get(x), Some(1));
    }

    #[test]
    fn predefined_is_the_fallback() {
        let mut table = SymbolTable::new();
        let t = Symbol::intern("true");
        table.insert(t, 0).unwrap();
        let outer = table.enter_scope();
        assert_eq!(table.get(t), Some(0));
        table.insert(t, 7).unwrap();
        assert_eq!(table.get(t), Some(7));
        assert_ne!(outer, ScopeId::PREDEFINED);
    }

    #[test]
    fn scope_ids_increase() {
        let mut table = SymbolTable::<u8>::new();
        let a = table.enter_scope();
        table.leave_scope();
        let b = table.enter_scope();
        assert!(b > a);
    }
}
