use super::Symbol;
use std::{cell::RefCell, collections::HashMap};

/// Owns the text of every symbol made on the current thread.
#[derive(Default)]
pub struct Interner {
    ids: HashMap<String, Symbol>,
    texts: Vec<String>,
}

impl Interner {
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.ids.get(s) {
            return sym;
        }
        let sym = Symbol(self.texts.len() as u32);
        self.texts.push(s.to_owned());
        self.ids.insert(s.to_owned(), sym);
        sym
    }

    pub fn text(&self, sym: Symbol) -> &str {
        &self.texts[sym.0 as usize]
    }
}

thread_local! {
    static INTERNER: RefCell<Interner> = RefCell::new(Interner::default());
}

pub fn with<T>(f: impl FnOnce(&mut Interner) -> T) -> T {
    INTERNER.with(|i| f(&mut *i.borrow_mut()))
}
