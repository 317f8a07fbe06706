//! Lexically nested name bindings.
//!
//! Scopes form a persistent chain: every function body, branch arm, and
//! package gets a child scope whose `outer` pointer leads back to the
//! universe. Branch arms stay introspectable after evaluation so the join
//! pass can merge their local cells into the outer variable.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::object::Object;

pub type ScopeRef = Rc<Scope>;

/// One level of name bindings. Insertion order is preserved so traversals
/// over local cells (the branch join pass) are deterministic.
#[derive(Debug)]
pub struct Scope {
    vars: RefCell<IndexMap<String, Object>>,
    /// Names written here copy-on-write because the real binding lives in
    /// an outer scope. Only these participate in the branch join.
    shadows: RefCell<Vec<String>>,
    outer: Option<ScopeRef>,
}

impl Scope {
    /// A root scope with no parent (the universe).
    pub fn root() -> ScopeRef {
        Rc::new(Self {
            vars: RefCell::new(IndexMap::new()),
            shadows: RefCell::new(Vec::new()),
            outer: None,
        })
    }

    /// A child scope of `outer`.
    pub fn child(outer: &ScopeRef) -> ScopeRef {
        Rc::new(Self {
            vars: RefCell::new(IndexMap::new()),
            shadows: RefCell::new(Vec::new()),
            outer: Some(Rc::clone(outer)),
        })
    }

    pub fn outer(&self) -> Option<&ScopeRef> {
        self.outer.as_ref()
    }

    /// Looks `name` up through the scope chain.
    pub fn get(&self, name: &str) -> Option<Object> {
        if let Some(obj) = self.vars.borrow().get(name) {
            return Some(obj.clone());
        }
        self.outer.as_ref().and_then(|o| o.get(name))
    }

    /// Looks `name` up and also reports the scope that defines it, which
    /// assignment semantics need.
    pub fn get_with_scope(self: &Rc<Self>, name: &str) -> Option<(Object, ScopeRef)> {
        if let Some(obj) = self.vars.borrow().get(name) {
            return Some((obj.clone(), Rc::clone(self)));
        }
        self.outer.as_ref().and_then(|o| o.get_with_scope(name))
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn set_local(&self, name: impl Into<String>, obj: Object) {
        self.vars.borrow_mut().insert(name.into(), obj);
    }

    /// Writes `name` into the scope where it is defined. Returns false when
    /// no scope in the chain defines it.
    pub fn assign(&self, name: &str, obj: Object) -> bool {
        if self.vars.borrow().contains_key(name) {
            self.vars.borrow_mut().insert(name.to_string(), obj);
            return true;
        }
        match &self.outer {
            Some(outer) => outer.assign(name, obj),
            None => false,
        }
    }

    /// Whether this scope (not the chain) defines `name`.
    pub fn defines_locally(&self, name: &str) -> bool {
        self.vars.borrow().contains_key(name)
    }

    /// Whether any scope in the chain defines `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.defines_locally(name) || self.outer.as_ref().is_some_and(|o| o.defines(name))
    }

    /// Names bound directly in this scope, in insertion order.
    pub fn local_names(&self) -> Vec<String> {
        self.vars.borrow().keys().cloned().collect()
    }

    /// Marks `name` as a copy-on-write shadow of an outer binding.
    pub fn mark_shadow(&self, name: &str) {
        let mut shadows = self.shadows.borrow_mut();
        if !shadows.iter().any(|n| n == name) {
            shadows.push(name.to_string());
        }
    }

    /// Copy-on-write shadow names, in first-write order.
    pub fn shadow_names(&self) -> Vec<String> {
        self.shadows.borrow().clone()
    }

    /// The object bound directly in this scope, ignoring the chain.
    pub fn get_local(&self, name: &str) -> Option<Object> {
        self.vars.borrow().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_reads_through_to_outer() {
        let root = Scope::root();
        root.set_local("x", Object::int(1));
        let child = Scope::child(&root);
        assert_eq!(child.get("x").unwrap().as_int(), Some(1));
    }

    #[test]
    fn set_local_shadows_without_touching_outer() {
        let root = Scope::root();
        root.set_local("x", Object::int(1));
        let child = Scope::child(&root);
        child.set_local("x", Object::int(2));
        assert_eq!(child.get("x").unwrap().as_int(), Some(2));
        assert_eq!(root.get("x").unwrap().as_int(), Some(1));
    }

    #[test]
    fn assign_writes_the_defining_scope() {
        let root = Scope::root();
        root.set_local("x", Object::int(1));
        let child = Scope::child(&root);
        assert!(child.assign("x", Object::int(9)));
        assert_eq!(root.get("x").unwrap().as_int(), Some(9));
        assert!(!child.defines_locally("x"));
    }

    #[test]
    fn assign_fails_for_unknown_names() {
        let root = Scope::root();
        assert!(!root.assign("missing", Object::int(0)));
    }

    #[test]
    fn get_with_scope_reports_the_defining_level() {
        let root = Scope::root();
        root.set_local("x", Object::int(1));
        let child = Scope::child(&root);
        let (_, found_in) = child.get_with_scope("x").unwrap();
        assert!(Rc::ptr_eq(&found_in, &root));
    }
}
