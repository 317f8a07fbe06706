//! Host-installed callables observing and overriding calls.
//!
//! Two mechanisms share the registry:
//!
//! - **Keyed intrinsics** replace the object a symbol resolves to. Keys are
//!   `pkg.Name` for package symbols (full import path), `(T).Method` /
//!   `(*T).Method` for methods on a concrete type, and `(pkg.Iface).Method`
//!   for interface methods, all with the qualified display name of the type.
//! - The **default intrinsic** is a catch-all observer invoked on every
//!   call with `[callee, args...]` before the callee is descended into.
//!   Call-graph tools live here.

use std::{fmt, rc::Rc};

use ahash::AHashMap;

use crate::{ast::Pos, object::Object};

/// Read-only call-site information handed to intrinsic handlers.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Import path of the package whose code contains the call site.
    pub caller_pkg: Option<String>,
    /// Call stack depth at the call site.
    pub depth: usize,
    pub pos: Pos,
}

/// A keyed intrinsic handler. Returning `None` means "observed, no
/// replacement result" and the engine produces a placeholder.
#[derive(Clone)]
pub struct IntrinsicFn(Rc<dyn Fn(&CallContext, &[Object]) -> Option<Object>>);

impl IntrinsicFn {
    pub fn new(f: impl Fn(&CallContext, &[Object]) -> Option<Object> + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &CallContext, args: &[Object]) -> Option<Object> {
        (self.0)(ctx, args)
    }
}

impl fmt::Debug for IntrinsicFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntrinsicFn(..)")
    }
}

/// The catch-all call observer.
pub type DefaultIntrinsic = Rc<dyn Fn(&CallContext, &[Object])>;

/// Registry of keyed intrinsics plus the optional default intrinsic.
#[derive(Default)]
pub struct IntrinsicRegistry {
    keyed: AHashMap<String, IntrinsicFn>,
    default: Option<DefaultIntrinsic>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a handler for one symbol key, replacing any previous one.
    pub fn register(&mut self, key: impl Into<String>, f: impl Fn(&CallContext, &[Object]) -> Option<Object> + 'static) {
        self.keyed.insert(key.into(), IntrinsicFn::new(f));
    }

    /// Installs the catch-all handler invoked on every call.
    pub fn register_default(&mut self, f: impl Fn(&CallContext, &[Object]) + 'static) {
        self.default = Some(Rc::new(f));
    }

    pub fn lookup(&self, key: &str) -> Option<IntrinsicFn> {
        self.keyed.get(key).cloned()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Fires the default intrinsic with `[callee, args...]`.
    pub fn fire_default(&self, ctx: &CallContext, callee_and_args: &[Object]) {
        if let Some(handler) = &self.default {
            handler(ctx, callee_and_args);
        }
    }
}

impl fmt::Debug for IntrinsicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrinsicRegistry")
            .field("keys", &self.keyed.len())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// `pkg.Name` key for a package-level symbol; `pkg_path` is the import path.
pub fn pkg_key(pkg_path: &str, name: &str) -> String {
    format!("{pkg_path}.{name}")
}

/// `(T).Method` or `(*T).Method` key; `type_name` is the qualified display
/// name (`main.Dog`).
pub fn method_key(type_name: &str, pointer: bool, method: &str) -> String {
    if pointer {
        format!("(*{type_name}).{method}")
    } else {
        format!("({type_name}).{method}")
    }
}

/// `(pkg.Iface).Method` key for an interface method.
pub fn iface_method_key(iface_name: &str, method: &str) -> String {
    format!("({iface_name}).{method}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_forms() {
        assert_eq!(pkg_key("example.com/m/db", "Open"), "example.com/m/db.Open");
        assert_eq!(method_key("main.Dog", false, "Speak"), "(main.Dog).Speak");
        assert_eq!(method_key("main.Dog", true, "Speak"), "(*main.Dog).Speak");
        assert_eq!(iface_method_key("main.Speaker", "Speak"), "(main.Speaker).Speak");
    }

    #[test]
    fn keyed_lookup_and_call() {
        let mut reg = IntrinsicRegistry::new();
        reg.register("p.F", |_, args| Some(Object::int(args.len() as i64)));
        let f = reg.lookup("p.F").unwrap();
        let got = f.call(&CallContext::default(), &[Object::nil()]).unwrap();
        assert_eq!(got.as_int(), Some(1));
        assert!(reg.lookup("p.G").is_none());
    }
}
