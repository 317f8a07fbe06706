//! Field and method lookup on a type.
//!
//! Searches recurse through embedded fields and embedded interfaces with a
//! visited set keyed by `(package path, type name)`: qualified names, not
//! pointer identity, so shared records across packages still detect cycles.
//! Method hits become bound methods pairing the shared function object with
//! the receiver; the function itself is never mutated.

use std::rc::Rc;

use ahash::AHashSet;

use crate::{
    ast::Pos,
    loader::PackageStore,
    object::{Function, Object, Value},
    resolver::Resolver,
    scan::{FieldInfo, FieldType, FunctionInfo, MethodInfo, Scanner, TypeInfo, TypeKind},
};

/// Outcome of a field or method lookup.
#[derive(Debug)]
pub enum Lookup {
    Found(Object),
    Missing,
    /// An embedded type could not be resolved, so the search is
    /// inconclusive rather than negative.
    UnresolvedEmbedded,
}

/// Outcome of a method-record search, before any object is built.
#[derive(Debug)]
pub enum MethodSearch {
    Found {
        def: Rc<FunctionInfo>,
        /// Import path of the package declaring the method.
        owner: String,
    },
    Missing,
    Unresolved,
}

enum FieldSearch {
    Found(FieldInfo),
    Missing,
    Unresolved,
}

type Visited = AHashSet<(String, String)>;

pub struct Accessor<S: Scanner> {
    resolver: Rc<Resolver<S>>,
}

impl<S: Scanner> Accessor<S> {
    pub fn new(resolver: Rc<Resolver<S>>) -> Self {
        Self { resolver }
    }

    /// Looks up a (possibly promoted) struct field and produces its
    /// symbolic value.
    pub fn find_field(&self, ti: &Rc<TypeInfo>, name: &str, receiver: &Object) -> Lookup {
        let mut visited = Visited::new();
        match self.field_search(ti, name, &mut visited) {
            FieldSearch::Found(field) => Lookup::Found(self.resolver.resolve_symbolic_field(&field, Some(receiver))),
            FieldSearch::Missing => Lookup::Missing,
            FieldSearch::Unresolved => Lookup::UnresolvedEmbedded,
        }
    }

    fn field_search(&self, ti: &Rc<TypeInfo>, name: &str, visited: &mut Visited) -> FieldSearch {
        if !visited.insert((ti.pkg_path.clone(), ti.name.clone())) {
            return FieldSearch::Missing;
        }
        // Named types with a struct underlying carry no fields themselves.
        if ti.kind == TypeKind::Named
            && let Some(underlying) = &ti.underlying
        {
            return match self.resolver.resolve_type_without_policy_check(underlying) {
                Some(under) => self.field_search(&under, name, visited),
                None => FieldSearch::Unresolved,
            };
        }
        for field in &ti.fields {
            if !field.embedded && field.name == name {
                return FieldSearch::Found(field.clone());
            }
        }
        let mut unresolved = false;
        for field in ti.fields.iter().filter(|f| f.embedded) {
            // The embedded field itself is promoted under its base name.
            if field.name == name {
                return FieldSearch::Found(field.clone());
            }
            match self.resolver.resolve_type_without_policy_check(&field.ty) {
                Some(embedded) => match self.field_search(&embedded, name, visited) {
                    found @ FieldSearch::Found(_) => return found,
                    FieldSearch::Unresolved => unresolved = true,
                    FieldSearch::Missing => {}
                },
                None => unresolved = true,
            }
        }
        if unresolved {
            FieldSearch::Unresolved
        } else {
            FieldSearch::Missing
        }
    }

    /// Finds the method record for `name` on `ti`, walking interface
    /// embeddings and struct embeddings as needed.
    pub fn find_method_info(&self, ti: &Rc<TypeInfo>, name: &str) -> MethodSearch {
        let mut visited = Visited::new();
        self.method_search(ti, name, &mut visited)
    }

    fn method_search(&self, ti: &Rc<TypeInfo>, name: &str, visited: &mut Visited) -> MethodSearch {
        if !visited.insert((ti.pkg_path.clone(), ti.name.clone())) {
            return MethodSearch::Missing;
        }
        if ti.is_interface() {
            return self.interface_method_search(ti, name, visited);
        }

        // Concrete type: scan the owning package's functions for a matching
        // receiver base name. The policy gates descending into foreign
        // packages' method sets.
        if !ti.pkg_path.is_empty() {
            if !self.resolver.scan_policy(&ti.pkg_path) {
                return MethodSearch::Unresolved;
            }
            if let Some(def) = self
                .resolver
                .scan_package(&ti.pkg_path)
                .and_then(|info| info.method(&ti.name, name).cloned())
            {
                return MethodSearch::Found {
                    def,
                    owner: ti.pkg_path.clone(),
                };
            }
        }

        // Promoted methods through embedded fields, pointer-dereferenced as
        // needed by base_named resolution.
        let mut unresolved = false;
        for field in ti.fields.iter().filter(|f| f.embedded) {
            match self.resolver.resolve_type_without_policy_check(&field.ty) {
                Some(embedded) => match self.method_search(&embedded, name, visited) {
                    found @ MethodSearch::Found { .. } => return found,
                    MethodSearch::Unresolved => unresolved = true,
                    MethodSearch::Missing => {}
                },
                None => unresolved = true,
            }
        }
        if unresolved {
            MethodSearch::Unresolved
        } else {
            MethodSearch::Missing
        }
    }

    fn interface_method_search(&self, ti: &Rc<TypeInfo>, name: &str, visited: &mut Visited) -> MethodSearch {
        if let Some(method) = ti.methods.iter().find(|m| m.name == name) {
            return MethodSearch::Found {
                def: Rc::new(synthesize_interface_method(ti, method)),
                owner: ti.pkg_path.clone(),
            };
        }
        let mut unresolved = false;
        for embed in &ti.embeds {
            match self.resolver.resolve_type_without_policy_check(embed) {
                Some(embedded) => match self.method_search(&embedded, name, visited) {
                    found @ MethodSearch::Found { .. } => return found,
                    MethodSearch::Unresolved => unresolved = true,
                    MethodSearch::Missing => {}
                },
                None => unresolved = true,
            }
        }
        if unresolved {
            MethodSearch::Unresolved
        } else {
            MethodSearch::Missing
        }
    }

    /// Resolves a method and binds it to `receiver`.
    pub fn find_method(&self, store: &PackageStore<S>, ti: &Rc<TypeInfo>, name: &str, receiver: &Object) -> Lookup {
        match self.find_method_info(ti, name) {
            MethodSearch::Found { def, owner } => {
                let pkg = store.load_or_shell(&owner);
                let func = self.resolver.resolve_function(&pkg, &def);
                Lookup::Found(bind_method(func, receiver))
            }
            MethodSearch::Missing => Lookup::Missing,
            MethodSearch::Unresolved => Lookup::UnresolvedEmbedded,
        }
    }
}

/// Builds a bound method object. The signature's type metadata is copied
/// onto the bound method so callers can type the call without reaching
/// through to the function.
pub fn bind_method(func: Rc<Function>, receiver: &Object) -> Object {
    let signature = FieldType::Func {
        params: func.params.iter().map(|p| p.ty.clone()).collect(),
        results: func.results.iter().map(|r| r.ty.clone()).collect(),
    };
    Object::new(Value::BoundMethod {
        func,
        receiver: Box::new(receiver.clone()),
    })
    .with_field_type(signature)
}

/// A function record for an interface method: the receiver is the
/// interface itself and there is no body.
fn synthesize_interface_method(iface: &TypeInfo, method: &MethodInfo) -> FunctionInfo {
    FunctionInfo {
        name: method.name.clone(),
        receiver: Some(FieldInfo::new(
            String::new(),
            FieldType::named(iface.pkg_path.clone(), iface.name.clone()),
        )),
        params: method.params.clone(),
        results: method.results.clone(),
        variadic: method.variadic,
        body: None,
        pos: Pos::default(),
    }
}
