//! Type and function resolution.
//!
//! The resolver turns syntactic [`FieldType`]s into semantic [`TypeInfo`]
//! records and declaration records into shared [`Function`] objects. It is
//! where the scan policy bites: the default `resolve_type` refuses to look
//! inside out-of-policy packages, while the `_without_policy_check`
//! variants are reserved for the two deliberate bypass points (assignment
//! target typing and return-value placeholder construction) plus symbolic
//! field production.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::Rc,
};

use ahash::AHashMap;
use tracing::trace;

use crate::{
    loader::PackageObj,
    object::{Function, Object},
    scan::{FieldInfo, FieldType, FunctionInfo, Scanner, TypeInfo},
};

/// Predicate deciding which packages are analyzed deeply.
pub type ScanPolicy = Rc<dyn Fn(&str) -> bool>;

/// Cache key for function objects: package path, receiver base type (empty
/// for plain functions), function name.
type FuncKey = (String, String, String);

pub struct Resolver<S: Scanner> {
    scanner: Rc<S>,
    policy: ScanPolicy,
    basics: RefCell<AHashMap<String, Rc<TypeInfo>>>,
    functions: RefCell<AHashMap<FuncKey, Rc<Function>>>,
    next_fn_id: Cell<u64>,
}

impl<S: Scanner> Resolver<S> {
    pub fn new(scanner: Rc<S>, policy: ScanPolicy) -> Self {
        Self {
            scanner,
            policy,
            basics: RefCell::new(AHashMap::new()),
            functions: RefCell::new(AHashMap::new()),
            next_fn_id: Cell::new(1),
        }
    }

    /// Whether `pkg_path` is inside the analysis scope. The universe
    /// (empty path) is always in scope.
    pub fn scan_policy(&self, pkg_path: &str) -> bool {
        pkg_path.is_empty() || (self.policy)(pkg_path)
    }

    /// A fresh identity for a function object created outside the
    /// declaration cache (function literals, cloned bound functions keep
    /// the original id instead).
    pub fn fresh_fn_id(&self) -> u64 {
        let id = self.next_fn_id.get();
        self.next_fn_id.set(id + 1);
        id
    }

    /// Resolves the named type at the base of `ft`, honoring the scan
    /// policy: out-of-policy packages yield `None`.
    pub fn resolve_type(&self, ft: &FieldType) -> Option<Rc<TypeInfo>> {
        let (pkg_path, name) = ft.base_named()?;
        if !self.scan_policy(pkg_path) {
            trace!(pkg_path, name, "type resolution blocked by scan policy");
            return None;
        }
        self.lookup_named(pkg_path, name)
    }

    /// Policy-bypassing variant of [`Self::resolve_type`]. Used for
    /// assignment target typing and for typing the placeholder results of
    /// out-of-policy callees.
    pub fn resolve_type_without_policy_check(&self, ft: &FieldType) -> Option<Rc<TypeInfo>> {
        let (pkg_path, name) = ft.base_named()?;
        self.lookup_named(pkg_path, name)
    }

    /// The scan record for `pkg_path`, bypassing the policy. Scan failures
    /// degrade to `None`; the caller decides whether that is an error.
    pub fn scan_package(&self, pkg_path: &str) -> Option<Rc<crate::scan::PackageInfo>> {
        self.scanner.scan_package(pkg_path).ok()
    }

    fn lookup_named(&self, pkg_path: &str, name: &str) -> Option<Rc<TypeInfo>> {
        if pkg_path.is_empty() {
            let mut basics = self.basics.borrow_mut();
            let entry = basics
                .entry(name.to_string())
                .or_insert_with(|| Rc::new(TypeInfo::basic(name)));
            return Some(Rc::clone(entry));
        }
        let info = self.scanner.scan_package(pkg_path).ok()?;
        info.type_named(name).cloned()
    }

    /// The shared function object for a declaration. One object exists per
    /// `(package, receiver type, name)` for the engine's lifetime.
    pub fn resolve_function(&self, pkg: &Rc<PackageObj>, def: &Rc<FunctionInfo>) -> Rc<Function> {
        let key: FuncKey = (
            pkg.path.clone(),
            def.receiver_base_name().unwrap_or_default().to_string(),
            def.name.clone(),
        );
        if let Some(found) = self.functions.borrow().get(&key) {
            return Rc::clone(found);
        }
        let func = Rc::new(Function {
            id: self.fresh_fn_id(),
            name: Some(def.name.clone()),
            params: def.params.clone(),
            results: def.results.clone(),
            variadic: def.variadic,
            body: def.body.clone(),
            scope: Rc::clone(&pkg.scope),
            pkg: Some(Rc::clone(pkg)),
            def: Some(Rc::clone(def)),
            bound_stack: None,
        });
        self.functions.borrow_mut().insert(key, Rc::clone(&func));
        func
    }

    /// A symbolic value standing for a struct field access, typed by the
    /// field's declaration. Policy-checked: the semantic record is omitted
    /// when the field's type lives out of policy.
    pub fn resolve_symbolic_field(&self, field: &FieldInfo, receiver: Option<&Object>) -> Object {
        let type_info = self.resolve_type(&field.ty);
        self.symbolic_field(field, receiver, type_info)
    }

    /// Policy-bypassing variant of [`Self::resolve_symbolic_field`].
    pub fn resolve_symbolic_field_without_policy_check(&self, field: &FieldInfo, receiver: Option<&Object>) -> Object {
        let type_info = self.resolve_type_without_policy_check(&field.ty);
        self.symbolic_field(field, receiver, type_info)
    }

    fn symbolic_field(&self, field: &FieldInfo, receiver: Option<&Object>, type_info: Option<Rc<TypeInfo>>) -> Object {
        let reason = match receiver.and_then(Object::qualified_type_name) {
            Some(recv) => format!("field {}.{}", recv, field.name),
            None => format!("field {}", field.name),
        };
        let mut obj = Object::symbolic(reason).with_field_type(field.ty.clone());
        obj.meta.type_info = type_info;
        obj
    }
}

impl<S: Scanner> fmt::Debug for Resolver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("cached_functions", &self.functions.borrow().len())
            .finish()
    }
}
