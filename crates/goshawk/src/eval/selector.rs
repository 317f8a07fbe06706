//! Selector resolution `x.N`.
//!
//! The meaning of a selector branches on the static nature of the receiver:
//! interface variables record a call and produce a callable placeholder,
//! packages resolve top-level symbols, instances walk the accessor's method
//! and field search, and unresolved receivers degrade to placeholders so
//! the traversal always completes.

use std::rc::Rc;

use crate::{
    accessor::Lookup,
    ast::{Expr, Ident},
    error::EvalError,
    eval::{EvalResult, Evaluator},
    intrinsics::{iface_method_key, method_key, pkg_key},
    loader::PackageObj,
    object::{Object, Symbolic, Value},
    scan::{FieldType, FunctionInfo, MethodInfo, Scanner, TypeInfo},
    scope::ScopeRef,
    tracer::EngineTracer,
};

impl<S: Scanner, Tr: EngineTracer> Evaluator<S, Tr> {
    pub(crate) fn eval_selector(&mut self, x: &Expr, sel: &Ident, scope: &ScopeRef) -> EvalResult<Object> {
        let xv = self.eval_expr(x, scope)?;
        self.select_on(xv, sel)
    }

    pub(crate) fn select_on(&mut self, xv: Object, sel: &Ident) -> EvalResult<Object> {
        if let Value::Package(pkg) = &xv.value {
            let pkg = Rc::clone(pkg);
            return self.package_selector(&pkg, sel);
        }
        // A variable whose static type is an interface dispatches through
        // the interface path no matter what value currently sits in it,
        // including a typed nil.
        if xv.meta.is_interface() && !matches!(xv.value, Value::TypeRef(_)) {
            return Ok(self.interface_selector(&xv, sel));
        }
        match &xv.value {
            Value::Instance { .. } | Value::Pointer(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
            | Value::Bool(_) | Value::Slice(_) | Value::Map(_) | Value::Chan(_) | Value::Nil => {
                match receiver_type(&xv) {
                    Some((ti, is_ptr)) => self.concrete_selector(&xv, &ti, is_ptr, sel),
                    None if matches!(xv.value, Value::Nil) => Err(EvalError::UndefinedSelector {
                        receiver: "nil".to_string(),
                        name: sel.name.clone(),
                    }),
                    None => Ok(Object::symbolic(format!("selector {} on untyped value", sel.name))),
                }
            }
            Value::Struct(data) => {
                if let Some(found) = data.borrow().fields.get(&sel.name) {
                    return Ok(found.clone());
                }
                Ok(Object::symbolic(format!("field {}", sel.name)))
            }
            Value::Symbolic(_) => self.symbolic_selector(&xv, sel),
            Value::UnresolvedFunction { pkg_path, name } | Value::UnresolvedType { pkg_path, name } => Ok(
                Object::symbolic(format!("selector {} on unresolved {pkg_path}.{name}", sel.name)),
            ),
            Value::TypeRef(tr) => {
                // Method expressions `T.M` stay opaque.
                Ok(Object::symbolic(format!("method expression {}.{}", tr.display_name(), sel.name)))
            }
            _ => Err(EvalError::UndefinedSelector {
                receiver: xv.kind().to_string(),
                name: sel.name.clone(),
            }),
        }
    }

    /// Case 1: the receiver's static type is an interface.
    fn interface_selector(&mut self, xv: &Object, sel: &Ident) -> Object {
        let ti = xv
            .meta
            .type_info
            .clone()
            .expect("interface selector requires resolved type info");
        let log_key = format!("{}.{}", ti.qualified_name(), sel.name);
        self.log_interface_call(log_key);

        if ti.is_union() {
            return self.union_selector(xv, &ti, sel);
        }

        let key = iface_method_key(&ti.qualified_name(), &sel.name);
        if let Some(f) = self.intrinsics.lookup(&key) {
            self.tracer.on_intrinsic(&key);
            return Object::new(Value::Intrinsic(f));
        }

        if let crate::accessor::MethodSearch::Found { def, .. } = self.accessor.find_method_info(&ti, &sel.name) {
            return iface_callable(xv, &method_info_of(&def));
        }

        // The interface does not declare this method: invent one, cache it,
        // and keep going.
        let cache_key = format!("{}.{}", ti.qualified_name(), sel.name);
        let synthetic = self
            .synthetic_methods
            .entry(cache_key)
            .or_insert_with(|| Rc::new(MethodInfo::unknown(sel.name.clone())));
        iface_callable(xv, &Rc::clone(synthetic))
    }

    /// A constraint-union interface: every member type's concrete method is
    /// surfaced to the default intrinsic, in declaration order, before the
    /// placeholder result is produced.
    fn union_selector(&mut self, xv: &Object, ti: &Rc<TypeInfo>, sel: &Ident) -> Object {
        let terms: Vec<FieldType> = ti.union_terms.clone();
        for term in &terms {
            let Some(term_ti) = self.resolver.resolve_type_without_policy_check(term) else {
                continue;
            };
            let mut recv = Object::symbolic(format!("union member {}", term_ti.qualified_name()))
                .with_field_type(term.clone());
            recv.meta.type_info = Some(Rc::clone(&term_ti));
            if let Lookup::Found(bound) = self.accessor.find_method(&self.store, &term_ti, &sel.name, &recv) {
                let ctx = self.call_context(sel.pos);
                self.intrinsics.fire_default(&ctx, &[bound]);
            }
        }
        let mi = ti
            .methods
            .iter()
            .find(|m| m.name == sel.name)
            .cloned()
            .unwrap_or_else(|| Rc::new(MethodInfo::unknown(sel.name.clone())));
        iface_callable(xv, &mi)
    }

    /// Case 3: a package object.
    fn package_selector(&mut self, pkg: &Rc<PackageObj>, sel: &Ident) -> EvalResult<Object> {
        self.populate_package(pkg);
        let key = pkg_key(&pkg.path, &sel.name);
        if let Some(f) = self.intrinsics.lookup(&key) {
            self.tracer.on_intrinsic(&key);
            return Ok(Object::new(Value::Intrinsic(f)));
        }
        if let Some(obj) = pkg.scope.get_local(&sel.name) {
            return self.force_var(obj);
        }
        // Out-of-scope or unscanned symbol: produce a callable stand-in so
        // call-graph analysis still records the edge.
        Ok(Object::new(Value::UnresolvedFunction {
            pkg_path: pkg.path.clone(),
            name: sel.name.clone(),
        }))
    }

    /// Cases 4 and 5: instances, pointers, typed nils, and named basic
    /// values. Keyed intrinsics are consulted in both pointer and value
    /// forms, then methods, then fields.
    fn concrete_selector(&mut self, xv: &Object, ti: &Rc<TypeInfo>, is_ptr: bool, sel: &Ident) -> EvalResult<Object> {
        let qualified = ti.qualified_name();
        let key_order = [
            method_key(&qualified, is_ptr, &sel.name),
            method_key(&qualified, !is_ptr, &sel.name),
        ];
        for key in &key_order {
            if let Some(f) = self.intrinsics.lookup(key) {
                self.tracer.on_intrinsic(key);
                return Ok(Object::new(Value::Intrinsic(f)));
            }
        }

        let method_unresolved = match self.accessor.find_method(&self.store, ti, &sel.name, xv) {
            Lookup::Found(obj) => return Ok(obj),
            Lookup::UnresolvedEmbedded => true,
            Lookup::Missing => false,
        };
        match self.accessor.find_field(ti, &sel.name, xv) {
            Lookup::Found(obj) => {
                // Prefer the stored field value when the receiver carries
                // concrete struct data.
                if let Some(stored) = stored_field(xv, &sel.name) {
                    return Ok(stored);
                }
                Ok(obj)
            }
            Lookup::UnresolvedEmbedded if method_unresolved => Ok(Object::new(Value::AmbiguousSelector {
                type_name: qualified,
                sel: sel.name.clone(),
            })),
            Lookup::UnresolvedEmbedded => Ok(Object::symbolic(format!(
                "selector {} through unresolved embedding of {qualified}",
                sel.name
            ))),
            Lookup::Missing if method_unresolved => Ok(Object::symbolic(format!(
                "selector {} through unresolved embedding of {qualified}",
                sel.name
            ))),
            Lookup::Missing => Err(EvalError::UndefinedSelector {
                receiver: qualified,
                name: sel.name.clone(),
            }),
        }
    }

    /// Case 6 (and struct-typed placeholders): selection on a symbolic
    /// receiver. Field lookup runs first, then methods; misses degrade to
    /// further placeholders rather than errors.
    fn symbolic_selector(&mut self, xv: &Object, sel: &Ident) -> EvalResult<Object> {
        let Some(ti) = xv.meta.type_info.clone() else {
            return Ok(Object::symbolic(format!("selector {} on symbolic value", sel.name)));
        };
        if let Lookup::Found(obj) = self.accessor.find_field(&ti, &sel.name, xv) {
            return Ok(obj);
        }
        if let Lookup::Found(obj) = self.accessor.find_method(&self.store, &ti, &sel.name, xv) {
            return Ok(obj);
        }
        Ok(Object::symbolic(format!(
            "selector {} on symbolic {}",
            sel.name,
            ti.qualified_name()
        )))
    }
}

/// The resolved type record of a concrete receiver, looking through
/// pointers, plus whether the receiver was a pointer.
fn receiver_type(xv: &Object) -> Option<(Rc<TypeInfo>, bool)> {
    match &xv.value {
        Value::Pointer(pointee) => {
            let ti = pointee
                .meta
                .type_info
                .clone()
                .or_else(|| xv.meta.type_info.clone())?;
            Some((ti, true))
        }
        _ => {
            let is_ptr = matches!(xv.meta.field_type.as_deref(), Some(FieldType::Pointer(_)));
            xv.meta.type_info.clone().map(|ti| (ti, is_ptr))
        }
    }
}

/// The concrete value stored in the receiver's struct data, when there is
/// one. The accessor's symbolic answer is the fallback.
fn stored_field(xv: &Object, name: &str) -> Option<Object> {
    match &xv.value {
        Value::Struct(data) => data.borrow().fields.get(name).cloned(),
        Value::Instance { underlying, .. } => stored_field(underlying, name),
        Value::Pointer(pointee) => stored_field(pointee, name),
        _ => None,
    }
}

/// A callable placeholder for a pending interface method call.
fn iface_callable(receiver: &Object, mi: &Rc<MethodInfo>) -> Object {
    let sym = Symbolic {
        reason: format!("interface method {}", mi.name),
        receiver: Some(Box::new(receiver.clone())),
        underlying_func: Some(Rc::clone(mi)),
        possible_types: Default::default(),
    };
    let signature = FieldType::Func {
        params: mi.params.iter().map(|p| p.ty.clone()).collect(),
        results: mi.results.iter().map(|r| r.ty.clone()).collect(),
    };
    Object::new(Value::Symbolic(Box::new(sym))).with_field_type(signature)
}

/// Projects a declaration record down to the method signature carried on
/// interface-call placeholders.
fn method_info_of(def: &Rc<FunctionInfo>) -> Rc<MethodInfo> {
    Rc::new(MethodInfo {
        name: def.name.clone(),
        params: def.params.clone(),
        results: def.results.clone(),
        variadic: def.variadic,
    })
}
