//! Expression evaluation: identifiers, literals, operators, composites.

use std::rc::Rc;

use crate::{
    ast::{BinaryOp, CompositeElem, Expr, FuncLit, Ident, Pos, UnaryOp},
    error::EvalError,
    eval::{EvalResult, Evaluator, Frame},
    object::{Function, MapData, Object, SliceData, StructData, TypeRefObj, Value},
    scan::{FieldType, Scanner},
    scope::{Scope, ScopeRef},
    tracer::EngineTracer,
};

impl<S: Scanner, Tr: EngineTracer> Evaluator<S, Tr> {
    pub(crate) fn eval_expr(&mut self, expr: &Expr, scope: &ScopeRef) -> EvalResult<Object> {
        self.step()?;
        match expr {
            Expr::Ident(id) => self.eval_ident(id, scope),
            Expr::IntLit(v) => Ok(Object::int(*v)),
            Expr::FloatLit(v) => Ok(Object::float(*v)),
            Expr::StringLit(v) => Ok(Object::string(v.clone())),
            Expr::Selector { x, sel } => self.eval_selector(x, sel, scope),
            Expr::Call(call) => self.eval_call(call, scope),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, scope),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, scope),
            Expr::Index { x, index } => self.eval_index(x, index, scope),
            Expr::Slice { x, low, high } => self.eval_slice_expr(x, low.as_deref(), high.as_deref(), scope),
            Expr::Star(inner) => self.eval_star(inner, scope),
            Expr::Paren(inner) => self.eval_expr(inner, scope),
            Expr::Composite { ty, elems } => self.eval_composite(ty.as_ref(), elems, scope),
            Expr::FuncLit(lit) => Ok(self.eval_func_lit(lit, scope)),
            Expr::TypeAssert { x, ty } => self.eval_type_assert(x, ty.as_ref(), scope),
            Expr::TypeExpr(ft) => Ok(self.eval_type_expr(ft)),
        }
    }

    fn eval_ident(&mut self, id: &Ident, scope: &ScopeRef) -> EvalResult<Object> {
        if let Some(obj) = scope.get(&id.name) {
            return self.force_var(obj);
        }
        // A miss may just mean the current package's top level has not been
        // bound yet.
        if let Some(pkg) = self.current_pkg() {
            self.populate_package(&pkg);
            if let Some(obj) = scope.get(&id.name) {
                return self.force_var(obj);
            }
            if let Some(obj) = pkg.scope.get_local(&id.name) {
                return self.force_var(obj);
            }
            // An import's short name resolves to the package object, loaded
            // on demand (bypassing the scan policy) and cached in the
            // package scope.
            if let Some(path) = pkg.info().and_then(|info| info.imports.get(&id.name).cloned()) {
                let target = self.load_package_or_shell(&path);
                let obj = Object::new(Value::Package(target));
                pkg.scope.set_local(id.name.clone(), obj.clone());
                return Ok(obj);
            }
        }
        Err(EvalError::UndefinedIdentifier {
            name: id.name.clone(),
            pos: id.pos,
        })
    }

    /// Reads through a variable cell, evaluating a package-level
    /// initializer on first access. Once `is_evaluated` is set the
    /// initializer never runs again.
    pub(crate) fn force_var(&mut self, obj: Object) -> EvalResult<Object> {
        let Value::Var(cell) = &obj.value else {
            return Ok(obj);
        };
        let cell = Rc::clone(cell);
        let pending = {
            let borrow = cell.borrow();
            if borrow.is_evaluated {
                None
            } else {
                Some((borrow.initializer.clone(), borrow.pkg.clone(), borrow.name.clone()))
            }
        };
        if let Some((init, pkg, name)) = pending {
            // Mark first so a self-referential initializer terminates.
            cell.borrow_mut().is_evaluated = true;
            if let Some(init) = init {
                let init_scope = match &pkg {
                    Some(p) => Scope::child(&p.scope),
                    None => Scope::child(&self.universe),
                };
                self.call_stack.push(Frame {
                    name: format!("init {name}"),
                    fn_id: None,
                    pkg,
                    pos: Pos::default(),
                    recovers: false,
                    result_names: Vec::new(),
                });
                let res = self.eval_expr(&init, &init_scope);
                self.call_stack.pop();
                cell.borrow_mut().value = res?;
            }
        }
        let mut value = cell.borrow().value.clone();
        // The binding's declared type governs when the value is untyped.
        if value.meta.field_type.is_none() {
            value.meta.field_type = obj.meta.field_type.clone();
        }
        if value.meta.type_info.is_none() {
            value.meta.type_info = obj.meta.type_info.clone();
        }
        Ok(value)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: &ScopeRef) -> EvalResult<Object> {
        let v = self.eval_expr(operand, scope)?;
        match op {
            UnaryOp::Addr => {
                let ft = v.meta.field_type.as_deref().cloned().map(FieldType::pointer);
                let mut ptr = Object::new(Value::Pointer(Box::new(v)));
                if let Some(ft) = ft {
                    ptr = ptr.with_field_type(ft);
                }
                Ok(ptr)
            }
            UnaryOp::Neg => match v.value {
                Value::Int(n) => Ok(Object::int(-n)),
                Value::Float(n) => Ok(Object::float(-n)),
                Value::Symbolic(_) => Ok(Object::symbolic("negated value").with_meta(v.meta.clone())),
                _ => Err(EvalError::KindMismatch {
                    op: "-".to_string(),
                    kind: v.kind(),
                }),
            },
            UnaryOp::Not => match v.value {
                Value::Bool(b) => Ok(Object::truth(!b)),
                Value::Symbolic(_) => Ok(Object::symbolic("negated condition").with_field_type(FieldType::basic("bool"))),
                _ => Err(EvalError::KindMismatch {
                    op: "!".to_string(),
                    kind: v.kind(),
                }),
            },
            UnaryOp::BitNot => match v.value {
                Value::Int(n) => Ok(Object::int(!n)),
                Value::Symbolic(_) => Ok(Object::symbolic("complemented value").with_meta(v.meta.clone())),
                _ => Err(EvalError::KindMismatch {
                    op: "^".to_string(),
                    kind: v.kind(),
                }),
            },
            UnaryOp::Recv => {
                let mut result = Object::symbolic("channel receive");
                match &v.value {
                    Value::Chan(data) => {
                        if let Some(elem) = &data.elem_type {
                            result = result.with_field_type(elem.clone());
                        }
                    }
                    _ => {
                        if let Some(FieldType::Chan(elem)) = v.meta.field_type.as_deref() {
                            result = result.with_field_type((**elem).clone());
                        }
                    }
                }
                Ok(result)
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, scope: &ScopeRef) -> EvalResult<Object> {
        // Both operands are always explored, even when the left side would
        // short-circuit at runtime: the analysis wants their call edges.
        let lv = self.eval_expr(left, scope)?;
        let rv = self.eval_expr(right, scope)?;
        match (&lv.value, &rv.value) {
            (Value::Int(a), Value::Int(b)) => int_binary(op, *a, *b),
            (Value::Float(a), Value::Float(b)) => float_binary(op, *a, *b),
            (Value::Str(a), Value::Str(b)) => str_binary(op, a, b),
            (Value::Bool(a), Value::Bool(b)) => bool_binary(op, *a, *b),
            (Value::Nil, Value::Nil) => match op {
                BinaryOp::Eq => Ok(Object::truth(true)),
                BinaryOp::Ne => Ok(Object::truth(false)),
                _ => Err(EvalError::KindMismatch {
                    op: format!("{op:?}"),
                    kind: "nil",
                }),
            },
            // Two concrete scalars of different kinds never compare or
            // combine in Go.
            (Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_),
             Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Bool(_)) => Err(EvalError::KindMismatch {
                op: format!("{op:?}"),
                kind: lv.kind(),
            }),
            _ => Ok(symbolic_binary(op, &lv, &rv)),
        }
    }

    fn eval_index(&mut self, x: &Expr, index: &Expr, scope: &ScopeRef) -> EvalResult<Object> {
        let xv = self.eval_expr(x, scope)?;
        let iv = self.eval_expr(index, scope)?;
        Ok(index_value(&xv, &iv))
    }

    fn eval_slice_expr(
        &mut self,
        x: &Expr,
        low: Option<&Expr>,
        high: Option<&Expr>,
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        let xv = self.eval_expr(x, scope)?;
        if let Some(e) = low {
            self.eval_expr(e, scope)?;
        }
        if let Some(e) = high {
            self.eval_expr(e, scope)?;
        }
        match xv.value {
            Value::Slice(_) | Value::Str(_) => Ok(xv),
            _ => {
                let meta = xv.meta.clone();
                Ok(Object::symbolic("sliced value").with_meta(meta))
            }
        }
    }

    fn eval_star(&mut self, inner: &Expr, scope: &ScopeRef) -> EvalResult<Object> {
        let v = self.eval_expr(inner, scope)?;
        match v.value {
            Value::Pointer(pointee) => {
                let pointee = *pointee;
                // A pointee can carry an unconsumed return marker when the
                // pointer came straight out of a call expression.
                if let Value::Return(ret) = pointee.value {
                    return Ok(ret.values.into_iter().next().unwrap_or_else(Object::nil));
                }
                Ok(pointee)
            }
            Value::Symbolic(_) => {
                let mut deref = Object::symbolic("dereferenced value");
                if let Some(FieldType::Pointer(elem)) = v.meta.field_type.as_deref() {
                    deref = deref.with_field_type((**elem).clone());
                    deref.meta.type_info = self.resolver.resolve_type_without_policy_check(elem);
                }
                Ok(deref)
            }
            _ => Ok(Object::symbolic("dereferenced value").with_meta(v.meta.clone())),
        }
    }

    fn eval_composite(
        &mut self,
        ty: Option<&FieldType>,
        elems: &[CompositeElem],
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        match ty {
            Some(ft @ FieldType::Slice(elem)) => {
                let mut items = Vec::with_capacity(elems.len());
                for el in elems {
                    let mut v = self.eval_expr(&el.value, scope)?;
                    if v.meta.field_type.is_none() {
                        v.meta.field_type = Some(Rc::new((**elem).clone()));
                    }
                    items.push(v);
                }
                let data = SliceData {
                    elems: items,
                    elem_type: Some((**elem).clone()),
                };
                Ok(Object::new(Value::Slice(Rc::new(std::cell::RefCell::new(data)))).with_field_type(ft.clone()))
            }
            Some(ft @ FieldType::Map(key_ty, value_ty)) => {
                let mut entries = Vec::with_capacity(elems.len());
                for el in elems {
                    let key = match &el.key {
                        Some(k) => self.eval_expr(k, scope)?,
                        None => Object::symbolic("map key"),
                    };
                    let mut value = self.eval_expr(&el.value, scope)?;
                    if value.meta.field_type.is_none() {
                        value.meta.field_type = Some(Rc::new((**value_ty).clone()));
                    }
                    entries.push((key, value));
                }
                let data = MapData {
                    entries,
                    key_type: Some((**key_ty).clone()),
                    value_type: Some((**value_ty).clone()),
                };
                Ok(Object::new(Value::Map(Rc::new(std::cell::RefCell::new(data)))).with_field_type(ft.clone()))
            }
            Some(ft @ FieldType::Named { .. }) => self.eval_named_composite(ft, elems, scope),
            Some(other) => Ok(Object::symbolic("composite literal").with_field_type(other.clone())),
            None => {
                let mut data = StructData::default();
                for (i, el) in elems.iter().enumerate() {
                    let name = composite_key_name(el, i);
                    let v = self.eval_expr(&el.value, scope)?;
                    data.fields.insert(name, v);
                }
                Ok(Object::new(Value::Struct(Rc::new(std::cell::RefCell::new(data)))))
            }
        }
    }

    fn eval_named_composite(
        &mut self,
        ft: &FieldType,
        elems: &[CompositeElem],
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        let ti = self.resolver.resolve_type_without_policy_check(ft);
        let mut data = StructData::default();
        for (i, el) in elems.iter().enumerate() {
            let name = match &el.key {
                Some(Expr::Ident(id)) => id.name.clone(),
                Some(_) | None => ti
                    .as_ref()
                    .and_then(|t| t.fields.get(i))
                    .map_or_else(|| format!("{i}"), |f| f.name.clone()),
            };
            let mut v = self.eval_expr(&el.value, scope)?;
            if v.meta.field_type.is_none()
                && let Some(t) = &ti
                && let Some(field) = t.fields.iter().find(|f| f.name == name)
            {
                v.meta.field_type = Some(Rc::new(field.ty.clone()));
            }
            data.fields.insert(name, v);
        }
        let type_name = ti.as_ref().map_or_else(|| ft.to_string(), |t| t.qualified_name());
        let underlying = Object::new(Value::Struct(Rc::new(std::cell::RefCell::new(data))));
        let mut obj = Object::new(Value::Instance {
            type_name,
            underlying: Box::new(underlying),
        })
        .with_field_type(ft.clone());
        obj.meta.type_info = ti;
        Ok(obj)
    }

    pub(crate) fn eval_func_lit(&mut self, lit: &Rc<FuncLit>, scope: &ScopeRef) -> Object {
        let func = Function {
            id: self.resolver.fresh_fn_id(),
            name: None,
            params: lit.params.clone(),
            results: lit.results.clone(),
            variadic: lit.variadic,
            body: Some(Rc::clone(&lit.body)),
            scope: Rc::clone(scope),
            pkg: self.current_pkg(),
            def: None,
            bound_stack: None,
        };
        let signature = FieldType::Func {
            params: lit.params.iter().map(|p| p.ty.clone()).collect(),
            results: lit.results.iter().map(|r| r.ty.clone()).collect(),
        };
        Object::new(Value::Func(Rc::new(func))).with_field_type(signature)
    }

    fn eval_type_assert(&mut self, x: &Expr, ty: Option<&FieldType>, scope: &ScopeRef) -> EvalResult<Object> {
        let xv = self.eval_expr(x, scope)?;
        let Some(ft) = ty else {
            // `x.(type)` inside a type switch guard: the switch statement
            // does the per-case binding.
            return Ok(xv);
        };
        let ti = self.resolver.resolve_type_without_policy_check(ft);
        if let Some(t) = &ti
            && xv.qualified_type_name().as_deref() == Some(t.qualified_name().as_str())
        {
            return Ok(xv);
        }
        let mut result = Object::symbolic("type assertion").with_field_type(ft.clone());
        result.meta.type_info = ti;
        Ok(result)
    }

    pub(crate) fn eval_type_expr(&mut self, ft: &FieldType) -> Object {
        match ft {
            FieldType::Named { pkg_path, name } => match self.resolver.resolve_type_without_policy_check(ft) {
                Some(info) => Object::new(Value::TypeRef(TypeRefObj {
                    info: Some(info),
                    ft: Some(Rc::new(ft.clone())),
                })),
                None => Object::new(Value::UnresolvedType {
                    pkg_path: pkg_path.clone(),
                    name: name.clone(),
                })
                .with_field_type(ft.clone()),
            },
            _ => Object::new(Value::TypeRef(TypeRefObj {
                info: None,
                ft: Some(Rc::new(ft.clone())),
            })),
        }
    }
}

fn composite_key_name(el: &CompositeElem, index: usize) -> String {
    match &el.key {
        Some(Expr::Ident(id)) => id.name.clone(),
        _ => format!("{index}"),
    }
}

/// Element access on a container, concrete when statically knowable.
fn index_value(container: &Object, index: &Object) -> Object {
    match &container.value {
        Value::Slice(data) => {
            let borrow = data.borrow();
            if let Some(i) = index.as_int()
                && let Ok(i) = usize::try_from(i)
                && i < borrow.elems.len()
            {
                return borrow.elems[i].clone();
            }
            let mut elem = Object::symbolic("slice element");
            if let Some(ft) = &borrow.elem_type {
                elem = elem.with_field_type(ft.clone());
            }
            elem
        }
        Value::Map(data) => {
            let mut value = Object::symbolic("map access");
            if let Some(ft) = &data.borrow().value_type {
                value = value.with_field_type(ft.clone());
            }
            value
        }
        Value::Str(s) => {
            if let Some(i) = index.as_int()
                && let Ok(i) = usize::try_from(i)
                && i < s.len()
            {
                return Object::int(i64::from(s.as_bytes()[i]));
            }
            Object::symbolic("string index").with_field_type(FieldType::basic("byte"))
        }
        Value::Instance { underlying, .. } => index_value(underlying, index),
        Value::Pointer(pointee) => index_value(pointee, index),
        _ => {
            let mut elem = Object::symbolic("indexed value");
            match container.meta.field_type.as_deref() {
                Some(FieldType::Slice(e)) => elem = elem.with_field_type((**e).clone()),
                Some(FieldType::Map(_, v)) => elem = elem.with_field_type((**v).clone()),
                _ => {}
            }
            elem
        }
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> EvalResult<Object> {
    let obj = match op {
        BinaryOp::Add => Object::int(a.wrapping_add(b)),
        BinaryOp::Sub => Object::int(a.wrapping_sub(b)),
        BinaryOp::Mul => Object::int(a.wrapping_mul(b)),
        // Division by a concrete zero would panic at runtime; the analysis
        // degrades to a typed placeholder instead of dying.
        BinaryOp::Div if b == 0 => Object::symbolic("division by zero").with_field_type(FieldType::basic("int")),
        BinaryOp::Div => Object::int(a.wrapping_div(b)),
        BinaryOp::Rem if b == 0 => Object::symbolic("division by zero").with_field_type(FieldType::basic("int")),
        BinaryOp::Rem => Object::int(a.wrapping_rem(b)),
        BinaryOp::Eq => Object::truth(a == b),
        BinaryOp::Ne => Object::truth(a != b),
        BinaryOp::Lt => Object::truth(a < b),
        BinaryOp::Le => Object::truth(a <= b),
        BinaryOp::Gt => Object::truth(a > b),
        BinaryOp::Ge => Object::truth(a >= b),
        BinaryOp::BitAnd => Object::int(a & b),
        BinaryOp::BitOr => Object::int(a | b),
        BinaryOp::BitXor => Object::int(a ^ b),
        BinaryOp::Shl => Object::int(a.wrapping_shl(u32::try_from(b.max(0)).unwrap_or(u32::MAX))),
        BinaryOp::Shr => Object::int(a.wrapping_shr(u32::try_from(b.max(0)).unwrap_or(u32::MAX))),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            return Err(EvalError::KindMismatch {
                op: format!("{op:?}"),
                kind: "integer",
            });
        }
    };
    Ok(obj)
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> EvalResult<Object> {
    let obj = match op {
        BinaryOp::Add => Object::float(a + b),
        BinaryOp::Sub => Object::float(a - b),
        BinaryOp::Mul => Object::float(a * b),
        BinaryOp::Div => Object::float(a / b),
        BinaryOp::Eq => Object::truth(a == b),
        BinaryOp::Ne => Object::truth(a != b),
        BinaryOp::Lt => Object::truth(a < b),
        BinaryOp::Le => Object::truth(a <= b),
        BinaryOp::Gt => Object::truth(a > b),
        BinaryOp::Ge => Object::truth(a >= b),
        _ => {
            return Err(EvalError::KindMismatch {
                op: format!("{op:?}"),
                kind: "float",
            });
        }
    };
    Ok(obj)
}

fn str_binary(op: BinaryOp, a: &str, b: &str) -> EvalResult<Object> {
    let obj = match op {
        BinaryOp::Add => Object::string(format!("{a}{b}")),
        BinaryOp::Eq => Object::truth(a == b),
        BinaryOp::Ne => Object::truth(a != b),
        BinaryOp::Lt => Object::truth(a < b),
        BinaryOp::Le => Object::truth(a <= b),
        BinaryOp::Gt => Object::truth(a > b),
        BinaryOp::Ge => Object::truth(a >= b),
        _ => {
            return Err(EvalError::KindMismatch {
                op: format!("{op:?}"),
                kind: "string",
            });
        }
    };
    Ok(obj)
}

fn bool_binary(op: BinaryOp, a: bool, b: bool) -> EvalResult<Object> {
    let obj = match op {
        BinaryOp::LogicalAnd => Object::truth(a && b),
        BinaryOp::LogicalOr => Object::truth(a || b),
        BinaryOp::Eq => Object::truth(a == b),
        BinaryOp::Ne => Object::truth(a != b),
        _ => {
            return Err(EvalError::KindMismatch {
                op: format!("{op:?}"),
                kind: "boolean",
            });
        }
    };
    Ok(obj)
}

/// The placeholder result of an operator with at least one symbolic
/// operand: boolean-typed for comparisons, operand-typed otherwise.
fn symbolic_binary(op: BinaryOp, lv: &Object, rv: &Object) -> Object {
    if op.is_comparison() {
        return Object::symbolic("comparison result").with_field_type(FieldType::basic("bool"));
    }
    let meta = if lv.meta.field_type.is_some() || lv.meta.type_info.is_some() {
        lv.meta.clone()
    } else {
        rv.meta.clone()
    };
    let mut result = Object::symbolic("arithmetic result").with_meta(meta);
    if result.meta.field_type.is_none() {
        let ft = match (&lv.value, &rv.value) {
            (Value::Float(_), _) | (_, Value::Float(_)) => Some(FieldType::basic("float64")),
            (Value::Int(_), _) | (_, Value::Int(_)) => Some(FieldType::basic("int")),
            (Value::Str(_), _) | (_, Value::Str(_)) => Some(FieldType::basic("string")),
            _ => None,
        };
        if let Some(ft) = ft {
            result.meta.field_type = Some(Rc::new(ft));
        }
    }
    result
}
