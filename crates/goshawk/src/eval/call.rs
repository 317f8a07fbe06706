//! The call junction: argument shaping, the intrinsic bus, function
//! application, builtin dispatch, and function-literal scanning.

use std::rc::Rc;

use smallvec::SmallVec;
use tracing::debug;

use crate::{
    ast::{CallExpr, Pos},
    builtins::Builtin,
    error::EvalError,
    eval::{EvalResult, Evaluator, Frame},
    object::{ChanData, Function, Object, ReturnValue, SliceData, Symbolic, TypeRefObj, Value},
    scan::{FieldType, ParamInfo, Scanner},
    scope::{Scope, ScopeRef},
    tracer::EngineTracer,
};

impl<S: Scanner, Tr: EngineTracer> Evaluator<S, Tr> {
    pub(crate) fn eval_call(&mut self, call: &CallExpr, scope: &ScopeRef) -> EvalResult<Object> {
        let callee = self.eval_expr(&call.func, scope)?;

        let mut args: Vec<Object> = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let v = self.eval_expr(arg, scope)?;
            match v.value {
                // `g(f())` forwards all of f's results as g's arguments.
                Value::MultiValue(vs) if call.args.len() == 1 => args.extend(vs),
                _ => args.push(v),
            }
        }
        if call.ellipsis {
            let Some(last) = args.pop() else {
                return Err(EvalError::BadVariadic { pos: call.pos });
            };
            args.push(Object::new(Value::Variadic(Box::new(last))));
        }

        // Function values passed as arguments get their bodies scanned even
        // when the callee never invokes them.
        for arg in &args {
            self.scan_function_argument(arg);
        }

        let ctx = self.call_context(call.pos);
        let mut observed: SmallVec<[Object; 5]> = SmallVec::with_capacity(args.len() + 1);
        observed.push(callee.clone());
        observed.extend(args.iter().cloned());
        self.intrinsics.fire_default(&ctx, &observed);

        match &callee.value {
            Value::Builtin(b) => self.call_builtin(*b, &args, call.pos),
            Value::TypeRef(tr) => Ok(convert(tr, args.into_iter().next())),
            Value::Intrinsic(f) => {
                let result = f.call(&ctx, &args);
                Ok(result.unwrap_or_else(|| Object::symbolic("intrinsic result")))
            }
            Value::Func(_) | Value::BoundMethod { .. } => self.apply_function(callee, args, call.pos),
            Value::Symbolic(sym) => Ok(self.call_symbolic(sym, &callee)),
            Value::UnresolvedFunction { pkg_path, name } => {
                Ok(Object::symbolic(format!("call into {pkg_path}.{name}")))
            }
            Value::UnresolvedType { .. } => {
                // Conversion through an out-of-policy type keeps the operand.
                let mut operand = args.into_iter().next().unwrap_or_else(Object::nil);
                operand.meta.field_type = callee.meta.field_type.clone();
                Ok(operand)
            }
            _ => Err(EvalError::KindMismatch {
                op: "call".to_string(),
                kind: callee.kind(),
            }),
        }
    }

    /// Calls a symbolic value. With a pending interface-method signature the
    /// declared results are synthesized; on a no-result method the receiver's
    /// candidate set rides along so interface-flow stays observable at the
    /// call site.
    fn call_symbolic(&mut self, sym: &Symbolic, callee: &Object) -> Object {
        let Some(mi) = &sym.underlying_func else {
            return Object::symbolic("call on symbolic value");
        };
        if mi.results.is_empty() {
            let mut result = Symbolic {
                reason: format!("interface method call {}", mi.name),
                ..Symbolic::default()
            };
            if let Some(recv) = &sym.receiver {
                result.possible_types = recv.type_candidates();
            }
            let mut obj = Object::new(Value::Symbolic(Box::new(result)));
            obj.meta = callee.meta.clone();
            return obj;
        }
        self.placeholder_for_results(&mi.results, &format!("result of {}", mi.name))
    }

    /// The central call application junction.
    pub fn apply_function(&mut self, callee: Object, args: Vec<Object>, pos: Pos) -> EvalResult<Object> {
        let (func, receiver) = match callee.value {
            Value::Func(f) => (f, None),
            Value::BoundMethod { func, receiver } => (func, Some(*receiver)),
            _ => {
                return Err(EvalError::KindMismatch {
                    op: "call".to_string(),
                    kind: callee.kind(),
                });
            }
        };
        let result_names: Vec<String> = func
            .results
            .iter()
            .filter(|r| !r.name.is_empty())
            .map(|r| r.name.clone())
            .collect();
        self.call_stack.push(Frame {
            name: func.display_name().to_string(),
            fn_id: Some(func.id),
            pkg: func.pkg.clone().or_else(|| self.current_pkg()),
            pos,
            recovers: false,
            result_names,
        });
        self.tracer.on_call(func.name.as_deref(), self.call_stack.len(), pos);
        let result = self.apply_inner(&func, receiver, args);
        self.call_stack.pop();
        self.tracer.on_return(self.call_stack.len());
        result
    }

    fn apply_inner(&mut self, func: &Rc<Function>, receiver: Option<Object>, args: Vec<Object>) -> EvalResult<Object> {
        let Some(body) = func.body.clone() else {
            return Ok(self.placeholder_for_results(&func.results, "external function result"));
        };

        // Memoized skip: the body already ran this run, so only the result
        // shape is reproduced.
        if self.memoize && self.executed.contains(&func.id) {
            debug!(func = func.display_name(), "memoized call, skipping body");
            return Ok(self.placeholder_for_results(&func.results, "memoized result"));
        }

        // Recursion through the live stack or through the snapshot bound to
        // this function value when it crossed a call boundary.
        let in_stack = self
            .call_stack
            .iter()
            .rev()
            .skip(1)
            .any(|f| f.fn_id == Some(func.id));
        let in_bound = func.bound_stack.as_ref().is_some_and(|s| s.contains(&func.id));
        if in_stack || in_bound {
            return Ok(self.placeholder_for_results(&func.results, "recursive call"));
        }

        // Out-of-policy bodies collapse to result placeholders; their
        // signatures stay available because package loading bypassed the
        // policy.
        if let Some(pkg) = &func.pkg
            && !self.resolver.scan_policy(&pkg.path)
        {
            return Ok(self.placeholder_for_results(&func.results, "out-of-policy call"));
        }

        let env = Scope::child(&func.scope);
        if let (Some(recv), Some(def)) = (&receiver, &func.def)
            && let Some(recv_field) = &def.receiver
            && !recv_field.name.is_empty()
            && recv_field.name != "_"
        {
            env.set_local(recv_field.name.clone(), recv.clone());
        }
        for result in func.results.iter().filter(|r| !r.name.is_empty()) {
            env.set_local(result.name.clone(), self.zero_value(&result.ty));
        }
        self.bind_params(func, &args, &env);

        let outcome = self.eval_block(&body, &env);
        self.executed.insert(func.id);

        let value = match outcome {
            Ok(v) => v,
            // A structural recover absorbs the panic at this frame; the
            // panic value survives as an error object the host can render.
            Err(err) if err.is_panic() && self.call_stack.last().is_some_and(|f| f.recovers) => {
                return Ok(Object::new(Value::Error(Rc::new(err))));
            }
            Err(err) => return Err(err),
        };
        unwrap_return(value)
    }

    /// Binds parameters into the call scope. The static parameter type wins
    /// over the argument's dynamic type; function-valued arguments are
    /// cloned with the current call-stack snapshot attached.
    fn bind_params(&mut self, func: &Rc<Function>, args: &[Object], env: &ScopeRef) {
        let fixed = if func.variadic {
            func.params.len().saturating_sub(1)
        } else {
            func.params.len()
        };
        for (i, param) in func.params.iter().take(fixed).enumerate() {
            let arg = match args.get(i) {
                Some(a) => self.bind_one_arg(a, param),
                None => self.symbolic_param(param, "missing argument"),
            };
            if !param.name.is_empty() && param.name != "_" {
                env.set_local(param.name.clone(), arg);
            }
        }
        if func.variadic
            && let Some(param) = func.params.last()
        {
            let rest = self.collect_variadic(&args[fixed.min(args.len())..], param);
            if !param.name.is_empty() && param.name != "_" {
                env.set_local(param.name.clone(), rest);
            }
        }
    }

    fn bind_one_arg(&mut self, arg: &Object, param: &ParamInfo) -> Object {
        let mut bound = self.attach_bound_stack(arg.clone());
        if bound.meta.field_type.is_none() {
            bound.meta.field_type = Some(Rc::new(param.ty.clone()));
        }
        if bound.meta.type_info.is_none() {
            bound.meta.type_info = self.resolver.resolve_type(&param.ty);
        }
        bound
    }

    /// Clones a function-valued argument with the current stack snapshot so
    /// recursion through the callback is detected later.
    fn attach_bound_stack(&self, arg: Object) -> Object {
        let snapshot = || -> Vec<u64> { self.call_stack.iter().filter_map(|f| f.fn_id).collect() };
        match arg.value {
            Value::Func(f) => {
                let cloned = f.with_bound_stack(snapshot());
                Object {
                    value: Value::Func(Rc::new(cloned)),
                    meta: arg.meta,
                }
            }
            Value::BoundMethod { func, receiver } => {
                let cloned = func.with_bound_stack(snapshot());
                Object {
                    value: Value::BoundMethod {
                        func: Rc::new(cloned),
                        receiver,
                    },
                    meta: arg.meta,
                }
            }
            _ => arg,
        }
    }

    /// Gathers trailing arguments into the variadic slice parameter,
    /// unwrapping an explicit `...` spread.
    fn collect_variadic(&mut self, rest: &[Object], param: &ParamInfo) -> Object {
        let elem_ty = match &param.ty {
            FieldType::Slice(elem) => Some((**elem).clone()),
            _ => None,
        };
        if let [single] = rest
            && let Value::Variadic(inner) = &single.value
        {
            let mut spread = (**inner).clone();
            if spread.meta.field_type.is_none() {
                spread.meta.field_type = Some(Rc::new(param.ty.clone()));
            }
            return spread;
        }
        let data = SliceData {
            elems: rest.to_vec(),
            elem_type: elem_ty,
        };
        Object::new(Value::Slice(Rc::new(std::cell::RefCell::new(data)))).with_field_type(param.ty.clone())
    }

    /// The result shape of a call that is not descended into: nothing for
    /// no results, a typed placeholder for one, a multi-value of typed
    /// placeholders otherwise. Result types resolve without the policy
    /// check so out-of-policy signatures still type their placeholders.
    pub(crate) fn placeholder_for_results(&mut self, results: &[ParamInfo], reason: &str) -> Object {
        match results.len() {
            0 => Object::nil(),
            1 => self.result_placeholder(&results[0], reason),
            _ => {
                let values = results.iter().map(|r| self.result_placeholder(r, reason)).collect();
                Object::new(Value::MultiValue(values))
            }
        }
    }

    fn result_placeholder(&mut self, result: &ParamInfo, reason: &str) -> Object {
        let mut obj = Object::symbolic(reason).with_field_type(result.ty.clone());
        obj.meta.type_info = self.resolver.resolve_type_without_policy_check(&result.ty);
        obj
    }

    /// Evaluates a function value's body once, purely to observe the calls
    /// it contains, with parameters bound to typed placeholders. Runs the
    /// first time the value is seen as a call argument, even when the
    /// callee never invokes it.
    fn scan_function_argument(&mut self, arg: &Object) {
        let (func, receiver) = match &arg.value {
            Value::Func(f) => (Rc::clone(f), None),
            Value::BoundMethod { func, receiver } => (Rc::clone(func), Some((**receiver).clone())),
            _ => return,
        };
        if func.body.is_none() {
            return;
        }
        if self.literal_scans_done.contains(&func.id) || !self.literal_scans_active.insert(func.id) {
            return;
        }

        let env = Scope::child(&func.scope);
        if let (Some(recv), Some(def)) = (&receiver, &func.def)
            && let Some(recv_field) = &def.receiver
            && !recv_field.name.is_empty()
        {
            env.set_local(recv_field.name.clone(), recv.clone());
        }
        for param in &func.params {
            if !param.name.is_empty() && param.name != "_" {
                let bound = self.symbolic_param(param, "scanned parameter");
                env.set_local(param.name.clone(), bound);
            }
        }
        for result in func.results.iter().filter(|r| !r.name.is_empty()) {
            env.set_local(result.name.clone(), self.zero_value(&result.ty));
        }

        self.call_stack.push(Frame {
            name: format!("scan {}", func.display_name()),
            fn_id: Some(func.id),
            pkg: func.pkg.clone(),
            pos: Pos::default(),
            recovers: false,
            result_names: Vec::new(),
        });
        let body = func.body.clone().expect("checked above");
        let res = self.eval_block(&body, &env);
        self.call_stack.pop();
        if let Err(err) = res {
            debug!(func = func.display_name(), %err, "function-literal scan aborted");
        }

        self.literal_scans_active.remove(&func.id);
        self.literal_scans_done.insert(func.id);
    }

    fn call_builtin(&mut self, builtin: Builtin, args: &[Object], _pos: Pos) -> EvalResult<Object> {
        match builtin {
            Builtin::Len | Builtin::Cap => Ok(len_of(args.first())),
            Builtin::Append => Ok(append_slice(args)),
            Builtin::Make => Ok(make_value(args.first())),
            Builtin::New => Ok(new_value(args.first())),
            Builtin::Copy => Ok(Object::symbolic("copied element count").with_field_type(FieldType::basic("int"))),
            Builtin::Delete | Builtin::Close | Builtin::Clear | Builtin::Print | Builtin::Println => Ok(Object::nil()),
            Builtin::Complex | Builtin::Real | Builtin::Imag => {
                Ok(Object::symbolic("complex arithmetic").with_field_type(FieldType::basic("float64")))
            }
            Builtin::Max => Ok(fold_ints(args, i64::max).unwrap_or_else(|| Object::symbolic("max result"))),
            Builtin::Min => Ok(fold_ints(args, i64::min).unwrap_or_else(|| Object::symbolic("min result"))),
            Builtin::Panic => Err(EvalError::Panic(Box::new(
                args.first().cloned().unwrap_or_else(Object::nil),
            ))),
            Builtin::Recover => Ok(Object::symbolic("recovered value")),
        }
    }
}

/// Unwraps the return marker at the function boundary. A marker nested
/// inside the returned values would mean block evaluation leaked one, which
/// is an engine bug and fails loudly.
fn unwrap_return(value: Object) -> EvalResult<Object> {
    let Value::Return(ret) = value.value else {
        return Ok(Object::nil());
    };
    let ReturnValue { values } = *ret;
    if values.iter().any(Object::is_return) {
        return Err(EvalError::MarkerLeak("return value"));
    }
    match values.len() {
        0 => Ok(Object::nil()),
        1 => Ok(values.into_iter().next().expect("length checked")),
        _ => Ok(Object::new(Value::MultiValue(values))),
    }
}

/// A conversion call `T(x)`: the operand keeps its value and acquires the
/// target's static type.
fn convert(target: &TypeRefObj, operand: Option<Object>) -> Object {
    let mut obj = operand.unwrap_or_else(Object::nil);
    obj.meta.field_type = target.ft.clone();
    obj.meta.type_info = target.info.clone();
    obj
}

fn len_of(arg: Option<&Object>) -> Object {
    let placeholder = || Object::symbolic("length of symbolic value").with_field_type(FieldType::basic("int"));
    let Some(arg) = arg else { return placeholder() };
    match &arg.value {
        Value::Str(s) => Object::int(s.len() as i64),
        Value::Slice(data) => Object::int(data.borrow().elems.len() as i64),
        Value::Map(data) => Object::int(data.borrow().entries.len() as i64),
        _ => placeholder(),
    }
}

fn append_slice(args: &[Object]) -> Object {
    let Some((first, rest)) = args.split_first() else {
        return Object::symbolic("append result");
    };
    let mut data = match &first.value {
        Value::Slice(data) => data.borrow().clone(),
        _ => SliceData::default(),
    };
    for arg in rest {
        match &arg.value {
            Value::Variadic(inner) => match &inner.value {
                Value::Slice(spread) => data.elems.extend(spread.borrow().elems.iter().cloned()),
                _ => data.elems.push((**inner).clone()),
            },
            _ => data.elems.push(arg.clone()),
        }
    }
    Object::new(Value::Slice(Rc::new(std::cell::RefCell::new(data)))).with_meta(first.meta.clone())
}

fn make_value(arg: Option<&Object>) -> Object {
    let ft = arg.and_then(|a| match &a.value {
        Value::TypeRef(tr) => tr.ft.as_deref().cloned(),
        _ => a.meta.field_type.as_deref().cloned(),
    });
    match ft {
        Some(FieldType::Slice(elem)) => {
            let data = SliceData {
                elems: Vec::new(),
                elem_type: Some((*elem).clone()),
            };
            Object::new(Value::Slice(Rc::new(std::cell::RefCell::new(data)))).with_field_type(FieldType::Slice(elem))
        }
        Some(FieldType::Map(k, v)) => {
            let data = crate::object::MapData {
                entries: Vec::new(),
                key_type: Some((*k).clone()),
                value_type: Some((*v).clone()),
            };
            Object::new(Value::Map(Rc::new(std::cell::RefCell::new(data)))).with_field_type(FieldType::Map(k, v))
        }
        Some(FieldType::Chan(elem)) => {
            let data = ChanData {
                elem_type: Some((*elem).clone()),
            };
            Object::new(Value::Chan(Rc::new(data))).with_field_type(FieldType::Chan(elem))
        }
        Some(ft) => Object::symbolic("made value").with_field_type(ft),
        None => Object::symbolic("made value"),
    }
}

fn new_value(arg: Option<&Object>) -> Object {
    let ft = arg.and_then(|a| match &a.value {
        Value::TypeRef(tr) => tr.ft.as_deref().cloned(),
        _ => a.meta.field_type.as_deref().cloned(),
    });
    match ft {
        Some(ft) => {
            let pointee = Object::symbolic("newly allocated zero value").with_field_type(ft.clone());
            Object::new(Value::Pointer(Box::new(pointee))).with_field_type(FieldType::pointer(ft))
        }
        None => Object::symbolic("newly allocated value"),
    }
}

fn fold_ints(args: &[Object], f: impl Fn(i64, i64) -> i64) -> Option<Object> {
    let mut iter = args.iter().map(Object::as_int);
    let mut acc = iter.next()??;
    for v in iter {
        acc = f(acc, v?);
    }
    Some(Object::int(acc))
}
