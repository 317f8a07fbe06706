//! The evaluator core: a depth-first walk over Go AST nodes.
//!
//! One [`Evaluator`] drives one analysis run. Statements live in this
//! module; expressions, calls, and selector resolution are split into
//! submodules the way the concerns split in practice: the call junction
//! and the selector ladder are each intricate enough to own a file.

mod call;
mod expr;
mod selector;

use std::{rc::Rc, time::Duration};

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::{
    ast::{self, Block, CallExpr, Expr, Pos, SelectCase, Stmt, SwitchCase, TypeSwitchCase},
    builtins,
    error::EvalError,
    intrinsics::{CallContext, IntrinsicRegistry},
    loader::{PackageObj, PackageStore},
    object::{Object, Symbolic, Value, VarCell},
    resolver::{Resolver, ScanPolicy},
    resource::StepBudget,
    scan::{ConstValue, FieldType, MethodInfo, ParamInfo, Scanner},
    scope::{Scope, ScopeRef},
    tracer::{EngineTracer, NoopTracer},
};

/// Result alias used throughout evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Engine construction options.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Skip re-executing function bodies that already ran this run,
    /// returning a result-typed placeholder instead.
    pub memoize: bool,
    pub max_steps: Option<usize>,
    pub timeout: Option<Duration>,
    /// Import-path prefix considered in-policy by the default scan policy.
    /// Falls back to the scanner's module path when absent.
    pub primary_analysis_scope: Option<String>,
}

/// One call frame.
#[derive(Debug)]
struct Frame {
    name: String,
    /// Identity of the function being applied, for recursion detection.
    fn_id: Option<u64>,
    pkg: Option<Rc<PackageObj>>,
    pos: Pos,
    /// Set when a structural `defer ... recover()` was seen in this body.
    recovers: bool,
    /// Named result slots, read back by a bare `return`.
    result_names: Vec<String>,
}

/// The symbolic execution engine.
///
/// Single-threaded; create one per analysis run. All caches (packages,
/// function objects, synthetic interface methods, the memoization set) live
/// for the engine's lifetime.
pub struct Evaluator<S: Scanner, Tr: EngineTracer = NoopTracer> {
    resolver: Rc<Resolver<S>>,
    accessor: crate::accessor::Accessor<S>,
    store: PackageStore<S>,
    universe: ScopeRef,
    intrinsics: IntrinsicRegistry,
    tracer: Tr,
    budget: StepBudget,
    memoize: bool,
    call_stack: Vec<Frame>,
    /// Function ids whose bodies have executed this run.
    executed: AHashSet<u64>,
    /// Interface method call log, in observation order.
    iface_calls: Vec<String>,
    /// Methods invented for selectors an interface does not declare,
    /// keyed `pkg.Iface.Method`.
    synthetic_methods: AHashMap<String, Rc<MethodInfo>>,
    /// Function-literal scan bookkeeping (in progress / completed).
    literal_scans_active: AHashSet<u64>,
    literal_scans_done: AHashSet<u64>,
    /// Depth of conditional branches currently being evaluated; governs
    /// copy-on-write assignment.
    branch_depth: usize,
}

impl<S: Scanner> Evaluator<S, NoopTracer> {
    /// An engine with the default scan policy (the scanner's module path is
    /// in-policy) and no tracer.
    pub fn new(scanner: Rc<S>, options: Options) -> Self {
        Self::with_tracer(scanner, options, NoopTracer)
    }

    /// An engine with a custom scan policy.
    pub fn with_policy(scanner: Rc<S>, options: Options, policy: impl Fn(&str) -> bool + 'static) -> Self {
        Self::with_policy_and_tracer(scanner, options, Rc::new(policy), NoopTracer)
    }
}

impl<S: Scanner, Tr: EngineTracer> Evaluator<S, Tr> {
    pub fn with_tracer(scanner: Rc<S>, options: Options, tracer: Tr) -> Self {
        let scope = options
            .primary_analysis_scope
            .clone()
            .unwrap_or_else(|| scanner.module_path().to_string());
        let policy: ScanPolicy = Rc::new(move |path: &str| {
            path == scope || path.starts_with(&format!("{scope}/"))
        });
        Self::with_policy_and_tracer(scanner, options, policy, tracer)
    }

    pub fn with_policy_and_tracer(scanner: Rc<S>, options: Options, policy: ScanPolicy, tracer: Tr) -> Self {
        let universe = builtins::universe();
        let resolver = Rc::new(Resolver::new(Rc::clone(&scanner), policy));
        let accessor = crate::accessor::Accessor::new(Rc::clone(&resolver));
        let store = PackageStore::new(scanner, Rc::clone(&universe));
        Self {
            resolver,
            accessor,
            store,
            universe,
            intrinsics: IntrinsicRegistry::new(),
            tracer,
            budget: StepBudget::new(options.max_steps, options.timeout),
            memoize: options.memoize,
            call_stack: Vec::new(),
            executed: AHashSet::new(),
            iface_calls: Vec::new(),
            synthetic_methods: AHashMap::new(),
            literal_scans_active: AHashSet::new(),
            literal_scans_done: AHashSet::new(),
            branch_depth: 0,
        }
    }

    /// Installs a keyed intrinsic (`pkg.Name`, `(T).Method`, `(*T).Method`,
    /// `(pkg.Iface).Method`).
    pub fn register_intrinsic(
        &mut self,
        key: impl Into<String>,
        f: impl Fn(&CallContext, &[Object]) -> Option<Object> + 'static,
    ) {
        self.intrinsics.register(key, f);
    }

    /// Installs the default intrinsic invoked on every call with
    /// `[callee, args...]`.
    pub fn register_default_intrinsic(&mut self, f: impl Fn(&CallContext, &[Object]) + 'static) {
        self.intrinsics.register_default(f);
    }

    /// The interface method call log, keyed `pkg.Iface.Method`, in
    /// observation order.
    pub fn interface_calls(&self) -> &[String] {
        &self.iface_calls
    }

    /// Evaluation steps consumed so far.
    pub fn steps(&self) -> usize {
        self.budget.steps()
    }

    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    pub fn into_tracer(self) -> Tr {
        self.tracer
    }

    /// Runs the engine from an entry-point function: loads the package,
    /// binds symbolic arguments from the declared parameter types, and
    /// applies the function.
    pub fn eval_entry(&mut self, pkg_path: &str, func_name: &str) -> EvalResult<Object> {
        let pkg = self.load_package(pkg_path)?;
        self.populate_package(&pkg);
        let info = pkg.info().ok_or_else(|| EvalError::PackageLoad(crate::scan::ScanError {
            path: pkg_path.to_string(),
            reason: "package has no scan record".to_string(),
        }))?;
        let def = info
            .function(func_name)
            .ok_or_else(|| EvalError::UndefinedIdentifier {
                name: format!("{pkg_path}.{func_name}"),
                pos: Pos::default(),
            })?
            .clone();
        let func = self.resolver.resolve_function(&pkg, &def);
        let args: Vec<Object> = def
            .params
            .iter()
            .map(|p| self.symbolic_param(p, "entry argument"))
            .collect();
        let callee = Object::new(Value::Func(func));
        self.apply_function(callee, args, def.pos)
    }

    // ------------------------------------------------------------------
    // shared plumbing
    // ------------------------------------------------------------------

    pub(crate) fn step(&mut self) -> EvalResult<()> {
        self.budget.on_step().map_err(EvalError::from)
    }

    pub(crate) fn current_pkg(&self) -> Option<Rc<PackageObj>> {
        self.call_stack.iter().rev().find_map(|f| f.pkg.clone())
    }

    pub(crate) fn call_context(&self, pos: Pos) -> CallContext {
        CallContext {
            caller_pkg: self.current_pkg().map(|p| p.path.clone()),
            depth: self.call_stack.len(),
            pos,
        }
    }

    pub(crate) fn load_package(&mut self, path: &str) -> EvalResult<Rc<PackageObj>> {
        let known = self.store.cached(path).is_some();
        let pkg = self.store.load(path)?;
        if !known {
            self.tracer.on_package_load(path);
        }
        Ok(pkg)
    }

    pub(crate) fn load_package_or_shell(&mut self, path: &str) -> Rc<PackageObj> {
        let known = self.store.cached(path).is_some();
        let pkg = self.store.load_or_shell(path);
        if !known {
            self.tracer.on_package_load(path);
        }
        pkg
    }

    /// Binds a package's top-level declarations into its scope. Deferred to
    /// the first selector or identifier that needs the package.
    pub(crate) fn populate_package(&mut self, pkg: &Rc<PackageObj>) {
        if pkg.populated.get() {
            return;
        }
        pkg.populated.set(true);
        let Some(info) = pkg.info() else { return };
        debug!(path = %pkg.path, "populating package scope");
        for def in &info.functions {
            if def.receiver.is_some() {
                continue;
            }
            let func = self.resolver.resolve_function(pkg, def);
            pkg.scope.set_local(def.name.clone(), Object::new(Value::Func(func)));
        }
        for ti in &info.types {
            let obj = Object::new(Value::TypeRef(crate::object::TypeRefObj::of_info(Rc::clone(ti))));
            pkg.scope.set_local(ti.name.clone(), obj);
        }
        for c in &info.constants {
            let mut obj = match &c.value {
                ConstValue::Int(v) => Object::int(*v),
                ConstValue::Str(v) => Object::string(v.clone()),
                ConstValue::Bool(v) => Object::truth(*v),
                ConstValue::Opaque => Object::symbolic(format!("constant {}", c.name)),
            };
            if let Some(ty) = &c.ty {
                obj.meta.field_type = Some(Rc::new(ty.clone()));
                obj.meta.type_info = self.resolver.resolve_type(ty);
            }
            pkg.scope.set_local(c.name.clone(), obj);
        }
        for v in &info.vars {
            let mut cell_obj = Object::new(Value::Var(Rc::new(std::cell::RefCell::new(VarCell {
                name: v.name.clone(),
                value: Object::nil(),
                is_evaluated: v.init.is_none(),
                initializer: v.init.clone(),
                pkg: Some(Rc::clone(pkg)),
            }))));
            if let Some(ty) = &v.ty {
                cell_obj.meta.field_type = Some(Rc::new(ty.clone()));
                cell_obj.meta.type_info = self.resolver.resolve_type(ty);
            }
            pkg.scope.set_local(v.name.clone(), cell_obj);
        }
    }

    /// A typed placeholder for a declared parameter.
    pub(crate) fn symbolic_param(&self, param: &ParamInfo, reason: &str) -> Object {
        let mut obj = Object::symbolic(format!("{reason} {}", param.name)).with_field_type(param.ty.clone());
        obj.meta.type_info = self.resolver.resolve_type(&param.ty);
        obj
    }

    /// Records an interface method call in the log.
    pub(crate) fn log_interface_call(&mut self, key: String) {
        self.tracer.on_interface_call(&key);
        self.iface_calls.push(key);
    }

    // ------------------------------------------------------------------
    // statements
    // ------------------------------------------------------------------

    pub(crate) fn eval_block(&mut self, block: &Block, scope: &ScopeRef) -> EvalResult<Object> {
        for stmt in &block.stmts {
            let v = self.eval_stmt(stmt, scope)?;
            if v.is_return() {
                return Ok(v);
            }
        }
        Ok(Object::nil())
    }

    pub(crate) fn eval_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> EvalResult<Object> {
        self.step()?;
        match stmt {
            Stmt::Expr(e) => self.eval_expr(e, scope),
            Stmt::Assign { lhs, rhs, op } => self.eval_assign(lhs, rhs, *op, scope),
            Stmt::Var { names, ty, values } => self.eval_var_decl(names, ty.as_ref(), values, scope),
            Stmt::IncDec { target, inc } => self.eval_inc_dec(target, *inc, scope),
            Stmt::If { cond, then, els } => self.eval_if(cond, then, els.as_deref(), scope),
            Stmt::For { cond, body } => self.eval_for(cond.as_ref(), body, scope),
            Stmt::Range { key, value, x, body } => self.eval_range(key.as_deref(), value.as_deref(), x, body, scope),
            Stmt::Switch { tag, cases } => self.eval_switch(tag.as_ref(), cases, scope),
            Stmt::TypeSwitch { binding, x, cases } => self.eval_type_switch(binding.as_deref(), x, cases, scope),
            Stmt::Select { cases } => self.eval_select(cases, scope),
            Stmt::Return { results } => self.eval_return(results, scope),
            Stmt::Defer(call) => self.eval_defer(call, scope),
            Stmt::Go(call) => self.eval_go(call, scope),
            Stmt::Send { chan, value } => {
                self.eval_expr(chan, scope)?;
                self.eval_expr(value, scope)?;
                Ok(Object::nil())
            }
            Stmt::Block(b) => {
                let child = Scope::child(scope);
                self.eval_block(b, &child)
            }
        }
    }

    fn eval_var_decl(
        &mut self,
        names: &[String],
        ty: Option<&FieldType>,
        values: &[Expr],
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        for (i, name) in names.iter().enumerate() {
            let mut value = match values.get(i) {
                Some(expr) => self.eval_expr(expr, scope)?,
                None => match ty {
                    Some(ft) => self.zero_value(ft),
                    None => Object::nil(),
                },
            };
            if let Some(ft) = ty {
                // Declared type governs the binding; resolution bypasses the
                // policy so interface-flow tracking works across scope edges.
                value.meta.field_type = Some(Rc::new(ft.clone()));
                value.meta.type_info = self.resolver.resolve_type_without_policy_check(ft);
            }
            if name != "_" {
                scope.set_local(name.clone(), value);
            }
        }
        Ok(Object::nil())
    }

    /// The zero value of a declared type. Basic kinds get their concrete
    /// zero; everything else is a typed nil.
    pub(crate) fn zero_value(&self, ft: &FieldType) -> Object {
        let zero = match ft {
            FieldType::Named { pkg_path, name } if pkg_path.is_empty() => match name.as_str() {
                "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
                | "uintptr" | "byte" | "rune" => Object::int(0),
                "float32" | "float64" => Object::float(0.0),
                "string" => Object::string(""),
                "bool" => Object::truth(false),
                _ => Object::nil(),
            },
            _ => Object::nil(),
        };
        let mut zero = zero.with_field_type(ft.clone());
        zero.meta.type_info = self.resolver.resolve_type_without_policy_check(ft);
        zero
    }

    fn eval_assign(&mut self, lhs: &[Expr], rhs: &[Expr], op: ast::AssignOp, scope: &ScopeRef) -> EvalResult<Object> {
        let values = self.eval_rhs(lhs.len(), rhs, scope)?;
        for (target, value) in lhs.iter().zip(values) {
            match target {
                Expr::Ident(id) if id.name == "_" => {}
                Expr::Ident(id) => match op {
                    ast::AssignOp::Define => scope.set_local(id.name.clone(), value),
                    ast::AssignOp::Assign => self.assign_value(scope, &id.name, value),
                },
                Expr::Selector { x, sel } => {
                    let recv = self.eval_expr(x, scope)?;
                    assign_field(&recv, &sel.name, value);
                }
                Expr::Index { x, index } => {
                    let container = self.eval_expr(x, scope)?;
                    let key = self.eval_expr(index, scope)?;
                    assign_element(&container, &key, value);
                }
                // Writes through bare derefs and other targets have no
                // observable effect on the lattice; the operand was already
                // explored while evaluating the rhs.
                Expr::Star(inner) => {
                    self.eval_expr(inner, scope)?;
                }
                _ => {}
            }
        }
        Ok(Object::nil())
    }

    /// Evaluates an assignment's right-hand side, spreading multi-value
    /// calls and the comma-ok forms across multiple targets.
    fn eval_rhs(&mut self, want: usize, rhs: &[Expr], scope: &ScopeRef) -> EvalResult<Vec<Object>> {
        let mut values = if rhs.len() == 1 {
            let v = self.eval_expr(&rhs[0], scope)?;
            match v.value {
                Value::MultiValue(vs) if want > 1 => vs,
                // A multi-result call bound to a single target takes the
                // first value; the transport marker never reaches a binding.
                Value::MultiValue(vs) => vec![vs.into_iter().next().unwrap_or_else(Object::nil)],
                _ if want == 2 && comma_ok_form(&rhs[0]) => {
                    vec![v, Object::symbolic("comma-ok").with_field_type(FieldType::basic("bool"))]
                }
                _ => vec![v],
            }
        } else {
            let mut vs = Vec::with_capacity(rhs.len());
            for e in rhs {
                vs.push(self.eval_expr(e, scope)?);
            }
            vs
        };
        while values.len() < want {
            values.push(Object::symbolic("missing assignment value"));
        }
        Ok(values)
    }

    /// Writes `name` with `=` semantics: into the defining scope normally,
    /// copy-on-write into the current scope inside a conditional branch.
    pub(crate) fn assign_value(&mut self, scope: &ScopeRef, name: &str, value: Object) {
        let Some((existing, def_scope)) = scope.get_with_scope(name) else {
            scope.set_local(name.to_string(), value);
            return;
        };
        if Rc::ptr_eq(&def_scope, &self.universe) {
            // Universe bindings are read-only; treat as a fresh local.
            scope.set_local(name.to_string(), value);
            return;
        }
        let value = inherit_target_meta(&existing, value);
        if scope.defines_locally(name) {
            scope.set_local(name.to_string(), value);
        } else if self.branch_depth > 0 {
            scope.set_local(name.to_string(), value);
            scope.mark_shadow(name);
        } else {
            def_scope.set_local(name.to_string(), value);
        }
    }

    fn eval_inc_dec(&mut self, target: &Expr, inc: bool, scope: &ScopeRef) -> EvalResult<Object> {
        let Expr::Ident(id) = target else {
            // `x.f++` and friends: explore the operand, nothing to write back.
            self.eval_expr(target, scope)?;
            return Ok(Object::nil());
        };
        let current = self.eval_expr(target, scope)?;
        let next = match current.value {
            Value::Int(n) => {
                let n = if inc { n + 1 } else { n - 1 };
                Object::int(n).with_meta(current.meta.clone())
            }
            Value::Symbolic(_) => {
                let mut obj = Object::symbolic(if inc { "incremented value" } else { "decremented value" });
                obj.meta = current.meta.clone();
                obj
            }
            _ => {
                return Err(EvalError::KindMismatch {
                    op: (if inc { "++" } else { "--" }).to_string(),
                    kind: current.kind(),
                });
            }
        };
        self.assign_value(scope, &id.name, next);
        Ok(Object::nil())
    }

    fn eval_if(&mut self, cond: &Expr, then: &Block, els: Option<&Stmt>, scope: &ScopeRef) -> EvalResult<Object> {
        let cond_v = self.eval_expr(cond, scope)?;
        match cond_v.as_bool() {
            // Concrete conditions prune: only the taken branch runs, with
            // ordinary assignment semantics, and its return propagates.
            Some(true) => {
                let child = Scope::child(scope);
                self.eval_block(then, &child)
            }
            Some(false) => match els {
                Some(stmt) => self.eval_stmt(stmt, scope),
                None => Ok(Object::nil()),
            },
            // Unknown condition: both branches run in isolated child
            // scopes, then their copy-on-write cells merge into the outer
            // variable.
            None => {
                self.branch_depth += 1;
                let then_child = Scope::child(scope);
                let then_res = self.eval_block(then, &then_child);
                let else_eval = els.map(|stmt| {
                    let child = Scope::child(scope);
                    let res = match stmt {
                        Stmt::Block(b) => self.eval_block(b, &child),
                        other => self.eval_stmt(other, &child),
                    };
                    (res, child)
                });
                self.branch_depth -= 1;

                let then_res = then_res?;
                self.merge_branch(scope, &then_child);
                let mut else_returned = false;
                if let Some((res, child)) = else_eval {
                    else_returned = res?.is_return();
                    self.merge_branch(scope, &child);
                }
                if then_res.is_return() && else_returned {
                    return Ok(then_res);
                }
                Ok(Object::nil())
            }
        }
    }

    /// Folds a branch scope's copy-on-write cells into the outer variable:
    /// the possible-type sets union, and the merged binding becomes a
    /// placeholder when the branches disagree.
    pub(crate) fn merge_branch(&mut self, parent: &ScopeRef, child: &ScopeRef) {
        for name in child.shadow_names() {
            let Some(child_v) = child.get_local(&name) else { continue };
            let Some((outer_v, def_scope)) = parent.get_with_scope(&name) else {
                continue;
            };
            if Rc::ptr_eq(&def_scope, &self.universe) {
                continue;
            }
            let merged = merge_values(&outer_v, &child_v);
            if self.branch_depth > 0 {
                parent.set_local(name.clone(), merged);
                parent.mark_shadow(&name);
            } else {
                def_scope.set_local(name.clone(), merged);
            }
        }
    }

    fn eval_for(&mut self, cond: Option<&Expr>, body: &Block, scope: &ScopeRef) -> EvalResult<Object> {
        if let Some(c) = cond {
            self.eval_expr(c, scope)?;
        }
        // One symbolic iteration, branch semantics for assignments.
        self.branch_depth += 1;
        let child = Scope::child(scope);
        let res = self.eval_block(body, &child);
        self.branch_depth -= 1;
        res?;
        self.merge_branch(scope, &child);
        Ok(Object::nil())
    }

    fn eval_range(
        &mut self,
        key: Option<&str>,
        value: Option<&str>,
        x: &Expr,
        body: &Block,
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        let subject = self.eval_expr(x, scope)?;
        self.branch_depth += 1;
        let child = Scope::child(scope);
        let (key_obj, value_obj) = range_bindings(&subject);
        if let Some(k) = key
            && k != "_"
        {
            child.set_local(k.to_string(), key_obj);
        }
        if let Some(v) = value
            && v != "_"
        {
            child.set_local(v.to_string(), value_obj);
        }
        let res = self.eval_block(body, &child);
        self.branch_depth -= 1;
        res?;
        self.merge_branch(scope, &child);
        Ok(Object::nil())
    }

    fn eval_switch(&mut self, tag: Option<&Expr>, cases: &[SwitchCase], scope: &ScopeRef) -> EvalResult<Object> {
        if let Some(t) = tag {
            self.eval_expr(t, scope)?;
        }
        for case in cases {
            for e in &case.exprs {
                self.eval_expr(e, scope)?;
            }
            self.branch_depth += 1;
            let child = Scope::child(scope);
            let res = self.eval_block(&case.body, &child);
            self.branch_depth -= 1;
            res?;
            self.merge_branch(scope, &child);
        }
        Ok(Object::nil())
    }

    fn eval_type_switch(
        &mut self,
        binding: Option<&str>,
        x: &Expr,
        cases: &[TypeSwitchCase],
        scope: &ScopeRef,
    ) -> EvalResult<Object> {
        let subject = self.eval_expr(x, scope)?;
        for case in cases {
            self.branch_depth += 1;
            let child = Scope::child(scope);
            if let Some(name) = binding {
                let bound = match case.types.as_slice() {
                    [Some(ft)] => {
                        let mut obj = Object::symbolic("type switch case").with_field_type(ft.clone());
                        obj.meta.type_info = self.resolver.resolve_type_without_policy_check(ft);
                        obj
                    }
                    // default, `nil`, and multi-type cases keep the subject's
                    // static view.
                    _ => subject.clone(),
                };
                child.set_local(name.to_string(), bound);
            }
            let res = self.eval_block(&case.body, &child);
            self.branch_depth -= 1;
            res?;
            self.merge_branch(scope, &child);
        }
        Ok(Object::nil())
    }

    fn eval_select(&mut self, cases: &[SelectCase], scope: &ScopeRef) -> EvalResult<Object> {
        for case in cases {
            self.branch_depth += 1;
            let child = Scope::child(scope);
            let res = (|| -> EvalResult<()> {
                if let Some(comm) = &case.comm {
                    self.eval_stmt(comm, &child)?;
                }
                self.eval_block(&case.body, &child)?;
                Ok(())
            })();
            self.branch_depth -= 1;
            res?;
            self.merge_branch(scope, &child);
        }
        Ok(Object::nil())
    }

    fn eval_return(&mut self, results: &[Expr], scope: &ScopeRef) -> EvalResult<Object> {
        let mut values = Vec::with_capacity(results.len());
        if results.is_empty() {
            // Bare return with named results reads the result slots back.
            let names = self
                .call_stack
                .last()
                .map(|f| f.result_names.clone())
                .unwrap_or_default();
            for name in names {
                if let Some(v) = scope.get(&name) {
                    values.push(v);
                }
            }
        } else {
            for e in results {
                let v = self.eval_expr(e, scope)?;
                match v.value {
                    Value::MultiValue(vs) if results.len() == 1 => values.extend(vs),
                    _ => values.push(v),
                }
            }
        }
        Ok(Object::new(Value::Return(Box::new(crate::object::ReturnValue { values }))))
    }

    fn eval_defer(&mut self, call: &CallExpr, scope: &ScopeRef) -> EvalResult<Object> {
        if call_arms_recovery(call)
            && let Some(frame) = self.call_stack.last_mut()
        {
            frame.recovers = true;
        }
        // The deferred call is explored now; no ordering is modeled.
        self.eval_call(call, scope)?;
        Ok(Object::nil())
    }

    fn eval_go(&mut self, call: &CallExpr, scope: &ScopeRef) -> EvalResult<Object> {
        // Goroutines are not scheduled; the call is explored for its edges.
        self.eval_call(call, scope)?;
        Ok(Object::nil())
    }
}

/// Whether a deferred call structurally arms `recover()` for its frame.
fn call_arms_recovery(call: &CallExpr) -> bool {
    if let Expr::Ident(id) = &call.func
        && id.name == "recover"
    {
        return true;
    }
    let mut exprs: Vec<&Expr> = vec![&call.func];
    exprs.extend(call.args.iter());
    exprs.into_iter().any(|e| match e {
        Expr::FuncLit(lit) => ast::block_mentions_recover(&lit.body),
        _ => false,
    })
}

/// Whether an assignment rhs is one of the comma-ok forms: type assertion,
/// map index, channel receive.
fn comma_ok_form(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::TypeAssert { .. } | Expr::Index { .. } | Expr::Unary { op: ast::UnaryOp::Recv, .. }
    )
}

/// Merges a branch-local value into the outer binding. Candidate type sets
/// union monotonically; the static type of the outer binding wins.
fn merge_values(outer: &Object, child: &Object) -> Object {
    let mut set = outer.type_candidates();
    set.extend(child.type_candidates());
    let meta = if outer.meta.field_type.is_some() || outer.meta.type_info.is_some() {
        outer.meta.clone()
    } else {
        child.meta.clone()
    };
    let sym = Symbolic {
        reason: "merged branch assignment".to_string(),
        possible_types: set,
        ..Symbolic::default()
    };
    Object {
        value: Value::Symbolic(Box::new(sym)),
        meta,
    }
}

/// Keeps the declared static type of an assignment target on the binding.
/// Interface-typed targets keep their interface view regardless of the
/// concrete value flowing in; untyped values inherit the target's field
/// type.
fn inherit_target_meta(existing: &Object, mut value: Object) -> Object {
    if existing.meta.is_interface() {
        value.meta = existing.meta.clone();
        return value;
    }
    if value.meta.field_type.is_none() {
        value.meta.field_type = existing.meta.field_type.clone();
    }
    value
}

/// Writes a struct field through an instance, pointer, or bare struct.
fn assign_field(recv: &Object, name: &str, value: Object) {
    match &recv.value {
        Value::Struct(data) => {
            data.borrow_mut().fields.insert(name.to_string(), value);
        }
        Value::Instance { underlying, .. } => assign_field(underlying, name, value),
        Value::Pointer(pointee) => assign_field(pointee, name, value),
        _ => {}
    }
}

/// Writes an element through a map or slice.
fn assign_element(container: &Object, key: &Object, value: Object) {
    match &container.value {
        Value::Map(data) => {
            data.borrow_mut().entries.push((key.clone(), value));
        }
        Value::Slice(data) => {
            if let Some(idx) = key.as_int()
                && let Ok(idx) = usize::try_from(idx)
                && idx < data.borrow().elems.len()
            {
                data.borrow_mut().elems[idx] = value;
            }
        }
        Value::Instance { underlying, .. } => assign_element(underlying, key, value),
        Value::Pointer(pointee) => assign_element(pointee, key, value),
        _ => {}
    }
}

/// Loop-variable placeholders for a `range` subject.
fn range_bindings(subject: &Object) -> (Object, Object) {
    match &subject.value {
        Value::Slice(data) => {
            let key = Object::symbolic("range index").with_field_type(FieldType::basic("int"));
            let mut value = Object::symbolic("range element");
            if let Some(elem) = &data.borrow().elem_type {
                value = value.with_field_type(elem.clone());
            }
            (key, value)
        }
        Value::Map(data) => {
            let borrow = data.borrow();
            let mut key = Object::symbolic("range key");
            if let Some(k) = &borrow.key_type {
                key = key.with_field_type(k.clone());
            }
            let mut value = Object::symbolic("range value");
            if let Some(v) = &borrow.value_type {
                value = value.with_field_type(v.clone());
            }
            (key, value)
        }
        Value::Str(_) => (
            Object::symbolic("range index").with_field_type(FieldType::basic("int")),
            Object::symbolic("range rune").with_field_type(FieldType::basic("rune")),
        ),
        _ => {
            // Typed via the subject's static element type when known.
            let elem = match subject.meta.field_type.as_deref() {
                Some(FieldType::Slice(elem) | FieldType::Chan(elem)) => {
                    Object::symbolic("range element").with_field_type((**elem).clone())
                }
                Some(FieldType::Map(_, v)) => Object::symbolic("range value").with_field_type((**v).clone()),
                _ => Object::symbolic("range element"),
            };
            (
                Object::symbolic("range index").with_field_type(FieldType::basic("int")),
                elem,
            )
        }
    }
}
