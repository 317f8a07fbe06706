//! Shared test fixtures: an in-memory Scanner, AST builder helpers, and a
//! call recorder built on the default intrinsic.
//!
//! Tests assemble small Go programs as records and AST nodes, the same
//! shape a real scanner would produce from source, and drive the engine
//! from an entry point.

// Each test binary uses a different slice of the fixture kit.
#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use goshawk::{
    Evaluator, Object, Options, Value,
    ast::{AssignOp, BinaryOp, Block, CallExpr, CompositeElem, Expr, FuncLit, Ident, Pos, Stmt, UnaryOp},
    scan::{
        ConstValue, ConstantInfo, FieldInfo, FieldType, FunctionInfo, MethodInfo, PackageInfo, ParamInfo, ScanError,
        Scanner, TypeInfo, TypeKind, VarInfo,
    },
};

/// Module path used by most fixtures.
pub const MODULE: &str = "example.com/app";

// =============================================================================
// In-memory scanner
// =============================================================================

/// A Scanner backed by a fixed set of pre-built packages.
pub struct MemScanner {
    module: String,
    packages: HashMap<String, Rc<PackageInfo>>,
    /// Number of scan_package calls, for cache-behavior assertions.
    pub scans: RefCell<usize>,
}

impl MemScanner {
    pub fn new(packages: Vec<PackageInfo>) -> Rc<Self> {
        Self::with_module(MODULE, packages)
    }

    pub fn with_module(module: &str, packages: Vec<PackageInfo>) -> Rc<Self> {
        let map = packages.into_iter().map(|p| (p.path.clone(), Rc::new(p))).collect();
        Rc::new(Self {
            module: module.to_string(),
            packages: map,
            scans: RefCell::new(0),
        })
    }
}

impl Scanner for MemScanner {
    fn scan_package(&self, import_path: &str) -> Result<Rc<PackageInfo>, ScanError> {
        *self.scans.borrow_mut() += 1;
        self.packages.get(import_path).cloned().ok_or_else(|| ScanError {
            path: import_path.to_string(),
            reason: "not part of the fixture module".to_string(),
        })
    }

    fn module_path(&self) -> &str {
        &self.module
    }
}

/// An engine over the given packages with default options.
pub fn engine_for(packages: Vec<PackageInfo>) -> Evaluator<MemScanner> {
    Evaluator::new(MemScanner::new(packages), Options::default())
}

pub fn engine_with_options(packages: Vec<PackageInfo>, options: Options) -> Evaluator<MemScanner> {
    Evaluator::new(MemScanner::new(packages), options)
}

// =============================================================================
// Call recorder
// =============================================================================

/// Compact display label for a callee observed by the default intrinsic.
pub fn callee_label(obj: &Object) -> String {
    match &obj.value {
        Value::Func(f) => f.display_name().to_string(),
        Value::BoundMethod { func, receiver } => match receiver.qualified_type_name() {
            Some(t) => format!("({t}).{}", func.display_name()),
            None => func.display_name().to_string(),
        },
        Value::Builtin(b) => b.to_string(),
        Value::Symbolic(sym) => sym
            .underlying_func
            .as_ref()
            .map_or_else(|| "<symbolic>".to_string(), |mi| format!("iface:{}", mi.name)),
        Value::UnresolvedFunction { pkg_path, name } => format!("{pkg_path}.{name}"),
        Value::TypeRef(tr) => format!("conv:{}", tr.display_name()),
        Value::Intrinsic(_) => "<intrinsic>".to_string(),
        _ => format!("<{}>", obj.kind()),
    }
}

/// Installs a default intrinsic that records callee labels in call order.
pub fn record_calls(engine: &mut Evaluator<MemScanner>) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.register_default_intrinsic(move |_ctx, objs| {
        sink.borrow_mut().push(callee_label(&objs[0]));
    });
    log
}

/// Installs a default intrinsic that records full callee objects.
pub fn record_callees(engine: &mut Evaluator<MemScanner>) -> Rc<RefCell<Vec<Object>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    engine.register_default_intrinsic(move |_ctx, objs| {
        sink.borrow_mut().push(objs[0].clone());
    });
    log
}

// =============================================================================
// Expression builders
// =============================================================================

pub fn ident(name: &str) -> Expr {
    Expr::ident(name)
}

pub fn int(v: i64) -> Expr {
    Expr::IntLit(v)
}

pub fn float(v: f64) -> Expr {
    Expr::FloatLit(v)
}

pub fn str_lit(s: &str) -> Expr {
    Expr::StringLit(s.to_string())
}

pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(CallExpr {
        func,
        args,
        ellipsis: false,
        pos: Pos::default(),
    }))
}

pub fn call_name(name: &str, args: Vec<Expr>) -> Expr {
    call(ident(name), args)
}

pub fn call_spread(func: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call(Box::new(CallExpr {
        func,
        args,
        ellipsis: true,
        pos: Pos::default(),
    }))
}

pub fn sel(x: Expr, name: &str) -> Expr {
    Expr::Selector {
        x: Box::new(x),
        sel: Ident::new(name),
    }
}

pub fn addr(e: Expr) -> Expr {
    Expr::Unary {
        op: UnaryOp::Addr,
        operand: Box::new(e),
    }
}

pub fn star(e: Expr) -> Expr {
    Expr::Star(Box::new(e))
}

pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `T{}` / `T{field: value, ...}`
pub fn composite(ty: FieldType, elems: Vec<(Option<&str>, Expr)>) -> Expr {
    Expr::Composite {
        ty: Some(ty),
        elems: elems
            .into_iter()
            .map(|(key, value)| CompositeElem {
                key: key.map(ident),
                value,
            })
            .collect(),
    }
}

pub fn func_lit(params: Vec<ParamInfo>, body: Vec<Stmt>) -> Expr {
    Expr::FuncLit(Rc::new(FuncLit {
        params,
        results: Vec::new(),
        variadic: false,
        body: Rc::new(Block::new(body)),
    }))
}

// =============================================================================
// Statement builders
// =============================================================================

pub fn expr_stmt(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

/// `name := value`
pub fn define(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        lhs: vec![ident(name)],
        rhs: vec![value],
        op: AssignOp::Define,
    }
}

/// `name = value`
pub fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        lhs: vec![ident(name)],
        rhs: vec![value],
        op: AssignOp::Assign,
    }
}

/// `a, b := value`
pub fn define2(a: &str, b: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        lhs: vec![ident(a), ident(b)],
        rhs: vec![value],
        op: AssignOp::Define,
    }
}

pub fn var_decl(name: &str, ty: FieldType) -> Stmt {
    Stmt::Var {
        names: vec![name.to_string()],
        ty: Some(ty),
        values: Vec::new(),
    }
}

pub fn inc(name: &str) -> Stmt {
    Stmt::IncDec {
        target: ident(name),
        inc: true,
    }
}

pub fn dec(name: &str) -> Stmt {
    Stmt::IncDec {
        target: ident(name),
        inc: false,
    }
}

pub fn ret(results: Vec<Expr>) -> Stmt {
    Stmt::Return { results }
}

pub fn ret1(e: Expr) -> Stmt {
    ret(vec![e])
}

pub fn if_else(cond: Expr, then: Vec<Stmt>, els: Vec<Stmt>) -> Stmt {
    Stmt::If {
        cond,
        then: Block::new(then),
        els: Some(Box::new(Stmt::Block(Block::new(els)))),
    }
}

pub fn if_only(cond: Expr, then: Vec<Stmt>) -> Stmt {
    Stmt::If {
        cond,
        then: Block::new(then),
        els: None,
    }
}

pub fn send(chan: Expr, value: Expr) -> Stmt {
    Stmt::Send { chan, value }
}

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block::new(stmts)
}

// =============================================================================
// Type and declaration builders
// =============================================================================

/// A named type in the fixture module's main package.
pub fn app_ty(name: &str) -> FieldType {
    FieldType::named(MODULE, name)
}

pub fn int_ty() -> FieldType {
    FieldType::basic("int")
}

pub fn bool_ty() -> FieldType {
    FieldType::basic("bool")
}

pub fn string_ty() -> FieldType {
    FieldType::basic("string")
}

pub fn param(name: &str, ty: FieldType) -> ParamInfo {
    ParamInfo::new(name, ty)
}

pub fn result(ty: FieldType) -> ParamInfo {
    ParamInfo::unnamed(ty)
}

pub fn method_sig(name: &str) -> MethodInfo {
    MethodInfo {
        name: name.to_string(),
        params: Vec::new(),
        results: Vec::new(),
        variadic: false,
    }
}

fn base_type(pkg_path: &str, pkg_name: &str, name: &str, kind: TypeKind) -> TypeInfo {
    TypeInfo {
        pkg_path: pkg_path.to_string(),
        pkg_name: pkg_name.to_string(),
        name: name.to_string(),
        kind,
        fields: Vec::new(),
        methods: Vec::new(),
        embeds: Vec::new(),
        union_terms: Vec::new(),
        underlying: None,
    }
}

pub fn struct_type(pkg_path: &str, pkg_name: &str, name: &str, fields: Vec<FieldInfo>) -> TypeInfo {
    TypeInfo {
        fields,
        ..base_type(pkg_path, pkg_name, name, TypeKind::Struct)
    }
}

pub fn iface_type(pkg_path: &str, pkg_name: &str, name: &str, methods: Vec<MethodInfo>) -> TypeInfo {
    TypeInfo {
        methods: methods.into_iter().map(Rc::new).collect(),
        ..base_type(pkg_path, pkg_name, name, TypeKind::Interface)
    }
}

pub fn union_type(pkg_path: &str, pkg_name: &str, name: &str, methods: Vec<MethodInfo>, terms: Vec<FieldType>) -> TypeInfo {
    TypeInfo {
        methods: methods.into_iter().map(Rc::new).collect(),
        union_terms: terms,
        ..base_type(pkg_path, pkg_name, name, TypeKind::Interface)
    }
}

pub fn func_def(name: &str, params: Vec<ParamInfo>, results: Vec<ParamInfo>, body: Vec<Stmt>) -> FunctionInfo {
    FunctionInfo {
        name: name.to_string(),
        receiver: None,
        params,
        results,
        variadic: false,
        body: Some(Rc::new(Block::new(body))),
        pos: Pos::default(),
    }
}

/// A declaration without a body (out-of-policy or assembly stub shape).
pub fn external_func(name: &str, params: Vec<ParamInfo>, results: Vec<ParamInfo>) -> FunctionInfo {
    FunctionInfo {
        body: None,
        ..func_def(name, params, results, Vec::new())
    }
}

pub fn method_def(recv_name: &str, recv_ty: FieldType, name: &str, body: Vec<Stmt>) -> FunctionInfo {
    FunctionInfo {
        receiver: Some(FieldInfo::new(recv_name, recv_ty)),
        ..func_def(name, Vec::new(), Vec::new(), body)
    }
}

// =============================================================================
// Package builder
// =============================================================================

pub struct PkgBuilder {
    info: PackageInfo,
}

/// Starts a package in the fixture module's root (`package main`).
pub fn app_pkg() -> PkgBuilder {
    PkgBuilder::new(MODULE, "main")
}

impl PkgBuilder {
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            info: PackageInfo::new(path, name),
        }
    }

    pub fn import(mut self, short: &str, path: &str) -> Self {
        self.info.imports.insert(short.to_string(), path.to_string());
        self
    }

    pub fn func(mut self, def: FunctionInfo) -> Self {
        self.info.functions.push(Rc::new(def));
        self
    }

    pub fn ty(mut self, ti: TypeInfo) -> Self {
        self.info.types.push(Rc::new(ti));
        self
    }

    pub fn constant(mut self, name: &str, value: ConstValue) -> Self {
        self.info.constants.push(ConstantInfo {
            name: name.to_string(),
            ty: None,
            value,
        });
        self
    }

    pub fn var(mut self, name: &str, ty: Option<FieldType>, init: Option<Expr>) -> Self {
        self.info.vars.push(VarInfo {
            name: name.to_string(),
            ty,
            init,
        });
        self
    }

    pub fn build(self) -> PackageInfo {
        self.info
    }
}
