//! Go AST node types consumed by the evaluator.
//!
//! The engine never parses Go text; a [`Scanner`](crate::scan::Scanner)
//! implementation (or a test fixture) produces these nodes. The shape follows
//! `go/ast` closely enough that a host wrapping the real Go toolchain can
//! translate mechanically, but type expressions are pre-resolved into
//! [`FieldType`] so the evaluator never has to consult an import table.

use std::rc::Rc;

use crate::scan::{FieldType, ParamInfo};

/// A source position. `Pos::default()` means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

/// An identifier with its source position.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pos: Pos::default(),
        }
    }
}

/// Unary operators. `*p` dereference is [`Expr::Star`], not a unary op,
/// mirroring `go/ast` where `StarExpr` is its own node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    /// `!x`
    Not,
    /// `-x`
    Neg,
    /// `&x`
    Addr,
    /// `<-ch`
    Recv,
    /// `^x`
    BitNot,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    /// Whether the operator produces a boolean result.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge | Self::LogicalAnd | Self::LogicalOr
        )
    }
}

/// A call expression. Kept as a named struct because `defer` and `go`
/// statements reference calls directly.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CallExpr {
    pub func: Expr,
    pub args: Vec<Expr>,
    /// `f(xs...)` spread on the final argument.
    pub ellipsis: bool,
    pub pos: Pos,
}

/// A function literal. The body is shared so closures cloned during
/// evaluation do not duplicate the AST.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FuncLit {
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
    pub body: Rc<Block>,
}

/// One element of a composite literal: `key: value` or a bare value.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CompositeElem {
    pub key: Option<Expr>,
    pub value: Expr,
}

/// An expression.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Ident(Ident),
    IntLit(i64),
    FloatLit(f64),
    StringLit(String),
    /// `x.Sel`
    Selector { x: Box<Expr>, sel: Ident },
    Call(Box<CallExpr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `x[i]`
    Index { x: Box<Expr>, index: Box<Expr> },
    /// `x[low:high]`
    Slice {
        x: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
    },
    /// `*x`, pointer dereference (or pointer type in type position).
    Star(Box<Expr>),
    Paren(Box<Expr>),
    /// `T{...}`, `[]T{...}`, `map[K]V{...}`. A `None` type appears for
    /// nested literals whose type is implied by the enclosing literal.
    Composite {
        ty: Option<FieldType>,
        elems: Vec<CompositeElem>,
    },
    FuncLit(Rc<FuncLit>),
    /// `x.(T)`; the type is `None` for the `x.(type)` form inside a type
    /// switch guard.
    TypeAssert { x: Box<Expr>, ty: Option<FieldType> },
    /// A type used in expression position: conversion callee, `make`
    /// argument, type-switch case.
    TypeExpr(FieldType),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(Ident::new(name))
    }

    /// The position of the expression, when one is carried.
    pub fn pos(&self) -> Pos {
        match self {
            Self::Ident(id) => id.pos,
            Self::Call(call) => call.pos,
            Self::Selector { sel, .. } => sel.pos,
            Self::Paren(inner) | Self::Star(inner) => inner.pos(),
            _ => Pos::default(),
        }
    }
}

/// A brace-delimited statement list.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }
}

/// One `case` clause of an expression switch. An empty `exprs` list is the
/// `default` clause.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SwitchCase {
    pub exprs: Vec<Expr>,
    pub body: Block,
}

/// One `case` clause of a type switch. A `None` entry in `types` is the
/// `nil` case; an empty list is the `default` clause.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TypeSwitchCase {
    pub types: Vec<Option<FieldType>>,
    pub body: Block,
}

/// One clause of a `select`. The communication statement is a send or a
/// receive assignment; `None` is the `default` clause.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SelectCase {
    pub comm: Option<Box<Stmt>>,
    pub body: Block,
}

/// Assignment forms. Compound forms (`+=` etc.) are desugared by scanners
/// into `Assign` with an explicit binary expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AssignOp {
    /// `:=`
    Define,
    /// `=`
    Assign,
}

/// A statement.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Assign {
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        op: AssignOp,
    },
    /// `var x T = v`: names with an optional declared type and optional
    /// initializers.
    Var {
        names: Vec<String>,
        ty: Option<FieldType>,
        values: Vec<Expr>,
    },
    /// `x++` / `x--`
    IncDec { target: Expr, inc: bool },
    If {
        cond: Expr,
        then: Block,
        /// Either another `If` (an `else if` chain) or a `Block`.
        els: Option<Box<Stmt>>,
    },
    For { cond: Option<Expr>, body: Block },
    Range {
        key: Option<String>,
        value: Option<String>,
        x: Expr,
        body: Block,
    },
    Switch {
        tag: Option<Expr>,
        cases: Vec<SwitchCase>,
    },
    TypeSwitch {
        /// `v := x.(type)` binding, when present.
        binding: Option<String>,
        x: Expr,
        cases: Vec<TypeSwitchCase>,
    },
    Select { cases: Vec<SelectCase> },
    Return { results: Vec<Expr> },
    Defer(CallExpr),
    Go(CallExpr),
    /// `ch <- v`
    Send { chan: Expr, value: Expr },
    Block(Block),
}

/// Reports whether a block structurally contains a call to `recover`.
///
/// Used to decide whether a deferred function arms panic recovery for the
/// frame that registered the defer. Only call positions are inspected; a
/// `recover` identifier passed around as a value does not count.
pub fn block_mentions_recover(block: &Block) -> bool {
    block.stmts.iter().any(stmt_mentions_recover)
}

fn stmt_mentions_recover(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Expr(e) => expr_mentions_recover(e),
        Stmt::Assign { rhs, .. } => rhs.iter().any(expr_mentions_recover),
        Stmt::Var { values, .. } => values.iter().any(expr_mentions_recover),
        Stmt::If { then, els, .. } => {
            block_mentions_recover(then) || els.as_deref().is_some_and(stmt_mentions_recover)
        }
        Stmt::For { body, .. } | Stmt::Range { body, .. } => block_mentions_recover(body),
        Stmt::Switch { cases, .. } => cases.iter().any(|c| block_mentions_recover(&c.body)),
        Stmt::TypeSwitch { cases, .. } => cases.iter().any(|c| block_mentions_recover(&c.body)),
        Stmt::Select { cases } => cases.iter().any(|c| block_mentions_recover(&c.body)),
        Stmt::Return { results } => results.iter().any(expr_mentions_recover),
        Stmt::Defer(call) | Stmt::Go(call) => call_mentions_recover(call),
        Stmt::Block(b) => block_mentions_recover(b),
        _ => false,
    }
}

fn call_mentions_recover(call: &CallExpr) -> bool {
    if let Expr::Ident(id) = &call.func
        && id.name == "recover"
    {
        return true;
    }
    expr_mentions_recover(&call.func) || call.args.iter().any(expr_mentions_recover)
}

fn expr_mentions_recover(expr: &Expr) -> bool {
    match expr {
        Expr::Call(call) => call_mentions_recover(call),
        Expr::Unary { operand, .. } => expr_mentions_recover(operand),
        Expr::Binary { left, right, .. } => expr_mentions_recover(left) || expr_mentions_recover(right),
        Expr::Paren(inner) | Expr::Star(inner) => expr_mentions_recover(inner),
        Expr::FuncLit(lit) => block_mentions_recover(&lit.body),
        _ => false,
    }
}
