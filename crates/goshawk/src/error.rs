//! Evaluation errors.
//!
//! Errors bubble through expression evaluation as the `Err` arm of
//! [`EvalResult`](crate::EvalResult). Lookups on unresolved or
//! out-of-policy symbols are deliberately *not* errors; they produce
//! symbolic placeholders so the analysis completes; this enum covers the
//! failures that genuinely stop a traversal.

use std::fmt;

use crate::{ast::Pos, object::Object, resource::ResourceError, scan::ScanError};

/// An evaluation failure.
#[derive(Debug, Clone)]
pub enum EvalError {
    /// An identifier was not found in any enclosing scope or the universe.
    UndefinedIdentifier { name: String, pos: Pos },
    /// A selector named neither a field nor a method of the receiver.
    UndefinedSelector { receiver: String, name: String },
    /// An operator was applied to an object whose kind does not support it.
    KindMismatch { op: String, kind: &'static str },
    /// A package could not be scanned.
    PackageLoad(ScanError),
    /// `f(xs...)` with no argument to spread.
    BadVariadic { pos: Pos },
    /// A `panic(v)` reached the frame boundary without a structural
    /// `defer ... recover()`.
    Panic(Box<Object>),
    /// An internal marker object escaped its containment boundary. Always a
    /// bug in the engine, never in the analyzed program.
    MarkerLeak(&'static str),
    /// A step or time budget was exceeded.
    Resource(ResourceError),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedIdentifier { name, .. } => {
                write!(f, "identifier not found: {name}")
            }
            Self::UndefinedSelector { receiver, name } => {
                write!(f, "undefined field or method: {receiver}.{name}")
            }
            Self::KindMismatch { op, kind } => {
                write!(f, "operator {op} not supported on {kind}")
            }
            Self::PackageLoad(err) => write!(f, "{err}"),
            Self::BadVariadic { .. } => {
                write!(f, "invalid use of ... with no argument")
            }
            Self::Panic(value) => write!(f, "panic: {value}"),
            Self::MarkerLeak(which) => {
                write!(f, "internal invariant violated: {which} marker escaped its boundary")
            }
            Self::Resource(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<ScanError> for EvalError {
    fn from(err: ScanError) -> Self {
        Self::PackageLoad(err)
    }
}

impl From<ResourceError> for EvalError {
    fn from(err: ResourceError) -> Self {
        Self::Resource(err)
    }
}

impl EvalError {
    /// Whether this error is a propagating `panic`.
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}
