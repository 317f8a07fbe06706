//! goshawk: a symbolic execution engine for Go source code.
//!
//! Given a scanned Go module and an entry-point function, the engine
//! abstractly interprets the program's AST to discover which functions,
//! methods, interface implementations, and external symbols are reachable.
//! It is the analytical substrate for tools such as orphan-function
//! finders, call-graph extractors, and documentation generators.
//!
//! The engine does not parse Go or execute anything for real: a
//! [`Scanner`](scan::Scanner) supplies declaration records and AST bodies,
//! and evaluation produces a lattice of concrete values and typed symbolic
//! placeholders. Hosts observe the traversal through the intrinsic bus
//! ([`Evaluator::register_default_intrinsic`]) and steer it with a scan
//! policy that separates deep analysis from opaque dependencies.
//!
//! ```no_run
//! use std::rc::Rc;
//! use goshawk::{Evaluator, Options};
//! # use goshawk::scan::{PackageInfo, ScanError, Scanner};
//! # struct NullScanner;
//! # impl Scanner for NullScanner {
//! #     fn scan_package(&self, path: &str) -> Result<Rc<PackageInfo>, ScanError> {
//! #         Err(ScanError { path: path.to_string(), reason: "no source".to_string() })
//! #     }
//! #     fn module_path(&self) -> &str {
//! #         "example.com/app"
//! #     }
//! # }
//!
//! let mut engine = Evaluator::new(Rc::new(NullScanner), Options::default());
//! engine.register_default_intrinsic(|_ctx, objs| {
//!     println!("call: {}", objs[0]);
//! });
//! let result = engine.eval_entry("example.com/app", "main")?;
//! # Ok::<(), goshawk::EvalError>(())
//! ```

mod accessor;
mod builtins;
mod error;
mod eval;
mod intrinsics;
mod loader;
mod object;
mod resolver;
mod resource;
mod scope;
mod tracer;

pub mod ast;
pub mod scan;

pub use crate::{
    accessor::{Accessor, Lookup, MethodSearch},
    builtins::{BASIC_TYPES, Builtin, universe},
    error::EvalError,
    eval::{EvalResult, Evaluator, Options},
    intrinsics::{CallContext, IntrinsicFn, IntrinsicRegistry, iface_method_key, method_key, pkg_key},
    loader::{PackageObj, PackageStore},
    object::{
        ChanData, Function, MapData, Object, ReturnValue, SliceData, StructData, Symbolic, TypeMeta, TypeRefObj,
        Value, VarCell,
    },
    resolver::{Resolver, ScanPolicy},
    resource::{ResourceError, StepBudget},
    scope::{Scope, ScopeRef},
    tracer::{EngineTracer, NoopTracer, RecordingTracer, StderrTracer, TraceEvent},
};
