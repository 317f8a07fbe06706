//! Engine execution tracing.
//!
//! A trait-based tracing system for the evaluator. The engine carries its
//! tracer as a type parameter, so with [`NoopTracer`] every hook inlines to
//! nothing and tracing has zero cost in production.
//!
//! | Tracer | Purpose |
//! |--------|---------|
//! | [`NoopTracer`] | Zero-cost no-op (default) |
//! | [`StderrTracer`] | Human-readable traversal log on stderr |
//! | [`RecordingTracer`] | Full event capture for determinism tests and post-mortems |

use crate::ast::Pos;

/// Trace event emitted during a traversal.
///
/// [`RecordingTracer`] captures these; the determinism property tests
/// compare recorded streams across runs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum TraceEvent {
    /// A call frame was pushed.
    Call {
        /// Callee name when one is known (`pkg.Fn`, method name, or `None`
        /// for anonymous function literals).
        name: Option<String>,
        /// Call stack depth after the push.
        depth: usize,
        pos: Pos,
    },
    /// A call frame was popped.
    Return { depth: usize },
    /// A package object was created for an import path.
    PackageLoad { path: String },
    /// A registered intrinsic replaced or observed a call.
    Intrinsic { key: String },
    /// An interface method call was recorded in the call log.
    InterfaceCall { key: String },
}

/// Trait for evaluator tracing.
///
/// All methods default to no-ops, so [`NoopTracer`] needs no code and
/// monomorphizes away. Implementations override only the hooks they need.
pub trait EngineTracer {
    /// Called after a call frame is pushed, before the callee is entered.
    #[inline(always)]
    fn on_call(&mut self, _name: Option<&str>, _depth: usize, _pos: Pos) {}

    /// Called after a call frame is popped.
    #[inline(always)]
    fn on_return(&mut self, _depth: usize) {}

    /// Called when a package object is created for an import path.
    #[inline(always)]
    fn on_package_load(&mut self, _path: &str) {}

    /// Called when a keyed intrinsic fires.
    #[inline(always)]
    fn on_intrinsic(&mut self, _key: &str) {}

    /// Called when an interface method call is appended to the call log.
    #[inline(always)]
    fn on_interface_call(&mut self, _key: &str) {}
}

/// A tracer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl EngineTracer for NoopTracer {}

/// Tracer that prints a human-readable traversal log to stderr.
///
/// ```text
///   >>> call main.Run           depth=1
///   <<< return                  depth=0
///   pkg example.com/m/store
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl EngineTracer for StderrTracer {
    fn on_call(&mut self, name: Option<&str>, depth: usize, _pos: Pos) {
        eprintln!("  >>> call {:<24} depth={depth}", name.unwrap_or("<anonymous>"));
    }

    fn on_return(&mut self, depth: usize) {
        eprintln!("  <<< return {:<22} depth={depth}", "");
    }

    fn on_package_load(&mut self, path: &str) {
        eprintln!("  pkg {path}");
    }

    fn on_intrinsic(&mut self, key: &str) {
        eprintln!("  intrinsic {key}");
    }

    fn on_interface_call(&mut self, key: &str) {
        eprintln!("  iface {key}");
    }
}

/// Tracer that records every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingTracer {
    events: Vec<TraceEvent>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }
}

impl EngineTracer for RecordingTracer {
    fn on_call(&mut self, name: Option<&str>, depth: usize, pos: Pos) {
        self.events.push(TraceEvent::Call {
            name: name.map(str::to_string),
            depth,
            pos,
        });
    }

    fn on_return(&mut self, depth: usize) {
        self.events.push(TraceEvent::Return { depth });
    }

    fn on_package_load(&mut self, path: &str) {
        self.events.push(TraceEvent::PackageLoad { path: path.to_string() });
    }

    fn on_intrinsic(&mut self, key: &str) {
        self.events.push(TraceEvent::Intrinsic { key: key.to_string() });
    }

    fn on_interface_call(&mut self, key: &str) {
        self.events.push(TraceEvent::InterfaceCall { key: key.to_string() });
    }
}
