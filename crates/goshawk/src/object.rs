//! The object lattice: every value the evaluator produces.
//!
//! An [`Object`] is a tagged [`Value`] plus a common metadata tail
//! ([`TypeMeta`]) carrying the static field type and the resolved type
//! record when they are known. Concrete scalars coexist with symbolic
//! placeholders; both flow through the same evaluation paths.
//!
//! Sharing rules: [`Function`] objects are immutable and shared via `Rc`;
//! receivers are attached with [`Value::BoundMethod`], never by mutation.
//! Struct, slice, and map payloads sit behind `Rc<RefCell<...>>` so that
//! pointers and instances alias the same storage.

use std::{
    cell::RefCell,
    collections::BTreeSet,
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    ast::{Block, Expr},
    error::EvalError,
    intrinsics::IntrinsicFn,
    loader::PackageObj,
    scan::{FieldType, FunctionInfo, MethodInfo, ParamInfo, TypeInfo},
    scope::ScopeRef,
};

/// Static type metadata attached to every object.
///
/// `field_type` is the syntactic type from a signature or declaration;
/// `type_info` is the resolved semantic record. Absence means "unknown".
#[derive(Debug, Clone, Default)]
pub struct TypeMeta {
    pub field_type: Option<Rc<FieldType>>,
    pub type_info: Option<Rc<TypeInfo>>,
}

impl TypeMeta {
    pub fn of_field_type(ft: FieldType) -> Self {
        Self {
            field_type: Some(Rc::new(ft)),
            type_info: None,
        }
    }

    /// Whether the resolved type is an interface.
    pub fn is_interface(&self) -> bool {
        self.type_info.as_ref().is_some_and(|ti| ti.is_interface())
    }
}

/// A symbolic placeholder: "some value of this static type".
#[derive(Debug, Clone, Default)]
pub struct Symbolic {
    /// Human-readable provenance, for diagnostics only.
    pub reason: String,
    /// Receiver of a pending interface method call.
    pub receiver: Option<Box<Object>>,
    /// Signature of a pending interface method call; makes the placeholder
    /// callable.
    pub underlying_func: Option<Rc<MethodInfo>>,
    /// Dynamic types this value may hold, learned from control flow.
    /// Sorted, and only ever grows.
    pub possible_types: BTreeSet<String>,
}

/// A named binding cell. Package-level variables keep their initializer
/// here and evaluate it on first read; `is_evaluated` guarantees the
/// initializer runs at most once.
#[derive(Debug)]
pub struct VarCell {
    pub name: String,
    pub value: Object,
    pub is_evaluated: bool,
    pub initializer: Option<Expr>,
    /// Declaring package, used as evaluation context for the initializer.
    pub pkg: Option<Rc<PackageObj>>,
}

/// A callable closure.
///
/// Shared and immutable; `id` is the engine-assigned identity used for
/// recursion detection and memoization (stable across the clone made when a
/// function value crosses a call boundary and picks up a bound call stack).
#[derive(Clone)]
pub struct Function {
    pub id: u64,
    pub name: Option<String>,
    pub params: Vec<ParamInfo>,
    pub results: Vec<ParamInfo>,
    pub variadic: bool,
    pub body: Option<Rc<Block>>,
    /// Captured lexical environment.
    pub scope: ScopeRef,
    /// Owning package, when the function came from a declaration.
    pub pkg: Option<Rc<PackageObj>>,
    /// Declaration record, when the function came from a declaration.
    pub def: Option<Rc<FunctionInfo>>,
    /// Call-stack snapshot taken when this function value was passed into
    /// another function. Checked by recursion detection so that mutual
    /// recursion through a callback cannot escape it.
    pub bound_stack: Option<Rc<Vec<u64>>>,
}

impl Function {
    /// A copy of this function carrying a bound call-stack snapshot.
    pub fn with_bound_stack(&self, stack: Vec<u64>) -> Self {
        let mut cloned = self.clone();
        cloned.bound_stack = Some(Rc::new(stack));
        cloned
    }

    /// Display name for traces and diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

// Manual Debug: the captured scope reaches back to this function through the
// package environment, so a derived impl would recurse forever.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("variadic", &self.variadic)
            .field("has_body", &self.body.is_some())
            .finish_non_exhaustive()
    }
}

/// Ordered struct storage. Shared so pointers and instances alias.
#[derive(Debug, Clone, Default)]
pub struct StructData {
    pub fields: IndexMap<String, Object>,
}

/// Slice storage with element-type metadata.
#[derive(Debug, Clone, Default)]
pub struct SliceData {
    pub elems: Vec<Object>,
    pub elem_type: Option<FieldType>,
}

/// Map storage. Keys may be symbolic, so entries are an ordered pair list
/// rather than a hash table.
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub entries: Vec<(Object, Object)>,
    pub key_type: Option<FieldType>,
    pub value_type: Option<FieldType>,
}

/// Channel storage. Channels are modeled structurally: only the element
/// type matters.
#[derive(Debug, Clone, Default)]
pub struct ChanData {
    pub elem_type: Option<FieldType>,
}

/// The values of a `return` statement in flight through block evaluation.
#[derive(Debug, Clone, Default)]
pub struct ReturnValue {
    pub values: Vec<Object>,
}

/// A first-class type reference, usable as a conversion callable.
///
/// Named types carry the resolved record; composite type expressions
/// (`[]int`, `map[string]T`) carry only the syntactic type.
#[derive(Debug, Clone, Default)]
pub struct TypeRefObj {
    pub info: Option<Rc<TypeInfo>>,
    pub ft: Option<Rc<FieldType>>,
}

impl TypeRefObj {
    pub fn of_info(info: Rc<TypeInfo>) -> Self {
        let ft = FieldType::named(info.pkg_path.clone(), info.name.clone());
        Self {
            info: Some(info),
            ft: Some(Rc::new(ft)),
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(info) = &self.info {
            return info.qualified_name();
        }
        match &self.ft {
            Some(ft) => ft.to_string(),
            None => "<type>".to_string(),
        }
    }
}

/// The tagged value variants.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Bool(bool),
    Nil,
    Symbolic(Box<Symbolic>),
    /// A named binding cell (package-level variables).
    Var(Rc<RefCell<VarCell>>),
    Func(Rc<Function>),
    /// A shared function paired with a receiver, without mutating the
    /// function.
    BoundMethod {
        func: Rc<Function>,
        receiver: Box<Object>,
    },
    /// A value of a named type; `type_name` is the qualified display name.
    Instance {
        type_name: String,
        underlying: Box<Object>,
    },
    Struct(Rc<RefCell<StructData>>),
    Pointer(Box<Object>),
    Slice(Rc<RefCell<SliceData>>),
    Map(Rc<RefCell<MapData>>),
    Chan(Rc<ChanData>),
    Package(Rc<PackageObj>),
    /// A first-class type, callable as a conversion.
    TypeRef(TypeRefObj),
    /// A universe callable (`len`, `make`, `append`, ...).
    Builtin(crate::builtins::Builtin),
    /// A host-registered callable.
    Intrinsic(IntrinsicFn),
    /// A callable stand-in for a symbol in an out-of-policy package.
    UnresolvedFunction { pkg_path: String, name: String },
    /// A type stand-in for a symbol in an out-of-policy package.
    UnresolvedType { pkg_path: String, name: String },
    /// Wraps an argument spread with `...`.
    Variadic(Box<Object>),
    /// Transports `return` values through block evaluation. Must never
    /// survive past the function boundary.
    Return(Box<ReturnValue>),
    /// Transports a multi-result call into a destructuring assignment.
    /// Must never survive past statement evaluation.
    MultiValue(Vec<Object>),
    /// Both field and method lookup bottomed out on an unresolved embedded
    /// type; the surrounding context decides what to do.
    AmbiguousSelector { type_name: String, sel: String },
    /// A propagating error value (panic payloads).
    Error(Rc<EvalError>),
}

/// A value plus its static type metadata.
#[derive(Debug, Clone)]
pub struct Object {
    pub value: Value,
    pub meta: TypeMeta,
}

impl Object {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            meta: TypeMeta::default(),
        }
    }

    pub fn int(v: i64) -> Self {
        Self::new(Value::Int(v))
    }

    pub fn float(v: f64) -> Self {
        Self::new(Value::Float(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::new(Value::Str(Rc::from(v.into())))
    }

    /// The boolean singletons.
    pub fn truth(v: bool) -> Self {
        Self::new(Value::Bool(v))
    }

    /// The nil singleton.
    pub fn nil() -> Self {
        Self::new(Value::Nil)
    }

    pub fn symbolic(reason: impl Into<String>) -> Self {
        Self::new(Value::Symbolic(Box::new(Symbolic {
            reason: reason.into(),
            ..Symbolic::default()
        })))
    }

    pub fn with_field_type(mut self, ft: FieldType) -> Self {
        self.meta.field_type = Some(Rc::new(ft));
        self
    }

    pub fn with_type_info(mut self, ti: Rc<TypeInfo>) -> Self {
        self.meta.type_info = Some(ti);
        self
    }

    pub fn with_meta(mut self, meta: TypeMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Object kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.value {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
            Value::Symbolic(_) => "symbolic",
            Value::Var(_) => "variable",
            Value::Func(_) => "function",
            Value::BoundMethod { .. } => "bound method",
            Value::Instance { .. } => "instance",
            Value::Struct(_) => "struct",
            Value::Pointer(_) => "pointer",
            Value::Slice(_) => "slice",
            Value::Map(_) => "map",
            Value::Chan(_) => "channel",
            Value::Package(_) => "package",
            Value::TypeRef(_) => "type",
            Value::Builtin(_) => "builtin",
            Value::Intrinsic(_) => "intrinsic",
            Value::UnresolvedFunction { .. } => "unresolved function",
            Value::UnresolvedType { .. } => "unresolved type",
            Value::Variadic(_) => "variadic",
            Value::Return(_) => "return value",
            Value::MultiValue(_) => "multi-value",
            Value::AmbiguousSelector { .. } => "ambiguous selector",
            Value::Error(_) => "error",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.value {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self.value, Value::Nil)
    }

    pub fn is_return(&self) -> bool {
        matches!(self.value, Value::Return(_))
    }

    /// The symbolic payload, when this is a placeholder.
    pub fn as_symbolic(&self) -> Option<&Symbolic> {
        match &self.value {
            Value::Symbolic(sym) => Some(sym),
            _ => None,
        }
    }

    /// Qualified name of this object's declared type, when one is known.
    pub fn qualified_type_name(&self) -> Option<String> {
        if let Value::Instance { type_name, .. } = &self.value {
            return Some(type_name.clone());
        }
        self.meta.type_info.as_ref().map(|ti| ti.qualified_name())
    }

    /// Dynamic type candidates contributed by this value at a branch join.
    ///
    /// Instances report their own type, pointers look through to the
    /// pointee, and placeholders contribute their accumulated set. Values
    /// with no named dynamic type contribute nothing.
    pub fn type_candidates(&self) -> BTreeSet<String> {
        match &self.value {
            Value::Instance { type_name, .. } => std::iter::once(type_name.clone()).collect(),
            Value::Pointer(pointee) => pointee.type_candidates(),
            Value::Symbolic(sym) => sym.possible_types.clone(),
            _ => BTreeSet::new(),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Nil => write!(f, "nil"),
            Value::Symbolic(sym) => write!(f, "<symbolic: {}>", sym.reason),
            Value::Var(cell) => write!(f, "<var {}>", cell.borrow().name),
            Value::Func(func) => write!(f, "<func {}>", func.display_name()),
            Value::BoundMethod { func, .. } => {
                write!(f, "<bound method {}>", func.display_name())
            }
            Value::Instance { type_name, .. } => write!(f, "<{type_name}>"),
            Value::Struct(_) => write!(f, "<struct>"),
            Value::Pointer(pointee) => write!(f, "&{pointee}"),
            Value::Slice(data) => write!(f, "<slice len={}>", data.borrow().elems.len()),
            Value::Map(data) => write!(f, "<map len={}>", data.borrow().entries.len()),
            Value::Chan(_) => write!(f, "<chan>"),
            Value::Package(pkg) => write!(f, "<package {}>", pkg.path),
            Value::TypeRef(tr) => write!(f, "<type {}>", tr.display_name()),
            Value::Builtin(b) => write!(f, "<builtin {b}>"),
            Value::Intrinsic(_) => write!(f, "<intrinsic>"),
            Value::UnresolvedFunction { pkg_path, name } => {
                write!(f, "<unresolved func {pkg_path}.{name}>")
            }
            Value::UnresolvedType { pkg_path, name } => {
                write!(f, "<unresolved type {pkg_path}.{name}>")
            }
            Value::Variadic(inner) => write!(f, "{inner}..."),
            Value::Return(ret) => write!(f, "<return of {} values>", ret.values.len()),
            Value::MultiValue(values) => write!(f, "<{} values>", values.len()),
            Value::AmbiguousSelector { type_name, sel } => {
                write!(f, "<ambiguous selector {type_name}.{sel}>")
            }
            Value::Error(err) => write!(f, "<error: {err}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_look_through_pointers() {
        let dog = Object::new(Value::Instance {
            type_name: "main.Dog".to_string(),
            underlying: Box::new(Object::nil()),
        });
        let ptr = Object::new(Value::Pointer(Box::new(dog)));
        let got: Vec<String> = ptr.type_candidates().into_iter().collect();
        assert_eq!(got, vec!["main.Dog".to_string()]);
    }

    #[test]
    fn candidate_sets_are_sorted() {
        let mut sym = Symbolic::default();
        sym.possible_types.insert("main.Dog".to_string());
        sym.possible_types.insert("main.Cat".to_string());
        let obj = Object::new(Value::Symbolic(Box::new(sym)));
        let got: Vec<String> = obj.type_candidates().into_iter().collect();
        assert_eq!(got, vec!["main.Cat".to_string(), "main.Dog".to_string()]);
    }

    #[test]
    fn scalar_accessors() {
        assert_eq!(Object::int(12).as_int(), Some(12));
        assert_eq!(Object::float(3.5).as_float(), Some(3.5));
        assert_eq!(Object::truth(true).as_bool(), Some(true));
        assert_eq!(Object::string("x").as_str(), Some("x"));
        assert!(Object::nil().is_nil());
        assert_eq!(Object::int(1).as_float(), None);
    }
}
