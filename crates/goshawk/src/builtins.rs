//! The universe scope: built-in type names, constants, and callables.
//!
//! The universe sits at the root of every scope chain and is read-only
//! after construction. Builtin callables are an enum dispatched by the
//! evaluator rather than closures, so they stay `Copy`, comparable, and
//! cheap to store in bindings.

use std::rc::Rc;

use strum::IntoEnumIterator;

use crate::{
    object::{Object, TypeRefObj, Value},
    scan::TypeInfo,
    scope::{Scope, ScopeRef},
};

/// Names of the universe types. `any` is carried as its own basic type, not
/// as an alias, since the engine never needs the distinction.
pub const BASIC_TYPES: &[&str] = &[
    "any", "bool", "byte", "comparable", "error", "float32", "float64", "int", "int8", "int16", "int32", "int64",
    "rune", "string", "uint", "uint8", "uint16", "uint32", "uint64", "uintptr",
];

/// Every universe callable.
///
/// Uses strum so bindings serialize to the lowercase Go name (`Println` ->
/// "println").
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
}

/// Whether `name` names a universe type.
pub fn is_basic_type(name: &str) -> bool {
    BASIC_TYPES.contains(&name)
}

/// Builds the universe scope. One per engine; bindings are never written
/// again after this returns.
pub fn universe() -> ScopeRef {
    let scope = Scope::root();
    for name in BASIC_TYPES {
        let info = Rc::new(TypeInfo::basic(*name));
        scope.set_local(*name, Object::new(Value::TypeRef(TypeRefObj::of_info(info))));
    }
    scope.set_local("true", Object::truth(true));
    scope.set_local("false", Object::truth(false));
    scope.set_local("nil", Object::nil());
    for builtin in Builtin::iter() {
        scope.set_local(builtin.to_string(), Object::new(Value::Builtin(builtin)));
    }
    scope
}
