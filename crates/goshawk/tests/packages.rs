//! Package loading: singleton objects, the scan policy boundary, constant
//! materialization, and lazy package-level variables.

mod common;

use std::rc::Rc;

use common::*;
use goshawk::{
    Evaluator, Options, PackageStore, Resolver, Value,
    scan::{ConstValue, FieldType, Scanner},
    universe,
};
use pretty_assertions::assert_eq;

const STORE_PKG: &str = "example.com/app/store";
const VENDOR_PKG: &str = "github.com/vendor/redis";

fn store_pkg() -> goshawk::scan::PackageInfo {
    PkgBuilder::new(STORE_PKG, "store")
        .func(func_def("newStore", vec![], vec![result(int_ty())], vec![ret1(int(1))]))
        .func(func_def(
            "Open",
            vec![],
            vec![result(int_ty())],
            vec![ret1(call_name("newStore", vec![]))],
        ))
        .var("Default", Some(int_ty()), Some(call_name("newStore", vec![])))
        .constant("MaxRetries", ConstValue::Int(5))
        .constant("Name", ConstValue::Str("store".to_string()))
        .constant("Tuned", ConstValue::Opaque)
        .build()
}

fn vendor_pkg() -> goshawk::scan::PackageInfo {
    PkgBuilder::new(VENDOR_PKG, "redis")
        .func(func_def(
            "Connect",
            vec![],
            vec![result(FieldType::named(VENDOR_PKG, "Client"))],
            vec![expr_stmt(call_name("dial", vec![]))],
        ))
        .func(func_def("dial", vec![], vec![], vec![]))
        .ty(struct_type(VENDOR_PKG, "redis", "Client", vec![]))
        .build()
}

// =============================================================================
// 1. singletons
// =============================================================================

/// The store hands out one package object per import path.
#[test]
fn package_objects_are_singletons() {
    let scanner = MemScanner::new(vec![store_pkg()]);
    let store = PackageStore::new(scanner, universe());
    let a = store.load(STORE_PKG).unwrap();
    let b = store.load(STORE_PKG).unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

/// A shell package created for an unscannable path is also a singleton.
#[test]
fn shell_packages_are_singletons() {
    let scanner = MemScanner::new(vec![]);
    let store = PackageStore::new(scanner, universe());
    let a = store.load_or_shell("github.com/gone/gone");
    let b = store.load_or_shell("github.com/gone/gone");
    assert!(Rc::ptr_eq(&a, &b));
    assert!(a.info().is_none());
}

/// The resolver hands out one function object per declaration.
#[test]
fn function_objects_are_singletons() {
    let scanner = MemScanner::new(vec![store_pkg()]);
    let store = PackageStore::new(Rc::clone(&scanner), universe());
    let resolver = Resolver::new(Rc::clone(&scanner), Rc::new(|_: &str| true));
    let pkg = store.load(STORE_PKG).unwrap();
    let def = scanner.scan_package(STORE_PKG).unwrap().function("Open").unwrap().clone();
    let a = resolver.resolve_function(&pkg, &def);
    let b = resolver.resolve_function(&pkg, &def);
    assert!(Rc::ptr_eq(&a, &b));
    assert_eq!(a.id, b.id);
}

// =============================================================================
// 2. scan policy
// =============================================================================

/// Calls into an in-policy subpackage descend into the body.
#[test]
fn in_policy_subpackage_is_executed_deeply() {
    let app = app_pkg()
        .import("store", STORE_PKG)
        .func(func_def(
            "entry",
            vec![],
            vec![result(int_ty())],
            vec![ret1(call(sel(ident("store"), "Open"), vec![]))],
        ))
        .build();
    let mut engine = engine_for(vec![app, store_pkg()]);
    let calls = record_calls(&mut engine);
    let got = engine.eval_entry(MODULE, "entry").unwrap();
    assert_eq!(got.as_int(), Some(1), "deep execution reaches the concrete return");
    assert!(calls.borrow().iter().any(|c| c == "newStore"));
}

/// Calls into an out-of-policy package collapse to a result-typed
/// placeholder; the body is never entered but the signature still types
/// the result.
#[test]
fn out_of_policy_call_collapses_to_placeholder() {
    let app = app_pkg()
        .import("redis", VENDOR_PKG)
        .func(func_def(
            "entry",
            vec![],
            vec![],
            vec![define("c", call(sel(ident("redis"), "Connect"), vec![])), ret1(ident("c"))],
        ))
        .build();
    let mut engine = engine_for(vec![app, vendor_pkg()]);
    let calls = record_calls(&mut engine);
    let got = engine.eval_entry(MODULE, "entry").unwrap();

    let sym = got.as_symbolic().expect("out-of-policy result must be symbolic");
    assert!(sym.reason.contains("out-of-policy"), "reason: {}", sym.reason);
    // Signature typing survives the policy wall.
    assert_eq!(
        got.meta.field_type.as_deref(),
        Some(&FieldType::named(VENDOR_PKG, "Client"))
    );
    // The outer call edge is observed; the body's internal call is not.
    let log = calls.borrow();
    assert!(log.iter().any(|c| c == "Connect"));
    assert!(!log.iter().any(|c| c == "dial"), "body must not be entered: {log:?}");
}

/// A custom policy widens the analysis across module boundaries.
#[test]
fn custom_policy_admits_foreign_packages() {
    let app = app_pkg()
        .import("redis", VENDOR_PKG)
        .func(func_def(
            "entry",
            vec![],
            vec![],
            vec![expr_stmt(call(sel(ident("redis"), "Connect"), vec![]))],
        ))
        .build();
    let scanner = MemScanner::new(vec![app, vendor_pkg()]);
    let mut engine = Evaluator::with_policy(scanner, Options::default(), |_| true);
    let calls = record_calls(&mut engine);
    engine.eval_entry(MODULE, "entry").unwrap();
    assert!(calls.borrow().iter().any(|c| c == "dial"), "{:?}", calls.borrow());
}

/// Selecting a symbol from a package that cannot be scanned yields an
/// unresolved-function stand-in, not an error, and calling it yields a
/// placeholder.
#[test]
fn missing_package_degrades_to_unresolved_symbols() {
    let app = app_pkg()
        .import("gone", "github.com/gone/gone")
        .func(func_def(
            "entry",
            vec![],
            vec![],
            vec![expr_stmt(call(sel(ident("gone"), "Mystery"), vec![]))],
        ))
        .build();
    let mut engine = engine_for(vec![app]);
    let calls = record_calls(&mut engine);
    engine.eval_entry(MODULE, "entry").unwrap();
    assert_eq!(*calls.borrow(), vec!["github.com/gone/gone.Mystery".to_string()]);
}

// =============================================================================
// 3. constants
// =============================================================================

/// Integer, string, and boolean constants materialize on selector access;
/// other kinds stay placeholders.
#[test]
fn constants_materialize_by_kind() {
    let app = app_pkg()
        .import("store", STORE_PKG)
        .func(func_def(
            "retries",
            vec![],
            vec![result(int_ty())],
            vec![ret1(sel(ident("store"), "MaxRetries"))],
        ))
        .func(func_def(
            "name",
            vec![],
            vec![result(string_ty())],
            vec![ret1(sel(ident("store"), "Name"))],
        ))
        .func(func_def(
            "tuned",
            vec![],
            vec![],
            vec![ret1(sel(ident("store"), "Tuned"))],
        ))
        .build();
    let mut engine = engine_for(vec![app, store_pkg()]);
    assert_eq!(engine.eval_entry(MODULE, "retries").unwrap().as_int(), Some(5));
    assert_eq!(engine.eval_entry(MODULE, "name").unwrap().as_str(), Some("store"));
    assert!(engine.eval_entry(MODULE, "tuned").unwrap().as_symbolic().is_some());
}

// =============================================================================
// 4. lazy package variables
// =============================================================================

/// A package-level variable's initializer runs once, on first read, and
/// the cached value serves later reads.
#[test]
fn package_var_initializer_runs_once() {
    let app = app_pkg()
        .import("store", STORE_PKG)
        .func(func_def(
            "entry",
            vec![],
            vec![result(int_ty())],
            vec![
                define("a", sel(ident("store"), "Default")),
                define("b", sel(ident("store"), "Default")),
                ret1(ident("b")),
            ],
        ))
        .build();
    let mut engine = engine_for(vec![app, store_pkg()]);
    let calls = record_calls(&mut engine);
    let got = engine.eval_entry(MODULE, "entry").unwrap();
    assert_eq!(got.as_int(), Some(1), "initializer value is cached and returned");
    let inits = calls.borrow().iter().filter(|c| *c == "newStore").count();
    assert_eq!(inits, 1, "initializer must run exactly once: {:?}", calls.borrow());
}

// =============================================================================
// 5. keyed intrinsics on package symbols
// =============================================================================

/// A keyed `pkg.Name` intrinsic replaces the resolved symbol and its
/// handler result becomes the call's value.
#[test]
fn keyed_intrinsic_overrides_a_package_symbol() {
    let app = app_pkg()
        .import("store", STORE_PKG)
        .func(func_def(
            "entry",
            vec![],
            vec![result(int_ty())],
            vec![ret1(call(sel(ident("store"), "Open"), vec![]))],
        ))
        .build();
    let mut engine = engine_for(vec![app, store_pkg()]);
    engine.register_intrinsic(goshawk::pkg_key(STORE_PKG, "Open"), |_ctx, _args| {
        Some(goshawk::Object::int(99))
    });
    let got = engine.eval_entry(MODULE, "entry").unwrap();
    assert_eq!(got.as_int(), Some(99));
}

// =============================================================================
// 6. package object values
// =============================================================================

/// An import's short name evaluates to the package object itself.
#[test]
fn import_short_name_resolves_to_package_object() {
    let app = app_pkg()
        .import("store", STORE_PKG)
        .func(func_def("entry", vec![], vec![], vec![ret1(ident("store"))]))
        .build();
    let mut engine = engine_for(vec![app, store_pkg()]);
    let got = engine.eval_entry(MODULE, "entry").unwrap();
    match &got.value {
        Value::Package(pkg) => assert_eq!(pkg.path, STORE_PKG),
        other => panic!("expected package object, got {other:?}"),
    }
}
