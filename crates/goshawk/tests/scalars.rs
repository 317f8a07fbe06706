//! Concrete scalar evaluation: increment/decrement, integer and float
//! arithmetic, string operations, and the kind-mismatch error surface.

mod common;

use common::*;
use goshawk::{EvalError, ast::BinaryOp};
use pretty_assertions::assert_eq;

/// Runs `body` as the entry function and returns its result object.
fn run(body: Vec<goshawk::ast::Stmt>) -> goshawk::EvalResult<goshawk::Object> {
    let pkg = app_pkg()
        .func(func_def("entry", vec![], vec![result(int_ty())], body))
        .build();
    let mut engine = engine_for(vec![pkg]);
    engine.eval_entry(MODULE, "entry")
}

// =============================================================================
// 1. increment / decrement
// =============================================================================

/// `x := 10; x++; x++; x--; x++; return x` evaluates to 12.
#[test]
fn inc_dec_sequence_nets_out() {
    let got = run(vec![
        define("x", int(10)),
        inc("x"),
        inc("x"),
        dec("x"),
        inc("x"),
        ret1(ident("x")),
    ])
    .unwrap();
    assert_eq!(got.as_int(), Some(12));
}

/// `x := 10; x--; return x` evaluates to 9.
#[test]
fn single_decrement() {
    let got = run(vec![define("x", int(10)), dec("x"), ret1(ident("x"))]).unwrap();
    assert_eq!(got.as_int(), Some(9));
}

/// `++` on a string is a kind mismatch, not a silent placeholder.
#[test]
fn increment_on_string_is_kind_mismatch() {
    let err = run(vec![define("s", str_lit("x")), inc("s"), ret1(ident("s"))]).unwrap_err();
    assert!(matches!(err, EvalError::KindMismatch { .. }), "got {err:?}");
}

// =============================================================================
// 2. integer arithmetic
// =============================================================================

/// Concrete integer arithmetic folds.
#[test]
fn integer_arithmetic_folds() {
    let got = run(vec![ret1(binary(
        BinaryOp::Mul,
        binary(BinaryOp::Add, int(2), int(3)),
        int(4),
    ))])
    .unwrap();
    assert_eq!(got.as_int(), Some(20));
}

/// Division by a concrete zero degrades to an int-typed placeholder
/// instead of aborting the traversal.
#[test]
fn division_by_zero_degrades_to_placeholder() {
    let got = run(vec![ret1(binary(BinaryOp::Div, int(7), int(0)))]).unwrap();
    assert!(got.as_symbolic().is_some(), "got {got}");
}

/// Comparisons on concrete integers produce concrete booleans.
#[test]
fn integer_comparisons() {
    let got = run(vec![ret1(binary(BinaryOp::Lt, int(3), int(5)))]).unwrap();
    assert_eq!(got.as_bool(), Some(true));
    let got = run(vec![ret1(binary(BinaryOp::Ge, int(3), int(5)))]).unwrap();
    assert_eq!(got.as_bool(), Some(false));
}

// =============================================================================
// 3. float arithmetic and comparison
// =============================================================================

/// `1.5 + 2.0` evaluates to Float 3.5.
#[test]
fn float_addition() {
    let got = run(vec![ret1(binary(BinaryOp::Add, float(1.5), float(2.0)))]).unwrap();
    assert_eq!(got.as_float(), Some(3.5));
}

/// `1.5 == 1.5` evaluates to TRUE.
#[test]
fn float_equality() {
    let got = run(vec![ret1(binary(BinaryOp::Eq, float(1.5), float(1.5)))]).unwrap();
    assert_eq!(got.as_bool(), Some(true));
}

/// `2.5 > 1.5` evaluates to TRUE.
#[test]
fn float_greater_than() {
    let got = run(vec![ret1(binary(BinaryOp::Gt, float(2.5), float(1.5)))]).unwrap();
    assert_eq!(got.as_bool(), Some(true));
}

// =============================================================================
// 4. strings and booleans
// =============================================================================

/// String concatenation and comparison fold when both sides are concrete.
#[test]
fn string_concat_and_compare() {
    let got = run(vec![ret1(binary(BinaryOp::Add, str_lit("go"), str_lit("shawk")))]).unwrap();
    assert_eq!(got.as_str(), Some("goshawk"));
    let got = run(vec![ret1(binary(BinaryOp::Eq, str_lit("a"), str_lit("b")))]).unwrap();
    assert_eq!(got.as_bool(), Some(false));
}

/// Mixed concrete scalar kinds are a kind mismatch.
#[test]
fn mixed_kinds_are_rejected() {
    let err = run(vec![ret1(binary(BinaryOp::Add, int(1), str_lit("x")))]).unwrap_err();
    assert!(matches!(err, EvalError::KindMismatch { .. }), "got {err:?}");
}

/// `len` of a concrete string folds; `len` of a placeholder stays
/// symbolic but int-typed.
#[test]
fn len_builtin() {
    let got = run(vec![ret1(call_name("len", vec![str_lit("four")]))]).unwrap();
    assert_eq!(got.as_int(), Some(4));
}

// =============================================================================
// 5. lookup failures
// =============================================================================

/// An identifier bound nowhere is a lookup failure.
#[test]
fn undefined_identifier_is_an_error() {
    let err = run(vec![ret1(ident("missing"))]).unwrap_err();
    match err {
        EvalError::UndefinedIdentifier { name, .. } => assert_eq!(name, "missing"),
        other => panic!("expected undefined identifier, got {other:?}"),
    }
}
