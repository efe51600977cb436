use super::helpers::*;
use rill_core::value::Value;

// ---- Literals ----

#[test]
fn test_literal_globals() {
    let vm = run("let i = 42 let f = 2.5 let t = true let n = None");
    assert_global_int(&vm, "i", 42);
    assert_global_float(&vm, "f", 2.5);
    assert_global_bool(&vm, "t", true);
    assert_eq!(vm.get_global("n"), Value::None);
}

#[test]
fn test_string_literal() {
    let vm = run("let s = \"hello\"");
    match vm.get_global("s") {
        Value::Str(id) => assert_eq!(vm.heap.strings.get_bytes(id), b"hello"),
        other => panic!("expected string, got {other:?}"),
    }
}

// ---- Arithmetic ----

#[test]
fn test_integer_arithmetic() {
    let vm = run("let a = 2 + 3 let b = 7 - 10 let c = 6 * 7 let d = 7 / 2 let e = 7 % 3");
    assert_global_int(&vm, "a", 5);
    assert_global_int(&vm, "b", -3);
    assert_global_int(&vm, "c", 42);
    assert_global_int(&vm, "d", 3);
    assert_global_int(&vm, "e", 1);
}

#[test]
fn test_integer_division_does_not_widen() {
    let vm = run("let d = 1 / 2");
    assert_global_int(&vm, "d", 0);
}

#[test]
fn test_float_contagion() {
    let vm = run("let a = 1 + 0.5 let b = 0.5 + 1 let c = 2.0 * 3");
    assert_global_float(&vm, "a", 1.5);
    assert_global_float(&vm, "b", 1.5);
    assert_global_float(&vm, "c", 6.0);
}

#[test]
fn test_unary_negation() {
    let vm = run("let a = -5 let b = --5 let c = -2.5");
    assert_global_int(&vm, "a", -5);
    assert_global_int(&vm, "b", 5);
    assert_global_float(&vm, "c", -2.5);
}

#[test]
fn test_precedence_and_grouping() {
    let vm = run("let a = 2 + 3 * 4 let b = (2 + 3) * 4");
    assert_global_int(&vm, "a", 14);
    assert_global_int(&vm, "b", 20);
}

// ---- Equality ----

#[test]
fn test_equality_same_tag() {
    let vm = run("let a = 1 == 1 let b = 1 == 2 let c = 1 != 2");
    assert_global_bool(&vm, "a", true);
    assert_global_bool(&vm, "b", false);
    assert_global_bool(&vm, "c", true);
}

#[test]
fn test_equality_across_tags_is_false() {
    let vm = run("let a = 1 == 1.0 let b = 0 == false let c = None == false");
    assert_global_bool(&vm, "a", false);
    assert_global_bool(&vm, "b", false);
    assert_global_bool(&vm, "c", false);
}

#[test]
fn test_string_equality_is_identity() {
    // Interning makes equal literals the same handle.
    let vm = run("let a = \"x\" == \"x\" let b = \"x\" == \"y\"");
    assert_global_bool(&vm, "a", true);
    assert_global_bool(&vm, "b", false);
}

#[test]
fn test_array_equality_is_identity() {
    let vm = run(
        "let xs = [1]
         let same = xs
         let a = xs == same
         let b = xs == [1]",
    );
    assert_global_bool(&vm, "a", true);
    assert_global_bool(&vm, "b", false);
}

// ---- Comparison ----

#[test]
fn test_comparisons() {
    let vm = run("let a = 1 < 2 let b = 2 <= 2 let c = 3 > 4 let d = 4 >= 5");
    assert_global_bool(&vm, "a", true);
    assert_global_bool(&vm, "b", true);
    assert_global_bool(&vm, "c", false);
    assert_global_bool(&vm, "d", false);
}

#[test]
fn test_comparison_promotes_ints() {
    let vm = run("let a = 1 < 1.5 let b = 2.5 >= 2");
    assert_global_bool(&vm, "a", true);
    assert_global_bool(&vm, "b", true);
}

// ---- Truthiness ----

#[test]
fn test_truthiness_in_conditions() {
    let vm = run(
        "let mut r = 0
         if 0 { r = 1 }
         if 0.0 { r = r + 2 }
         if None { r = r + 4 }
         if false { r = r + 8 }
         if 7 { r = r + 16 }
         if [ ] { r = r + 32 }
         if \"\" { r = r + 64 }",
    );
    assert_global_int(&vm, "r", 16 + 32 + 64);
}

// ---- Expression round-trip ----

#[test]
fn test_pure_expression_roundtrip() {
    // `let x = E` then reading x matches evaluating E directly.
    let vm = run("let x = (1 + 2) * 3 - 4 / 2");
    assert_global_int(&vm, "x", 7);
    let vm = run("let x = 1.5 * 2.0");
    assert_global_float(&vm, "x", 3.0);
}

#[test]
fn test_wrapping_integer_overflow() {
    let vm = run("let x = 2147483647 + 1");
    assert_global_int(&vm, "x", i32::MIN);
}
