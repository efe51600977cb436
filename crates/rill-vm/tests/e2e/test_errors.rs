use super::helpers::*;
use rill_vm::VmError;

fn runtime_message(source: &str) -> String {
    match run_err(source) {
        VmError::Runtime(msg) => msg,
        other => panic!("expected Runtime error, got {other:?}"),
    }
}

// ---- Undefined names ----

#[test]
fn test_undefined_variable() {
    let msg = runtime_message("let x = nowhere");
    assert!(msg.contains("undefined variable: nowhere"), "{msg}");
}

#[test]
fn test_registered_native_is_not_undefined() {
    // `print` is not a global, but the lookup falls back to the native
    // registry.
    run("print(1)");
}

#[test]
fn test_global_can_shadow_native() {
    let vm = run("let print = 5 let x = print + 1");
    assert_global_int(&vm, "x", 6);
}

// ---- Type errors ----

#[test]
fn test_call_non_function() {
    let msg = runtime_message("let x = 3 x(1)");
    assert!(msg.contains("not a function"), "{msg}");
}

#[test]
fn test_index_non_array() {
    let msg = runtime_message("let x = 3 let y = x[0]");
    assert!(msg.contains("not an array"), "{msg}");
}

#[test]
fn test_non_integer_index() {
    let msg = runtime_message("let a = [1] let y = a[1.0]");
    assert!(msg.contains("index must be an integer"), "{msg}");
}

#[test]
fn test_index_out_of_bounds() {
    let msg = runtime_message("let a = [1, 2] let y = a[2]");
    assert!(msg.contains("out of bounds"), "{msg}");
}

#[test]
fn test_negative_index_out_of_bounds() {
    let msg = runtime_message("let a = [1, 2] let y = a[-1]");
    assert!(msg.contains("out of bounds"), "{msg}");
}

#[test]
fn test_store_out_of_bounds() {
    let msg = runtime_message("let a = [1] a[3] = 0");
    assert!(msg.contains("out of bounds"), "{msg}");
}

#[test]
fn test_arithmetic_on_non_numbers() {
    let msg = runtime_message("let x = true + 1");
    assert!(msg.contains("numeric operands"), "{msg}");
}

#[test]
fn test_ordering_on_non_numbers() {
    let msg = runtime_message("let x = \"a\" < \"b\"");
    assert!(msg.contains("numeric operands"), "{msg}");
}

#[test]
fn test_ordering_on_none() {
    let msg = runtime_message("let x = None < 1");
    assert!(msg.contains("numeric operands"), "{msg}");
}

// ---- Division ----

#[test]
fn test_integer_division_by_zero() {
    let msg = runtime_message("let x = 1 / 0");
    assert!(msg.contains("division by zero"), "{msg}");
}

#[test]
fn test_modulo_by_zero() {
    let msg = runtime_message("let x = 1 % 0");
    assert!(msg.contains("modulo by zero"), "{msg}");
}

#[test]
fn test_float_division_by_zero_is_infinity() {
    let vm = run("let x = 1.0 / 0");
    assert_eq!(
        vm.get_global("x"),
        rill_core::value::Value::Float(f32::INFINITY)
    );
}

// ---- Stack limits ----

#[test]
fn test_deep_recursion_within_cap() {
    let vm = run(
        "fn down(n) { if n <= 0 { return 0 } return down(n - 1) }
         let r = down(50)",
    );
    assert_global_int(&vm, "r", 0);
}

#[test]
fn test_stack_overflow_on_unbounded_recursion() {
    let err = run_err("fn loop_forever() { return loop_forever() } loop_forever()");
    assert_eq!(err, VmError::StackOverflow);
}

#[test]
fn test_native_error_propagates() {
    let msg = runtime_message("push(1, 2)");
    assert!(msg.contains("push expects an array"), "{msg}");
}

#[test]
fn test_error_leaves_frames_for_teardown() {
    let mut vm = new_vm();
    vm.compile("fn f() { return missing_thing } f()").unwrap();
    assert!(vm.run().is_err());
    // The frame stack is intentionally not unwound.
    assert_eq!(vm.frames.len(), 2);
}
