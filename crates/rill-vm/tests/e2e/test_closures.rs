use super::helpers::*;

// ---- Functions ----

#[test]
fn test_simple_function_call() {
    let vm = run("fn add(a, b) { return a + b } let r = add(5, 10)");
    assert_global_int(&vm, "r", 15);
}

#[test]
fn test_implicit_return_is_none() {
    let vm = run("fn noop() { } let r = noop() let is_none = r == None");
    assert_global_bool(&vm, "is_none", true);
}

#[test]
fn test_missing_arguments_read_as_none() {
    let vm = run("fn second(a, b) { return b == None } let r = second(1)");
    assert_global_bool(&vm, "r", true);
}

#[test]
fn test_extra_arguments_ignored() {
    let vm = run("fn first(a) { return a } let r = first(1, 2, 3)");
    assert_global_int(&vm, "r", 1);
}

#[test]
fn test_recursion_through_global() {
    let vm = run(
        "fn fib(n) { if n < 2 { return n } return fib(n - 1) + fib(n - 2) }
         let r = fib(10)",
    );
    assert_global_int(&vm, "r", 55);
}

#[test]
fn test_function_as_value() {
    let vm = run(
        "fn double(x) { return x * 2 }
         fn apply(f, v) { return f(v) }
         let r = apply(double, 21)",
    );
    assert_global_int(&vm, "r", 42);
}

#[test]
fn test_lambda_expression_body() {
    let vm = run("let inc = |x| x + 1 let r = inc(41)");
    assert_global_int(&vm, "r", 42);
}

#[test]
fn test_lambda_block_body() {
    let vm = run("let f = |a, b| { return a * b } let r = f(6, 7)");
    assert_global_int(&vm, "r", 42);
}

#[test]
fn test_immediately_invoked_lambda() {
    let vm = run("let r = (|x| x + 1)(41)");
    assert_global_int(&vm, "r", 42);
}

// ---- Upvalue capture ----

#[test]
fn test_counter_closure() {
    let vm = run(
        "fn make() { let mut c = 0 return || { c = c + 1 return c } }
         let f = make()
         f() f()
         let r = f()",
    );
    assert_global_int(&vm, "r", 3);
}

#[test]
fn test_counters_are_independent() {
    let vm = run(
        "fn make() { let mut c = 0 return || { c = c + 1 return c } }
         let a = make()
         let b = make()
         a() a()
         let ra = a()
         let rb = b()",
    );
    assert_global_int(&vm, "ra", 3);
    assert_global_int(&vm, "rb", 1);
}

#[test]
fn test_shared_upvalue_between_siblings() {
    let vm = run(
        "fn pair() { let mut c = 0
           let inc = || { c = c + 1 }
           let get = || { return c }
           return [inc, get] }
         let p = pair()
         p[0]() p[0]()
         let r = p[1]()",
    );
    assert_global_int(&vm, "r", 2);
}

#[test]
fn test_enclosing_scope_sees_closure_writes() {
    // The shared-cell property while the variable is still live: writes
    // through the closure are visible to the defining scope and back.
    let vm = run(
        "fn host() {
           let mut x = 1
           let setx = || { x = 99 }
           setx()
           let after = x
           x = x + 1
           let get = || { return x }
           return get()
         }
         let r = host()",
    );
    assert_global_int(&vm, "r", 100);
}

#[test]
fn test_capture_through_two_levels() {
    let vm = run(
        "fn outer() {
           let x = 7
           return || { return || { return x } }
         }
         let mid = outer()
         let inner = mid()
         let r = inner()",
    );
    assert_global_int(&vm, "r", 7);
}

#[test]
fn test_closed_upvalue_survives_scope_exit() {
    let vm = run(
        "fn make() { let x = 42 return || { return x } }
         let f = make()
         let r = f()",
    );
    assert_global_int(&vm, "r", 42);
}

#[test]
fn test_closed_upvalue_keeps_mutating() {
    // Closing moves the cell to the heap; it stays writable there.
    let vm = run(
        "fn make() { let mut c = 10 return || { c = c + 5 return c } }
         let f = make()
         f()
         let r = f()",
    );
    assert_global_int(&vm, "r", 20);
}

#[test]
fn test_block_scope_close() {
    // The captured local dies at block exit, not function exit; reads
    // after the block still see the closed cell.
    let vm = run(
        "fn host() {
           let mut f = 0
           {
             let mut n = 5
             f = || { n = n + 1 return n }
           }
           f()
           return f()
         }
         let r = host()",
    );
    assert_global_int(&vm, "r", 7);
}

#[test]
fn test_recursive_local_function() {
    let vm = run(
        "fn host() {
           fn fact(n) { if n <= 1 { return 1 } return n * fact(n - 1) }
           return fact(5)
         }
         let r = host()",
    );
    assert_global_int(&vm, "r", 120);
}

#[test]
fn test_closure_capturing_parameter() {
    let vm = run(
        "fn adder(n) { return |x| x + n }
         let add3 = adder(3)
         let r = add3(4)",
    );
    assert_global_int(&vm, "r", 7);
}

#[test]
fn test_upvalue_write_before_and_after_close() {
    let vm = run(
        "fn host() {
           let mut v = 1
           let set = |n| { v = n }
           let get = || { return v }
           set(10)
           let live = v
           return [get, set, live]
         }
         let parts = host()
         let live = parts[2]
         parts[1](33)
         let after = parts[0]()",
    );
    assert_global_int(&vm, "live", 10);
    assert_global_int(&vm, "after", 33);
}
