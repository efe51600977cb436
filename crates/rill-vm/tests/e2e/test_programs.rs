//! End-to-end programs checked through their printed output.

use super::helpers::*;

#[test]
fn test_bindings_and_mutation() {
    let (_, out) = run_capture("let x = 10 let mut y = 20 y = y + 1 print(x) print(y)");
    assert_eq!(out, vec!["10", "21"]);
}

#[test]
fn test_function_call_prints_sum() {
    let (_, out) = run_capture("fn add(a,b){return a+b} print(add(5,10))");
    assert_eq!(out, vec!["15"]);
}

#[test]
fn test_counter_closure_sequence() {
    let (_, out) = run_capture(
        "fn make(){ let mut c = 0 return || { c = c + 1 return c } }
         let f = make() print(f()) print(f()) print(f())",
    );
    assert_eq!(out, vec!["1", "2", "3"]);
}

#[test]
fn test_shared_upvalue_pair() {
    let (_, out) = run_capture(
        "fn pair(){ let mut c = 0
           let inc = || { c = c + 1 }
           let get = || { return c }
           return [inc, get] }
         let p = pair() p[0]() p[0]() print(p[1]())",
    );
    assert_eq!(out, vec!["2"]);
}

#[test]
fn test_for_in_sum() {
    let (_, out) = run_capture("let a = [1,2,3] let mut s = 0 for x in a { s = s + x } print(s)");
    assert_eq!(out, vec!["6"]);
}

#[test]
fn test_break_out_of_infinite_loop() {
    let (_, out) =
        run_capture("let mut i = 0 loop { if i >= 3 { break } i = i + 1 } print(i)");
    assert_eq!(out, vec!["3"]);
}

// ---- Larger programs ----

#[test]
fn test_fibonacci() {
    let (_, out) = run_capture(
        "fn fib(n) { if n < 2 { return n } return fib(n - 1) + fib(n - 2) }
         let mut i = 0
         while i < 10 { print(fib(i)) i = i + 1 }",
    );
    assert_eq!(out, vec!["0", "1", "1", "2", "3", "5", "8", "13", "21", "34"]);
}

#[test]
fn test_print_formats() {
    let (_, out) = run_capture("print(1, 2.5, true, None, \"txt\", [1, [2]])");
    assert_eq!(out, vec!["1 2.5 true None txt [1, [2]]"]);
}

#[test]
fn test_print_closure_and_native() {
    let (_, out) = run_capture("let f = || 0 print(f) print(print)");
    assert_eq!(out, vec!["<closure>", "<native function>"]);
}

#[test]
fn test_build_and_filter_array() {
    let (_, out) = run_capture(
        "let xs = [ ]
         let mut i = 0
         while i < 10 { push(xs, i * i) i = i + 1 }
         let evens = [ ]
         for v in xs { if v % 2 == 0 { push(evens, v) } }
         print(evens)",
    );
    assert_eq!(out, vec!["[0, 4, 16, 36, 64]"]);
}

#[test]
fn test_higher_order_compose() {
    let (_, out) = run_capture(
        "fn compose(f, g) { return |x| f(g(x)) }
         let add1 = |x| x + 1
         let dbl = |x| x * 2
         let both = compose(add1, dbl)
         print(both(10))",
    );
    assert_eq!(out, vec!["21"]);
}

#[test]
fn test_globals_persist_across_chunks() {
    // REPL-style: each line compiles and runs on the same interpreter.
    let mut vm = new_vm();
    for line in ["let mut total = 0", "total = total + 40", "total = total + 2"] {
        vm.compile(line).expect("compile failed");
        vm.run().expect("runtime error");
    }
    assert_global_int(&vm, "total", 42);
}

#[test]
fn test_stacked_chunks_run_in_one_call() {
    let mut vm = new_vm();
    vm.compile("let a = 1").unwrap();
    vm.compile("let b = 2").unwrap();
    vm.run().unwrap();
    assert_global_int(&vm, "a", 1);
    assert_global_int(&vm, "b", 2);
}

#[test]
fn test_host_seeded_global() {
    use rill_core::value::Value;
    let mut vm = new_vm();
    vm.set_global("seed", Value::Int(99));
    vm.compile("let r = seed + 1").unwrap();
    vm.run().unwrap();
    assert_global_int(&vm, "r", 100);
}
