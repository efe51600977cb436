use super::helpers::*;

// ---- if / else ----

#[test]
fn test_if_taken() {
    let vm = run("let mut x = 0 if 1 < 2 { x = 10 }");
    assert_global_int(&vm, "x", 10);
}

#[test]
fn test_if_not_taken() {
    let vm = run("let mut x = 0 if 2 < 1 { x = 10 }");
    assert_global_int(&vm, "x", 0);
}

#[test]
fn test_if_else() {
    let vm = run("let mut x = 0 if 2 < 1 { x = 1 } else { x = 2 }");
    assert_global_int(&vm, "x", 2);
}

#[test]
fn test_nested_if() {
    let vm = run(
        "let mut x = 0
         if true { if false { x = 1 } else { x = 2 } } else { x = 3 }",
    );
    assert_global_int(&vm, "x", 2);
}

// ---- while ----

#[test]
fn test_while_loop() {
    let vm = run(
        "let mut i = 0
         let mut sum = 0
         while i < 10 { sum = sum + i i = i + 1 }",
    );
    assert_global_int(&vm, "sum", 45);
    assert_global_int(&vm, "i", 10);
}

#[test]
fn test_while_false_never_runs() {
    let vm = run("let mut x = 0 while false { x = 1 }");
    assert_global_int(&vm, "x", 0);
}

#[test]
fn test_while_with_break() {
    let vm = run(
        "let mut i = 0
         while true { if i >= 5 { break } i = i + 1 }",
    );
    assert_global_int(&vm, "i", 5);
}

// ---- loop / break ----

#[test]
fn test_loop_break() {
    let vm = run("let mut i = 0 loop { if i >= 3 { break } i = i + 1 }");
    assert_global_int(&vm, "i", 3);
}

#[test]
fn test_break_exits_innermost_loop() {
    let vm = run(
        "let mut outer = 0
         let mut total = 0
         loop {
             if outer >= 3 { break }
             let mut inner = 0
             loop {
                 if inner >= 2 { break }
                 total = total + 1
                 inner = inner + 1
             }
             outer = outer + 1
         }",
    );
    assert_global_int(&vm, "outer", 3);
    assert_global_int(&vm, "total", 6);
}

#[test]
fn test_multiple_breaks_in_one_loop() {
    let vm = run(
        "let mut x = 0
         loop {
             if x == 1 { break }
             if x > 10 { break }
             x = 1
         }",
    );
    assert_global_int(&vm, "x", 1);
}

// ---- for-in ----

#[test]
fn test_for_in_sums_elements() {
    let vm = run("let a = [1, 2, 3] let mut s = 0 for x in a { s = s + x }");
    assert_global_int(&vm, "s", 6);
}

#[test]
fn test_for_in_empty_array() {
    let vm = run("let mut n = 0 for x in [ ] { n = n + 1 }");
    assert_global_int(&vm, "n", 0);
}

#[test]
fn test_for_in_non_array_is_exhausted() {
    // Iterating a non-array produces an immediately exhausted iterator.
    let vm = run("let mut n = 0 for x in 5 { n = n + 1 }");
    assert_global_int(&vm, "n", 0);
}

#[test]
fn test_for_in_with_break() {
    let vm = run(
        "let mut s = 0
         for x in [1, 2, 3, 4, 5] { if x > 3 { break } s = s + x }",
    );
    assert_global_int(&vm, "s", 6);
}

#[test]
fn test_for_in_over_bare_iter_call() {
    let vm = run("let a = [4, 5] let mut s = 0 for x in a.iter() { s = s + x }");
    assert_global_int(&vm, "s", 9);
}

#[test]
fn test_nested_for_in() {
    let vm = run(
        "let mut s = 0
         for x in [1, 2] { for y in [10, 20] { s = s + x * y } }",
    );
    assert_global_int(&vm, "s", 90);
}

#[test]
fn test_round_trip_push() {
    // Copying through a loop preserves order and content.
    let vm = run(
        "let src = [1, 2, 3]
         let dst = [ ]
         for x in src { push(dst, x) }",
    );
    assert_eq!(global_ints(&vm, "dst"), vec![1, 2, 3]);
}

// ---- Jump distances ----

#[test]
fn test_long_forward_jump_executes() {
    // A then-branch far larger than one byte's worth of code exercises
    // the 16-bit offset path.
    let mut src = String::from("let mut x = 0 if false {\n");
    for _ in 0..600 {
        src.push_str("x = x + 1\n");
    }
    src.push_str("}\nx = x + 5");
    let vm = run(&src);
    assert_global_int(&vm, "x", 5);
}

#[test]
fn test_long_backward_jump_executes() {
    let mut src = String::from("let mut x = 0 let mut i = 0 while i < 2 {\n");
    for _ in 0..400 {
        src.push_str("x = x + 1\n");
    }
    src.push_str("i = i + 1\n}");
    let vm = run(&src);
    assert_global_int(&vm, "x", 800);
}
