//! End-to-end pipeline tests: AST in, stdout out.

use bumpalo::Bump;
use common::SourceLoc;
use frontend::{AstBuilder, BinOp, Block, Severity, Type};
use indoc::indoc;
use paracl::{compile, compile_and_run, disassemble_chunk, read_chunk, write_chunk, VmError};

fn loc() -> SourceLoc {
    SourceLoc::start()
}

fn at(line: u32, col: u32) -> SourceLoc {
    SourceLoc::new(0, line, col)
}

/// Run a program and return its stdout, failing the test on any error.
fn run_ok<'a>(root: &'a Block<'a>, arena: &'a Bump, stdin: &str) -> String {
    let mut input = stdin.as_bytes();
    let mut output = Vec::new();
    let report = compile_and_run(root, arena, &mut input, &mut output);
    let errors: Vec<_> = report
        .reports
        .iter()
        .filter(|r| r.severity == Severity::Error)
        .collect();
    assert!(errors.is_empty(), "compile errors: {:?}", errors);
    match report.execution {
        Some(Ok(())) => {}
        other => panic!("execution failed: {:?}", other),
    }
    String::from_utf8(output).unwrap()
}

#[test]
fn test_arithmetic_precedence() {
    // print 1 + 2 * 3;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let two = b.constant(2, loc());
    let three = b.constant(3, loc());
    let product = b.binary(BinOp::Mul, two, three, loc());
    let one = b.constant(1, loc());
    let sum = b.binary(BinOp::Add, one, product, loc());
    let print = b.print_stmt(sum, loc());
    let root = b.block(&[print], loc());

    assert_eq!(run_ok(root, &arena, ""), "7\n");
}

#[test]
fn test_while_countdown() {
    // x = 5; while (x > 0) { print x; x = x - 1; }
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let x1 = b.variable("x", loc());
    let five = b.constant(5, loc());
    let init = b.assign(&[x1], five, loc());
    let s1 = b.expr_stmt(init);

    let x2 = b.variable("x", loc());
    let zero = b.constant(0, loc());
    let cond = b.binary(BinOp::Gt, x2, zero, loc());

    let x3 = b.variable("x", loc());
    let p = b.print_stmt(x3, loc());
    let x4 = b.variable("x", loc());
    let x5 = b.variable("x", loc());
    let one = b.constant(1, loc());
    let decremented = b.binary(BinOp::Sub, x5, one, loc());
    let step = b.assign(&[x4], decremented, loc());
    let step_stmt = b.expr_stmt(step);
    let body = b.block(&[p, step_stmt], loc());

    let while_stmt = b.while_stmt(cond, body, loc());
    let root = b.block(&[s1, while_stmt], loc());

    assert_eq!(run_ok(root, &arena, ""), "5\n4\n3\n2\n1\n");
}

/// f = func(n) { if (n < 2) return n; return f(n-1) + f(n-2); };
/// print f(10);
fn build_fib<'a>(b: &mut AstBuilder<'a>) -> &'a Block<'a> {
    let n1 = b.variable("n", loc());
    let two = b.constant(2, loc());
    let cond = b.binary(BinOp::Ls, n1, two, loc());
    let n2 = b.variable("n", loc());
    let base = b.return_stmt(Some(n2), loc());
    let then_block = b.block(&[base], loc());
    let if_stmt = b.if_stmt(cond, then_block, None, loc());

    let n3 = b.variable("n", loc());
    let one = b.constant(1, loc());
    let nm1 = b.binary(BinOp::Sub, n3, one, loc());
    let rec1 = b.call("f", &[nm1], loc());
    let n4 = b.variable("n", loc());
    let two2 = b.constant(2, loc());
    let nm2 = b.binary(BinOp::Sub, n4, two2, loc());
    let rec2 = b.call("f", &[nm2], loc());
    let sum = b.binary(BinOp::Add, rec1, rec2, loc());
    let rec_ret = b.return_stmt(Some(sum), loc());

    let body = b.block(&[if_stmt, rec_ret], loc());
    let def = b.fn_def(Some("f"), &["n"], body, loc());
    let conv = b.fn_to_ptr(def, loc());
    let f_var = b.variable("f", loc());
    let bind = b.assign(&[f_var], conv, loc());
    let bind_stmt = b.expr_stmt(bind);

    let ten = b.constant(10, loc());
    let call = b.call("f", &[ten], loc());
    let print = b.print_stmt(call, loc());

    b.block(&[bind_stmt, print], loc())
}

#[test]
fn test_recursive_fibonacci() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let root = build_fib(&mut b);
    assert_eq!(run_ok(root, &arena, ""), "55\n");
}

#[test]
fn test_read_from_stdin() {
    // x = ?; y = ?; print x * y;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let x1 = b.variable("x", loc());
    let read1 = b.read(loc());
    let a1 = b.assign(&[x1], read1, loc());
    let s1 = b.expr_stmt(a1);
    let y1 = b.variable("y", loc());
    let read2 = b.read(loc());
    let a2 = b.assign(&[y1], read2, loc());
    let s2 = b.expr_stmt(a2);
    let x2 = b.variable("x", loc());
    let y2 = b.variable("y", loc());
    let product = b.binary(BinOp::Mul, x2, y2, loc());
    let print = b.print_stmt(product, loc());
    let root = b.block(&[s1, s2, print], loc());

    assert_eq!(run_ok(root, &arena, "6\n7\n"), "42\n");
}

#[test]
fn test_function_pointer_call() {
    // g = func(a, b) { return a + b; }; h = g; print h(3, 4);
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let a = b.variable("a", loc());
    let b_var = b.variable("b", loc());
    let sum = b.binary(BinOp::Add, a, b_var, loc());
    let ret = b.return_stmt(Some(sum), loc());
    let g_body = b.block(&[ret], loc());
    let g_def = b.fn_def(Some("g"), &["a", "b"], g_body, loc());
    let g_conv = b.fn_to_ptr(g_def, loc());
    let g_var = b.variable("g", loc());
    let g_bind = b.assign(&[g_var], g_conv, loc());
    let s1 = b.expr_stmt(g_bind);

    let h = b.variable("h", loc());
    let g_ref = b.variable("g", loc());
    let h_bind = b.assign(&[h], g_ref, loc());
    let s2 = b.expr_stmt(h_bind);

    let three = b.constant(3, loc());
    let four = b.constant(4, loc());
    let call = b.call("h", &[three, four], loc());
    let print = b.print_stmt(call, loc());

    let root = b.block(&[s1, s2, print], loc());
    assert_eq!(run_ok(root, &arena, ""), "7\n");
}

#[test]
fn test_if_else() {
    // if (1 == 1) print 10; else print 20;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let one1 = b.constant(1, loc());
    let one2 = b.constant(1, loc());
    let cond = b.binary(BinOp::Eq, one1, one2, loc());
    let ten = b.constant(10, loc());
    let p1 = b.print_stmt(ten, loc());
    let then_block = b.block(&[p1], loc());
    let twenty = b.constant(20, loc());
    let p2 = b.print_stmt(twenty, loc());
    let else_block = b.block(&[p2], loc());
    let if_stmt = b.if_stmt(cond, then_block, Some(else_block), loc());
    let root = b.block(&[if_stmt], loc());

    assert_eq!(run_ok(root, &arena, ""), "10\n");
}

#[test]
fn test_anonymous_function_pointer() {
    // p = func(n) { return n + 1; }; print p(4);
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let n = b.variable("n", loc());
    let one = b.constant(1, loc());
    let sum = b.binary(BinOp::Add, n, one, loc());
    let ret = b.return_stmt(Some(sum), loc());
    let body = b.block(&[ret], loc());
    let def = b.fn_def(None, &["n"], body, loc());
    let conv = b.fn_to_ptr(def, loc());
    let p_var = b.variable("p", loc());
    let bind = b.assign(&[p_var], conv, loc());
    let s1 = b.expr_stmt(bind);

    let four = b.constant(4, loc());
    let call = b.call("p", &[four], loc());
    let print = b.print_stmt(call, loc());
    let root = b.block(&[s1, print], loc());

    assert_eq!(run_ok(root, &arena, ""), "5\n");
}

#[test]
fn test_value_block() {
    // x = { y = 3; y + 1 }; print x;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let y1 = b.variable("y", loc());
    let three = b.constant(3, loc());
    let y_bind = b.assign(&[y1], three, loc());
    let s1 = b.expr_stmt(y_bind);
    let y2 = b.variable("y", loc());
    let one = b.constant(1, loc());
    let tail = b.binary(BinOp::Add, y2, one, loc());
    let tail_stmt = b.expr_stmt(tail);
    let inner = b.block(&[s1, tail_stmt], loc());
    let value = b.value_block(inner, loc());

    let x1 = b.variable("x", loc());
    let bind = b.assign(&[x1], value, loc());
    let bind_stmt = b.expr_stmt(bind);
    let x2 = b.variable("x", loc());
    let print = b.print_stmt(x2, loc());
    let root = b.block(&[bind_stmt, print], loc());

    assert_eq!(run_ok(root, &arena, ""), "4\n");
}

#[test]
fn test_array_fill_and_read() {
    // a: int[5]; i = 0; while (i < 5) { a[i] = i * i; i = i + 1; }
    // print a[3];
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let decl = b.variable_typed("a", Type::array(Type::Int, 5), loc());
    let decl_stmt = b.expr_stmt(decl);

    let i1 = b.variable("i", loc());
    let zero = b.constant(0, loc());
    let i_init = b.assign(&[i1], zero, loc());
    let s_init = b.expr_stmt(i_init);

    let i2 = b.variable("i", loc());
    let five = b.constant(5, loc());
    let cond = b.binary(BinOp::Ls, i2, five, loc());

    let a1 = b.variable("a", loc());
    let i3 = b.variable("i", loc());
    let target = b.subscript(a1, i3, loc());
    let i4 = b.variable("i", loc());
    let i5 = b.variable("i", loc());
    let square = b.binary(BinOp::Mul, i4, i5, loc());
    let store = b.assign(&[target], square, loc());
    let s_store = b.expr_stmt(store);

    let i6 = b.variable("i", loc());
    let i7 = b.variable("i", loc());
    let one = b.constant(1, loc());
    let inc = b.binary(BinOp::Add, i7, one, loc());
    let i_step = b.assign(&[i6], inc, loc());
    let s_step = b.expr_stmt(i_step);

    let body = b.block(&[s_store, s_step], loc());
    let while_stmt = b.while_stmt(cond, body, loc());

    let a2 = b.variable("a", loc());
    let three = b.constant(3, loc());
    let element = b.subscript(a2, three, loc());
    let print = b.print_stmt(element, loc());

    let root = b.block(&[decl_stmt, s_init, while_stmt, print], loc());
    assert_eq!(run_ok(root, &arena, ""), "9\n");
}

#[test]
fn test_division_by_zero_is_runtime_fatal() {
    // print 10 / (2 - 2);
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let ten = b.constant(10, loc());
    let two1 = b.constant(2, loc());
    let two2 = b.constant(2, loc());
    let denom = b.binary(BinOp::Sub, two1, two2, loc());
    let div = b.binary(BinOp::Div, ten, denom, loc());
    let print = b.print_stmt(div, loc());
    let root = b.block(&[print], loc());

    let mut input = "".as_bytes();
    let mut output = Vec::new();
    let report = compile_and_run(root, &arena, &mut input, &mut output);
    assert!(matches!(
        report.execution,
        Some(Err(VmError::DivisionByZero))
    ));
}

#[test]
fn test_partial_output_survives_runtime_error() {
    // print 1; print 1 / 0;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let one1 = b.constant(1, loc());
    let p1 = b.print_stmt(one1, loc());
    let one2 = b.constant(1, loc());
    let zero = b.constant(0, loc());
    let div = b.binary(BinOp::Div, one2, zero, loc());
    let p2 = b.print_stmt(div, loc());
    let root = b.block(&[p1, p2], loc());

    let mut input = "".as_bytes();
    let mut output = Vec::new();
    let report = compile_and_run(root, &arena, &mut input, &mut output);
    assert!(matches!(report.execution, Some(Err(_))));
    assert_eq!(String::from_utf8(output).unwrap(), "1\n");
}

#[test]
fn test_undeclared_call_is_a_compile_error() {
    // print f(1);
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let one = b.constant(1, loc());
    let call = b.call("f", &[one], at(2, 7));
    let print = b.print_stmt(call, loc());
    let root = b.block(&[print], loc());

    let result = compile(root, &arena);
    assert!(!result.success());
    let report = result
        .reports
        .iter()
        .find(|r| r.msg.contains("undeclared function `f`"))
        .expect("missing diagnostic");
    assert_eq!(report.loc.line, 2);
    assert_eq!(report.loc.col, 7);
}

#[test]
fn test_function_redefinition_points_at_first() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let body1 = b.block(&[], loc());
    let first = b.fn_def(Some("f"), &[], body1, at(1, 1));
    let s1 = b.fn_def_stmt(first);
    let body2 = b.block(&[], loc());
    let second = b.fn_def(Some("f"), &[], body2, at(4, 1));
    let s2 = b.fn_def_stmt(second);
    let root = b.block(&[s1, s2], loc());

    let result = compile(root, &arena);
    assert!(!result.success());
    let report = result
        .reports
        .iter()
        .find(|r| r.msg.contains("redefinition of function `f`"))
        .expect("missing diagnostic");
    assert_eq!(report.loc.line, 4);
    assert_eq!(report.attachments.len(), 1);
    assert!(report.attachments[0].msg.contains("previously declared here"));
    assert_eq!(report.attachments[0].loc.line, 1);
}

#[test]
fn test_mixed_void_and_int_returns_rejected() {
    // func(n) { if (n) return; return n; }
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let cond = b.variable("n", loc());
    let bare = b.return_stmt(None, loc());
    let then_block = b.block(&[bare], loc());
    let if_stmt = b.if_stmt(cond, then_block, None, loc());
    let n = b.variable("n", loc());
    let with_value = b.return_stmt(Some(n), at(3, 3));
    let body = b.block(&[if_stmt, with_value], loc());
    let def = b.fn_def(Some("broken"), &["n"], body, loc());
    let stmt = b.fn_def_stmt(def);
    let root = b.block(&[stmt], loc());

    let result = compile(root, &arena);
    assert!(!result.success());
    assert!(result
        .reports
        .iter()
        .any(|r| r.msg.contains("mismatched return types")));
}

#[test]
fn test_chunk_round_trips_through_serialization() {
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let root = build_fib(&mut b);

    let result = compile(root, &arena);
    let chunk = result.chunk.expect("fib must compile");

    let mut buf = Vec::new();
    write_chunk(&chunk, &mut buf).unwrap();
    let back = read_chunk(&mut buf.as_slice()).unwrap();
    assert_eq!(back, chunk);

    // The deserialized chunk still computes fib(10).
    let mut input = "".as_bytes();
    let mut output = Vec::new();
    paracl::run_chunk(&back, &mut input, &mut output).unwrap();
    assert_eq!(String::from_utf8(output).unwrap(), "55\n");
}

#[test]
fn test_nested_scopes_and_shadowing() {
    // x = 1; { x = 2; y = 3; print x + y; } print x;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let x1 = b.variable("x", loc());
    let one = b.constant(1, loc());
    let outer_bind = b.assign(&[x1], one, loc());
    let s1 = b.expr_stmt(outer_bind);

    // Inner block assigns the outer x (no shadowing through assignment)
    // and declares its own y.
    let x2 = b.variable("x", loc());
    let two = b.constant(2, loc());
    let inner_x = b.assign(&[x2], two, loc());
    let is1 = b.expr_stmt(inner_x);
    let y1 = b.variable("y", loc());
    let three = b.constant(3, loc());
    let y_bind = b.assign(&[y1], three, loc());
    let is2 = b.expr_stmt(y_bind);
    let x3 = b.variable("x", loc());
    let y2 = b.variable("y", loc());
    let sum = b.binary(BinOp::Add, x3, y2, loc());
    let ip = b.print_stmt(sum, loc());
    let inner = b.block(&[is1, is2, ip], loc());
    let s2 = b.block_stmt(inner);

    let x4 = b.variable("x", loc());
    let p = b.print_stmt(x4, loc());
    let root = b.block(&[s1, s2, p], loc());

    assert_eq!(run_ok(root, &arena, ""), "5\n2\n");
}

#[test]
fn test_logical_operators_and_not() {
    // print !(1 && 0) || 0;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let one = b.constant(1, loc());
    let zero1 = b.constant(0, loc());
    let conj = b.binary(BinOp::And, one, zero1, loc());
    let negated = b.unary(frontend::UnOp::Not, conj, loc());
    let zero2 = b.constant(0, loc());
    let disj = b.binary(BinOp::Or, negated, zero2, loc());
    let print = b.print_stmt(disj, loc());
    let root = b.block(&[print], loc());

    assert_eq!(run_ok(root, &arena, ""), "1\n");
}

#[test]
fn test_void_function_call_statement() {
    // show = func(n) { print n; }; show(3); show(4);
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);

    let n = b.variable("n", loc());
    let body_print = b.print_stmt(n, loc());
    let body = b.block(&[body_print], loc());
    let def = b.fn_def(Some("show"), &["n"], body, loc());
    let def_stmt = b.fn_def_stmt(def);

    let three = b.constant(3, loc());
    let c1 = b.call("show", &[three], loc());
    let s1 = b.expr_stmt(c1);
    let four = b.constant(4, loc());
    let c2 = b.call("show", &[four], loc());
    let s2 = b.expr_stmt(c2);
    let root = b.block(&[def_stmt, s1, s2], loc());

    assert_eq!(run_ok(root, &arena, ""), "3\n4\n");
}

#[test]
fn test_disassembly_of_straight_line_program() {
    // print 2 + 2; -- both literals share one pool slot.
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let two1 = b.constant(2, loc());
    let two2 = b.constant(2, loc());
    let sum = b.binary(BinOp::Add, two1, two2, loc());
    let print = b.print_stmt(sum, loc());
    let root = b.block(&[print], loc());

    let result = compile(root, &arena);
    let chunk = result.chunk.expect("must compile");
    let text = disassemble_chunk(&chunk).unwrap();
    assert_eq!(
        text,
        indoc! {"
            .constants
              0000 2
            .code
              0000 push_const 0
              0005 push_const 0
              000a add
              000b print
              000c ret
        "}
    );
}

#[test]
fn test_unary_minus() {
    // x = 3; print -x;
    let arena = Bump::new();
    let mut b = AstBuilder::new(&arena);
    let x1 = b.variable("x", loc());
    let three = b.constant(3, loc());
    let bind = b.assign(&[x1], three, loc());
    let s1 = b.expr_stmt(bind);
    let x2 = b.variable("x", loc());
    let negated = b.unary(frontend::UnOp::Neg, x2, loc());
    let print = b.print_stmt(negated, loc());
    let root = b.block(&[s1, print], loc());

    assert_eq!(run_ok(root, &arena, ""), "-3\n");
}
