//! End-to-end suite: source text through read, the continuation-chain
//! evaluator, and the printer.

use std::io::Write;

use cclisp::error::LispError;
use cclisp::eval::Machine;
use cclisp::reader;
use cclisp::value::Value;

fn machine() -> Machine {
    Machine::new(10_000_000)
}

/// Evaluate every form in `src` on the given machine, returning the last
/// result.
fn eval_all(machine: &mut Machine, src: &str) -> Result<Value, LispError> {
    let mut pos = 0;
    let mut last = Value::Nil;
    loop {
        let next = reader::read_one_at(
            src,
            pos,
            &mut machine.heap,
            &mut machine.symbols,
            &mut machine.strings,
        )?;
        match next {
            Some((form, new_pos)) => {
                pos = new_pos;
                last = machine.eval_form(form)?;
            }
            None => return Ok(last),
        }
    }
}

/// Evaluate a program in a fresh machine and render the last result.
fn run(src: &str) -> String {
    let mut m = machine();
    match eval_all(&mut m, src) {
        Ok(val) => m.render(val),
        Err(e) => panic!("program failed: {}\n  source: {}", e, src),
    }
}

fn run_err(src: &str) -> LispError {
    let mut m = machine();
    match eval_all(&mut m, src) {
        Ok(val) => panic!(
            "program unexpectedly succeeded with {}\n  source: {}",
            m.render(val),
            src
        ),
        Err(e) => e,
    }
}

fn err_message(err: &LispError) -> String {
    match err {
        LispError::Eval { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

#[test]
fn print_read_round_trip() {
    let forms = [
        "sym",
        "123",
        "\"str\"",
        "nil",
        "true",
        "false",
        "(1)",
        "(1 2)",
        "((a) (b c))",
        "(define f (lambda (a b) (plus a b)))",
    ];
    let mut m = machine();
    for src in forms {
        let form = reader::read_str(src, &mut m.heap, &mut m.symbols, &mut m.strings)
            .unwrap_or_else(|e| panic!("{}: {}", src, e));
        assert_eq!(m.render(form), src);
    }
}

#[test]
fn evaluation_table() {
    let cases = [
        ("(cons 1 2)", "(1 . 2)"),
        ("(cons 1 (cons 2 3))", "(1 2 . 3)"),
        ("(first (cons 1 2))", "1"),
        ("(rest (cons 1 2))", "2"),
        ("(set_first (cons 1 2) 3)", "(3 . 2)"),
        ("(set_rest (cons 1 2) 9)", "(1 . 9)"),
        ("(plus 1 2)", "3"),
        ("(plus 1 2 3 4)", "10"),
        ("(minus 2 1 1)", "0"),
        ("(plus \"hallo\" \" \" \"welt\")", "\"hallo welt\""),
        ("(eq? 1 1)", "true"),
        ("(eq? '(1 2) '(1 2))", "true"),
        ("(eq? 1 \"1\")", "false"),
        ("(gt? 2 1)", "true"),
        ("(gt? 1 2)", "false"),
        ("(gt? \"b\" \"a\")", "true"),
        ("(if (eq? 5 5) 1 2)", "1"),
        ("(if false 1 2)", "2"),
        ("(if nil 1 2)", "2"),
        ("(if 0 1 2)", "1"),
        ("(if false 1)", "nil"),
        ("(define a (plus 1 2)) a", "3"),
        ("(define inc (lambda (a) (plus a 1))) (inc 2)", "3"),
        ("((lambda (a b) (plus a b)) 1 2)", "3"),
        ("(begin 1 2 3)", "3"),
        ("(begin)", "nil"),
        ("(define (dec a) (minus a 1)) (dec 2)", "1"),
        ("(define (two) 1 2) (two)", "2"),
        ("(pair? (cons 1 2))", "true"),
        ("(atom? \"str\")", "true"),
        ("(atom? (cons 1 2))", "false"),
        ("(symbol? 'a)", "true"),
        ("(symbol? 1)", "false"),
        ("(nil? nil)", "true"),
        ("(nil? 0)", "false"),
        ("(lambda? (lambda (x) x))", "true"),
        ("(lambda? 'lambda)", "false"),
        ("(not true)", "false"),
        ("(not false)", "true"),
        ("(not nil)", "true"),
        ("(not 1)", "true"),
        ("(and true true)", "true"),
        ("(and true 1)", "false"),
        ("(and)", "true"),
        ("(or false true)", "true"),
        ("(or false nil)", "false"),
        ("(quote (a b))", "(a b)"),
        ("'x", "x"),
        ("''x", "(quote x)"),
        ("(to_s 12)", "\"12\""),
        ("(to_s \"already\")", "\"already\""),
        ("(to_s 'name)", "\"name\""),
        ("(last '(1 2 3))", "3"),
        ("(last (cons 1 2))", "2"),
        ("(last nil)", "nil"),
        ("(define a 1) (set a 5) a", "5"),
        ("(define x 10) ((lambda (x) x) 3)", "3"),
    ];
    for (src, expected) in cases {
        assert_eq!(run(src), expected, "source: {}", src);
    }
}

#[test]
fn or_and_and_evaluate_every_argument() {
    let err = run_err("(or true (error \"x\"))");
    assert_eq!(err_message(&err), "x");
    let err = run_err("(and false (error \"y\"))");
    assert_eq!(err_message(&err), "y");
}

#[test]
fn callcc_returns_normally_without_capture() {
    let src = "(define (f return) (return 2) 3) (f (lambda (x) x))";
    assert_eq!(run(src), "3");
}

#[test]
fn callcc_jump_skips_the_rest_of_the_body() {
    let src = "(define (f return) (return 2) 3) (callcc f)";
    assert_eq!(run(src), "2");
}

#[test]
fn callcc_resumes_into_an_argument_position() {
    assert_eq!(run("(plus 1 (callcc (lambda (k) 2)))"), "3");
    assert_eq!(run("(plus 1 (callcc (lambda (k) (k 10) 2)))"), "11");
}

#[test]
fn callcc_rejects_non_lambdas() {
    let err = run_err("(callcc 5)");
    assert!(err_message(&err).contains("callcc"), "{:?}", err);
}

#[test]
fn mutation_is_visible_through_aliases() {
    let src = "(define p (cons 1 2)) (set_first p 9) p";
    assert_eq!(run(src), "(9 . 2)");
}

#[test]
fn scoping_is_lexical_not_dynamic() {
    let src = "(define x 1) (define (g) x) (define (h) (define x 2) (g)) (h)";
    assert_eq!(run(src), "1");
}

#[test]
fn printing_a_cyclic_pair_terminates() {
    let src = "(define p (cons 1 nil)) (set_rest p p) p";
    let rendered = run(src);
    assert!(rendered.contains("..."), "got {}", rendered);
}

#[test]
fn a_routed_error_leaves_the_machine_usable() {
    let mut m = machine();
    let err = eval_all(&mut m, "(plus 1 \"a\")").unwrap_err();
    match &err {
        LispError::Eval { message, form } => {
            assert!(message.contains("plus"), "{}", message);
            assert_eq!(form.as_deref(), Some("(plus 1 \"a\")"));
        }
        other => panic!("expected an eval error, got {:?}", other),
    }
    assert_eq!(eval_all(&mut m, "(plus 1 2)").unwrap(), Value::Int(3));
}

#[test]
fn set_reports_a_missing_binding() {
    let err = run_err("(set zz 1)");
    assert!(err_message(&err).contains("unresolved symbol"), "{:?}", err);
}

#[test]
fn arity_mismatch_is_reported_before_the_body_runs() {
    let err = run_err("((lambda (a) a) 1 2)");
    assert!(
        err_message(&err).contains("wrong number of arguments"),
        "{:?}",
        err
    );
}

#[test]
fn a_symbol_value_that_names_no_builtin_is_not_callable() {
    let err = run_err("(define f 'nope) (f 1)");
    assert!(err_message(&err).contains("unknown built-in"), "{:?}", err);
}

#[test]
fn non_function_values_are_not_callable() {
    let err = run_err("(1 2)");
    assert!(err_message(&err).contains("not callable"), "{:?}", err);
}

#[test]
fn minus_with_one_operand_is_not_negation() {
    let err = run_err("(minus 5)");
    assert!(err_message(&err).contains("minus"), "{:?}", err);
}

#[test]
fn file_operations_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("out.txt");
    let p = path.display();

    let mut m = machine();
    eval_all(&mut m, &format!("(define f (file_open \"{}\" \"w\"))", p)).unwrap();
    assert_eq!(
        eval_all(&mut m, "(file_write f \"hi there\")").unwrap(),
        Value::Int(8)
    );
    eval_all(&mut m, "(file_close f)").unwrap();

    eval_all(&mut m, &format!("(define g (file_open \"{}\" \"r\"))", p)).unwrap();
    let text = eval_all(&mut m, "(define text (file_read g)) (file_close g) text").unwrap();
    assert_eq!(m.render(text), "\"hi there\"");

    let err = eval_all(&mut m, "(file_read g)").unwrap_err();
    assert!(err_message(&err).contains("closed"), "{:?}", err);
}

#[test]
fn load_evaluates_a_file_and_returns_the_last_result() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("prog.lisp");
    let mut file = std::fs::File::create(&path).expect("create");
    writeln!(file, "(define loaded 41)").unwrap();
    writeln!(file, "(plus loaded 1)").unwrap();
    drop(file);

    let mut m = machine();
    let val = eval_all(&mut m, &format!("(load \"{}\")", path.display())).unwrap();
    assert_eq!(val, Value::Int(42));
    // Definitions made by the loaded file stay visible.
    assert_eq!(eval_all(&mut m, "loaded").unwrap(), Value::Int(41));
}

#[test]
fn load_reports_a_missing_file() {
    let err = run_err("(load \"no-such-file-anywhere.lisp\")");
    assert!(err_message(&err).contains("cannot open"), "{:?}", err);
}
