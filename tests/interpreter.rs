#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use rox::{Outcome, Session};

    /// In-memory sink shared between the session and the test.
    #[derive(Clone, Default)]
    struct Capture(Rc<RefCell<Vec<u8>>>);

    impl Capture {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Harness {
        session: Session,
        out: Capture,
        err: Capture,
    }

    impl Harness {
        fn new() -> Self {
            let out = Capture::default();
            let err = Capture::default();
            let session = Session::with_io(Box::new(out.clone()), Box::new(err.clone()));

            Self { session, out, err }
        }

        fn run(&mut self, source: &str) -> Outcome {
            self.session.run_source(source)
        }
    }

    /// Run `source` in a fresh session: (outcome, stdout, stderr).
    fn run(source: &str) -> (Outcome, String, String) {
        let mut harness = Harness::new();
        let outcome = harness.run(source);
        (outcome, harness.out.text(), harness.err.text())
    }

    fn output(source: &str) -> String {
        let (outcome, out, err) = run(source);
        assert!(outcome.is_success(), "{:?} failed: {}", outcome, err);
        out
    }

    fn runtime_error(source: &str) -> String {
        match run(source) {
            (Outcome::RuntimeError(error), _, _) => error.message(),
            (other, _, _) => panic!("expected a runtime error, got {:?}", other),
        }
    }

    // ───────────────────────── expressions ─────────────────────────

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(output("print 2 + 3 * 4;"), "14\n");
        assert_eq!(output("print (2 + 3) * 4;"), "20\n");
        assert_eq!(output("print 7 / 2;"), "3.5\n");
        assert_eq!(output("print -(1 - 4);"), "3\n");
        assert_eq!(output("print -0;"), "-0\n");
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(output("print \"foo\" + \"bar\";"), "foobar\n");
        assert_eq!(output("print \"x\" + 1;"), "x1\n");
        assert_eq!(output("print \"v\" + 2.5;"), "v2.5\n");
    }

    #[test]
    fn test_number_plus_string_is_an_error() {
        let (outcome, out, err) = run("print 1 + \"x\";");

        assert_eq!(outcome.exit_code(), 70);
        assert_eq!(out, "");
        assert_eq!(err, "Operands must be two numbers or two strings.\n[line 1]\n");
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(runtime_error("print 1 / 0;"), "Division by zero.");
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(runtime_error("print -\"a\";"), "Operand must be a number.");
        assert_eq!(runtime_error("print 1 < \"a\";"), "Operands must be numbers.");
        assert_eq!(runtime_error("print nope;"), "Undefined variable 'nope'.");
        assert_eq!(runtime_error("nope = 1;"), "Undefined variable 'nope'.");
    }

    #[test]
    fn test_equality_and_truthiness() {
        assert_eq!(
            output("print \"a\" == \"a\"; print nil == false; print 1 != 2; print !0;"),
            "true\nfalse\ntrue\nfalse\n"
        );
    }

    #[test]
    fn test_logical_operators_return_operands() {
        assert_eq!(
            output("print nil or \"x\"; print false and 1; print 1 and 2;"),
            "x\nfalse\n2\n"
        );
    }

    #[test]
    fn test_ternary_evaluates_selected_branch() {
        assert_eq!(
            output("print true ? \"yes\" : \"no\"; print nil ? 1 : 2;"),
            "yes\n2\n"
        );
        // The untaken branch would fail if evaluated.
        assert_eq!(output("print true ? 1 : 1 / 0;"), "1\n");
    }

    #[test]
    fn test_postfix_increment_and_decrement() {
        assert_eq!(
            output("var i = 1; print i++; print i; print i--; print i;"),
            "1\n2\n2\n1\n"
        );
        assert_eq!(
            output("class P {} var p = P(); p.n = 5; p.n++; print p.n;"),
            "6\n"
        );
        assert_eq!(runtime_error("var s = \"a\"; s++;"), "Operand must be a number.");
    }

    // ───────────────────────── statements ──────────────────────────

    #[test]
    fn test_block_shadowing() {
        assert_eq!(
            output("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
    }

    #[test]
    fn test_loops() {
        assert_eq!(
            output("for (var i = 0; i < 3; i = i + 1) print i;"),
            "0\n1\n2\n"
        );
        assert_eq!(
            output("var n = 3; while (n > 0) { print n; n = n - 1; }"),
            "3\n2\n1\n"
        );
    }

    #[test]
    fn test_runtime_error_stops_execution() {
        let (outcome, out, err) = run("print 1;\nprint -\"a\";\nprint 2;");

        assert!(matches!(outcome, Outcome::RuntimeError(_)));
        assert_eq!(out, "1\n");
        assert_eq!(err, "Operand must be a number.\n[line 2]\n");
    }

    #[test]
    fn test_static_errors_prevent_execution() {
        let (outcome, out, err) = run("print 1;\nprint ;");

        assert_eq!(outcome.exit_code(), 65);
        assert_eq!(out, "");
        assert_eq!(err, "[line 2] Error at ';': Expect expression.\n");
    }

    #[test]
    fn test_global_read_in_own_initializer_is_static() {
        let (outcome, out, err) = run("print 1;\nvar a = a;");

        assert_eq!(outcome.exit_code(), 65);
        assert_eq!(out, "");
        assert_eq!(
            err,
            "[line 2] Error at 'a': Can't read local variable in its own initializer.\n"
        );
    }

    #[test]
    fn test_static_errors_are_reported_in_line_order() {
        // The lexical error is found first but sits on a later line.
        let (outcome, _, err) = run("print 1;\nprint ;\n\"open");

        assert!(matches!(outcome, Outcome::StaticErrors(ref e) if e.len() == 2));
        assert_eq!(
            err,
            "[line 2] Error at ';': Expect expression.\n[line 3] Error: Unterminated string.\n"
        );
    }

    // ───────────────────────── functions ───────────────────────────

    #[test]
    fn test_recursion_and_return() {
        assert_eq!(
            output("fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } print fib(10);"),
            "55\n"
        );
    }

    #[test]
    fn test_closures_keep_their_own_counter() {
        let source = "
            fun makeCounter() {
                var i = 0;
                fun count() { i = i + 1; return i; }
                return count;
            }
            var a = makeCounter();
            var b = makeCounter();
            print a(); print a(); print b();
        ";

        assert_eq!(output(source), "1\n2\n1\n");
    }

    #[test]
    fn test_closure_binding_is_static() {
        let source = "
            var a = \"global\";
            {
                fun showA() { print a; }
                showA();
                var a = \"block\";
                showA();
            }
        ";

        assert_eq!(output(source), "global\nglobal\n");
    }

    #[test]
    fn test_arity_mismatch() {
        assert_eq!(
            runtime_error("fun f(a, b) {} f(1);"),
            "Expected 2 arguments but got 1."
        );
        assert_eq!(
            runtime_error("class A { init(x) {} } A();"),
            "Expected 1 arguments but got 0."
        );
    }

    #[test]
    fn test_calling_non_callable() {
        assert_eq!(
            runtime_error("\"s\"();"),
            "Can only call functions and classes."
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(output("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(
            output("fun f() {} print f; print clock; print print; class K {} print K; print K();"),
            "<fn f>\n<native fn clock>\n<native fn print>\nK\nK instance\n"
        );
    }

    #[test]
    fn test_print_is_a_first_class_value() {
        assert_eq!(output("var p = print; p(\"hi\");"), "hi\n");
    }

    // ───────────────────────── natives ─────────────────────────────

    #[test]
    fn test_clock_returns_a_number() {
        assert_eq!(output("var t = clock(); print t > 0; print t - t;"), "true\n0\n");
    }

    #[test]
    fn test_exit_stops_the_program() {
        let (outcome, out, _) = run("print 1; exit(); print 2;");

        assert!(matches!(outcome, Outcome::Exit(1)));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(out, "1\n");
    }

    // ───────────────────────── classes ─────────────────────────────

    #[test]
    fn test_fields_and_methods() {
        let source = "
            class Box {
                init(v) { this.v = v; }
                get() { return this.v; }
            }
            var b = Box(3);
            print b.get();
            b.v = 4;
            print b.v;
            var g = b.get;
            print g();
        ";

        assert_eq!(output(source), "3\n4\n4\n");
    }

    #[test]
    fn test_init_returns_the_instance() {
        let source = "
            class A { init() { this.x = 1; return; } }
            var a = A();
            print a.init() == a;
            print a.x;
        ";

        assert_eq!(output(source), "true\n1\n");
    }

    #[test]
    fn test_super_calls_skip_overrides() {
        let source = "
            class A { method() { return \"A method\"; } }
            class B : A {
                method() { return \"B method\"; }
                test() { return super.method(); }
            }
            class C : B {}
            print C().test();
            print C().method();
        ";

        assert_eq!(output(source), "A method\nB method\n");
    }

    #[test]
    fn test_inherited_initializer() {
        let source = "
            class A { init(n) { this.n = n; } }
            class B : A { init() { super.init(7); } }
            print B().n;
        ";

        assert_eq!(output(source), "7\n");
    }

    #[test]
    fn test_property_errors() {
        assert_eq!(
            runtime_error("class Box {} print Box().nope;"),
            "Undefined property 'nope'."
        );
        assert_eq!(
            runtime_error("var x = 1; print x.y;"),
            "Only instances have properties."
        );
        assert_eq!(
            runtime_error("var x = 1; x.y = 2;"),
            "Only instances have fields."
        );
        assert_eq!(
            runtime_error("var x = 1; class B : x {}"),
            "Superclass must be a class."
        );
    }

    #[test]
    fn test_set_evaluates_target_before_value() {
        let source = "
            var n = 0;
            class O {}
            var o = O();
            fun target() { n = n + 1; return o; }
            target().f = n;
            print o.f;
            print n;
        ";

        assert_eq!(output(source), "1\n1\n");
    }

    // ───────────────────────── sessions ────────────────────────────

    #[test]
    fn test_definitions_persist_across_runs() {
        let mut harness = Harness::new();

        assert!(harness.run("var a = 1;").is_success());
        assert!(harness.run("fun f() { return a + 1; }").is_success());
        assert!(harness.run("{ var b = 10; print f() + b; }").is_success());

        assert_eq!(harness.out.text(), "12\n");
    }

    #[test]
    fn test_errors_do_not_poison_later_runs() {
        let mut harness = Harness::new();

        assert!(matches!(harness.run("print nope;"), Outcome::RuntimeError(_)));
        assert!(harness.session.had_runtime_error());

        harness.session.reset_errors();
        assert!(!harness.session.had_runtime_error());

        assert!(matches!(harness.run("print ;"), Outcome::StaticErrors(_)));
        assert!(harness.session.had_error());

        harness.session.reset_errors();
        assert!(harness.run("print \"ok\";").is_success());
        assert!(!harness.session.had_error());
        assert_eq!(harness.out.text(), "ok\n");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut first = Harness::new();
        let mut second = Harness::new();

        assert!(first.run("var shared = 1;").is_success());
        assert!(matches!(
            second.run("print shared;"),
            Outcome::RuntimeError(_)
        ));
    }
}
