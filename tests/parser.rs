#[cfg(test)]
mod parser_tests {
    use pretty_assertions::assert_eq;

    use rox::ast::{IdGen, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::error::LoxError;
    use rox::parser::Parser;
    use rox::scanner::scan_all;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<LoxError>> {
        let (tokens, errors) = scan_all(source);
        assert!(errors.is_empty(), "unexpected lexical errors: {:?}", errors);

        let mut ids = IdGen::new();
        let mut parser = Parser::new(tokens, &mut ids);
        parser.parse()
    }

    fn printed(source: &str) -> Vec<String> {
        match parse(source) {
            Ok(statements) => statements.iter().map(AstPrinter::print_stmt).collect(),
            Err(errors) => panic!("parse failed: {:?}", errors),
        }
    }

    fn error_lines(source: &str) -> Vec<String> {
        match parse(source) {
            Ok(_) => panic!("expected parse errors for {:?}", source),
            Err(errors) => errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_precedence_of_arithmetic() {
        assert_eq!(printed("1 + 2 * 3;"), vec!["(; (+ 1.0 (* 2.0 3.0)))"]);
        assert_eq!(printed("(1 + 2) * 3;"), vec!["(; (* (group (+ 1.0 2.0)) 3.0))"]);
        assert_eq!(printed("-a - -b;"), vec!["(; (- (- a) (- b)))"]);
        assert_eq!(printed("1 - 2 - 3;"), vec!["(; (- (- 1.0 2.0) 3.0))"]);
    }

    #[test]
    fn test_precedence_of_comparison_and_logic() {
        assert_eq!(
            printed("a or b and c == d < e;"),
            vec!["(; (or a (and b (== c (< d e)))))"]
        );
        assert_eq!(printed("!true != false;"), vec!["(; (!= (! true) false))"]);
    }

    #[test]
    fn test_ternary_is_right_associative() {
        assert_eq!(
            printed("a ? b : c ? d : e;"),
            vec!["(; (?: a b (?: c d e)))"]
        );
    }

    #[test]
    fn test_assignment_and_property_set() {
        assert_eq!(printed("a = b = 1;"), vec!["(; (= a (= b 1.0)))"]);
        assert_eq!(printed("o.f.g = 2;"), vec!["(; (= (. (. o f) g) 2.0))"]);
    }

    #[test]
    fn test_postfix_and_calls() {
        assert_eq!(printed("i++;"), vec!["(; (post++ i))"]);
        assert_eq!(printed("o.n--;"), vec!["(; (post-- (. o n)))"]);
        assert_eq!(printed("f(1, g(2))(3);"), vec!["(; (call (call f 1.0 (call g 2.0)) 3.0))"]);
    }

    #[test]
    fn test_print_statement_is_call_of_native() {
        assert_eq!(printed("print 1;"), vec!["(; (call print 1.0))"]);
        assert_eq!(printed("var p = print;"), vec!["(var p print)"]);
    }

    #[test]
    fn test_for_loop_desugars_to_while() {
        assert_eq!(
            printed("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["(block (var i 0.0) (while (< i 3.0) (block (; (call print i)) (; (= i (+ i 1.0))))))"]
        );
        assert_eq!(printed("for (;;) f();"), vec!["(while true (; (call f)))"]);
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            printed("fun add(a, b) { return a + b; }"),
            vec!["(fun add (a b) (block (return (+ a b))))"]
        );
        assert_eq!(
            printed("class B : A { init(x) { this.x = x; } get() { return super.get(); } }"),
            vec![
                "(class B : A (method init (x) (block (; (= (. this x) x)))) (method get () (block (return (call (super get))))))"
            ]
        );
        assert_eq!(
            printed("if (a) print 1; else { }"),
            vec!["(if a (; (call print 1.0)) (block))"]
        );
    }

    #[test]
    fn test_one_error_per_bad_statement() {
        assert_eq!(
            error_lines("var = 1;\nvar b 2;\nprint 3;"),
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 2] Error at '2': Expect ';' after variable declaration.",
            ]
        );
    }

    #[test]
    fn test_error_at_end_of_input() {
        assert_eq!(
            error_lines("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
        assert_eq!(
            error_lines("print ;"),
            vec!["[line 1] Error at ';': Expect expression."]
        );
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(
            error_lines("a + b = c;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
        assert_eq!(
            error_lines("1++;"),
            vec!["[line 1] Error at '++': Invalid increment target."]
        );
    }

    #[test]
    fn test_ternary_rejected_as_condition() {
        assert_eq!(
            error_lines("if (a ? b : c) print 1;"),
            vec!["[line 1] Error at 'if': Ternary expression can't be used as a condition."]
        );
        assert_eq!(
            error_lines("while ((a ? b : c)) {}"),
            vec!["[line 1] Error at 'while': Ternary expression can't be used as a condition."]
        );
        // Ternaries are fine inside a larger condition.
        assert_eq!(
            printed("while ((a ? b : c) == d) {}"),
            vec!["(while (== (group (?: a b c)) d) (block))"]
        );
    }

    #[test]
    fn test_too_many_arguments_is_reported_once() {
        let arguments: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});", arguments.join(", "));

        assert_eq!(
            error_lines(&source),
            vec!["[line 1] Error at '255': Can't have more than 255 arguments."]
        );
    }

    #[test]
    fn test_too_many_parameters() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));

        assert_eq!(
            error_lines(&source),
            vec!["[line 1] Error at 'p255': Can't have more than 255 parameters."]
        );
    }

    #[test]
    fn test_ids_stay_unique_across_parses() {
        let mut ids = IdGen::new();

        let (first, _) = scan_all("a;");
        let (second, _) = scan_all("a;");

        let one = Parser::new(first, &mut ids).parse().unwrap();
        let two = Parser::new(second, &mut ids).parse().unwrap();

        assert_ne!(one, two);
    }
}
