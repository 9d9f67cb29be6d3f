mod common;

#[cfg(test)]
mod interpreter_tests {
    use super::common::{run, run_ok, session};

    use rox::error::LoxError;
    use rox::interpreter::MAX_CALL_DEPTH;
    use rox::session::RunError;

    /// Runs a program expected to fail at runtime; returns output and error.
    fn run_runtime_err(source: &str) -> (Vec<String>, LoxError) {
        match run(source) {
            (lines, Err(RunError::Runtime(e))) => (lines, e),
            (_, other) => panic!("expected runtime error, got {other:?}"),
        }
    }

    // ── output formatting ──────────────────────────────────────────────

    #[test]
    fn test_print_formats() {
        assert_eq!(
            run_ok("print nil; print true; print 3; print 2.5; print -0.125; print \"txt\";"),
            vec!["nil", "true", "3", "2.5", "-0.125", "txt"]
        );
    }

    #[test]
    fn test_callables_print_labels() {
        assert_eq!(
            run_ok("fun f() {} print f; print clock;"),
            vec!["<fn f>", "<native fn>"]
        );
    }

    // ── arithmetic and coercion policy ─────────────────────────────────

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            run_ok("print 1 + 2; print 10 - 4 * 2; print (10 - 4) * 2; print 7 / 2;"),
            vec!["3", "2", "12", "3.5"]
        );
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(run_ok("print \"a\" + \"b\";"), vec!["ab"]);
    }

    #[test]
    fn test_mixed_plus_is_a_runtime_error() {
        let (_, error) = run_runtime_err("print \"a\" + 1;");

        assert_eq!(
            error.to_string(),
            "Operands of '+' must be two numbers or two strings, got \"a\" and 1.\n[line 1]"
        );
    }

    #[test]
    fn test_numeric_operators_name_the_operator() {
        let (_, error) = run_runtime_err("print 1 < \"2\";");
        assert_eq!(error.message(), "Operands of '<' must be numbers.");

        let (_, error) = run_runtime_err("print -\"x\";");
        assert_eq!(error.message(), "Operand of '-' must be a number.");
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        assert_eq!(run_ok("print 1 / 0; print -1 / 0;"), vec!["inf", "-inf"]);
    }

    // ── truthiness and equality ────────────────────────────────────────

    #[test]
    fn test_truthiness_and_equality() {
        assert_eq!(
            run_ok(
                "print nil == nil;
                 print false == nil;
                 print 1 == 1;
                 print \"a\" == \"a\";
                 print 1 == \"1\";
                 print nil != false;
                 if (0) print \"zero is truthy\";
                 if (\"\") print \"empty is truthy\";
                 print !nil;"
            ),
            vec![
                "true",
                "false",
                "true",
                "true",
                "false",
                "true",
                "zero is truthy",
                "empty is truthy",
                "true"
            ]
        );
    }

    #[test]
    fn test_functions_compare_by_identity() {
        assert_eq!(
            run_ok(
                "fun make() { fun f() {} return f; }
                 var a = make(); var b = make(); var c = a;
                 print a == b; print a == c; print clock == clock;"
            ),
            vec!["false", "true", "true"]
        );
    }

    #[test]
    fn test_logical_operators_return_deciding_operand() {
        assert_eq!(
            run_ok(
                "print nil or \"yes\";
                 print \"first\" or \"second\";
                 print nil and \"never\";
                 print 1 and 2;"
            ),
            vec!["yes", "first", "nil", "2"]
        );
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        assert_eq!(
            run_ok(
                "var hits = 0;
                 fun touch() { hits = hits + 1; return true; }
                 true or touch();
                 false and touch();
                 print hits;"
            ),
            vec!["0"]
        );
    }

    // ── scoping ────────────────────────────────────────────────────────

    #[test]
    fn test_shadowing() {
        assert_eq!(
            run_ok("{ var a = 1; { var a = 2; print a; } print a; }"),
            vec!["2", "1"]
        );
    }

    #[test]
    fn test_static_binding_ignores_later_global_shadow() {
        assert_eq!(
            run_ok(
                "var a = \"global\";
                 {
                   fun show() { print a; }
                   show();
                   var a = \"block\";
                   show();
                 }"
            ),
            vec!["global", "global"]
        );
    }

    #[test]
    fn test_local_beats_same_named_global() {
        assert_eq!(
            run_ok(
                "var x = \"global\";
                 fun f() { var x = \"local\"; { { print x; } } }
                 f();"
            ),
            vec!["local"]
        );
    }

    #[test]
    fn test_assignment_is_an_expression() {
        assert_eq!(
            run_ok("var a; var b; a = b = 4; print a; print b;"),
            vec!["4", "4"]
        );
    }

    #[test]
    fn test_undefined_variable() {
        let (_, error) = run_runtime_err("print 1;\nprint missing;");

        assert_eq!(error.to_string(), "Undefined variable 'missing'.\n[line 2]");
    }

    #[test]
    fn test_self_reference_is_a_static_error() {
        let (lines, result) = run("{ var a = a; }");

        assert!(lines.is_empty());
        assert!(matches!(result, Err(RunError::Static(_))));
        assert_eq!(result.err().map(|e| e.exit_code()), Some(65));
    }

    // ── control flow ───────────────────────────────────────────────────

    #[test]
    fn test_for_loop() {
        assert_eq!(
            run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn test_while_and_if_else() {
        assert_eq!(
            run_ok(
                "var i = 0;
                 while (i < 4) {
                   if (i == 2) print \"two\"; else print i;
                   i = i + 1;
                 }"
            ),
            vec!["0", "1", "two", "3"]
        );
    }

    #[test]
    fn test_return_unwinds_nested_loops_and_blocks() {
        assert_eq!(
            run_ok(
                "fun find() {
                   for (var i = 0; i < 10; i = i + 1) {
                     var j = 0;
                     while (j < 10) {
                       { if (i * j == 6) return i + j; }
                       j = j + 1;
                     }
                   }
                   return -1;
                 }
                 print find();
                 fun first() { while (true) { return \"done\"; } }
                 print first();"
            ),
            vec!["7", "done"]
        );
    }

    #[test]
    fn test_return_value_and_implicit_nil() {
        assert_eq!(
            run_ok(
                "fun early(n) { if (n > 0) return \"pos\"; print \"fallthrough\"; }
                 print early(1);
                 print early(0);
                 fun bare() { return; }
                 print bare();"
            ),
            vec!["pos", "fallthrough", "nil", "nil"]
        );
    }

    #[test]
    fn test_environment_restored_after_return() {
        assert_eq!(
            run_ok(
                "var a = \"outer\";
                 fun f() { var a = \"inner\"; { return a; } }
                 print f();
                 print a;"
            ),
            vec!["inner", "outer"]
        );
    }

    // ── functions and closures ─────────────────────────────────────────

    #[test]
    fn test_recursion() {
        assert_eq!(
            run_ok(
                "fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); }
                 print fib(15);"
            ),
            vec!["610"]
        );
    }

    #[test]
    fn test_closures_outlive_their_declaring_call() {
        assert_eq!(
            run_ok(
                "fun makeCounter() {
                   var count = 0;
                   fun counter() { count = count + 1; return count; }
                   return counter;
                 }
                 var a = makeCounter();
                 var b = makeCounter();
                 print a(); print a(); print a();
                 print b();"
            ),
            vec!["1", "2", "3", "1"]
        );
    }

    #[test]
    fn test_closures_share_a_captured_scope() {
        assert_eq!(
            run_ok(
                "var get; var set;
                 {
                   var shared = \"initial\";
                   fun g() { return shared; }
                   fun s(v) { shared = v; }
                   get = g; set = s;
                 }
                 set(\"updated\");
                 print get();"
            ),
            vec!["updated"]
        );
    }

    #[test]
    fn test_closure_captures_declaration_scope_not_call_scope() {
        assert_eq!(
            run_ok(
                "var x = \"global\";
                 fun outer() { fun show() { print x; } return show; }
                 fun caller(f) { var x = \"caller\"; f(); }
                 caller(outer());"
            ),
            vec!["global"]
        );
    }

    #[test]
    fn test_arity_mismatch_names_both_counts() {
        let (_, too_few) = run_runtime_err("fun f(a, b) {}\nf(1);");
        assert_eq!(too_few.to_string(), "Expected 2 arguments but got 1.\n[line 2]");

        let (_, too_many) = run_runtime_err("fun f(a, b) {} f(1, 2, 3);");
        assert_eq!(too_many.message(), "Expected 2 arguments but got 3.");

        let (_, native) = run_runtime_err("clock(1);");
        assert_eq!(native.message(), "Expected 0 arguments but got 1.");
    }

    #[test]
    fn test_calling_a_non_callable() {
        let (_, error) = run_runtime_err("\"text\"();");

        assert_eq!(error.message(), "Can only call functions.");
    }

    #[test]
    fn test_clock_is_monotonic() {
        assert_eq!(
            run_ok("var a = clock(); var b = clock(); print b >= a; print a >= 0;"),
            vec!["true", "true"]
        );
    }

    #[test]
    fn test_local_function_outlives_its_scope_through_aliases() {
        assert_eq!(
            run_ok(
                "var h;
                 { fun f() { return \"f\"; } var g = f; h = g; }
                 print h();
                 fun outer() {
                   fun countdown(n) { if (n == 0) return \"done\"; return countdown(n - 1); }
                   return countdown;
                 }
                 print outer()(3);"
            ),
            vec!["f", "done"]
        );
    }

    // ── call depth ─────────────────────────────────────────────────────

    #[test]
    fn test_deep_recursion_within_limit() {
        assert_eq!(
            run_ok(
                "fun depth(n) { if (n == 0) return 0; return depth(n - 1) + 1; }
                 print depth(3000);"
            ),
            vec!["3000"]
        );
    }

    #[test]
    fn test_unbounded_recursion_is_a_runtime_error() {
        let (lines, result) = run("fun f(n) { return f(n + 1); }\nprint \"start\";\nf(0);");

        assert_eq!(lines, vec!["start"]);
        match result {
            Err(e @ RunError::Runtime(_)) => {
                assert_eq!(e.exit_code(), 70);
                assert_eq!(e.to_string(), "Stack overflow.\n[line 1]");

                let trace = e.stack_trace();
                assert_eq!(trace.len(), MAX_CALL_DEPTH + 1);
                assert_eq!(trace[0], "[line 1] in f()");
                assert_eq!(trace[trace.len() - 1], "[line 3] in script");
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn test_depth_resets_after_overflow() {
        let (mut session, buffer) = session();

        assert!(session.run("fun f() { return f(); } f();").is_err());
        session
            .run("fun g(n) { if (n == 0) return \"ok\"; return g(n - 1); } print g(100);")
            .expect("calls work again after an overflow");

        assert_eq!(buffer.lines(), vec!["ok"]);
    }

    #[test]
    fn test_stack_trace_lists_active_calls() {
        let (_, error) = run_runtime_err(
            "fun inner() {\n  return nil + 1;\n}\nfun outer() {\n  return inner();\n}\nouter();",
        );

        assert_eq!(
            error.stack_trace(),
            vec![
                "[line 2] in inner()",
                "[line 5] in outer()",
                "[line 7] in script"
            ]
        );
    }

    #[test]
    fn test_top_level_error_trace_is_script_only() {
        let (_, error) = run_runtime_err("print 1;\nprint -\"x\";");

        assert_eq!(error.stack_trace(), vec!["[line 2] in script"]);
    }

    // ── failure modes ──────────────────────────────────────────────────

    #[test]
    fn test_runtime_error_stops_the_run() {
        let (lines, result) = run("print 1;\nprint nil + 1;\nprint 3;");

        assert_eq!(lines, vec!["1"]);
        assert_eq!(result.err().map(|e| e.exit_code()), Some(70));
    }

    #[test]
    fn test_syntax_errors_prevent_execution() {
        let (lines, result) = run("print 1;\nprint ;");

        assert!(lines.is_empty());
        assert_eq!(result.err().map(|e| e.exit_code()), Some(65));
    }

    // ── sessions ───────────────────────────────────────────────────────

    #[test]
    fn test_session_keeps_state_between_runs() {
        let (mut session, buffer) = session();

        session
            .run("var n = 10; fun add(k) { fun inner(x) { return x + k; } return inner; }")
            .expect("first chunk runs");
        session.run("var plus5 = add(5);").expect("second chunk runs");
        assert!(session.run("print undefined_name;").is_err());
        session.run("print plus5(n);").expect("state survives an error");

        assert_eq!(buffer.lines(), vec!["15"]);
    }
}
