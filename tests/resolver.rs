mod common;

#[cfg(test)]
mod resolver_tests {
    use super::common::parse_ok;

    use rox::ast::ExprId;
    use rox::resolver::{Locals, Resolver};

    fn resolve(source: &str) -> Locals {
        Resolver::new()
            .resolve(&parse_ok(source))
            .unwrap_or_else(|d| panic!("resolve failed: {d}"))
    }

    fn resolve_errors(source: &str) -> Vec<String> {
        match Resolver::new().resolve(&parse_ok(source)) {
            Ok(_) => panic!("expected resolution errors for {source:?}"),
            Err(diagnostics) => diagnostics.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_globals_are_left_out_of_the_table() {
        let locals = resolve("var a = 1; print a; a = 2;");

        assert!(locals.is_empty());
    }

    #[test]
    fn test_hop_counts_through_blocks() {
        // ids: `a` read → 0, `b` read → 1
        let locals = resolve("{ var a = 1; { var b = 2; print a; print b; } }");

        assert_eq!(locals.get(&ExprId(0)), Some(&1));
        assert_eq!(locals.get(&ExprId(1)), Some(&0));
    }

    #[test]
    fn test_parameters_share_the_body_scope() {
        // ids: `x` read → 0
        let locals = resolve("fun f(x) { return x; }");

        assert_eq!(locals.get(&ExprId(0)), Some(&0));
    }

    #[test]
    fn test_closure_reference_counts_function_scopes() {
        // ids: assignment target parsed as a variable → 0 (then discarded),
        //      `count` in `count + 1` → 1, assignment → 2, `count` returned → 3,
        //      `inc` returned → 4
        let locals = resolve(
            "fun make() {
               var count = 0;
               fun inc() { count = count + 1; return count; }
               return inc;
             }",
        );

        assert_eq!(locals.get(&ExprId(0)), None);
        assert_eq!(locals.get(&ExprId(1)), Some(&1));
        assert_eq!(locals.get(&ExprId(2)), Some(&1));
        assert_eq!(locals.get(&ExprId(3)), Some(&1));
        assert_eq!(locals.get(&ExprId(4)), Some(&0));
        assert_eq!(locals.len(), 4);
    }

    #[test]
    fn test_self_referential_initializer_is_rejected() {
        assert_eq!(
            resolve_errors("{ var a = a; }"),
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_shadowing_outer_local_in_initializer_is_still_rejected() {
        let errors = resolve_errors("{ var a = 1; { var a = a + 1; } }");

        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_global_self_reference_is_not_static() {
        assert!(resolve("var a = a;").is_empty());
    }

    #[test]
    fn test_duplicate_local_declaration() {
        assert_eq!(
            resolve_errors("{\n var a = 1;\n var a = 2;\n}"),
            vec!["[line 3] Error at 'a': Already a variable with this name in this scope."]
        );
    }

    #[test]
    fn test_duplicate_parameter() {
        let errors = resolve_errors("fun f(a, a) {}");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Already a variable"));
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        assert!(resolve("var a = 1; var a = 2;").is_empty());
    }

    #[test]
    fn test_top_level_return() {
        assert_eq!(
            resolve_errors("return 1;"),
            vec!["[line 1] Error at 'return': Can't return from top-level code."]
        );
    }

    #[test]
    fn test_all_errors_are_collected() {
        let errors = resolve_errors("return;\n{ var x = x; }\n{ var y; var y; }");

        assert_eq!(errors.len(), 3);
    }
}
