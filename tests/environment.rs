#[cfg(test)]
mod environment_tests {
    use std::rc::Rc;

    use rox::ast::FunctionDecl;
    use rox::callable::LoxFunction;
    use rox::environment::{EnvRef, Environment};
    use rox::token::{Token, TokenType};
    use rox::value::Value;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, lexeme, 7)
    }

    fn function_in(scope: &EnvRef, fn_name: &str) -> Value {
        let declaration = Rc::new(FunctionDecl {
            name: name(fn_name),
            params: Vec::new(),
            body: Vec::new(),
        });
        Value::Callable(Rc::new(LoxFunction::new(declaration, Rc::clone(scope))))
    }

    fn chain() -> (EnvRef, EnvRef, EnvRef) {
        let global = Environment::new().into_ref();
        let middle = Environment::with_enclosing(Rc::clone(&global)).into_ref();
        let inner = Environment::with_enclosing(Rc::clone(&middle)).into_ref();
        (global, middle, inner)
    }

    #[test]
    fn test_define_overwrites_in_same_scope() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::Number(2.0));

        assert_eq!(env.get(&name("a")).ok(), Some(Value::Number(2.0)));
    }

    #[test]
    fn test_get_walks_outward() {
        let (global, _middle, inner) = chain();
        global.borrow_mut().define("g", Value::Bool(true));

        assert_eq!(inner.borrow().get(&name("g")).ok(), Some(Value::Bool(true)));
    }

    #[test]
    fn test_assign_updates_declaring_scope() {
        let (global, middle, inner) = chain();
        middle.borrow_mut().define("m", Value::Nil);

        inner
            .borrow_mut()
            .assign(&name("m"), Value::Number(3.0))
            .expect("assign succeeds");

        assert_eq!(middle.borrow().get(&name("m")).ok(), Some(Value::Number(3.0)));
        assert!(global.borrow().get(&name("m")).is_err());
    }

    #[test]
    fn test_undefined_variable_carries_line() {
        let env = Environment::new();
        let error = env.get(&name("missing")).expect_err("lookup fails");

        assert_eq!(error.to_string(), "Undefined variable 'missing'.\n[line 7]");
        assert_eq!(error.line(), Some(7));
    }

    #[test]
    fn test_assign_to_undefined_fails() {
        let mut env = Environment::new();

        assert!(env.assign(&name("nope"), Value::Nil).is_err());
    }

    #[test]
    fn test_get_at_skips_shadowing_bindings() {
        let (global, middle, inner) = chain();
        global.borrow_mut().define("x", Value::String("global".into()));
        middle.borrow_mut().define("x", Value::String("middle".into()));
        inner.borrow_mut().define("x", Value::String("inner".into()));

        let inner = inner.borrow();
        assert_eq!(inner.get_at(0, &name("x")).ok(), Some(Value::String("inner".into())));
        assert_eq!(inner.get_at(1, &name("x")).ok(), Some(Value::String("middle".into())));
        assert_eq!(inner.get_at(2, &name("x")).ok(), Some(Value::String("global".into())));
        assert!(inner.get_at(3, &name("x")).is_err());
    }

    #[test]
    fn test_assign_at_writes_exact_scope() {
        let (global, middle, inner) = chain();
        global.borrow_mut().define("x", Value::Number(0.0));
        middle.borrow_mut().define("x", Value::Number(1.0));

        inner
            .borrow_mut()
            .assign_at(2, &name("x"), Value::Number(9.0))
            .expect("assign_at succeeds");

        assert_eq!(global.borrow().get(&name("x")).ok(), Some(Value::Number(9.0)));
        assert_eq!(middle.borrow().get(&name("x")).ok(), Some(Value::Number(1.0)));
    }

    #[test]
    fn test_enclosing_link_is_shared() {
        let (_global, middle, inner) = chain();
        let parent = inner.borrow().enclosing().expect("inner has a parent");

        assert!(Rc::ptr_eq(&parent, &middle));
        assert_eq!(Rc::strong_count(&middle), 3);
    }

    #[test]
    fn test_scope_is_freed_with_its_local_function() {
        let (_global, middle, inner) = chain();
        let inner_function = function_in(&inner, "f");
        inner.borrow_mut().define("f", inner_function);

        let released = Rc::downgrade(&inner);
        drop(inner);

        assert!(released.upgrade().is_none());
        assert_eq!(Rc::strong_count(&middle), 1);
    }

    #[test]
    fn test_read_function_keeps_its_scope_alive() {
        let (_global, _middle, inner) = chain();
        let inner_function = function_in(&inner, "f");
        inner.borrow_mut().define("f", inner_function);

        let escaped = inner.borrow().get(&name("f")).expect("f is defined");
        let scope = Rc::downgrade(&inner);
        drop(inner);

        assert!(scope.upgrade().is_some());
        drop(escaped);
        assert!(scope.upgrade().is_none());
    }

    #[test]
    fn test_function_alias_in_declaring_scope_is_weak() {
        let (_global, _middle, inner) = chain();
        let inner_function = function_in(&inner, "f");
        inner.borrow_mut().define("f", inner_function);

        let alias = inner.borrow().get(&name("f")).expect("f is defined");
        inner.borrow_mut().define("g", Value::Nil);
        inner
            .borrow_mut()
            .assign(&name("g"), alias)
            .expect("g is defined");

        let scope = Rc::downgrade(&inner);
        drop(inner);

        assert!(scope.upgrade().is_none());
    }

    #[test]
    fn test_reads_of_one_function_compare_equal() {
        let (_global, _middle, inner) = chain();
        let inner_function = function_in(&inner, "f");
        inner.borrow_mut().define("f", inner_function);

        let first = inner.borrow().get(&name("f")).expect("f is defined");
        let second = inner.borrow().get_at(0, &name("f")).expect("f is defined");

        assert_eq!(first, second);
        assert_ne!(first, function_in(&inner, "f"));
    }
}
