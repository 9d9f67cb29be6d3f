//! Lexical scope chain.
//!
//! Each [`Environment`] owns its own bindings and a shared link to the scope
//! that encloses it.  Closures keep their declaring scope alive by holding an
//! [`EnvRef`]; the link only ever points outward.
//!
//! A function bound inside the very scope it closes over would make that scope
//! own itself, so such bindings store the function with a weak link (see
//! [`LoxFunction::downgraded`]).  Reads hand out a strong copy, which keeps
//! the scope alive for as long as the value escapes.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::callable::{LoxCallable, LoxFunction};
use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared, mutable handle to a scope.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

/// The value as seen from outside its binding: weakly linked functions come
/// back with a strong link.
fn detached(value: &Value) -> Value {
    if let Value::Callable(callable) = value {
        if let Some(function) = callable.as_function().and_then(LoxFunction::detached) {
            return Value::Callable(Rc::new(function));
        }
    }
    value.clone()
}

impl Environment {
    /// The global scope: no enclosing link.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap `self` into a shareable handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    /// The value as stored in this scope: a function closing over this very
    /// scope is downgraded to a weak link.
    fn anchored(&self, value: Value) -> Value {
        let downgraded: Option<LoxFunction> = match &value {
            Value::Callable(callable) => callable
                .as_function()
                .filter(|function| function.closes_over(self))
                .map(LoxFunction::downgraded),
            _ => None,
        };

        match downgraded {
            Some(function) => {
                debug!("Binding '{}' weakly to its declaring scope", function.name());
                Value::Callable(Rc::new(function))
            }
            None => value,
        }
    }

    /// Bind `name` in this scope, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        let value = self.anchored(value);
        self.values.insert(name.to_string(), value);
    }

    /// Read `name`, walking outward until some scope defines it.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(detached(value));
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(undefined(name)),
        }
    }

    /// Overwrite an existing binding, walking outward like [`Self::get`].
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if self.values.contains_key(&name.lexeme) {
            return self.overwrite(name, value);
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(undefined(name)),
        }
    }

    /// The scope exactly `hops` enclosing links away (`hops >= 1`).
    fn ancestor(&self, hops: usize) -> Option<EnvRef> {
        let mut env: EnvRef = self.enclosing.clone()?;

        for _ in 1..hops {
            let next: EnvRef = env.borrow().enclosing.clone()?;
            env = next;
        }

        Some(env)
    }

    /// Read `name` from the scope `hops` links out, without searching.
    pub fn get_at(&self, hops: usize, name: &Token) -> Result<Value> {
        debug!("get_at: '{}' at distance {}", name.lexeme, hops);

        if hops == 0 {
            return self
                .values
                .get(&name.lexeme)
                .map(detached)
                .ok_or_else(|| undefined(name));
        }

        let env: EnvRef = self.ancestor(hops).ok_or_else(|| undefined(name))?;
        let value: Option<Value> = env.borrow().values.get(&name.lexeme).map(detached);

        value.ok_or_else(|| undefined(name))
    }

    /// Write `name` in the scope `hops` links out, without searching.
    pub fn assign_at(&mut self, hops: usize, name: &Token, value: Value) -> Result<()> {
        debug!("assign_at: '{}' at distance {}", name.lexeme, hops);

        if hops == 0 {
            return self.overwrite(name, value);
        }

        let env: EnvRef = self.ancestor(hops).ok_or_else(|| undefined(name))?;
        let result = env.borrow_mut().overwrite(name, value);
        result
    }

    fn overwrite(&mut self, name: &Token, value: Value) -> Result<()> {
        let value = self.anchored(value);

        match self.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }
}
