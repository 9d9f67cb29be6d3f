//! The call protocol shared by user functions and host natives.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Instant;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// Anything a Lox call expression can invoke.
///
/// The interpreter checks `arity()` against the argument count before
/// calling, so implementations may assume the lengths agree.
pub trait LoxCallable: fmt::Debug + fmt::Display {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;

    /// The user function behind this callable, if it is one.
    fn as_function(&self) -> Option<&LoxFunction> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────────

/// How a function reaches the scope it was declared in.
#[derive(Debug)]
enum Closure {
    /// Held by a value living outside the declaring scope.
    Shared(EnvRef),

    /// Held by a binding inside the declaring scope itself, which must not
    /// own that scope.
    Declaring(Weak<RefCell<Environment>>),
}

/// A `fun` declaration paired with the scope it was declared in.
///
/// [`Environment`] keeps the link weak while the function sits in one of the
/// declaring scope's own bindings and hands out strong copies on every read,
/// so a scope and its local functions never keep each other alive.
#[derive(Debug)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Closure,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef) -> Self {
        Self {
            declaration,
            closure: Closure::Shared(closure),
        }
    }

    fn closure_ptr(&self) -> *const RefCell<Environment> {
        match &self.closure {
            Closure::Shared(env) => Rc::as_ptr(env),
            Closure::Declaring(env) => env.as_ptr(),
        }
    }

    /// Whether this function holds a strong link to `scope`.
    pub fn closes_over(&self, scope: &Environment) -> bool {
        match &self.closure {
            Closure::Shared(env) => std::ptr::eq(env.as_ptr(), scope),
            Closure::Declaring(_) => false,
        }
    }

    /// The same function with a weak link, for storing inside its own
    /// declaring scope.
    pub fn downgraded(&self) -> Self {
        let closure = match &self.closure {
            Closure::Shared(env) => Closure::Declaring(Rc::downgrade(env)),
            Closure::Declaring(env) => Closure::Declaring(Weak::clone(env)),
        };

        Self {
            declaration: Rc::clone(&self.declaration),
            closure,
        }
    }

    /// A strong copy of a weakly linked function, or `None` if the link is
    /// already strong (or its scope is gone).
    pub fn detached(&self) -> Option<Self> {
        match &self.closure {
            Closure::Shared(_) => None,
            Closure::Declaring(env) => env
                .upgrade()
                .map(|env| Self::new(Rc::clone(&self.declaration), env)),
        }
    }

    /// Same declaration closed over the same scope.
    pub fn same_function(&self, other: &LoxFunction) -> bool {
        Rc::ptr_eq(&self.declaration, &other.declaration)
            && std::ptr::eq(self.closure_ptr(), other.closure_ptr())
    }
}

impl LoxCallable for LoxFunction {
    fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", self.name());

        let closure: EnvRef = match &self.closure {
            Closure::Shared(env) => Rc::clone(env),
            Closure::Declaring(env) => env.upgrade().ok_or_else(|| {
                LoxError::Internal(format!("scope of '{}' was already dropped", self.name()))
            })?,
        };

        // Parameters live in a fresh scope hanging off the *declaring* scope.
        let mut scope = Environment::with_enclosing(closure);
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            debug!("Binding parameter '{}' to {}", param.lexeme, argument);
            scope.define(&param.lexeme, argument);
        }

        match interpreter.execute_block(&self.declaration.body, scope.into_ref())? {
            Flow::Normal => Ok(Value::Nil),
            Flow::Return(value) => Ok(value),
        }
    }

    fn as_function(&self) -> Option<&LoxFunction> {
        Some(self)
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────────

type NativeFn = Box<dyn Fn(&[Value]) -> Value>;

/// A host function exposed to scripts.  Natives see only their arguments,
/// never the caller's scope.
pub struct NativeFunction {
    name: &'static str,
    arity: usize,
    func: NativeFn,
}

impl NativeFunction {
    pub fn new(name: &'static str, arity: usize, func: NativeFn) -> Self {
        Self { name, arity, func }
    }

    /// `clock()`: seconds elapsed since `epoch`, from a monotonic clock.
    pub fn clock(epoch: Instant) -> Self {
        Self::new(
            "clock",
            0,
            Box::new(move |_args: &[Value]| Value::Number(epoch.elapsed().as_secs_f64())),
        )
    }
}

impl LoxCallable for NativeFunction {
    fn name(&self) -> &str {
        self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, _interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        Ok((self.func)(&arguments))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}
