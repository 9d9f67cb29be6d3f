use std::fmt;
use std::rc::Rc;

use crate::ast::LiteralValue;
use crate::callable::LoxCallable;

/// Runtime value of a Lox expression.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Rc<dyn LoxCallable>),
}

impl Value {
    /// `nil` and `false` are falsy; everything else (including `0` and `""`)
    /// is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Rendering used inside error messages: strings keep their quotes so
    /// `"1"` and `1` stay distinguishable.
    pub fn describe(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            other => other.to_string(),
        }
    }
}

/// Equality never fails: values of different kinds are simply unequal,
/// and callables compare by identity (for user functions, the declaration
/// and the scope it closes over).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => {
                match (a.as_function(), b.as_function()) {
                    (Some(f), Some(g)) => f.same_function(g),
                    _ => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
                }
            }
            _ => false,
        }
    }
}

impl From<&LiteralValue> for Value {
    fn from(literal: &LiteralValue) -> Self {
        match literal {
            LiteralValue::Number(n) => Value::Number(*n),
            LiteralValue::Str(s) => Value::String(s.clone()),
            LiteralValue::True => Value::Bool(true),
            LiteralValue::False => Value::Bool(false),
            LiteralValue::Nil => Value::Nil,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // 3.0 → "3", 2.5 → "2.5"
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Callable(c) => write!(f, "{}", c),
        }
    }
}
