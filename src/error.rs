//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! Static stages never stop at the first problem: they push into a
//! [`Diagnostics`] collector and hand it back to the caller, which decides
//! what to print and which exit status to use.
//!
//! The module **does not** print diagnostics itself

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error. `location` is ` at 'lexeme'` or ` at end`.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure (redeclaration, self‑referencing initializer,
    /// top‑level `return`).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error.  Exactly one of these ends a run.
    ///
    /// `calls` collects the calls the error unwound through, innermost first.
    #[error("{message}\n[line {line}]")]
    Runtime {
        message: String,
        line: usize,
        calls: Vec<CallSite>,
    },

    /// Broken interpreter invariant (e.g. `return` escaping to top level).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// ` at end` for the EOF marker, ` at 'lexeme'` otherwise.
fn location_of(token: &Token) -> String {
    if token.is_eof() {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            line: token.line,
            calls: Vec::new(),
        }
    }

    /// Records that a runtime error left a call to `function` made on `line`.
    pub fn unwound_through(mut self, function: &str, line: usize) -> Self {
        if let LoxError::Runtime { calls, .. } = &mut self {
            calls.push(CallSite {
                function: function.to_string(),
                line,
            });
        }
        self
    }

    /// `[line N] in f()` for every call the error left, innermost first,
    /// closed by `[line N] in script`.  Empty for non‑runtime errors.
    pub fn stack_trace(&self) -> Vec<String> {
        let LoxError::Runtime { line, calls, .. } = self else {
            return Vec::new();
        };

        let mut trace: Vec<String> = Vec::with_capacity(calls.len() + 1);
        let mut at: usize = *line;

        for call in calls {
            trace.push(format!("[line {}] in {}()", at, call.function));
            at = call.line;
        }
        trace.push(format!("[line {}] in script", at));

        trace
    }

    /// Source line the error points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::Lex { line, .. }
            | LoxError::Parse { line, .. }
            | LoxError::Resolve { line, .. }
            | LoxError::Runtime { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// The bare message without location decoration.
    pub fn message(&self) -> String {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// A call that was active when a runtime error escaped it.
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Name of the callee.
    pub function: String,

    /// Line of the call expression in the caller.
    pub line: usize,
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Ordered collection of static errors produced by one stage.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<LoxError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: LoxError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LoxError> {
        self.errors.iter()
    }
}

impl<'d> IntoIterator for &'d Diagnostics {
    type Item = &'d LoxError;
    type IntoIter = std::slice::Iter<'d, LoxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}
