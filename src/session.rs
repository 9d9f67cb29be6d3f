//! One interpreter plus the bookkeeping needed to feed it source text
//! repeatedly (a script file once, or prompt lines one at a time).

use std::io::Write;
use std::time::Instant;

use log::info;
use thiserror::Error;

use crate::ast::ExprIds;
use crate::error::{Diagnostics, LoxError};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;

/// Exit status for scan/parse/resolve failures.
pub const EXIT_STATIC_ERROR: i32 = 65;

/// Exit status for runtime failures.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Why a run stopped.
#[derive(Debug, Error)]
pub enum RunError {
    /// The source was rejected before execution began.
    #[error("{0}")]
    Static(Diagnostics),

    /// Execution started and was stopped by this error.
    #[error("{0}")]
    Runtime(LoxError),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Static(_) => EXIT_STATIC_ERROR,
            RunError::Runtime(_) => EXIT_RUNTIME_ERROR,
        }
    }

    /// Calls a runtime error unwound through; empty for static errors.
    pub fn stack_trace(&self) -> Vec<String> {
        match self {
            RunError::Static(_) => Vec::new(),
            RunError::Runtime(e) => e.stack_trace(),
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
    ids: ExprIds,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    /// Session whose `print` output goes to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        Self::with_interpreter(Interpreter::with_output(out))
    }

    fn with_interpreter(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            ids: ExprIds::new(),
        }
    }

    /// Scan, parse, resolve, and execute `source`.  Globals defined by earlier
    /// calls stay visible.
    pub fn run(&mut self, source: &str) -> Result<(), RunError> {
        let start = Instant::now();

        let (tokens, mut diagnostics) = scanner::scan(source);

        let mut parser = Parser::with_ids(&tokens, self.ids);
        let (statements, parse_diagnostics) = parser.parse();
        self.ids = parser.ids();
        diagnostics.extend(parse_diagnostics);

        if !diagnostics.is_empty() {
            return Err(RunError::Static(diagnostics));
        }

        let locals = Resolver::new()
            .resolve(&statements)
            .map_err(RunError::Static)?;

        info!("Front end finished in {:?}", start.elapsed());

        let start = Instant::now();
        let result = self
            .interpreter
            .interpret(&statements, locals)
            .map_err(RunError::Runtime);
        info!("Execution finished in {:?}", start.elapsed());

        result
    }
}
