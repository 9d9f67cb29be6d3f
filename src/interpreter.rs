//! Tree‑walking evaluator.
//!
//! Statements run against a chain of [`Environment`]s.  Variable references
//! the resolver placed in a local scope are read with a direct hop count;
//! anything it left unresolved is looked up in the globals.
//!
//! `return` is not an error: statement execution yields a [`Flow`] that every
//! statement‑sequence executor checks, and the function‑call boundary in
//! [`crate::callable::LoxFunction`] turns `Flow::Return` back into a value.
//!
//! Calls nest on the host stack.  Nesting is capped at [`MAX_CALL_DEPTH`]
//! (deeper calls fail with `Stack overflow.`), and the host stack is grown on
//! demand so the cap is reached before the thread runs out of stack.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info};

use crate::ast::{Expr, ExprId, Stmt};
use crate::callable::{LoxCallable, LoxFunction, NativeFunction};
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest allowed nesting of calls.
pub const MAX_CALL_DEPTH: usize = 4096;

/// Stack kept free before entering a call; with less left, the stack grows.
const RED_ZONE: usize = 100 * 1024;

/// Size of each stack segment allocated on growth.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f` with at least [`RED_ZONE`] bytes of stack available.
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Outcome of executing one statement.
#[derive(Debug)]
pub enum Flow {
    /// Fall through to the next statement.
    Normal,

    /// A `return` is unwinding toward the nearest call boundary.
    Return(Value),
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    depth: usize,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Creates an interpreter whose `print` output goes to `out`, with the
    /// native `clock` defined in the global scope.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();

        let clock: Rc<dyn LoxCallable> = Rc::new(NativeFunction::clock(Instant::now()));
        debug!("Defining native function '{}'", clock.name());
        globals
            .borrow_mut()
            .define(clock.name(), Value::Callable(Rc::clone(&clock)));

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            depth: 0,
            out,
        }
    }

    /// Runs a resolved program.  `locals` is the side table produced by
    /// [`crate::resolver::Resolver`] for exactly these statements.
    pub fn interpret(&mut self, statements: &[Stmt], locals: Locals) -> Result<()> {
        debug!(
            "Interpreting {} statements with {} resolved reference(s)",
            statements.len(),
            locals.len()
        );

        self.locals.extend(locals);

        // Output printed before a runtime error must still reach the writer.
        let result = self.execute_program(statements);
        self.out.flush()?;
        result?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    fn execute_program(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Err(LoxError::Internal(format!(
                    "'return' escaped to top level with value {}",
                    value
                )));
            }
        }
        Ok(())
    }

    // ───────────────────────────── statements ─────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let scope = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, scope.into_ref())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                // Capture the scope active *here*, at the declaration.
                let function =
                    LoxFunction::new(Rc::clone(declaration), Rc::clone(&self.environment));
                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Callable(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Flow::Return(value))
            }
        }
    }

    /// Runs `statements` inside `scope`, restoring the caller's scope on
    /// every exit path (normal completion, `return`, or error).
    pub fn execute_block(&mut self, statements: &[Stmt], scope: EnvRef) -> Result<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, scope);

        let result = self.execute_sequence(statements);

        self.environment = previous;
        result
    }

    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    // ──────────────────────────── expressions ─────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(Value::from(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                // The deciding operand is the result, not a coerced boolean.
                let short_circuit = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&hops) => self
                        .environment
                        .borrow_mut()
                        .assign_at(hops, name, value.clone())?,
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.invoke(callee, paren, values)
            }
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&hops) => self.environment.borrow().get_at(hops, name),
            None => self.globals.borrow().get(name),
        }
    }

    fn invoke(&mut self, callee: Value, paren: &Token, arguments: Vec<Value>) -> Result<Value> {
        let Value::Callable(function) = callee else {
            return Err(LoxError::runtime(paren, "Can only call functions."));
        };

        if arguments.len() != function.arity() {
            return Err(LoxError::runtime(
                paren,
                format!(
                    "Expected {} arguments but got {}.",
                    function.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        debug!("Invoking {} with {} argument(s)", function, arguments.len());

        self.depth += 1;
        let result = ensure_sufficient_stack(|| function.call(self, arguments));
        self.depth -= 1;

        let result: Value =
            result.map_err(|e| e.unwound_through(function.name(), paren.line))?;

        debug!("{} returned {}", function, result);
        Ok(result)
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let right: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(operator, "Operand of '-' must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),

            _ => Err(LoxError::Internal(format!(
                "invalid unary operator '{}'",
                operator.lexeme
            ))),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left: Value = self.evaluate(left)?;
        let right: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left != right)),
            _ => {}
        }

        if let TokenType::PLUS = operator.token_type {
            return match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                (a, b) => Err(LoxError::runtime(
                    operator,
                    format!(
                        "Operands of '+' must be two numbers or two strings, got {} and {}.",
                        a.describe(),
                        b.describe()
                    ),
                )),
            };
        }

        let (a, b) = match (left, right) {
            (Value::Number(a), Value::Number(b)) => (a, b),
            _ => {
                return Err(LoxError::runtime(
                    operator,
                    format!("Operands of '{}' must be numbers.", operator.lexeme),
                ))
            }
        };

        let value = match operator.token_type {
            TokenType::MINUS => Value::Number(a - b),
            TokenType::STAR => Value::Number(a * b),
            TokenType::SLASH => Value::Number(a / b),
            TokenType::GREATER => Value::Bool(a > b),
            TokenType::GREATER_EQUAL => Value::Bool(a >= b),
            TokenType::LESS => Value::Bool(a < b),
            TokenType::LESS_EQUAL => Value::Bool(a <= b),
            _ => {
                return Err(LoxError::Internal(format!(
                    "invalid binary operator '{}'",
                    operator.lexeme
                )))
            }
        };

        Ok(value)
    }
}
