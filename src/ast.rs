//! Abstract syntax tree for Lox programs.
//!
//! Two closed sum types, [`Expr`] and [`Stmt`], cover every node kind.  Nodes
//! only own their children; there are no parent links, and nothing rewrites a
//! node once the parser has built it.

use std::rc::Rc;

use crate::token::Token;

/// Stable identity of a variable‑referencing expression.
///
/// The resolver's side table is keyed by this id rather than by node address,
/// so statements can be moved or stored freely after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub usize);

/// Monotonic source of [`ExprId`]s.
///
/// Handing the same counter to successive parses (one per prompt line) keeps
/// ids unique for the lifetime of an interpreter.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprIds {
    next: usize,
}

impl ExprIds {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn fresh(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies the value out of the token so the AST never needs the
/// literal payload of a [`Token`] again.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    /// Integral lexemes such as `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// Every kind of *expression* in Lox.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary {
        /// The operator token (`!` or `-`).
        operator: Token,
        right: Box<Expr>,
    },

    /// Infix binary operator expression
    /// *Example:* `a + b`, `x <= y`
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token, // `AND` or `OR`
        right: Box<Expr>,
    },

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Function call
    /// *Example:* `clock()` or `add(1, 2)`
    Call {
        /// Expression that evaluates to a callable.
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        /// Argument list (may be empty).
        arguments: Vec<Expr>,
    },
}

/// A function declaration.  Shared behind an `Rc` so every closure created
/// from it points at the same body without copying it.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    /// Body executed when the function is called.
    pub body: Vec<Stmt>,
}

/// *Statements* (complete executable constructs).  A program is a sequence of
/// these nodes returned by [`crate::parser::Parser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    /// `if` / `else` conditional.
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop.  `for` loops are desugared into this form.
    While { condition: Expr, body: Box<Stmt> },

    /// Function declaration ‑ becomes a first‑class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },
}
