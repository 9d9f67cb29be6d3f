use crate::ast::{Expr, LiteralValue};

/// Renders expressions back to text.
///
/// * [`AstPrinter::print`] gives the Crafting‑Interpreters prefix form used by
///   the `parse` subcommand: `(* (- 1.0) (group 2.0))`.
/// * [`AstPrinter::source`] gives fully parenthesised Lox source that parses
///   back into an expression with the same meaning.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                LiteralValue::Str(s) => s.clone(),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        // 3 → 3.0
                        format!("{:.1}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("(group {})", Self::print(inner)),

            // ── unary operator ──────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, Self::print(right))
            }

            // ── binary / logical operator ───────────────────────────────
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                Self::print(left),
                Self::print(right)
            ),

            // ── variable / assign / call ───────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut s = format!("(call {}", Self::print(callee));
                for arg in arguments {
                    s.push(' ');
                    s.push_str(&Self::print(arg));
                }
                s.push(')');
                s
            }
        }
    }

    /// Infix source text.  Every compound node is wrapped in parentheses so
    /// precedence never depends on the reader.
    pub fn source(expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),
                LiteralValue::False => "false".into(),
                LiteralValue::Nil => "nil".into(),
                LiteralValue::Str(s) => format!("\"{}\"", s),
                LiteralValue::Number(n) => n.to_string(),
            },

            Expr::Grouping(inner) => format!("({})", Self::source(inner)),

            Expr::Unary { operator, right } => {
                format!("({}{})", operator.lexeme, Self::source(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                Self::source(left),
                operator.lexeme,
                Self::source(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("({} = {})", name.lexeme, Self::source(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let arguments: Vec<String> = arguments.iter().map(Self::source).collect();
                format!("{}({})", Self::source(callee), arguments.join(", "))
            }
        }
    }
}
