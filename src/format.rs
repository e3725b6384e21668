//! Single-line rendering of expressions and type specs for node labels.
//!
//! Plain infix, one space around binary and assignment operators, no
//! parentheses. Total: a missing expression prints `?`, an unknown kind
//! prints its kind name.

use std::fmt;

use crate::ast::{Expr, TypeSpec};

/// Format an optional expression; `None` renders as `?`.
pub fn format_expr(expr: Option<&Expr>) -> String {
    match expr {
        Some(e) => expr_to_string(e),
        None => "?".to_string(),
    }
}

pub fn expr_to_string(expr: &Expr) -> String {
    match expr {
        Expr::Int(lit) => lit.value.to_string(),
        Expr::Variable(v) | Expr::Identifier(v) => v.name.clone(),
        Expr::Binary(b) => format!(
            "{} {} {}",
            format_expr(b.left.as_deref()),
            b.operator,
            format_expr(b.right.as_deref())
        ),
        Expr::Unary(u) => {
            let operand = format_expr(u.operand.as_deref());
            if u.is_postfix {
                format!("{}{}", operand, u.operator)
            } else {
                format!("{}{}", u.operator, operand)
            }
        }
        Expr::Assignment(a) => format!(
            "{} {} {}",
            format_expr(a.left.as_deref()),
            a.op,
            format_expr(a.right.as_deref())
        ),
        Expr::Call(c) => format!("{}({})", c.function_name, join(&c.arguments)),
        Expr::ArrayAccess(a) => format!(
            "{}[{}]",
            format_expr(a.array.as_deref()),
            format_expr(a.index.as_deref())
        ),
        Expr::ArrayInit(init) => format!("{{{}}}", join(&init.elements)),
        Expr::Unsupported { kind } => kind.clone(),
    }
}

fn join(items: &[Expr]) -> String {
    items
        .iter()
        .map(expr_to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `int`, `int*`, `int[10][20]`, `char**[4]`.
impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_type)?;
        for _ in 0..self.pointer_level {
            f.write_str("*")?;
        }
        for size in &self.array_sizes {
            write!(f, "[{}]", size)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/rust/test_format.rs"]
mod tests;
