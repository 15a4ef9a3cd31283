//! Built-in tools: an arithmetic calculator and a reasoning scratchpad.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, run_blocking};
use serde::Deserialize;

// ── Calculator ─────────────────────────────────────────────────────

/// Evaluates arithmetic expressions: `+ - * / %`, unary minus and
/// parentheses over decimal numbers. Arguments are the expression text,
/// e.g. `TOOL:calculator:4*(2+3)`.
pub struct Calculator;

impl Tool for Calculator {
    fn definition(&self) -> ToolDef {
        ToolDef::text(
            "calculator",
            "Evaluate an arithmetic expression. Supports + - * / %, unary minus \
             and parentheses. Pass the expression as the argument, e.g. 4*(2+3).",
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let expr = arguments.to_string();
        run_blocking(move || evaluate(&expr).map(format_number))
    }
}

/// Deepest nesting of parentheses and unary signs [`evaluate`] accepts.
pub const MAX_NESTING: usize = 256;

/// Evaluate an expression to a number.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut parser = ExprParser {
        chars: expr.chars().filter(|c| !c.is_whitespace()).collect(),
        pos: 0,
        depth: 0,
    };
    if parser.chars.is_empty() {
        return Err("empty expression".into());
    }
    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        return Err(format!("unexpected '{c}' at position {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".into());
    }
    Ok(value)
}

/// Integers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct ExprParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    /// Run `f` one nesting level deeper. Bounds the recursion on model input.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_NESTING {
            return Err("expression nested too deeply".into());
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op != '*' && rhs == 0.0 {
                return Err("division by zero".into());
            }
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('-') => {
                self.pos += 1;
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.pos += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let value = self.nested(Self::expr)?;
                match self.bump() {
                    Some(')') => Ok(value),
                    _ => Err("missing closing parenthesis".into()),
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
                    self.pos += 1;
                }
                let literal: String = self.chars.iter().skip(start).take(self.pos - start).collect();
                literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))
            }
            Some(c) => Err(format!("unexpected '{c}' at position {}", self.pos)),
            None => Err("unexpected end of expression".into()),
        }
    }
}

// ── Think ──────────────────────────────────────────────────────────

/// A no-op scratchpad that gives the model a structured way to reason
/// between turns. The input is returned unchanged.
pub struct ThinkTool;

/// JSON form of the `think` arguments, for envelope callers.
#[derive(Deserialize)]
struct ThinkArgs {
    reasoning: String,
}

impl Tool for ThinkTool {
    fn definition(&self) -> ToolDef {
        ToolDef::text(
            "think",
            "Think through a problem step-by-step before acting. Pass your \
             reasoning as the argument. This is a scratchpad and performs no action.",
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let reasoning = match serde_json::from_str::<ThinkArgs>(arguments) {
            Ok(args) => args.reasoning,
            Err(_) => arguments.trim().to_string(),
        };
        Box::pin(async move {
            if reasoning.is_empty() {
                Ok("[no reasoning provided]".into())
            } else {
                Ok(reasoning)
            }
        })
    }
}
