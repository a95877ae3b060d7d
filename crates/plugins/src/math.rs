//! Math plugin: arithmetic over the `input` value.
//!
//! `math.add` / `math.subtract` take `input` and `amount`; `math.evaluate`
//! parses an arithmetic expression (`+ - * /`, parentheses, unary minus).

use async_trait::async_trait;
use skein_core::{
    Function, FunctionError, FunctionInvocation, FunctionMetadata, FunctionOutput,
    ParameterMetadata, ParameterType,
};
use std::sync::Arc;

pub const PLUGIN: &str = "math";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Evaluate,
}

pub struct MathFunction {
    metadata: FunctionMetadata,
    operation: Operation,
}

impl MathFunction {
    pub fn add() -> Self {
        Self {
            metadata: binary_metadata("add", "Add an amount to the input number"),
            operation: Operation::Add,
        }
    }

    pub fn subtract() -> Self {
        Self {
            metadata: binary_metadata("subtract", "Subtract an amount from the input number"),
            operation: Operation::Subtract,
        }
    }

    pub fn evaluate() -> Self {
        Self {
            metadata: FunctionMetadata::new("evaluate")
                .with_description(
                    "Evaluate an arithmetic expression. Supports +, -, *, /, parentheses and decimals.",
                )
                .with_parameter(
                    ParameterMetadata::new("expression")
                        .with_description("The expression, e.g. '(2 + 3) * 4'"),
                )
                .with_parameter(
                    ParameterMetadata::new("input")
                        .with_description("The expression, when 'expression' is not given"),
                )
                .with_return("The numeric result", ParameterType::Number),
            operation: Operation::Evaluate,
        }
    }
}

fn binary_metadata(name: &str, description: &str) -> FunctionMetadata {
    FunctionMetadata::new(name)
        .with_description(description)
        .with_parameter(
            ParameterMetadata::new("input")
                .with_description("The starting number")
                .with_type(ParameterType::Number)
                .required(),
        )
        .with_parameter(
            ParameterMetadata::new("amount")
                .with_description("The number to apply")
                .with_type(ParameterType::Number)
                .required(),
        )
        .with_return("The resulting number", ParameterType::Number)
}

/// All math functions, in listing order.
pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(MathFunction::add()),
        Arc::new(MathFunction::subtract()),
        Arc::new(MathFunction::evaluate()),
    ]
}

#[async_trait]
impl Function for MathFunction {
    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    async fn invoke(&self, invocation: FunctionInvocation<'_>) -> Result<FunctionOutput, FunctionError> {
        let name = format!("{PLUGIN}.{}", self.metadata.name);
        let vars = &*invocation.variables;

        let value = match self.operation {
            Operation::Add | Operation::Subtract => {
                let input = number(vars.input(), "input")?;
                let amount = number(vars.get("amount").unwrap_or_default(), "amount")?;
                if self.operation == Operation::Add {
                    input + amount
                } else {
                    input - amount
                }
            }
            Operation::Evaluate => {
                let expression = invocation
                    .arguments
                    .and_then(|args| args.get("expression"))
                    .and_then(serde_json::Value::as_str)
                    .or_else(|| vars.get("expression"))
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or(vars.input());
                if expression.trim().is_empty() {
                    return Err(FunctionError::InvalidArguments(
                        "Provide an 'expression' or 'input' to evaluate".into(),
                    ));
                }
                evaluate(expression).map_err(|reason| FunctionError::failed(&name, reason))?
            }
        };

        tracing::debug!(function = %name, value, "Math result");
        Ok(FunctionOutput::from(format_number(value)))
    }
}

fn number(raw: &str, parameter: &str) -> Result<f64, FunctionError> {
    raw.trim().parse::<f64>().map_err(|_| {
        FunctionError::InvalidArguments(format!("'{parameter}' is not a number: '{raw}'"))
    })
}

/// Integers print without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

// ── Expression evaluator ────────────────────────────────────────────────

/// Evaluate an arithmetic expression.
///
/// ```text
/// sum     = product (('+' | '-') product)*
/// product = factor (('*' | '/') factor)*
/// factor  = ('-' | '+') factor | '(' sum ')' | NUMBER
/// ```
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let mut cursor = Cursor {
        src: expression.as_bytes(),
        pos: 0,
    };
    let value = cursor.sum()?;
    cursor.skip_whitespace();
    match cursor.peek() {
        None => Ok(value),
        Some(c) => Err(format!("Unexpected '{}' at offset {}", c as char, cursor.pos)),
    }
}

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        loop {
            if self.eat(b'+') {
                acc += self.product()?;
            } else if self.eat(b'-') {
                acc -= self.product()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.factor()?;
        loop {
            if self.eat(b'*') {
                acc *= self.factor()?;
            } else if self.eat(b'/') {
                let divisor = self.factor()?;
                if divisor == 0.0 {
                    return Err("Division by zero".into());
                }
                acc /= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    fn factor(&mut self) -> Result<f64, String> {
        if self.eat(b'-') {
            return Ok(-self.factor()?);
        }
        if self.eat(b'+') {
            return self.factor();
        }
        if self.eat(b'(') {
            let inner = self.sum()?;
            if !self.eat(b')') {
                return Err("Missing closing parenthesis".into());
            }
            return Ok(inner);
        }
        self.literal()
    }

    fn literal(&mut self) -> Result<f64, String> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == b'.') {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek() {
                None => "Unexpected end of expression".to_string(),
                Some(c) => format!("Expected a number at offset {start}, found '{}'", c as char),
            });
        }
        let digits = &self.src[start..self.pos];
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| format!("Invalid number '{}'", String::from_utf8_lossy(digits)))
    }
}
