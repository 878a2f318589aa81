//! Expression evaluation.
//!
//! Reduces expression trees to values against an instance's storage.
//! Evaluation failures are engine-raised recoverable errors; the statement
//! boundary wraps them with source locations.

use crate::ast::{BinaryOp, Expr, UnaryOp, Value};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Evaluate an expression against the given storage.
pub fn eval(expr: &Expr, storage: &Storage) -> Result<Value> {
    match expr {
        Expr::Value(v) => Ok(v.clone()),
        Expr::Ident(name) => storage
            .get(name)
            .ok_or_else(|| Error::runtime(format!("undefined variable '{name}'"))),
        Expr::Unary { op, rhs } => {
            let value = eval(rhs, storage)?;
            eval_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => match op {
            // Logical operators short-circuit.
            BinaryOp::And => {
                if !eval(lhs, storage)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(eval(rhs, storage)?.is_truthy()))
            }
            BinaryOp::Or => {
                if eval(lhs, storage)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(eval(rhs, storage)?.is_truthy()))
            }
            _ => {
                let lhs = eval(lhs, storage)?;
                let rhs = eval(rhs, storage)?;
                eval_binary(*op, lhs, rhs)
            }
        },
        Expr::Member { target, field } => match eval(target, storage)? {
            Value::Extension(ext) => ext.member(field),
            other => Err(Error::runtime(format!(
                "type '{}' has no member '{field}'",
                other.type_name()
            ))),
        },
        Expr::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, storage)?);
            }
            call_builtin(name, values)
        }
    }
}

/// Try to reduce a constant-only subtree to a value. Returns `None` when
/// the subtree reads state or its evaluation would fail; folding must never
/// change which errors a program raises at run time.
pub fn eval_const(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Value(v) => Some(v.clone()),
        Expr::Unary { op, rhs } => {
            let value = eval_const(rhs)?;
            eval_unary(*op, value).ok()
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval_const(lhs)?;
            let rhs = eval_const(rhs)?;
            match op {
                BinaryOp::And => {
                    let rhs_truthy = rhs.is_truthy();
                    Some(Value::Bool(lhs.is_truthy() && rhs_truthy))
                }
                BinaryOp::Or => {
                    let rhs_truthy = rhs.is_truthy();
                    Some(Value::Bool(lhs.is_truthy() || rhs_truthy))
                }
                _ => eval_binary(*op, lhs, rhs).ok(),
            }
        }
        Expr::Ident(_) | Expr::Member { .. } | Expr::Call { .. } => None,
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(-i)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(Error::runtime(format!(
            "cannot negate value of type '{}'",
            other.type_name()
        ))),
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Eq => return Ok(Value::Bool(lhs == rhs)),
        Neq => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }
    // String concatenation.
    if op == Add {
        if let (Value::Str(a), b) = (&lhs, &rhs) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
        if let (a, Value::Str(b)) = (&lhs, &rhs) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }
    // String ordering.
    if let (Value::Str(a), Value::Str(b)) = (&lhs, &rhs) {
        let result = match op {
            Lt => a < b,
            Le => a <= b,
            Gt => a > b,
            Ge => a >= b,
            _ => {
                return Err(Error::runtime(format!(
                    "invalid operator '{op}' for strings"
                )))
            }
        };
        return Ok(Value::Bool(result));
    }
    // Everything else is numeric.
    let type_error = || {
        Error::runtime(format!(
            "invalid operands for '{op}': '{}' and '{}'",
            lhs.type_name(),
            rhs.type_name()
        ))
    };
    match (&lhs, &rhs) {
        (Value::Int(a), Value::Int(b)) => eval_numeric_int(op, *a, *b),
        (Value::Int(a), Value::Float(b)) => eval_numeric_float(op, *a as f64, *b),
        (Value::Float(a), Value::Int(b)) => eval_numeric_float(op, *a, *b as f64),
        (Value::Float(a), Value::Float(b)) => eval_numeric_float(op, *a, *b),
        _ => Err(type_error()),
    }
}

fn eval_numeric_int(op: BinaryOp, a: i64, b: i64) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => Ok(Value::Int(a.wrapping_add(b))),
        Sub => Ok(Value::Int(a.wrapping_sub(b))),
        Mul => Ok(Value::Int(a.wrapping_mul(b))),
        Div => {
            if b == 0 {
                Err(Error::runtime("division by zero"))
            } else if a % b == 0 {
                Ok(Value::Int(a / b))
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        Mod => {
            if b == 0 {
                Err(Error::runtime("division by zero"))
            } else {
                Ok(Value::Int(a % b))
            }
        }
        Lt => Ok(Value::Bool(a < b)),
        Le => Ok(Value::Bool(a <= b)),
        Gt => Ok(Value::Bool(a > b)),
        Ge => Ok(Value::Bool(a >= b)),
        Eq | Neq | And | Or => unreachable!("handled by eval_binary"),
    }
}

fn eval_numeric_float(op: BinaryOp, a: f64, b: f64) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Add => Ok(Value::Float(a + b)),
        Sub => Ok(Value::Float(a - b)),
        Mul => Ok(Value::Float(a * b)),
        Div => {
            if b == 0.0 {
                Err(Error::runtime("division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        Mod => {
            if b == 0.0 {
                Err(Error::runtime("division by zero"))
            } else {
                Ok(Value::Float(a % b))
            }
        }
        Lt => Ok(Value::Bool(a < b)),
        Le => Ok(Value::Bool(a <= b)),
        Gt => Ok(Value::Bool(a > b)),
        Ge => Ok(Value::Bool(a >= b)),
        Eq | Neq | And | Or => unreachable!("handled by eval_binary"),
    }
}

/// Dispatch a builtin function call.
fn call_builtin(name: &str, args: Vec<Value>) -> Result<Value> {
    match name {
        "println" => {
            println!("{}", join_args(&args));
            Ok(Value::Null)
        }
        "print" => {
            print!("{}", join_args(&args));
            Ok(Value::Null)
        }
        "to_string" => match args.as_slice() {
            [value] => Ok(Value::Str(value.to_string())),
            _ => Err(Error::runtime("to_string expects one argument")),
        },
        "typeid" => match args.as_slice() {
            [value] => Ok(Value::Str(value.type_name().to_string())),
            _ => Err(Error::runtime("typeid expects one argument")),
        },
        _ => Err(Error::runtime(format!("undefined function '{name}'"))),
    }
}

fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Expr {
        Expr::Value(Value::Int(v))
    }

    fn bin(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn arithmetic() {
        let storage = Storage::new();
        assert_eq!(
            eval(&bin(BinaryOp::Add, int(1), int(2)), &storage).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            eval(&bin(BinaryOp::Div, int(7), int(2)), &storage).unwrap(),
            Value::Float(3.5)
        );
        assert_eq!(
            eval(&bin(BinaryOp::Div, int(6), int(2)), &storage).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn division_by_zero_is_recoverable() {
        let storage = Storage::new();
        match eval(&bin(BinaryOp::Div, int(1), int(0)), &storage) {
            Err(Error::Runtime(msg)) => assert_eq!(msg, "division by zero"),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn string_concat() {
        let storage = Storage::new();
        let expr = bin(
            BinaryOp::Add,
            Expr::Value(Value::Str("x = ".into())),
            int(3),
        );
        assert_eq!(eval(&expr, &storage).unwrap(), Value::Str("x = 3".into()));
    }

    #[test]
    fn undefined_variable() {
        let storage = Storage::new();
        match eval(&Expr::Ident("ghost".into()), &storage) {
            Err(Error::Runtime(msg)) => assert!(msg.contains("ghost")),
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn logical_short_circuit() {
        let storage = Storage::new();
        // The rhs would raise if evaluated.
        let expr = bin(
            BinaryOp::And,
            Expr::Value(Value::Bool(false)),
            Expr::Ident("ghost".into()),
        );
        assert_eq!(eval(&expr, &storage).unwrap(), Value::Bool(false));
    }

    #[test]
    fn const_folding_covers_literals_only() {
        assert_eq!(
            eval_const(&bin(BinaryOp::Mul, int(6), int(7))),
            Some(Value::Int(42))
        );
        assert_eq!(eval_const(&Expr::Ident("x".into())), None);
        // A folding failure stays unfolded so the error surfaces at run time.
        assert_eq!(eval_const(&bin(BinaryOp::Div, int(1), int(0))), None);
    }
}
