//! Arithmetic and comparison semantics.
//!
//! Integer arithmetic stays in `i32` (wrapping); any float operand
//! promotes the operation to `f32`. `%` is integer-only. Division or
//! remainder by integer zero, and any arithmetic or ordering on
//! non-numeric operands, is a runtime error.

use crate::error::VmError;
use rill_core::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

fn type_error(what: &str, a: Value, b: Value) -> VmError {
    VmError::Runtime(format!(
        "{what} requires numeric operands, got {} and {}",
        a.type_name(),
        b.type_name()
    ))
}

pub fn arith(op: ArithOp, a: Value, b: Value) -> Result<Value, VmError> {
    if op == ArithOp::Mod {
        return match (a, b) {
            (Value::Int(_), Value::Int(0)) => {
                Err(VmError::Runtime("modulo by zero".to_string()))
            }
            (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_rem(y))),
            _ => Err(VmError::Runtime(format!(
                "modulo requires integer operands, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        };
    }

    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match op {
            ArithOp::Add => Value::Int(x.wrapping_add(y)),
            ArithOp::Sub => Value::Int(x.wrapping_sub(y)),
            ArithOp::Mul => Value::Int(x.wrapping_mul(y)),
            ArithOp::Div => {
                if y == 0 {
                    return Err(VmError::Runtime("division by zero".to_string()));
                }
                Value::Int(x.wrapping_div(y))
            }
            ArithOp::Mod => unreachable!("handled above"),
        }),
        _ => {
            let (x, y) = match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(type_error("arithmetic", a, b)),
            };
            Ok(match op {
                ArithOp::Add => Value::Float(x + y),
                ArithOp::Sub => Value::Float(x - y),
                ArithOp::Mul => Value::Float(x * y),
                ArithOp::Div => Value::Float(x / y),
                ArithOp::Mod => unreachable!("handled above"),
            })
        }
    }
}

pub fn compare(op: CmpOp, a: Value, b: Value) -> Result<bool, VmError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(match op {
            CmpOp::Lt => x < y,
            CmpOp::Le => x <= y,
            CmpOp::Gt => x > y,
            CmpOp::Ge => x >= y,
        }),
        _ => {
            let (x, y) = match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => (x, y),
                _ => return Err(type_error("comparison", a, b)),
            };
            Ok(match op {
                CmpOp::Lt => x < y,
                CmpOp::Le => x <= y,
                CmpOp::Gt => x > y,
                CmpOp::Ge => x >= y,
            })
        }
    }
}

pub fn negate(v: Value) -> Result<Value, VmError> {
    match v {
        Value::Int(i) => Ok(Value::Int(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(VmError::Runtime(format!(
            "cannot negate a {} value",
            v.type_name()
        ))),
    }
}
