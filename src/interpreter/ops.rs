//! Operator dispatch on runtime values.
//!
//! Binary operators first resolve write-through handles on both sides, then
//! dispatch on the operand types. Arithmetic on two numbers coerces to float
//! if either side is float, else to int if either side is int, else stays
//! char. Comparisons require numbers; equality never fails (mismatched types
//! are simply unequal); `+`/`*` additionally cover string and list
//! concatenation and repetition.

use std::rc::Rc;

use crate::error::{Error, ErrorKind, Result};
use crate::parser::ast::{BinaryOperator, UnaryOperator};

use super::value::{Value, ValueRef, resolve, slot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumKind {
    Char,
    Int,
    Float,
}

fn num_kind(value: &Value) -> Option<NumKind> {
    match value {
        Value::Char(_) => Some(NumKind::Char),
        Value::Int(_) => Some(NumKind::Int),
        Value::Float(_) => Some(NumKind::Float),
        _ => None,
    }
}

/// Result type of an arithmetic operation on two numbers.
fn coerce(left: &Value, right: &Value) -> NumKind {
    let left = num_kind(left).unwrap_or(NumKind::Char);
    let right = num_kind(right).unwrap_or(NumKind::Char);
    if left == NumKind::Float || right == NumKind::Float {
        NumKind::Float
    } else if left == NumKind::Int || right == NumKind::Int {
        NumKind::Int
    } else {
        NumKind::Char
    }
}

fn type_error_binary(op: BinaryOperator, left: &Value, right: &Value) -> Error {
    Error::new(
        ErrorKind::Type,
        format!(
            "unsupported operand type(s) for operation {}: {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ),
    )
}

pub(crate) fn binary(op: BinaryOperator, left: &ValueRef, right: &ValueRef) -> Result<ValueRef> {
    let left = resolve(left);
    let right = resolve(right);
    let left = left.borrow();
    let right = right.borrow();

    let value = match op {
        BinaryOperator::Add => add(&left, &right)?,
        BinaryOperator::Sub => {
            if left.is_number() && right.is_number() {
                numeric(op, &left, &right)?
            } else {
                return Err(type_error_binary(op, &left, &right));
            }
        }
        BinaryOperator::Mul => mul(&left, &right)?,
        BinaryOperator::Div | BinaryOperator::Mod => {
            if left.is_number() && right.is_number() {
                numeric(op, &left, &right)?
            } else {
                return Err(type_error_binary(op, &left, &right));
            }
        }
        BinaryOperator::Less
        | BinaryOperator::LessEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterEqual => compare(op, &left, &right)?,
        BinaryOperator::Equal => Value::Int(values_equal(&left, &right) as i64),
        BinaryOperator::NotEqual => Value::Int(!values_equal(&left, &right) as i64),
        BinaryOperator::In => in_sequence(&left, &right)?,
        BinaryOperator::And => {
            if left.is_number() && right.is_number() {
                Value::Int((left.as_bool()? && right.as_bool()?) as i64)
            } else {
                return Err(type_error_binary(op, &left, &right));
            }
        }
        BinaryOperator::Or => {
            if left.is_number() && right.is_number() {
                Value::Int((left.as_bool()? || right.as_bool()?) as i64)
            } else {
                return Err(type_error_binary(op, &left, &right));
            }
        }
    };

    Ok(slot(value))
}

pub(crate) fn unary(op: UnaryOperator, operand: &ValueRef) -> Result<ValueRef> {
    match op {
        // Unary plus returns its operand untouched.
        UnaryOperator::Plus => Ok(Rc::clone(operand)),
        UnaryOperator::Not => {
            let resolved = resolve(operand);
            let value = resolved.borrow();
            if !value.is_number() {
                return Err(Error::new(
                    ErrorKind::Type,
                    format!(
                        "unsupported operand type for operation !: {}",
                        value.type_name()
                    ),
                ));
            }
            Ok(slot(Value::Int(!value.as_bool()? as i64)))
        }
        UnaryOperator::Minus => {
            let resolved = resolve(operand);
            let value = resolved.borrow();
            let zero = match num_kind(&value) {
                Some(NumKind::Char) => Value::Char(0),
                Some(NumKind::Int) => Value::Int(0),
                Some(NumKind::Float) => Value::Float(0.0),
                None => {
                    return Err(Error::new(
                        ErrorKind::Type,
                        format!(
                            "unsupported operand type for operation -: {}",
                            value.type_name()
                        ),
                    ));
                }
            };
            Ok(slot(numeric(BinaryOperator::Sub, &zero, &value)?))
        }
    }
}

fn add(left: &Value, right: &Value) -> Result<Value> {
    if left.is_number() && right.is_number() {
        return numeric(BinaryOperator::Add, left, right);
    }
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        let mut bytes = left.coerce_str_bytes();
        bytes.extend(right.coerce_str_bytes());
        return Ok(Value::Str(bytes));
    }
    if let (Value::List(a), Value::List(b)) = (left, right) {
        let items = a
            .iter()
            .chain(b.iter())
            .map(|item| slot(item.borrow().deep_copy()))
            .collect();
        return Ok(Value::List(items));
    }
    Err(type_error_binary(BinaryOperator::Add, left, right))
}

fn mul(left: &Value, right: &Value) -> Result<Value> {
    if left.is_number() && right.is_number() {
        return numeric(BinaryOperator::Mul, left, right);
    }
    let one_number = left.is_number() || right.is_number();
    if one_number && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
        let (text, count) = if let Value::Str(bytes) = left {
            (bytes, right)
        } else if let Value::Str(bytes) = right {
            (bytes, left)
        } else {
            return Err(type_error_binary(BinaryOperator::Mul, left, right));
        };
        let times = count.as_int()?.max(0) as usize;
        let mut bytes = Vec::with_capacity(text.len() * times);
        for _ in 0..times {
            bytes.extend_from_slice(text);
        }
        return Ok(Value::Str(bytes));
    }
    if one_number && (matches!(left, Value::List(_)) || matches!(right, Value::List(_))) {
        let (items, count) = if let Value::List(items) = left {
            (items, right)
        } else if let Value::List(items) = right {
            (items, left)
        } else {
            return Err(type_error_binary(BinaryOperator::Mul, left, right));
        };
        let times = count.as_int()?.max(0) as usize;
        let mut result = Vec::with_capacity(items.len() * times);
        for _ in 0..times {
            for item in items {
                result.push(slot(item.borrow().deep_copy()));
            }
        }
        return Ok(Value::List(result));
    }
    Err(type_error_binary(BinaryOperator::Mul, left, right))
}

/// Arithmetic on two values both known to be numeric.
fn numeric(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    if matches!(op, BinaryOperator::Div | BinaryOperator::Mod) && right.as_float()? == 0.0 {
        return Err(Error::plain(ErrorKind::DivisionByZero));
    }

    match coerce(left, right) {
        NumKind::Float => {
            let (a, b) = (left.as_float()?, right.as_float()?);
            let result = match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div => a / b,
                BinaryOperator::Mod => {
                    return Err(Error::new(
                        ErrorKind::ModNotAllowed,
                        "% operator only allowed on integers",
                    ));
                }
                _ => return Err(design_error(op)),
            };
            Ok(Value::Float(result))
        }
        NumKind::Int => {
            let (a, b) = (left.as_int()?, right.as_int()?);
            let result = match op {
                BinaryOperator::Add => a.wrapping_add(b),
                BinaryOperator::Sub => a.wrapping_sub(b),
                BinaryOperator::Mul => a.wrapping_mul(b),
                BinaryOperator::Div => a.wrapping_div(b),
                BinaryOperator::Mod => a.wrapping_rem(b),
                _ => return Err(design_error(op)),
            };
            Ok(Value::Int(result))
        }
        NumKind::Char => {
            let (a, b) = (left.as_char()?, right.as_char()?);
            let result = match op {
                BinaryOperator::Add => a.wrapping_add(b),
                BinaryOperator::Sub => a.wrapping_sub(b),
                BinaryOperator::Mul => a.wrapping_mul(b),
                BinaryOperator::Div => a.wrapping_div(b),
                BinaryOperator::Mod => a.wrapping_rem(b),
                _ => return Err(design_error(op)),
            };
            Ok(Value::Char(result))
        }
    }
}

fn design_error(op: BinaryOperator) -> Error {
    Error::new(
        ErrorKind::Design,
        format!("operator {} is not arithmetic", op.symbol()),
    )
}

/// `<` `<=` `>` `>=`: numbers only, result 0 or 1. Either operand being
/// float compares as float, either being int compares as int, else as char.
fn compare(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    if !left.is_number() || !right.is_number() {
        return Err(type_error_binary(op, left, right));
    }

    let ordering = match coerce(left, right) {
        NumKind::Float => left
            .as_float()?
            .partial_cmp(&right.as_float()?)
            .unwrap_or(std::cmp::Ordering::Greater),
        NumKind::Int => left.as_int()?.cmp(&right.as_int()?),
        NumKind::Char => left.as_char()?.cmp(&right.as_char()?),
    };

    let result = match op {
        BinaryOperator::Less => ordering.is_lt(),
        BinaryOperator::LessEqual => ordering.is_le(),
        BinaryOperator::Greater => ordering.is_gt(),
        BinaryOperator::GreaterEqual => ordering.is_ge(),
        _ => return Err(design_error(op)),
    };
    Ok(Value::Int(result as i64))
}

/// Deep value equality. Mismatched types are by definition not equal; this
/// never raises.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_number() && right.is_number() {
        return match coerce(left, right) {
            NumKind::Float => match (left.as_float(), right.as_float()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            NumKind::Int => match (left.as_int(), right.as_int()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            NumKind::Char => match (left.as_char(), right.as_char()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
        };
    }
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| values_equal(&x.borrow(), &y.borrow()))
        }
        _ => false,
    }
}

/// `left in right`: right must be a sequence; 1 iff some element equals left.
fn in_sequence(left: &Value, right: &Value) -> Result<Value> {
    let found = match right {
        Value::Str(bytes) => bytes
            .iter()
            .any(|byte| values_equal(left, &Value::Char(*byte))),
        Value::List(items) => items.iter().any(|item| values_equal(left, &item.borrow())),
        other => {
            return Err(Error::new(
                ErrorKind::Type,
                format!("{} is not subscriptable", other.type_name()),
            ));
        }
    };
    Ok(Value::Int(found as i64))
}

/// Number of items in a string or list.
pub(crate) fn sequence_length(sequence: &ValueRef) -> Result<i64> {
    let resolved = resolve(sequence);
    let value = resolved.borrow();
    match &*value {
        Value::Str(bytes) => Ok(bytes.len() as i64),
        Value::List(items) => Ok(items.len() as i64),
        other => Err(Error::new(
            ErrorKind::Type,
            format!("type {} is not subscriptable", other.type_name()),
        )),
    }
}

fn adjust_index(index: i64, len: usize) -> Result<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    if index < 0 || index >= len {
        return Err(Error::plain(ErrorKind::Index));
    }
    Ok(index as usize)
}

/// Single-index access. A list yields a write-through handle to the slot; a
/// string yields a fresh char. Negative indices count from the end.
pub(crate) fn item(sequence: &ValueRef, index: i64) -> Result<ValueRef> {
    let resolved = resolve(sequence);
    let value = resolved.borrow();
    match &*value {
        Value::Str(bytes) => {
            let at = adjust_index(index, bytes.len())?;
            Ok(slot(Value::Char(bytes[at])))
        }
        Value::List(items) => {
            let at = adjust_index(index, items.len())?;
            Ok(slot(Value::ListNode(Rc::clone(&items[at]))))
        }
        other => Err(Error::new(
            ErrorKind::Type,
            format!("type {} is not subscriptable", other.type_name()),
        )),
    }
}

fn clamp_range(start: i64, end: i64, len: usize) -> (usize, usize) {
    let len = len as i64;
    let mut start = if start < 0 { start + len } else { start };
    let mut end = if end < 0 { end + len } else { end };
    start = start.clamp(0, len);
    end = end.clamp(0, len);
    if end < start {
        end = start;
    }
    (start as usize, end as usize)
}

/// Slice access: bounds silently clamp, negatives count from the end, and
/// the selected region is a deep copy.
pub(crate) fn slice(sequence: &ValueRef, start: i64, end: i64) -> Result<ValueRef> {
    let resolved = resolve(sequence);
    let value = resolved.borrow();
    match &*value {
        Value::Str(bytes) => {
            let (from, to) = clamp_range(start, end, bytes.len());
            Ok(slot(Value::Str(bytes[from..to].to_vec())))
        }
        Value::List(items) => {
            let (from, to) = clamp_range(start, end, items.len());
            let copied = items[from..to]
                .iter()
                .map(|item| slot(item.borrow().deep_copy()))
                .collect();
            Ok(slot(Value::List(copied)))
        }
        other => Err(Error::new(
            ErrorKind::Type,
            format!("type {} is not subscriptable", other.type_name()),
        )),
    }
}
