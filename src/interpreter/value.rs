//! The runtime value model.
//!
//! Values are shared through `Rc<RefCell<Value>>`: a variable binds a slot,
//! list elements are slots, and assignment writes into a slot in place.
//! `ListNode` is the write-through handle produced by subscripting a list:
//! it wraps the element's slot so `l[i] = v` can reach it, while every other
//! operation transparently resolves it to the held value.
//!
//! Cycles cannot form because composite values are deep-copied on insertion,
//! so plain reference counting reclaims everything.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, ErrorKind, Result};
use crate::parser::ast::VariableType;

pub type ValueRef = Rc<RefCell<Value>>;

#[derive(Debug, Clone)]
pub enum Value {
    Char(u8),
    Int(i64),
    Float(f64),
    /// A mutable owned byte string.
    Str(Vec<u8>),
    List(Vec<ValueRef>),
    /// Write-through handle to a list slot.
    ListNode(ValueRef),
    None,
}

/// Wrap an owned value in a fresh shared slot.
pub fn slot(value: Value) -> ValueRef {
    Rc::new(RefCell::new(value))
}

/// Unwrap one level of `ListNode`, yielding the slot every other operation
/// should act on.
pub fn resolve(value: &ValueRef) -> ValueRef {
    let inner = match &*value.borrow() {
        Value::ListNode(slot) => Some(Rc::clone(slot)),
        _ => None,
    };
    inner.unwrap_or_else(|| Rc::clone(value))
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Char(_) => "char",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::ListNode(_) => "listnode",
            Value::None => "none",
        }
    }

    /// The default value a declaration of `vtype` starts out with.
    pub fn default_for(vtype: VariableType) -> Value {
        match vtype {
            VariableType::Char => Value::Char(0),
            VariableType::Int => Value::Int(0),
            VariableType::Float => Value::Float(0.0),
            VariableType::Str => Value::Str(Vec::new()),
            VariableType::List => Value::List(Vec::new()),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Char(_) | Value::Int(_) | Value::Float(_))
    }

    /// Recursive copy with fresh slots. List elements are copies, never
    /// shared, and handles copy the value they point at.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| slot(item.borrow().deep_copy()))
                    .collect(),
            ),
            Value::ListNode(inner) => inner.borrow().deep_copy(),
            other => other.clone(),
        }
    }

    pub fn as_char(&self) -> Result<u8> {
        match self {
            Value::Char(c) => Ok(*c),
            Value::Int(i) => Ok(*i as u8),
            Value::Float(f) => Ok((*f as i64) as u8),
            Value::Str(bytes) => str_to_char(bytes),
            Value::ListNode(inner) => inner.borrow().as_char(),
            other => Err(Error::new(
                ErrorKind::Value,
                format!("cannot convert {} to char", other.type_name()),
            )),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Char(c) => Ok(*c as i64),
            Value::Int(i) => Ok(*i),
            Value::Float(f) => Ok(*f as i64),
            Value::Str(bytes) => parse_int_prefix(bytes),
            Value::ListNode(inner) => inner.borrow().as_int(),
            other => Err(Error::new(
                ErrorKind::Value,
                format!("cannot convert {} to integer", other.type_name()),
            )),
        }
    }

    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Char(c) => Ok(*c as f64),
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Str(bytes) => parse_float_prefix(bytes),
            Value::ListNode(inner) => inner.borrow().as_float(),
            other => Err(Error::new(
                ErrorKind::Value,
                format!("cannot convert {} to float", other.type_name()),
            )),
        }
    }

    /// Truthiness is defined for numeric values only.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Char(c) => Ok(*c != 0),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::ListNode(inner) => inner.borrow().as_bool(),
            other => Err(Error::new(
                ErrorKind::Value,
                format!("cannot convert {} to bool", other.type_name()),
            )),
        }
    }

    /// Bytes the `print` statement emits for this value. Floats use 15
    /// significant digits, `none` prints as `none`, lists print their
    /// elements between brackets with bare commas.
    pub fn display_bytes(&self) -> Vec<u8> {
        match self {
            Value::Char(c) => vec![*c],
            Value::Int(i) => i.to_string().into_bytes(),
            Value::Float(f) => format_float(*f, 15).into_bytes(),
            Value::Str(bytes) => bytes.clone(),
            Value::List(items) => {
                let mut out = vec![b'['];
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(b',');
                    }
                    out.extend(item.borrow().display_bytes());
                }
                out.push(b']');
                out
            }
            Value::ListNode(inner) => inner.borrow().display_bytes(),
            Value::None => b"none".to_vec(),
        }
    }

    /// Bytes of the string this value coerces to when assigned to a `str`
    /// slot or concatenated with a string. Floats use 16 significant digits
    /// here; `none` coerces to `"None"` and lists to the empty string.
    pub fn coerce_str_bytes(&self) -> Vec<u8> {
        match self {
            Value::Str(bytes) => bytes.clone(),
            Value::Char(c) => vec![*c],
            Value::Int(i) => i.to_string().into_bytes(),
            Value::Float(f) => format_float(*f, 16).into_bytes(),
            Value::None => b"None".to_vec(),
            Value::ListNode(inner) => inner.borrow().coerce_str_bytes(),
            Value::List(_) => Vec::new(),
        }
    }
}

/// Convert a string to a character value: one byte, or one escape sequence.
pub fn str_to_char(bytes: &[u8]) -> Result<u8> {
    let (value, used) = match bytes.first() {
        Some(b'\\') => match bytes.get(1) {
            Some(b'0') => (0, 2),
            Some(b'b') => (8, 2),
            Some(b'f') => (12, 2),
            Some(b'n') => (b'\n', 2),
            Some(b'r') => (b'\r', 2),
            Some(b't') => (b'\t', 2),
            Some(b'v') => (11, 2),
            Some(b'\\') => (b'\\', 2),
            Some(b'\'') => (b'\'', 2),
            Some(b'"') => (b'"', 2),
            other => {
                return Err(Error::new(
                    ErrorKind::Value,
                    format!(
                        "unknown escape sequence: {}",
                        other.map(|c| *c as char).unwrap_or(' ')
                    ),
                ));
            }
        },
        Some(c) => (*c, 1),
        None => {
            return Err(Error::new(ErrorKind::Syntax, "empty character constant"));
        }
    };
    if bytes.len() > used {
        return Err(Error::new(
            ErrorKind::Syntax,
            "too many characters in character constant",
        ));
    }
    Ok(value)
}

/// Integer conversion with `strtol` semantics: leading whitespace is
/// skipped, an optional sign and digits are consumed, trailing characters
/// are ignored. Converting nothing, or overflowing, is a `ValueError`.
pub fn parse_int_prefix(bytes: &[u8]) -> Result<i64> {
    let text = String::from_utf8_lossy(bytes).into_owned();

    let mut index = 0;
    while bytes.get(index).is_some_and(|c| c.is_ascii_whitespace()) {
        index += 1;
    }
    let negative = match bytes.get(index) {
        Some(b'-') => {
            index += 1;
            true
        }
        Some(b'+') => {
            index += 1;
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    let mut digits = 0;
    while let Some(c) = bytes.get(index) {
        if !c.is_ascii_digit() {
            break;
        }
        let digit = (*c - b'0') as i64;
        value = value
            .checked_mul(10)
            .and_then(|v| {
                if negative {
                    v.checked_sub(digit)
                } else {
                    v.checked_add(digit)
                }
            })
            .ok_or_else(|| {
                Error::new(ErrorKind::Value, format!("cannot convert {text} to int"))
            })?;
        digits += 1;
        index += 1;
    }

    if digits == 0 {
        return Err(Error::new(
            ErrorKind::Value,
            format!("cannot convert {text} to int"),
        ));
    }
    Ok(value)
}

/// Float conversion with `strtod` semantics: the longest valid prefix is
/// converted; overflow to infinity is a `ValueError`.
pub fn parse_float_prefix(bytes: &[u8]) -> Result<f64> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let invalid = || Error::new(ErrorKind::Value, format!("cannot convert {text} to float"));

    let mut start = 0;
    while bytes.get(start).is_some_and(|c| c.is_ascii_whitespace()) {
        start += 1;
    }

    let mut end = start;
    if matches!(bytes.get(end), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let mut digits = 0;
    while bytes.get(end).is_some_and(|c| c.is_ascii_digit()) {
        digits += 1;
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(|c| c.is_ascii_digit()) {
            digits += 1;
            end += 1;
        }
    }
    if digits == 0 {
        return Err(invalid());
    }
    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let mut exp_digits = 0;
        while bytes.get(exp_end).is_some_and(|c| c.is_ascii_digit()) {
            exp_digits += 1;
            exp_end += 1;
        }
        if exp_digits > 0 {
            end = exp_end;
        }
    }

    let prefix = std::str::from_utf8(&bytes[start..end]).map_err(|_| invalid())?;
    let value: f64 = prefix.parse().map_err(|_| invalid())?;
    if value.is_infinite() {
        return Err(invalid());
    }
    Ok(value)
}

/// `%.<sig>G`-style rendering: at most `sig` significant digits, trailing
/// zeros stripped, scientific notation (`E+NN`) outside the fixed range.
pub fn format_float(value: f64, significant: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-INF" } else { "INF" }.to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if exponent < -4 || exponent >= significant as i32 {
        let mantissa_digits = significant.saturating_sub(1);
        let formatted = format!("{value:.mantissa_digits$e}");
        let (mantissa, exp_text) = match formatted.split_once('e') {
            Some(parts) => parts,
            None => (formatted.as_str(), "0"),
        };
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let exp_value: i32 = exp_text.parse().unwrap_or(0);
        format!(
            "{mantissa}E{}{:02}",
            if exp_value < 0 { "-" } else { "+" },
            exp_value.abs()
        )
    } else {
        let decimals = (significant as i32 - 1 - exponent).max(0) as usize;
        let formatted = format!("{value:.decimals$}");
        if formatted.contains('.') {
            formatted
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        } else {
            formatted
        }
    }
}
