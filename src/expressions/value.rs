//! Value coercion and comparison
//!
//! Concrete expression values are JSON values. Mixed-type comparisons use
//! a fixed coercion table instead of any host-language implicit conversion:
//!
//! | from    | to number                                   |
//! |---------|---------------------------------------------|
//! | null    | `0`                                         |
//! | boolean | `true` → `1`, `false` → `0`                 |
//! | string  | parsed as a number; empty or blank → `0`; otherwise `NaN` |
//! | array   | `NaN`                                       |
//! | object  | `NaN`                                       |
//!
//! `NaN` is never equal to anything, itself included. Strings of the same
//! type compare case-insensitively. Arrays and objects compare equal only to
//! a structurally identical value of the same type.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Falsy values: `false`, `0`, `-0`, `NaN`, `""` and `null`.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_number(s),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn parse_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Reject the words Rust would otherwise accept (`inf`, `nan`)
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    text.parse().unwrap_or(f64::NAN)
}

/// String form used by interpolation and the string built-ins.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s.clone(),
        Value::Array(_) => "Array".to_string(),
        Value::Object(_) => "Object".to_string(),
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Build a JSON number, keeping integral values integral. Non-finite
/// numbers have no JSON form and become `null`.
pub fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// `==` under the coercion table.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if same_type(a, b) {
        return match (a, b) {
            (Value::String(x), Value::String(y)) => x.to_lowercase() == y.to_lowercase(),
            (Value::Number(_), Value::Number(_)) => to_number(a) == to_number(b),
            _ => a == b,
        };
    }
    let (x, y) = (to_number(a), to_number(b));
    !x.is_nan() && !y.is_nan() && x == y
}

/// Ordering for `<`, `<=`, `>`, `>=`; `None` when the operands are not
/// comparable (any `NaN`).
pub fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        return Some(x.to_lowercase().cmp(&y.to_lowercase()));
    }
    to_number(a).partial_cmp(&to_number(b))
}
