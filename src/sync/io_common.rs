use std::path::Path;

use serde_json::{Number, Value as JSValue};

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// The name given to a column without header. Columns are numbered from 1.
pub fn column_name(n: usize) -> String {
    format!("Column{}", n)
}

/// The text of a value, or None for null.
///
/// Integral numbers are written without decimals, as the spreadsheets store all
/// the numbers as floats.
pub fn value_as_string(v: &JSValue) -> Option<String> {
    match v {
        JSValue::Null => None,
        JSValue::String(s) => Some(s.clone()),
        JSValue::Number(n) => Some(number_as_string(n)),
        JSValue::Bool(b) => Some(b.to_string()),
        x => Some(x.to_string()),
    }
}

pub fn is_blank(v: &JSValue) -> bool {
    value_as_string(v)
        .map(|s| s.trim().is_empty())
        .unwrap_or(true)
}

fn number_as_string(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if is_integral(f) => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

/// True for floats that can be represented exactly as an i64.
pub fn is_integral(f: f64) -> bool {
    f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15
}

/// A float as a JSON value, with the integral values written as integers.
pub fn float_to_json(f: f64) -> JSValue {
    if is_integral(f) {
        JSValue::from(f as i64)
    } else {
        Number::from_f64(f)
            .map(JSValue::Number)
            .unwrap_or(JSValue::Null)
    }
}
