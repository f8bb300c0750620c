use num_bigint::BigInt;
use num_traits::{FromPrimitive, Num};
use serde_json::Value;
use std::str::FromStr;

use crate::error::{Result, WitnessError};

/// Parse a JSON array of field elements.
///
/// Elements may be decimal strings, `0x`-prefixed hex strings or JSON integers.
pub fn parse_field_elements(json_value: &Value) -> Result<Vec<BigInt>> {
    let array = json_value
        .as_array()
        .ok_or_else(|| invalid(0, "witness must be a JSON array"))?;

    array
        .iter()
        .enumerate()
        .map(|(index, value)| parse_field_element(index, value))
        .collect()
}

/// Parse a single element; `index` is only used for error reporting.
pub fn parse_field_element(index: usize, value: &Value) -> Result<BigInt> {
    match value {
        Value::String(s) => parse_bigint_str(s)
            .ok_or_else(|| invalid(index, format!("`{s}` is not an integer"))),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(BigInt::from(v));
            }
            if let Some(v) = n.as_i64() {
                return Ok(BigInt::from(v));
            }
            // Large literals arrive as f64; only accept whole numbers
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .and_then(BigInt::from_f64)
                .ok_or_else(|| invalid(index, format!("{n} is not an integer")))
        }
        other => Err(invalid(index, format!("unexpected {}", type_name(other)))),
    }
}

fn parse_bigint_str(s: &str) -> Option<BigInt> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => BigInt::from_str_radix(hex, 16).ok()?,
        None if digits.bytes().all(|b| b.is_ascii_digit()) => BigInt::from_str(digits).ok()?,
        None => return None,
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn invalid(index: usize, reason: impl Into<String>) -> WitnessError {
    WitnessError::InvalidElement {
        index,
        reason: reason.into(),
    }
}
