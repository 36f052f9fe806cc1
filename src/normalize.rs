//! Column type normalization.
//!
//! Every value is coerced to its column's declared type before comparison.
//! Coercion never fails: anything that does not parse under the declared type
//! becomes [`Value::Null`]. Callers see how many values were degraded through
//! [`Normalized::coerced`], and the dataset layer logs it.

use std::collections::HashSet;

use crate::{
    data::{Value, parse_boolean_token, parse_naive_datetime},
    schema::ColumnType,
};

/// Boolean-like tokens accepted during inference. Digits are left out so that
/// `0`/`1` columns infer as integers.
const INFERRED_BOOLEAN_TOKENS: &[&str] = &["true", "false", "t", "f", "yes", "no", "y", "n"];

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub values: Vec<Value>,
    /// Number of non-null inputs that could not be represented and became null.
    pub coerced: usize,
}

pub fn normalize(values: &[Value], ty: ColumnType) -> Normalized {
    let mut coerced = 0usize;
    let values = values
        .iter()
        .map(|value| {
            let converted = coerce(value, ty);
            if converted.is_null() && !value.is_null() {
                coerced += 1;
            }
            converted
        })
        .collect();
    Normalized { values, coerced }
}

pub fn coerce(value: &Value, ty: ColumnType) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match ty {
        ColumnType::String => Value::String(value.as_display()),
        ColumnType::Integer => to_integer(value),
        ColumnType::Float => to_float(value),
        ColumnType::DateTime => to_datetime(value),
        ColumnType::Boolean => to_boolean(value),
    }
}

fn to_integer(value: &Value) -> Value {
    match value {
        Value::Integer(i) => Value::Integer(*i),
        Value::Float(f) => integral(*f),
        Value::Boolean(b) => Value::Integer(i64::from(*b)),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(parsed) = trimmed.parse::<i64>() {
                Value::Integer(parsed)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(integral)
                    .unwrap_or(Value::Null)
            }
        }
        Value::DateTime(_) | Value::Null => Value::Null,
    }
}

fn integral(value: f64) -> Value {
    if value.is_finite()
        && value.fract() == 0.0
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
    {
        Value::Integer(value as i64)
    } else {
        Value::Null
    }
}

fn to_float(value: &Value) -> Value {
    match value {
        Value::Integer(i) => Value::Float(*i as f64),
        Value::Float(f) => Value::from(*f),
        Value::Boolean(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or(Value::Null),
        Value::DateTime(_) | Value::Null => Value::Null,
    }
}

fn to_datetime(value: &Value) -> Value {
    match value {
        Value::DateTime(dt) => Value::DateTime(*dt),
        Value::String(s) => parse_naive_datetime(s)
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_boolean(value: &Value) -> Value {
    match value {
        Value::Boolean(b) => Value::Boolean(*b),
        Value::Integer(i) => Value::Boolean(*i != 0),
        Value::Float(f) => Value::Boolean(*f != 0.0),
        Value::String(s) => match parse_boolean_token(s) {
            Some(parsed) => Value::Boolean(parsed),
            None => match s.trim().parse::<f64>() {
                Ok(number) if !number.is_nan() => Value::Boolean(number != 0.0),
                _ => Value::Null,
            },
        },
        Value::DateTime(_) | Value::Null => Value::Null,
    }
}

#[derive(Debug, Clone, Copy)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    saw_fraction: bool,
    possible_datetime: bool,
    possible_boolean: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            saw_fraction: false,
            possible_datetime: true,
            possible_boolean: true,
        }
    }

    fn observe(&mut self, value: &Value, boolean_tokens: &mut HashSet<String>) {
        match value {
            Value::Null => {}
            Value::Integer(_) => {
                self.possible_datetime = false;
                self.possible_boolean = false;
            }
            Value::Float(f) => {
                self.possible_integer = false;
                self.saw_fraction |= f.fract() != 0.0;
                self.possible_datetime = false;
                self.possible_boolean = false;
            }
            Value::DateTime(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_boolean = false;
            }
            Value::Boolean(b) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_datetime = false;
                boolean_tokens.insert(b.to_string());
            }
            Value::String(s) => {
                let trimmed = s.trim();
                // Strings are never "already temporal".
                self.possible_datetime = false;
                if self.possible_integer && trimmed.parse::<i64>().is_err() {
                    self.possible_integer = false;
                }
                if self.possible_float {
                    match trimmed.parse::<f64>() {
                        Ok(parsed) if !parsed.is_nan() => {
                            if trimmed.contains(['.', 'e', 'E']) {
                                self.saw_fraction = true;
                            } else if trimmed.parse::<i64>().is_err() {
                                // Integral but wider than i64: keep the digits as text.
                                self.possible_float = false;
                            }
                        }
                        _ => self.possible_float = false,
                    }
                }
                let lowered = trimmed.to_ascii_lowercase();
                if self.possible_boolean && INFERRED_BOOLEAN_TOKENS.contains(&lowered.as_str()) {
                    boolean_tokens.insert(lowered);
                } else {
                    self.possible_boolean = false;
                }
            }
        }
    }

    fn decide(&self, boolean_tokens: &HashSet<String>) -> ColumnType {
        if self.possible_integer && !self.saw_fraction {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_datetime {
            ColumnType::DateTime
        } else if self.possible_boolean && boolean_tokens.len() <= 2 {
            ColumnType::Boolean
        } else {
            ColumnType::String
        }
    }
}

/// Picks a column type when none was declared.
///
/// Integer when every value is integral, float when every value is numeric and
/// at least one is fractional, datetime only when values are already temporal,
/// boolean for at most two distinct boolean-like tokens, string otherwise.
/// All-null columns are strings.
pub fn infer_type(values: &[Value]) -> ColumnType {
    let mut candidate = TypeCandidate::new();
    let mut boolean_tokens = HashSet::new();
    let mut observed = 0usize;
    for value in values.iter().filter(|v| !v.is_null()) {
        candidate.observe(value, &mut boolean_tokens);
        observed += 1;
    }
    if observed == 0 {
        return ColumnType::String;
    }
    candidate.decide(&boolean_tokens)
}
